//! Update-decision engine.
//!
//! One [`UpdateEngine::run_pass`] call handles a single address family:
//! it detects the current address, works out which requested domains are
//! stale relative to the cache, reconciles them one by one against the DNS
//! provider and records every successful write in the new cache snapshot.
//! Failures are isolated per domain so one broken record never stops the
//! others from being updated.

use crate::cache::{Cache, IpCache, ZoneRecord};
use crate::detector::AddressProbe;
use crate::error::Result;
use crate::providers::DnsProvider;
use crate::types::{IpFamily, PassResult, RecordType};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

/// Per-invocation settings of the engine.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Domains to keep pointed at this host.
    pub domains: Vec<String>,
    /// Update every domain regardless of the cache.
    pub force: bool,
    /// Request provider-side proxying for the records.
    pub proxied: bool,
    /// Remove records of a family whose address cannot be detected.
    pub delete_missing: bool,
    /// Return the first failure as an error instead of a status code.
    pub debug: bool,
}

/// Reconciles DNS records with the current address, one family at a time.
pub struct UpdateEngine<'a> {
    provider: &'a dyn DnsProvider,
    probe: &'a dyn AddressProbe,
    options: UpdateOptions,
    // zone ids resolved during the current pass
    zone_ids: HashMap<String, String>,
}

impl<'a> UpdateEngine<'a> {
    pub fn new(
        provider: &'a dyn DnsProvider,
        probe: &'a dyn AddressProbe,
        options: UpdateOptions,
    ) -> Self {
        Self {
            provider,
            probe,
            options,
            zone_ids: HashMap::new(),
        }
    }

    /// Run one pass per family, in order, and aggregate their results.
    ///
    /// `new` is expected to start as a copy of `old`.
    pub async fn run(
        &mut self,
        families: &[IpFamily],
        old: &Cache,
        new: &mut Cache,
    ) -> Result<PassResult> {
        let mut results = Vec::with_capacity(families.len());
        for &family in families {
            let result = self
                .run_pass(family, old.family(family), new.family_mut(family))
                .await?;
            results.push(result);
        }
        Ok(PassResult::aggregate(results))
    }

    /// Reconcile every stale domain for `family`.
    ///
    /// Only returns `Err` in debug mode; otherwise failures are reported
    /// through the returned [`PassResult`].
    pub async fn run_pass(
        &mut self,
        family: IpFamily,
        old: &IpCache,
        new: &mut IpCache,
    ) -> Result<PassResult> {
        self.zone_ids.clear();

        let current_ip = match self.probe.get_address(family).await {
            Ok(ip) => ip,
            Err(e) => {
                tracing::error!("{}", e);
                if !self.options.delete_missing {
                    return Ok(PassResult::IpServiceError);
                }

                self.delete_records(family).await;
                new.clear();
                return Ok(PassResult::Ok);
            }
        };

        if old.address != Some(current_ip) {
            match old.address {
                Some(previous) => {
                    tracing::info!("{} address changed: {} -> {}", family, previous, current_ip)
                }
                None => tracing::info!("No cached {} address, using {}", family, current_ip),
            }
            // entries recorded for the previous address no longer hold
            new.address = Some(current_ip);
            new.updated_domains.clear();
        }

        let domains = select_domains_to_update(
            &self.options.domains,
            self.options.force,
            current_ip,
            old,
            self.options.proxied,
        );
        if domains.is_empty() {
            tracing::info!("Every domain is up-to-date for {}.", current_ip);
            return Ok(PassResult::Ok);
        }

        self.update_domains(&domains, current_ip, old, new).await
    }

    async fn update_domains(
        &mut self,
        domains: &[String],
        current_ip: IpAddr,
        old: &IpCache,
        new: &mut IpCache,
    ) -> Result<PassResult> {
        tracing::debug!(
            "Updating {} domain(s) through {}",
            domains.len(),
            self.provider.name()
        );
        let mut failures = Vec::new();
        let mut first_error = None;

        for domain in domains {
            let cached = if self.options.force {
                None
            } else {
                old.updated_domains.get(domain)
            };

            match self.reconcile_domain(domain, current_ip, cached).await {
                Ok(record) => {
                    new.updated_domains.insert(domain.clone(), record);
                }
                Err(e) => {
                    tracing::error!("Failed to update records for domain \"{}\": {}", domain, e);
                    failures.push((domain.as_str(), e.pass_result()));
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            if self.options.debug {
                return Err(e);
            }
        }

        if failures.is_empty() {
            return Ok(PassResult::Ok);
        }

        let failed: Vec<&str> = failures.iter().map(|(domain, _)| *domain).collect();
        tracing::warn!(
            "{} of {} domains failed to update: {}",
            failed.len(),
            domains.len(),
            failed.join(", ")
        );
        Ok(PassResult::aggregate(failures.iter().map(|(_, r)| *r)))
    }

    /// Make the provider's record for `domain` point at `current_ip`.
    ///
    /// Cached identifiers are tried first; if the provider rejects them the
    /// zone and record are looked up again, creating the record when the
    /// zone has none.
    async fn reconcile_domain(
        &mut self,
        domain: &str,
        current_ip: IpAddr,
        cached: Option<&ZoneRecord>,
    ) -> Result<ZoneRecord> {
        let proxied = self.options.proxied;

        if let Some(cached) = cached {
            match self
                .provider
                .update_record(
                    &cached.zone_id,
                    &cached.record_id,
                    domain,
                    current_ip,
                    proxied,
                )
                .await
            {
                Ok(()) => {
                    return Ok(ZoneRecord {
                        zone_id: cached.zone_id.clone(),
                        record_id: cached.record_id.clone(),
                        proxied,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        "Cached record of \"{}\" was rejected ({}), looking it up again",
                        domain,
                        e
                    );
                }
            }
        }

        let zone_id = self.resolve_zone_id(domain).await?;
        let record_type = RecordType::for_address(&current_ip);

        let record_id = match self
            .provider
            .get_record_id(&zone_id, domain, record_type)
            .await?
        {
            Some(record_id) => {
                self.provider
                    .update_record(&zone_id, &record_id, domain, current_ip, proxied)
                    .await?;
                record_id
            }
            None => {
                self.provider
                    .create_record(&zone_id, domain, current_ip, proxied)
                    .await?
            }
        };

        Ok(ZoneRecord {
            zone_id,
            record_id,
            proxied,
        })
    }

    async fn resolve_zone_id(&mut self, domain: &str) -> Result<String> {
        if let Some(zone_id) = self.zone_ids.get(domain) {
            return Ok(zone_id.clone());
        }

        let zone_id = self.provider.get_zone_id(domain).await?;
        self.zone_ids.insert(domain.to_string(), zone_id.clone());
        Ok(zone_id)
    }

    /// Best-effort removal of the `family` records of every requested domain.
    async fn delete_records(&mut self, family: IpFamily) {
        let record_type = family.record_type();
        let domains = self.options.domains.clone();

        for domain in &domains {
            let result = match self.resolve_zone_id(domain).await {
                Ok(zone_id) => {
                    self.provider
                        .delete_record(&zone_id, domain, record_type)
                        .await
                }
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                tracing::warn!(
                    "Could not delete {} record for \"{}\": {}",
                    record_type,
                    domain,
                    e
                );
            }
        }
    }
}

/// Requested domains whose record does not reflect `current_ip` yet.
///
/// A domain is up-to-date only when the address is unchanged and the cache
/// holds it with the requested `proxied` flag. The result keeps request
/// order and contains no duplicates.
pub fn select_domains_to_update(
    domains: &[String],
    force: bool,
    current_ip: IpAddr,
    old: &IpCache,
    proxied: bool,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let requested: Vec<&String> = domains
        .iter()
        .filter(|d| seen.insert(*d))
        .collect();

    if force {
        tracing::warn!("Forced update, ignoring cache");
        return requested.into_iter().cloned().collect();
    }

    if old.address != Some(current_ip) {
        return requested.into_iter().cloned().collect();
    }

    let (up_to_date, stale): (Vec<&String>, Vec<&String>) =
        requested.into_iter().partition(|domain| {
            old.updated_domains
                .get(domain.as_str())
                .is_some_and(|record| record.proxied == proxied)
        });

    if up_to_date.is_empty() {
        tracing::info!("There are no domains with this IP address in cache.");
    } else {
        let names: Vec<&str> = up_to_date.iter().map(|d| d.as_str()).collect();
        tracing::info!("Domains with this IP address in cache: {}", names.join(", "));
    }

    stale.into_iter().cloned().collect()
}
