//! DNS provider API clients.

mod cloudflare;

pub use cloudflare::{CloudflareProvider, Zone};

use crate::error::Result;
use crate::types::RecordType;
use async_trait::async_trait;
use std::net::IpAddr;

/// Record-level operations the update engine needs from a DNS provider.
///
/// Every call is a single request/response; callers own retries and
/// caching of identifiers.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &'static str;

    /// Identifier of the zone that contains `domain`.
    async fn get_zone_id(&self, domain: &str) -> Result<String>;

    /// Identifier of the `record_type` record named `domain`.
    ///
    /// `Ok(None)` means the zone has no such record; `Err` means the lookup
    /// itself failed.
    async fn get_record_id(
        &self,
        zone_id: &str,
        domain: &str,
        record_type: RecordType,
    ) -> Result<Option<String>>;

    /// Create an address record for `domain` and return its identifier.
    async fn create_record(
        &self,
        zone_id: &str,
        domain: &str,
        ip: IpAddr,
        proxied: bool,
    ) -> Result<String>;

    /// Point an existing record at `ip`.
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        domain: &str,
        ip: IpAddr,
        proxied: bool,
    ) -> Result<()>;

    /// Delete the `record_type` record of `domain`. A missing record is not
    /// an error.
    async fn delete_record(&self, zone_id: &str, domain: &str, record_type: RecordType)
        -> Result<()>;
}
