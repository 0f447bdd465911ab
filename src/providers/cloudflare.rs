//! Cloudflare DNS API client.

use super::DnsProvider;
use crate::config::DEFAULT_API_BASE_URL;
use crate::error::{DdnsError, Result};
use crate::types::RecordType;
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

const ZONES_PER_PAGE: u32 = 50;

/// Cloudflare DNS provider.
pub struct CloudflareProvider {
    client: reqwest::Client,
    api_token: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CloudflareResponse<T> {
    #[serde(default)]
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<CloudflareError>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct CloudflareError {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: u32,
}

/// A zone the API token can manage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct RecordRequest<'a> {
    #[serde(rename = "type")]
    record_type: RecordType,
    name: &'a str,
    content: String,
    proxied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DeletedRecord {
    #[allow(dead_code)]
    id: String,
}

fn format_errors(errors: &[CloudflareError]) -> String {
    if errors.is_empty() {
        return "Unknown error".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{} ({})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Candidate zone names for `domain`, most specific first.
///
/// `*.sub.example.com` yields `sub.example.com`, `example.com`.
fn zone_candidates(domain: &str) -> Vec<&str> {
    let domain = domain.strip_prefix("*.").unwrap_or(domain);
    let domain = domain.trim_end_matches('.');

    let mut candidates = vec![domain];
    let mut rest = domain;
    while let Some((_, parent)) = rest.split_once('.') {
        if !parent.contains('.') {
            break;
        }
        candidates.push(parent);
        rest = parent;
    }
    candidates
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider.
    pub fn new(api_token: String, timeout: Duration) -> Result<Self> {
        Self::with_base_url(api_token, DEFAULT_API_BASE_URL.to_string(), timeout)
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(api_token: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_token,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send an API request and unwrap the response envelope.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&RecordRequest<'_>>,
    ) -> Result<(T, Option<ResultInfo>)> {
        let url = format!("{}/client/v4{}", self.base_url, path);
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&self.api_token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        tracing::debug!("Response {}: {}", status, text);

        let envelope: std::result::Result<CloudflareResponse<T>, _> = serde_json::from_str(&text);

        if status.is_client_error() {
            let detail = match &envelope {
                Ok(envelope) => format_errors(&envelope.errors),
                Err(_) => text.clone(),
            };
            return Err(DdnsError::cloudflare(format!(
                "Client error {}: {}. Maybe your API token is invalid?",
                status, detail
            )));
        }

        let envelope = envelope?;

        if !envelope.success || !envelope.errors.is_empty() {
            return Err(DdnsError::cloudflare(format_errors(&envelope.errors)));
        }

        let result = envelope
            .result
            .ok_or_else(|| DdnsError::cloudflare("Response is missing the result field"))?;
        Ok((result, envelope.result_info))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let (result, _) = self.request(Method::GET, path, query, None).await?;
        Ok(result)
    }

    /// Check that the API token is accepted.
    pub async fn verify_token(&self) -> Result<()> {
        let url = format!("{}/client/v4/user/tokens/verify", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            return Err(DdnsError::TokenInvalid(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<CloudflareResponse<serde_json::Value>>(&text)
                .map(|r| format_errors(&r.errors))
                .unwrap_or(text);
            return Err(DdnsError::cloudflare(detail));
        }

        Ok(())
    }

    /// Every zone the API token can see.
    pub async fn list_zones(&self) -> Result<Vec<Zone>> {
        let mut zones = Vec::new();
        let mut page = 1;

        loop {
            let query = [
                ("page", page.to_string()),
                ("per_page", ZONES_PER_PAGE.to_string()),
            ];
            let (batch, info): (Vec<Zone>, _) =
                self.request(Method::GET, "/zones", &query, None).await?;
            zones.extend(batch);

            let total_pages = info.map(|i| i.total_pages).unwrap_or(1);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(zones)
    }

    async fn find_record(
        &self,
        zone_id: &str,
        domain: &str,
        record_type: RecordType,
    ) -> Result<Option<DnsRecord>> {
        let query = [
            ("name", domain.to_string()),
            ("type", record_type.to_string()),
        ];
        let records: Vec<DnsRecord> = self
            .get(&format!("/zones/{}/dns_records", zone_id), &query)
            .await?;

        Ok(records
            .into_iter()
            .find(|r| r.record_type == record_type.as_str() && r.name == domain))
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    async fn get_zone_id(&self, domain: &str) -> Result<String> {
        for candidate in zone_candidates(domain) {
            let zones: Vec<Zone> = self
                .get("/zones", &[("name", candidate.to_string())])
                .await?;

            if let Some(zone) = zones.into_iter().find(|z| z.name == candidate) {
                tracing::debug!("Zone of {} is {} ({})", domain, zone.name, zone.id);
                return Ok(zone.id);
            }
        }

        Err(DdnsError::cloudflare(format!(
            "Cannot find domain \"{}\" at Cloudflare",
            domain
        )))
    }

    async fn get_record_id(
        &self,
        zone_id: &str,
        domain: &str,
        record_type: RecordType,
    ) -> Result<Option<String>> {
        let record = self.find_record(zone_id, domain, record_type).await?;
        if record.is_none() {
            tracing::info!("No {} record found for \"{}\"", record_type, domain);
        }
        Ok(record.map(|r| r.id))
    }

    async fn create_record(
        &self,
        zone_id: &str,
        domain: &str,
        ip: IpAddr,
        proxied: bool,
    ) -> Result<String> {
        let record_type = RecordType::for_address(&ip);
        tracing::info!("Creating a new {} record for \"{}\".", record_type, domain);

        let request = RecordRequest {
            record_type,
            name: domain,
            content: ip.to_string(),
            proxied,
            ttl: Some(1),
        };

        let (record, _): (DnsRecord, _) = self
            .request(
                Method::POST,
                &format!("/zones/{}/dns_records", zone_id),
                &[],
                Some(&request),
            )
            .await?;

        Ok(record.id)
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        domain: &str,
        ip: IpAddr,
        proxied: bool,
    ) -> Result<()> {
        let record_type = RecordType::for_address(&ip);
        tracing::info!("Updating \"{}\" {} record.", domain, record_type);

        let request = RecordRequest {
            record_type,
            name: domain,
            content: ip.to_string(),
            proxied,
            ttl: None,
        };

        let _: (DnsRecord, _) = self
            .request(
                Method::PUT,
                &format!("/zones/{}/dns_records/{}", zone_id, record_id),
                &[],
                Some(&request),
            )
            .await?;

        Ok(())
    }

    async fn delete_record(
        &self,
        zone_id: &str,
        domain: &str,
        record_type: RecordType,
    ) -> Result<()> {
        tracing::warn!("Deleting {} record for \"{}\".", record_type, domain);

        let Some(record) = self.find_record(zone_id, domain, record_type).await? else {
            tracing::info!("{} record for \"{}\" doesn't exist.", record_type, domain);
            return Ok(());
        };

        let _: (DeletedRecord, _) = self
            .request(
                Method::DELETE,
                &format!("/zones/{}/dns_records/{}", zone_id, record.id),
                &[],
                None,
            )
            .await?;

        Ok(())
    }
}
