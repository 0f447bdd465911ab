//! Public IP detection.

use crate::config::{Config, IpService, ResponseParser};
use crate::error::{DdnsError, Result};
use crate::types::IpFamily;
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

/// Source of the machine's current public address.
#[async_trait]
pub trait AddressProbe: Send + Sync {
    /// First valid address of `family` reported by the configured services.
    async fn get_address(&self, family: IpFamily) -> Result<IpAddr>;
}

/// IP detector with multiple fallback services.
pub struct IpDetector {
    ipv4_client: reqwest::Client,
    ipv6_client: reqwest::Client,
    ipv4_services: Vec<IpService>,
    ipv6_services: Vec<IpService>,
}

impl IpDetector {
    /// Create a detector from the service lists and timeout in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_services(
            config.ipv4_services.clone(),
            config.ipv6_services.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    /// Create a new IP detector with custom services.
    ///
    /// Each family gets its own client bound to that family's unspecified
    /// address, so the request leaves over the family being probed.
    pub fn with_services(
        ipv4_services: Vec<IpService>,
        ipv6_services: Vec<IpService>,
        timeout: Duration,
    ) -> Result<Self> {
        let ipv4_client = reqwest::Client::builder()
            .timeout(timeout)
            .local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
            .build()?;
        let ipv6_client = reqwest::Client::builder()
            .timeout(timeout)
            .local_address(IpAddr::V6(Ipv6Addr::UNSPECIFIED))
            .build()?;

        Ok(Self {
            ipv4_client,
            ipv6_client,
            ipv4_services,
            ipv6_services,
        })
    }

    fn client_and_services(&self, family: IpFamily) -> (&reqwest::Client, &[IpService]) {
        match family {
            IpFamily::V4 => (&self.ipv4_client, self.ipv4_services.as_slice()),
            IpFamily::V6 => (&self.ipv6_client, self.ipv6_services.as_slice()),
        }
    }

    /// Try a single IP detection service.
    async fn try_service(&self, client: &reqwest::Client, service: &IpService) -> Result<IpAddr> {
        let response = client.get(&service.url).send().await?;

        if !response.status().is_success() {
            return Err(DdnsError::IpDetection(format!(
                "HTTP {} from {}",
                response.status(),
                service.url
            )));
        }

        let text = response.text().await?;
        let ip_str = parse_response(service.parser, &text).ok_or_else(|| {
            DdnsError::IpDetection(format!("No address in response from {}", service.url))
        })?;

        ip_str
            .parse()
            .map_err(|_| DdnsError::IpDetection(format!("Invalid IP response: {}", ip_str)))
    }
}

#[async_trait]
impl AddressProbe for IpDetector {
    async fn get_address(&self, family: IpFamily) -> Result<IpAddr> {
        let (client, services) = self.client_and_services(family);

        for service in services {
            tracing::info!(
                "Checking current {} address with service: {} ({})",
                family,
                service.name,
                service.url
            );

            match self.try_service(client, service).await {
                Ok(ip) if family.matches(&ip) => {
                    tracing::info!("Current {} address: {}", family, ip);
                    return Ok(ip);
                }
                Ok(ip) => {
                    tracing::warn!(
                        "Service {} returned {} which is not an {} address, skipping",
                        service.url,
                        ip,
                        family
                    );
                }
                Err(e) => {
                    tracing::warn!("Service {} failed: {}, skipping", service.url, e);
                }
            }
        }

        Err(DdnsError::IpDetection(format!(
            "Tried all IP services, but couldn't determine the current {} address",
            family
        )))
    }
}

fn parse_response(parser: ResponseParser, body: &str) -> Option<&str> {
    match parser {
        ResponseParser::Plain => Some(body.trim()),
        ResponseParser::CloudflareTrace => body
            .lines()
            .find_map(|line| line.strip_prefix("ip="))
            .map(str::trim),
    }
}
