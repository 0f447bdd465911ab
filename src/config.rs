//! Configuration management for cloudflare-dyndns.

use crate::error::{DdnsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE_URL: &str = "https://api.cloudflare.com";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cloudflare API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Timeout for every outbound HTTP request, in seconds.
    #[serde(default = "default_timeout")]
    pub http_timeout_secs: u64,

    /// Cache file location (overridden by `--cache-file`).
    #[serde(default)]
    pub cache_file: Option<PathBuf>,

    /// API token (or environment variable name if prefixed with $).
    #[serde(default)]
    pub api_token: Option<String>,

    /// Services used to detect the public IPv4 address, tried in order.
    #[serde(default = "default_ipv4_services")]
    pub ipv4_services: Vec<IpService>,

    /// Services used to detect the public IPv6 address, tried in order.
    #[serde(default = "default_ipv6_services")]
    pub ipv6_services: Vec<IpService>,
}

/// One "what is my IP" endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpService {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub parser: ResponseParser,
}

/// How to pull the address out of a service response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseParser {
    /// The whole body, whitespace trimmed.
    #[default]
    Plain,
    /// The `ip=` line of a Cloudflare `/cdn-cgi/trace` response.
    CloudflareTrace,
}

impl IpService {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            parser: ResponseParser::Plain,
        }
    }

    pub fn with_parser(mut self, parser: ResponseParser) -> Self {
        self.parser = parser;
        self
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_ipv4_services() -> Vec<IpService> {
    vec![
        IpService::new("CloudFlare trace", "https://1.1.1.1/cdn-cgi/trace")
            .with_parser(ResponseParser::CloudflareTrace),
        IpService::new("AWS check ip", "https://checkip.amazonaws.com/"),
        IpService::new("major.io icanhazip", "https://ipv4.icanhazip.com/"),
        IpService::new(
            "Namecheap DynamicDNS",
            "https://dynamicdns.park-your-domain.com/getip",
        ),
    ]
}

fn default_ipv6_services() -> Vec<IpService> {
    vec![
        IpService::new("ipify API", "https://api6.ipify.org"),
        IpService::new("ip.tyk.nu", "https://ip.tyk.nu/"),
        IpService::new("wgetip.com", "https://wgetip.com/"),
        IpService::new("major.io icanhazip", "https://ipv6.icanhazip.com/"),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            http_timeout_secs: default_timeout(),
            cache_file: None,
            api_token: None,
            ipv4_services: default_ipv4_services(),
            ipv6_services: default_ipv6_services(),
        }
    }
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DdnsError::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("cloudflare-dyndns").join("config.toml"))
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.ipv4_services.is_empty() && self.ipv6_services.is_empty() {
            return Err(DdnsError::Config(
                "At least one IP detection service is required".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(DdnsError::Config(
                "http_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// API token from the config file, with `$VAR` references resolved.
    pub fn resolved_api_token(&self) -> Option<String> {
        self.api_token.as_deref().map(resolve_env)
    }
}

/// Resolve environment variable references (values starting with $).
pub fn resolve_env(value: &str) -> String {
    if let Some(var_name) = value.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| {
            tracing::warn!("Environment variable {} not set", var_name);
            value.to_string()
        })
    } else {
        value.to_string()
    }
}
