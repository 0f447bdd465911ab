//! Error types for cloudflare-dyndns.

use crate::types::PassResult;
use thiserror::Error;

/// Result type alias for cloudflare-dyndns.
pub type Result<T> = std::result::Result<T, DdnsError>;

/// DDNS error types.
#[derive(Error, Debug)]
pub enum DdnsError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// Provider-specific error.
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    /// The API token was rejected by the provider.
    #[error("Invalid API token: {0}")]
    TokenInvalid(String),

    /// IP detection error.
    #[error("IP detection failed: {0}")]
    IpDetection(String),

    /// The cache file exists but cannot be parsed.
    #[error("Invalid cache file: {0}")]
    InvalidCache(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DdnsError {
    /// Shorthand for a Cloudflare API failure.
    pub fn cloudflare(message: impl Into<String>) -> Self {
        DdnsError::Provider {
            provider: "cloudflare".to_string(),
            message: message.into(),
        }
    }

    /// Map the error onto the status code reported for a pass.
    pub fn pass_result(&self) -> PassResult {
        match self {
            DdnsError::IpDetection(_) => PassResult::IpServiceError,
            DdnsError::Network(_)
            | DdnsError::Provider { .. }
            | DdnsError::TokenInvalid(_)
            | DdnsError::Serialization(_) => PassResult::ProviderError,
            DdnsError::Config(_) | DdnsError::InvalidCache(_) | DdnsError::Io(_) => {
                PassResult::UnknownError
            }
        }
    }
}

impl From<reqwest::Error> for DdnsError {
    fn from(e: reqwest::Error) -> Self {
        DdnsError::Network(e.to_string())
    }
}

impl From<toml::de::Error> for DdnsError {
    fn from(e: toml::de::Error) -> Self {
        DdnsError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for DdnsError {
    fn from(e: serde_json::Error) -> Self {
        DdnsError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_errors_map_to_provider_result() {
        assert_eq!(
            DdnsError::cloudflare("boom").pass_result(),
            PassResult::ProviderError
        );
        assert_eq!(
            DdnsError::Network("timeout".to_string()).pass_result(),
            PassResult::ProviderError
        );
        assert_eq!(
            DdnsError::TokenInvalid("nope".to_string()).pass_result(),
            PassResult::ProviderError
        );
    }

    #[test]
    fn test_detection_and_unknown_errors() {
        assert_eq!(
            DdnsError::IpDetection("no service".to_string()).pass_result(),
            PassResult::IpServiceError
        );
        assert_eq!(
            DdnsError::Config("bad".to_string()).pass_result(),
            PassResult::UnknownError
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(DdnsError::from(io).pass_result(), PassResult::UnknownError);
    }

    #[test]
    fn test_cloudflare_error_display() {
        let err = DdnsError::cloudflare("Domain not found");
        assert_eq!(
            err.to_string(),
            "Provider error (cloudflare): Domain not found"
        );
    }
}
