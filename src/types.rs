//! Small value types shared across the crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Address family handled by one update pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    /// DNS record type holding addresses of this family.
    pub fn record_type(self) -> RecordType {
        match self {
            IpFamily::V4 => RecordType::A,
            IpFamily::V6 => RecordType::Aaaa,
        }
    }

    /// Whether `ip` belongs to this family.
    pub fn matches(self, ip: &IpAddr) -> bool {
        match self {
            IpFamily::V4 => ip.is_ipv4(),
            IpFamily::V6 => ip.is_ipv6(),
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpFamily::V4 => f.write_str("IPv4"),
            IpFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// Address record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    #[serde(rename = "A")]
    A,
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Record type for an address: `A` for IPv4, `AAAA` for IPv6.
    pub fn for_address(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an update pass, doubling as the process exit code.
///
/// Aggregating several results keeps the lowest failing code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PassResult {
    Ok = 0,
    UnknownError = 1,
    IpServiceError = 2,
    ProviderError = 3,
}

impl PassResult {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_ok(self) -> bool {
        self == PassResult::Ok
    }

    /// `Ok` if every result is `Ok`, otherwise the minimum failing code.
    pub fn aggregate<I>(results: I) -> PassResult
    where
        I: IntoIterator<Item = PassResult>,
    {
        results
            .into_iter()
            .filter(|r| !r.is_ok())
            .min()
            .unwrap_or(PassResult::Ok)
    }
}

impl From<PassResult> for std::process::ExitCode {
    fn from(result: PassResult) -> Self {
        std::process::ExitCode::from(result.code())
    }
}
