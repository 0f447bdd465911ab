//! # cloudflare-dyndns
//!
//! Keeps Cloudflare A/AAAA records pointed at a host without a fixed
//! public address.
//!
//! ## Features
//!
//! - IPv4 and IPv6 detection through a list of fallback services
//! - Cache of the last published address and record ids, so unchanged runs
//!   make no API calls
//! - Per-domain failure isolation with aggregated exit codes
//! - Optional removal of records for an address family that went away
//!
//! ## Usage
//!
//! ```bash
//! # Update the A records of two domains
//! cloudflare-dyndns --api-token "$TOKEN" example.com www.example.com
//!
//! # Also manage AAAA records, proxied through Cloudflare
//! cloudflare-dyndns -6 --proxied example.com
//!
//! # Check the token and list the zones it can manage
//! cloudflare-dyndns --verify-token
//! ```

pub mod cache;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod providers;
pub mod types;

pub use cache::{Cache, CacheManager, IpCache, ZoneRecord};
pub use config::Config;
pub use detector::{AddressProbe, IpDetector};
pub use engine::{select_domains_to_update, UpdateEngine, UpdateOptions};
pub use error::{DdnsError, Result};
pub use providers::{CloudflareProvider, DnsProvider};
pub use types::{IpFamily, PassResult, RecordType};
