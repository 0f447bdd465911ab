//! Persisted record of the last published addresses.

use crate::error::{DdnsError, Result};
use crate::types::IpFamily;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Provider identifiers of a record the updater has written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub zone_id: String,
    pub record_id: String,
    #[serde(default)]
    pub proxied: bool,
}

/// Cached state for one address family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpCache {
    /// Last address this family was confirmed as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<IpAddr>,

    /// Domains successfully written at `address`.
    #[serde(default)]
    pub updated_domains: BTreeMap<String, ZoneRecord>,
}

impl IpCache {
    pub fn clear(&mut self) {
        self.address = None;
        self.updated_domains.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_none() && self.updated_domains.is_empty()
    }
}

/// Cache for both address families.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cache {
    #[serde(default)]
    pub ipv4: IpCache,
    #[serde(default)]
    pub ipv6: IpCache,
}

impl Cache {
    pub fn family(&self, family: IpFamily) -> &IpCache {
        match family {
            IpFamily::V4 => &self.ipv4,
            IpFamily::V6 => &self.ipv6,
        }
    }

    pub fn family_mut(&mut self, family: IpFamily) -> &mut IpCache {
        match family {
            IpFamily::V4 => &mut self.ipv4,
            IpFamily::V6 => &mut self.ipv6,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }
}

/// Loads and stores the cache as a JSON file.
pub struct CacheManager {
    path: PathBuf,
}

impl CacheManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<cache dir>/cloudflare-dyndns/ip.cache`, or `./ip.cache` when the
    /// platform has no cache directory.
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .map(|p| p.join("cloudflare-dyndns").join("ip.cache"))
            .unwrap_or_else(|| PathBuf::from("ip.cache"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cache file. A missing file yields an empty cache.
    pub fn load(&self) -> Result<Cache> {
        tracing::info!("Loading cache from: {}", self.path.display());

        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("Cache file not found.");
                return Ok(Cache::default());
            }
            Err(e) => return Err(e.into()),
        };

        let cache: Cache =
            serde_json::from_slice(&content).map_err(|e| DdnsError::InvalidCache(e.to_string()))?;
        tracing::debug!("Loaded cache: {:?}", cache);
        Ok(cache)
    }

    /// Like [`load`](Self::load), but an unreadable cache is deleted and
    /// replaced by an empty one.
    pub fn load_or_reset(&self) -> Result<Cache> {
        match self.load() {
            Ok(cache) => Ok(cache),
            Err(DdnsError::InvalidCache(reason)) => {
                tracing::warn!("Invalid cache file: {}", reason);
                self.delete()?;
                Ok(Cache::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Overwrite the cache file with `cache`.
    ///
    /// The content goes to a sibling `.tmp` file first and is renamed over
    /// the cache, so readers never see a partial file.
    pub fn save(&self, cache: &Cache) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(cache)?;
        tracing::debug!("Saving cache: {}", content);
        tracing::info!("Saving cache to: {}", self.path.display());
        let temp_path = self.temp_path();
        std::fs::write(&temp_path, content)?;
        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "ip.cache".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Remove the cache file. Removing a missing file is not an error.
    pub fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::warn!("Deleted cache at: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `new` if it differs from `old`; an emptied cache removes the
    /// file. Returns whether the file was touched.
    pub fn persist(&self, old: &Cache, new: &Cache) -> Result<bool> {
        if new == old {
            tracing::debug!("Cache unchanged, not saving");
            return Ok(false);
        }

        if new.is_empty() {
            self.delete()?;
        } else {
            self.save(new)?;
        }
        Ok(true)
    }
}
