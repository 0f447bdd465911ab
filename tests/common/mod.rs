//! Shared test doubles for the engine contract tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cloudflare_dyndns::{AddressProbe, DdnsError, DnsProvider, IpFamily, RecordType, Result};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Mutex;

/// A provider call as seen by [`FakeProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetZoneId(String),
    GetRecordId(String, RecordType),
    Create(String, IpAddr, bool),
    Update {
        record_id: String,
        domain: String,
        ip: IpAddr,
        proxied: bool,
    },
    Delete(String, RecordType),
}

/// Provider operation, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    GetZoneId,
    GetRecordId,
    Create,
    Update,
    Delete,
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Call::GetZoneId(_) => Op::GetZoneId,
            Call::GetRecordId(..) => Op::GetRecordId,
            Call::Create(..) => Op::Create,
            Call::Update { .. } => Op::Update,
            Call::Delete(..) => Op::Delete,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Call::Create(..) | Call::Update { .. } | Call::Delete(..))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRecord {
    pub zone_id: String,
    pub name: String,
    pub record_type: RecordType,
    pub content: IpAddr,
    pub proxied: bool,
}

#[derive(Default)]
struct State {
    // zone name -> zone id
    zones: HashMap<String, String>,
    // record id -> record
    records: HashMap<String, FakeRecord>,
    next_id: usize,
    failing_domains: HashSet<String>,
    failing_ops: HashSet<(String, Op)>,
    calls: Vec<Call>,
}

/// In-memory DNS provider that records every call.
#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<State>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone(self, name: &str, zone_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .zones
            .insert(name.to_string(), zone_id.to_string());
        self
    }

    /// Seed an existing record and return its id.
    pub fn add_record(&self, zone_id: &str, name: &str, content: &str, proxied: bool) -> String {
        let content: IpAddr = content.parse().unwrap();
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let record_id = format!("rec-{}", state.next_id);
        state.records.insert(
            record_id.clone(),
            FakeRecord {
                zone_id: zone_id.to_string(),
                name: name.to_string(),
                record_type: RecordType::for_address(&content),
                content,
                proxied,
            },
        );
        record_id
    }

    /// Make every operation touching `domain` fail.
    pub fn fail_domain(&self, domain: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_domains
            .insert(domain.to_string());
    }

    /// Make only `op` fail for `domain`.
    pub fn fail_op(&self, domain: &str, op: Op) {
        self.state
            .lock()
            .unwrap()
            .failing_ops
            .insert((domain.to_string(), op));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn record(&self, name: &str, record_type: RecordType) -> Option<FakeRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .values()
            .find(|r| r.name == name && r.record_type == record_type)
            .cloned()
    }

    fn begin(&self, call: Call, domain: &str) -> Result<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        let op = call.op();
        state.calls.push(call);
        if state.failing_domains.contains(domain)
            || state.failing_ops.contains(&(domain.to_string(), op))
        {
            return Err(DdnsError::Network(format!("connection reset for {}", domain)));
        }
        Ok(state)
    }
}

#[async_trait]
impl DnsProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn get_zone_id(&self, domain: &str) -> Result<String> {
        let state = self.begin(Call::GetZoneId(domain.to_string()), domain)?;
        let name = domain.strip_prefix("*.").unwrap_or(domain);

        state
            .zones
            .iter()
            .filter(|(zone, _)| name == zone.as_str() || name.ends_with(&format!(".{}", zone)))
            .max_by_key(|(zone, _)| zone.len())
            .map(|(_, id)| id.clone())
            .ok_or_else(|| DdnsError::cloudflare(format!("Cannot find domain \"{}\"", domain)))
    }

    async fn get_record_id(
        &self,
        zone_id: &str,
        domain: &str,
        record_type: RecordType,
    ) -> Result<Option<String>> {
        let state = self.begin(Call::GetRecordId(domain.to_string(), record_type), domain)?;

        Ok(state
            .records
            .iter()
            .find(|(_, r)| r.zone_id == zone_id && r.name == domain && r.record_type == record_type)
            .map(|(id, _)| id.clone()))
    }

    async fn create_record(
        &self,
        zone_id: &str,
        domain: &str,
        ip: IpAddr,
        proxied: bool,
    ) -> Result<String> {
        let mut state = self.begin(Call::Create(domain.to_string(), ip, proxied), domain)?;
        state.next_id += 1;
        let record_id = format!("rec-{}", state.next_id);
        state.records.insert(
            record_id.clone(),
            FakeRecord {
                zone_id: zone_id.to_string(),
                name: domain.to_string(),
                record_type: RecordType::for_address(&ip),
                content: ip,
                proxied,
            },
        );
        Ok(record_id)
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        domain: &str,
        ip: IpAddr,
        proxied: bool,
    ) -> Result<()> {
        let call = Call::Update {
            record_id: record_id.to_string(),
            domain: domain.to_string(),
            ip,
            proxied,
        };
        let mut state = self.begin(call, domain)?;

        match state.records.get_mut(record_id) {
            Some(record) if record.zone_id == zone_id && record.name == domain => {
                record.content = ip;
                record.proxied = proxied;
                Ok(())
            }
            _ => Err(DdnsError::cloudflare("Record does not exist. (81044)")),
        }
    }

    async fn delete_record(
        &self,
        zone_id: &str,
        domain: &str,
        record_type: RecordType,
    ) -> Result<()> {
        let mut state = self.begin(Call::Delete(domain.to_string(), record_type), domain)?;
        state.records.retain(|_, r| {
            !(r.zone_id == zone_id && r.name == domain && r.record_type == record_type)
        });
        Ok(())
    }
}

/// Address probe answering from a fixed table; missing families fail.
#[derive(Default)]
pub struct StaticProbe {
    addresses: Mutex<HashMap<IpFamily, IpAddr>>,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, family: IpFamily, ip: &str) -> Self {
        self.set(family, ip);
        self
    }

    pub fn set(&self, family: IpFamily, ip: &str) {
        self.addresses
            .lock()
            .unwrap()
            .insert(family, ip.parse().unwrap());
    }
}

#[async_trait]
impl AddressProbe for StaticProbe {
    async fn get_address(&self, family: IpFamily) -> Result<IpAddr> {
        self.addresses
            .lock()
            .unwrap()
            .get(&family)
            .copied()
            .ok_or_else(|| DdnsError::IpDetection(format!("Failed to detect {} address", family)))
    }
}

pub fn domains(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}
