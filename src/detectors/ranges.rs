//! Offline address ranges and allowlists.
//!
//! Both are built once from tolerant input and are read-only afterwards.

use ipnet::IpNet;
use serde_json::Value;
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, info, warn};

/// Parse an entry as a network prefix, or widen a single address to a
/// full-length prefix. Host bits in a prefix are allowed and dropped.
pub fn parse_network_or_address(entry: &str) -> Option<IpNet> {
    let entry = entry.trim();
    if entry.contains('/') {
        entry.parse::<IpNet>().ok().map(|net| net.trunc())
    } else {
        entry.parse::<IpAddr>().ok().map(IpNet::from)
    }
}

fn compile<I, S>(entries: I) -> (Vec<IpNet>, usize)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut nets = Vec::new();
    let mut skipped = 0;
    for entry in entries {
        match parse_network_or_address(entry.as_ref()) {
            Some(net) => nets.push(net),
            None => {
                debug!(entry = entry.as_ref(), "Skipping unparsable address entry");
                skipped += 1;
            }
        }
    }
    (nets, skipped)
}

/// Extract string entries from a JSON dataset.
///
/// A mapping contributes every string in its list values; a list contributes
/// its strings; anything else contributes nothing.
fn json_entries(data: Value) -> Vec<String> {
    let strings = |items: Vec<Value>| {
        items.into_iter().filter_map(|item| match item {
            Value::String(s) => Some(s),
            _ => None,
        })
    };

    match data {
        Value::Object(categories) => categories
            .into_iter()
            .filter_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .flat_map(strings)
            .collect(),
        Value::Array(items) => strings(items).collect(),
        _ => vec![],
    }
}

fn text_entries(source: &str) -> Vec<String> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Address ranges classified as anonymizers without a network call.
#[derive(Debug, Clone, Default)]
pub struct OfflineRangeSet {
    nets: Vec<IpNet>,
    skipped: usize,
}

impl OfflineRangeSet {
    /// Build from individual entries, skipping any that do not parse.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (nets, skipped) = compile(entries);
        Self { nets, skipped }
    }

    /// Build from dataset text: a JSON mapping of category to list, a JSON
    /// list, or one entry per line with `#` comments.
    pub fn from_source(source: &str) -> Self {
        let entries = match serde_json::from_str::<Value>(source) {
            Ok(data) => json_entries(data),
            Err(_) => text_entries(source),
        };
        Self::from_entries(entries)
    }

    /// Load from a file. A missing or unreadable file gives an empty set.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        let set = match std::fs::read_to_string(path) {
            Ok(source) => Self::from_source(&source),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Offline range dataset unreadable, continuing without it"
                );
                return Self::default();
            }
        };

        info!(
            path = %path.display(),
            ranges = set.len(),
            skipped = set.skipped(),
            "Loaded offline range dataset"
        );
        set
    }

    /// Return the first range containing `ip`.
    pub fn find(&self, ip: &IpAddr) -> Option<&IpNet> {
        self.nets.iter().find(|net| net.contains(ip))
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.find(ip).is_some()
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    /// Entries that failed to parse while building.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Addresses and ranges exempt from origin enforcement.
#[derive(Debug, Clone, Default)]
pub struct AddressAllowlist {
    nets: Vec<IpNet>,
}

impl AddressAllowlist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (nets, _) = compile(entries);
        Self { nets }
    }

    /// Parse a comma-separated list.
    pub fn from_csv(list: &str) -> Self {
        Self::new(list.split(',').filter(|s| !s.trim().is_empty()))
    }

    /// Check an address string. Unparsable addresses are never allowlisted.
    pub fn contains(&self, address: &str) -> bool {
        match address.trim().parse::<IpAddr>() {
            Ok(ip) => self.nets.iter().any(|net| net.contains(&ip)),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }
}
