//! Configured prefixes indexed for longest-prefix match.
//!
//! A [`RuleIndex`] is immutable once built. Reconfiguration builds a new
//! index and swaps it into the [`RuleTable`], so a detector classifying an
//! update keeps working against the snapshot it started with.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use log::debug;

use crate::models::{ConfiguredRule, PrefixNode};

/// Configured prefixes grouped by prefix length, so a lookup costs one hash
/// probe per distinct configured length rather than a scan of every prefix.
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    by_length: BTreeMap<u8, HashMap<IpNetwork, PrefixNode>>,
}

/// `prefix` with its host bits cleared, shortened to `len`
fn masked(prefix: &IpNetwork, len: u8) -> Option<IpNetwork> {
    let wider = IpNetwork::new(prefix.ip(), len).ok()?;
    IpNetwork::new(wider.network(), len).ok()
}

impl RuleIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from (prefixes, conf) pairs in config order. A prefix listed by
    /// several confs gets all of them, in the order they were given.
    pub fn build<I>(rules: I, timestamp: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = (Vec<IpNetwork>, ConfiguredRule)>,
    {
        let mut by_length: BTreeMap<u8, HashMap<IpNetwork, PrefixNode>> = BTreeMap::new();
        for (prefixes, conf) in rules {
            for prefix in prefixes {
                let prefix = masked(&prefix, prefix.prefix()).unwrap_or(prefix);
                by_length
                    .entry(prefix.prefix())
                    .or_default()
                    .entry(prefix)
                    .or_insert_with(|| PrefixNode::new(prefix, timestamp))
                    .confs
                    .push(conf.clone());
            }
        }
        let index = Self { by_length };
        debug!("Indexed {} configured prefixes", index.len());
        index
    }

    pub fn len(&self) -> usize {
        self.by_length.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_length.is_empty()
    }

    /// Most specific configured prefix covering `prefix`
    pub fn lookup(&self, prefix: &IpNetwork) -> Option<&PrefixNode> {
        self.by_length
            .range(..=prefix.prefix())
            .rev()
            .find_map(|(len, nodes)| nodes.get(&masked(prefix, *len)?))
    }
}

/// Current rule snapshot, replaced wholesale on reconfiguration
pub struct RuleTable {
    current: ArcSwap<RuleIndex>,
    version: AtomicU64,
}

impl RuleTable {
    pub fn new(index: RuleIndex) -> Self {
        Self {
            current: ArcSwap::from_pointee(index),
            version: AtomicU64::new(1),
        }
    }

    pub fn load(&self) -> Arc<RuleIndex> {
        self.current.load_full()
    }

    pub fn replace(&self, index: RuleIndex) {
        self.current.store(Arc::new(index));
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("Rule table now at version {}", version);
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}
