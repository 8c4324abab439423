use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::rpki::RpkiStatus;
use crate::utils::format_time_as_elapsed;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EndTag {
    Outdated,
}

/// Aggregated state of one ongoing hijack, shared by every detector
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HijackRecord {
    /// Persistent key, stable for the lifetime of the hijack
    pub key: String,
    pub prefix: IpNetwork,
    pub hijack_as: Option<u32>,
    /// Dimension tuple, e.g. "S|0|-|L"
    #[serde(rename = "type")]
    pub hij_type: String,
    pub time_started: DateTime<Utc>,
    pub time_last: DateTime<Utc>,
    pub time_detected: DateTime<Utc>,
    pub peers_seen: BTreeSet<u32>,
    /// ASNs assumed to have accepted the hijacked route
    pub asns_inf: BTreeSet<u32>,
    /// Update keys from the latest observation only
    pub monitor_keys: BTreeSet<String>,
    /// Every update key that contributed to this hijack
    pub bgpupdate_keys: BTreeSet<String>,
    pub configured_prefix: IpNetwork,
    pub timestamp_of_config: DateTime<Utc>,
    pub community_annotation: Option<String>,
    pub rpki_status: RpkiStatus,
    pub end_tag: Option<EndTag>,
    /// Persistent key of the hijack this one was re-filed from
    pub outdated_parent: Option<String>,
}

impl HijackRecord {
    /// Fold a fresh observation of the same hijack into this record.
    /// Community annotation is left to the caller.
    pub fn merge(&mut self, observation: &HijackRecord) {
        self.time_started = self.time_started.min(observation.time_started);
        self.time_last = self.time_last.max(observation.time_last);
        self.peers_seen.extend(observation.peers_seen.iter().copied());
        self.asns_inf.extend(observation.asns_inf.iter().copied());
        // TODO: confirm with product whether monitor_keys should accumulate like
        //       bgpupdate_keys; today only the latest observation is kept
        self.monitor_keys = observation.monitor_keys.clone();
        self.outdated_parent = observation.outdated_parent.clone();
        self.bgpupdate_keys
            .extend(observation.bgpupdate_keys.iter().cloned());
        self.rpki_status = observation.rpki_status;
    }
}

impl fmt::Display for HijackRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<Hijack {} prefix={} hijacker={} type={} peers={} age={}>",
            self.key,
            self.prefix,
            self.hijack_as
                .map_or_else(|| "unknown".to_string(), |asn| asn.to_string()),
            self.hij_type,
            self.peers_seen.len(),
            format_time_as_elapsed(self.time_started),
        )
    }
}
