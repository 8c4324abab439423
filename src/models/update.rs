use std::fmt;

use chrono::{DateTime, Duration, Utc};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use super::community::CommunityList;
use crate::utils::{as_path_to_string, get_hash};

/// Service tag carried by withdrawals synthesized from benign announcements
pub const IMPLICIT_WITHDRAWAL_SERVICE: &str = "implicit-withdrawal";

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum UpdateType {
    #[serde(rename = "A")]
    Announce,
    #[serde(rename = "W")]
    Withdraw,
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let code = match self {
            UpdateType::Announce => "A",
            UpdateType::Withdraw => "W",
        };
        write!(f, "{}", code)
    }
}

/// Classification an update was filed under when it's replayed
/// from the set of ongoing hijacks
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PriorHijack {
    /// Persistent hijack key
    #[serde(rename = "hij_key")]
    pub key: String,
    pub hijack_as: Option<u32>,
    #[serde(rename = "hij_type")]
    pub hij_type: String,
}

/// One announcement or withdrawal seen by a feed
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RouteUpdate {
    /// Per-update dedup key, generated on intake when missing
    #[serde(default)]
    pub key: String,
    pub service: String,
    #[serde(rename = "type")]
    pub kind: UpdateType,
    pub prefix: IpNetwork,
    /// AS path as observed, peer first and origin last
    #[serde(default)]
    pub path: Vec<u32>,
    #[serde(default)]
    pub communities: CommunityList,
    pub timestamp: DateTime<Utc>,
    pub peer_asn: u32,
    #[serde(flatten)]
    pub hijack: Option<PriorHijack>,
    /// Key of the benign announcement that caused this (implicit withdrawals only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
}

impl RouteUpdate {
    pub fn announce(prefix: IpNetwork, path: Vec<u32>, peer_asn: u32, service: &str) -> Self {
        let mut update = Self {
            key: String::new(),
            service: service.to_string(),
            kind: UpdateType::Announce,
            prefix,
            path,
            communities: CommunityList::default(),
            timestamp: Utc::now(),
            peer_asn,
            hijack: None,
            triggered_by: None,
        };
        update.key = update.compute_key();
        update
    }

    pub fn compute_key(&self) -> String {
        get_hash(&(
            self.prefix.to_string(),
            &self.path,
            self.kind.to_string(),
            self.timestamp.timestamp_micros(),
            self.peer_asn,
        ))
    }

    /// Fill in the dedup key if the feed didn't provide one
    pub fn ensure_key(&mut self) {
        if self.key.is_empty() {
            self.key = self.compute_key();
        }
    }

    pub fn is_replay(&self) -> bool {
        self.hijack.is_some()
    }

    /// Withdrawal of `prefix` from this update's peer, inferred from this
    /// (benign) announcement superseding a hijacked route
    pub fn implicit_withdrawal(&self, prefix: IpNetwork) -> RouteUpdate {
        let mut withdrawal = RouteUpdate {
            key: String::new(),
            service: IMPLICIT_WITHDRAWAL_SERVICE.to_string(),
            kind: UpdateType::Withdraw,
            prefix,
            path: vec![],
            communities: CommunityList::default(),
            timestamp: self.timestamp + Duration::seconds(1),
            peer_asn: self.peer_asn,
            hijack: None,
            triggered_by: Some(self.key.clone()),
        };
        withdrawal.key = withdrawal.compute_key();
        withdrawal
    }
}

impl fmt::Display for RouteUpdate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<RouteUpdate {} prefix={} peer={} path=[{}] service={}>",
            self.kind,
            self.prefix,
            self.peer_asn,
            as_path_to_string(&self.path),
            self.service,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_feed_update() {
        let update: RouteUpdate = serde_json::from_str(
            r#"{
                "service": "ripe-ris|rrc00",
                "type": "A",
                "prefix": "139.91.0.0/16",
                "path": [8522, 5408, 8522],
                "communities": [{"asn": 8522, "value": 100}],
                "timestamp": "2020-01-01T00:00:00Z",
                "peer_asn": 8522
            }"#,
        )
        .unwrap();
        assert_eq!(update.kind, UpdateType::Announce);
        assert!(update.key.is_empty());
        assert!(!update.is_replay());
        assert_eq!(update.communities.iter().count(), 1);
    }

    #[test]
    fn test_deserialize_replayed_update() {
        let update: RouteUpdate = serde_json::from_str(
            r#"{
                "key": "abc",
                "service": "a",
                "type": "A",
                "prefix": "10.0.0.0/24",
                "path": [3, 2, 1],
                "timestamp": "2020-01-01T00:00:00Z",
                "peer_asn": 3,
                "hij_key": "persistent",
                "hijack_as": 1,
                "hij_type": "E|0|-|-"
            }"#,
        )
        .unwrap();
        let prior = update.hijack.unwrap();
        assert_eq!(prior.key, "persistent");
        assert_eq!(prior.hijack_as, Some(1));
        assert_eq!(prior.hij_type, "E|0|-|-");
    }

    #[test]
    fn test_ensure_key() {
        let mut update = RouteUpdate::announce("10.0.0.0/24".parse().unwrap(), vec![2, 1], 2, "a");
        let key = update.key.clone();
        update.key.clear();
        update.ensure_key();
        assert_eq!(update.key, key);
    }

    #[test]
    fn test_implicit_withdrawal() {
        let update = RouteUpdate::announce("10.0.0.0/24".parse().unwrap(), vec![2, 1], 2, "a");
        let withdrawal = update.implicit_withdrawal("10.0.0.0/23".parse().unwrap());
        assert_eq!(withdrawal.kind, UpdateType::Withdraw);
        assert_eq!(withdrawal.service, IMPLICIT_WITHDRAWAL_SERVICE);
        assert_eq!(withdrawal.peer_asn, 2);
        assert!(withdrawal.path.is_empty());
        assert_eq!(withdrawal.timestamp, update.timestamp + Duration::seconds(1));
        assert_eq!(withdrawal.triggered_by, Some(update.key.clone()));
        assert_ne!(withdrawal.key, update.key);
    }
}
