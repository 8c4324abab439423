use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use serde::{self, Deserialize, Deserializer, Serialize, Serializer};

use super::community::{serialize_as_strings, Community};

/// Allowed ASNs for a position in the path (origin or first neighbor)
#[derive(Debug, Clone, PartialEq)]
pub enum AsnSet {
    /// Wildcard, every ASN is allowed
    Any,
    Listed(Vec<u32>),
}

impl AsnSet {
    /// Nothing configured at all (not even a wildcard)
    pub fn is_empty(&self) -> bool {
        matches!(self, AsnSet::Listed(asns) if asns.is_empty())
    }

    pub fn contains(&self, asn: u32) -> bool {
        match self {
            AsnSet::Any => true,
            AsnSet::Listed(asns) => asns.contains(&asn),
        }
    }
}

impl Default for AsnSet {
    fn default() -> Self {
        AsnSet::Listed(vec![])
    }
}

impl fmt::Display for AsnSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AsnSet::Any => write!(f, "*"),
            AsnSet::Listed(asns) => write!(f, "[{}]", itertools::join(asns, ", ")),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AsnEntry {
    Asn(u32),
    Token(String),
}

impl<'de> Deserialize<'de> for AsnSet {
    fn deserialize<D>(deserializer: D) -> Result<AsnSet, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<AsnEntry>::deserialize(deserializer)?;
        let mut asns = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                AsnEntry::Asn(asn) => asns.push(asn),
                AsnEntry::Token(token) if token == "*" => return Ok(AsnSet::Any),
                AsnEntry::Token(token) => {
                    return Err(serde::de::Error::custom(format!(
                        "Unsupported ASN: '{}'",
                        token
                    )))
                }
            }
        }
        Ok(AsnSet::Listed(asns))
    }
}

impl Serialize for AsnSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            AsnSet::Any => serializer.collect_seq(["*"].iter()),
            AsnSet::Listed(asns) => serializer.collect_seq(asns.iter()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Route must not be propagated past the first neighbor
    NoExport,
    #[serde(other)]
    Other,
}

/// Communities that must (in) and must not (out) be present
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CommunityRule {
    #[serde(rename = "in", default, with = "serialize_as_strings")]
    pub include: Vec<Community>,
    #[serde(rename = "out", default, with = "serialize_as_strings")]
    pub exclude: Vec<Community>,
}

impl CommunityRule {
    pub fn matches(&self, communities: &HashSet<Community>) -> bool {
        self.include.iter().all(|c| communities.contains(c))
            && !self.exclude.iter().any(|c| communities.contains(c))
    }
}

/// Named annotation applied to hijacks whose update satisfies any of `rules`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnnotationRule {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<CommunityRule>,
}

impl AnnotationRule {
    pub fn matches(&self, communities: &HashSet<Community>) -> bool {
        self.rules.iter().any(|rule| rule.matches(communities))
    }
}

/// Expectations an operator configured for a prefix (a "conf")
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ConfiguredRule {
    #[serde(default)]
    pub origin_asns: AsnSet,
    /// Empty means any neighbor is fine
    #[serde(default)]
    pub neighbors: AsnSet,
    /// Expected sub-paths right before the origin, peer side first
    #[serde(default)]
    pub prepend_seq: Vec<Vec<u32>>,
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub community_annotations: Vec<AnnotationRule>,
}

impl ConfiguredRule {
    pub fn has_policy(&self, policy: &Policy) -> bool {
        self.policies.contains(policy)
    }

    /// Any neighbor passes when nothing or a wildcard is configured
    pub fn allows_neighbor(&self, asn: u32) -> bool {
        self.neighbors.is_empty() || self.neighbors.contains(asn)
    }

    /// Position of an annotation name in this conf's ordered list
    pub fn annotation_rank(&self, name: &str) -> Option<usize> {
        self.community_annotations
            .iter()
            .position(|a| a.name == name)
    }
}

/// Configured prefix along with every conf attached to it, in config order
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PrefixNode {
    pub prefix: IpNetwork,
    pub confs: Vec<ConfiguredRule>,
    /// When the configuration holding these confs was loaded
    pub timestamp: DateTime<Utc>,
}

impl PrefixNode {
    pub fn new(prefix: IpNetwork, timestamp: DateTime<Utc>) -> Self {
        Self {
            prefix,
            confs: vec![],
            timestamp,
        }
    }
}
