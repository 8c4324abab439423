use std::collections::HashSet;
use std::convert::TryFrom;
use std::fmt;
use std::slice::Iter;

use serde::{Deserialize, Serialize};

use crate::error::DetectionError;

/// Standard community, as reported by route collectors
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Community {
    pub asn: u32,
    pub value: u32,
}

impl Community {
    pub fn new(asn: u32, value: u32) -> Self {
        Self { asn, value }
    }
}

impl fmt::Display for Community {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.asn, self.value)
    }
}

impl TryFrom<&str> for Community {
    type Error = DetectionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let invalid = || DetectionError::Config(format!("Invalid community '{}'", value));
        let (asn, val) = value.trim().split_once(':').ok_or_else(invalid)?;
        Ok(Community {
            asn: asn.parse().map_err(|_| invalid())?,
            value: val.parse().map_err(|_| invalid())?,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CommunityList(pub Vec<Community>);

impl CommunityList {
    pub fn iter(&self) -> Iter<Community> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_set(&self) -> HashSet<Community> {
        self.0.iter().copied().collect()
    }
}

impl fmt::Display for CommunityList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let communities = self
            .0
            .iter()
            .map(std::string::ToString::to_string)
            .collect::<Vec<String>>()
            .join(" ");
        write!(f, "{}", communities)
    }
}

/// (De)serialize communities written as "asn:value" strings
pub(crate) mod serialize_as_strings {
    use std::convert::TryFrom;

    use serde::{self, Deserialize, Deserializer, Serializer};

    use super::Community;

    pub fn serialize<S>(communities: &[Community], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(communities.iter().map(|c| c.to_string()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Community>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| Community::try_from(s.as_str()).map_err(serde::de::Error::custom))
            .collect()
    }
}
