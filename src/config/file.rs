use std::fs::File;
use std::io::Read;

use ipnetwork::IpNetwork;
use serde::Deserialize;
use toml;

use crate::error::DetectionError;
use crate::models::ConfiguredRule;
use crate::rpki::Roa;

struct Defaults {}

impl Defaults {
    fn lock_timeout() -> u64 {
        60
    }

    fn rpki_cache_ttl() -> u64 {
        3600
    }

    fn dedup_ttl() -> u64 {
        5400
    }

    fn rpki() -> bool {
        false
    }
}

/// Config (toml) representation of the engine tunables
#[derive(Debug, Deserialize)]
pub(super) struct DetectionSpec {
    // Seconds to wait for a hijack lock before treating an update as benign
    #[serde(default = "Defaults::lock_timeout")]
    pub(super) lock_timeout: u64,
    // Seconds an RPKI validation result stays cached
    #[serde(default = "Defaults::rpki_cache_ttl")]
    pub(super) rpki_cache_ttl: u64,
    // Seconds an update key is remembered for dedup
    #[serde(default = "Defaults::dedup_ttl")]
    pub(super) dedup_ttl: u64,
    // Tag hijacks with the RPKI status of their origin
    #[serde(default = "Defaults::rpki")]
    pub(super) rpki: bool,
}

impl Default for DetectionSpec {
    fn default() -> Self {
        Self {
            lock_timeout: Defaults::lock_timeout(),
            rpki_cache_ttl: Defaults::rpki_cache_ttl(),
            dedup_ttl: Defaults::dedup_ttl(),
            rpki: Defaults::rpki(),
        }
    }
}

/// One `[[rules]]` entry: a conf and every prefix it applies to
#[derive(Clone, Debug, Deserialize)]
pub(super) struct RuleSpec {
    pub(super) prefixes: Vec<IpNetwork>,
    #[serde(flatten)]
    pub(super) rule: ConfiguredRule,
}

#[derive(Debug, Deserialize)]
pub(super) struct EngineConfigSpec {
    #[serde(default)]
    pub(super) detection: DetectionSpec,
    #[serde(default = "Vec::new")]
    pub(super) rules: Vec<RuleSpec>,
    // Static ROAs for origin validation
    #[serde(default = "Vec::new")]
    pub(super) roas: Vec<Roa>,
}

impl EngineConfigSpec {
    pub(super) fn from_file(path: &str) -> Result<Self, DetectionError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::parse(&contents)
    }

    pub(super) fn parse(contents: &str) -> Result<Self, DetectionError> {
        let config: EngineConfigSpec = toml::from_str(contents)?;
        Ok(config)
    }
}
