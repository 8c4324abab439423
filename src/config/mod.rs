mod file;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ipnetwork::IpNetwork;
use log::warn;

use crate::error::DetectionError;
use crate::models::ConfiguredRule;
use crate::rpki::{Roa, RpkiValidator, StaticRoaValidator};
use crate::rules::RuleIndex;

/// Tunables shared by every detector
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    pub lock_timeout: Duration,
    pub rpki_cache_ttl: Duration,
    pub dedup_ttl: Duration,
    pub rpki: bool,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self::from_spec(&file::DetectionSpec::default())
    }
}

impl DetectionSettings {
    fn from_spec(spec: &file::DetectionSpec) -> Self {
        Self {
            lock_timeout: Duration::from_secs(spec.lock_timeout),
            rpki_cache_ttl: Duration::from_secs(spec.rpki_cache_ttl),
            dedup_ttl: Duration::from_secs(spec.dedup_ttl),
            rpki: spec.rpki,
        }
    }
}

/// In-Memory representation of the config file
#[derive(Debug)]
pub struct EngineConfig {
    pub settings: DetectionSettings,
    /// (prefixes, conf) pairs in file order
    pub rules: Vec<(Vec<IpNetwork>, ConfiguredRule)>,
    pub roas: Vec<Roa>,
}

impl EngineConfig {
    /// Parse a TOML config file and return an EngineConfig
    pub fn from_file(path: &str) -> Result<Self, DetectionError> {
        let spec = file::EngineConfigSpec::from_file(path)?;
        Ok(Self::from_spec(spec))
    }

    pub fn from_toml(contents: &str) -> Result<Self, DetectionError> {
        let spec = file::EngineConfigSpec::parse(contents)?;
        Ok(Self::from_spec(spec))
    }

    fn from_spec(spec: file::EngineConfigSpec) -> Self {
        let rules = spec
            .rules
            .into_iter()
            .enumerate()
            .filter_map(|(i, r)| {
                if r.prefixes.is_empty() {
                    warn!("Ignoring rule #{} without prefixes", i + 1);
                    return None;
                }
                Some((r.prefixes, r.rule))
            })
            .collect();
        Self {
            settings: DetectionSettings::from_spec(&spec.detection),
            rules,
            roas: spec.roas,
        }
    }

    /// Fresh longest-prefix index over the configured rules
    pub fn rule_index(&self) -> RuleIndex {
        RuleIndex::build(self.rules.iter().cloned(), Utc::now())
    }

    /// Origin validator, if RPKI tagging is enabled
    pub fn validator(&self) -> Option<Arc<dyn RpkiValidator>> {
        if !self.settings.rpki {
            return None;
        }
        if self.roas.is_empty() {
            warn!("RPKI tagging enabled without any ROAs, every origin will be NF");
        }
        Some(Arc::new(StaticRoaValidator::new(self.roas.clone())))
    }
}
