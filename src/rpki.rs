//! RPKI origin validation of hijacked announcements

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::error::DetectionError;
use crate::store::{keys, CoordinationStore};
use crate::utils::covers;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RpkiStatus {
    #[serde(rename = "VD")]
    Valid,
    #[serde(rename = "IA")]
    InvalidAsn,
    #[serde(rename = "IL")]
    InvalidLength,
    #[serde(rename = "IU")]
    InvalidUnknown,
    #[serde(rename = "NF")]
    NotFound,
    #[serde(rename = "NA")]
    NotAvailable,
}

impl RpkiStatus {
    pub fn code(&self) -> &'static str {
        use RpkiStatus::*;
        match self {
            Valid => "VD",
            InvalidAsn => "IA",
            InvalidLength => "IL",
            InvalidUnknown => "IU",
            NotFound => "NF",
            NotAvailable => "NA",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        use RpkiStatus::*;
        let status = match code {
            "VD" => Valid,
            "IA" => InvalidAsn,
            "IL" => InvalidLength,
            "IU" => InvalidUnknown,
            "NF" => NotFound,
            "NA" => NotAvailable,
            _ => return None,
        };
        Some(status)
    }
}

impl Default for RpkiStatus {
    fn default() -> Self {
        RpkiStatus::NotAvailable
    }
}

impl fmt::Display for RpkiStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[async_trait]
pub trait RpkiValidator: Send + Sync {
    async fn validate(
        &self,
        asn: u32,
        network: IpAddr,
        mask: u8,
    ) -> Result<RpkiStatus, DetectionError>;
}

/// Validate `asn` originating `prefix`, caching the answer in the
/// coordination store for `ttl`. Failures degrade to `NotAvailable`.
pub async fn cached_status(
    store: &dyn CoordinationStore,
    validator: &dyn RpkiValidator,
    asn: u32,
    prefix: &IpNetwork,
    ttl: Duration,
) -> RpkiStatus {
    let cache_key = keys::rpki_status(asn, prefix);
    let cached = match store.get(&cache_key).await {
        Ok(cached) => cached.as_deref().and_then(RpkiStatus::from_code),
        Err(err) => {
            warn!("Reading cached RPKI status for AS{} {}: {}", asn, prefix, err);
            None
        }
    };
    let status = match cached {
        Some(status) => status,
        None => match validator.validate(asn, prefix.network(), prefix.prefix()).await {
            Ok(status) => status,
            Err(err) => {
                warn!("{}", err);
                RpkiStatus::NotAvailable
            }
        },
    };
    trace!("RPKI status for AS{} {}: {}", asn, prefix, status);
    if let Err(err) = store.set_ex(&cache_key, status.code(), ttl).await {
        warn!("Caching RPKI status for AS{} {}: {}", asn, prefix, err);
    }
    status
}

/// Validated ROA payload: `asn` may originate `prefix` up to `max_length`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Roa {
    pub prefix: IpNetwork,
    pub max_length: Option<u8>,
    pub asn: u32,
}

impl Roa {
    fn max_length(&self) -> u8 {
        self.max_length.unwrap_or_else(|| self.prefix.prefix())
    }
}

/// Route origin validation against a fixed set of ROAs
#[derive(Debug, Default)]
pub struct StaticRoaValidator {
    roas: Vec<Roa>,
}

impl StaticRoaValidator {
    pub fn new(roas: Vec<Roa>) -> Self {
        Self { roas }
    }

    fn check(&self, asn: u32, route: &IpNetwork) -> RpkiStatus {
        let covering: Vec<&Roa> = self
            .roas
            .iter()
            .filter(|roa| covers(&roa.prefix, route))
            .collect();
        if covering.is_empty() {
            return RpkiStatus::NotFound;
        }
        let same_asn: Vec<&&Roa> = covering.iter().filter(|roa| roa.asn == asn).collect();
        if same_asn.is_empty() {
            RpkiStatus::InvalidAsn
        } else if same_asn
            .iter()
            .any(|roa| route.prefix() <= roa.max_length())
        {
            RpkiStatus::Valid
        } else {
            RpkiStatus::InvalidLength
        }
    }
}

#[async_trait]
impl RpkiValidator for StaticRoaValidator {
    async fn validate(
        &self,
        asn: u32,
        network: IpAddr,
        mask: u8,
    ) -> Result<RpkiStatus, DetectionError> {
        let route = IpNetwork::new(network, mask)
            .map_err(|err| DetectionError::Rpki(err.to_string()))?;
        Ok(self.check(asn, &route))
    }
}
