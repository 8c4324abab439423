use std::error;
use std::fmt;
use std::io;

use tokio_util::codec::LinesCodecError;

use crate::store::StoreError;

#[derive(Debug)]
pub enum DetectionError {
    /// Coordination store failed. [cause]
    Store(StoreError),
    /// Could not (de)serialize a message or record. [reason]
    Serialization(String),
    /// Invalid configuration. [reason]
    Config(String),
    /// RPKI validator failed. [reason]
    Rpki(String),
    /// Something happened reading input or config files. [reason]
    Io(String),
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Detection Error: ")?;
        use DetectionError::*;
        match self {
            Store(err) => write!(f, "{}", err)?,
            Serialization(r) => write!(f, "Serialization error [{}]", r)?,
            Config(r) => write!(f, "Invalid config [{}]", r)?,
            Rpki(r) => write!(f, "RPKI validation error [{}]", r)?,
            Io(r) => write!(f, "IO error [{}]", r)?,
        }
        Ok(())
    }
}

impl error::Error for DetectionError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            DetectionError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for DetectionError {
    fn from(error: StoreError) -> Self {
        DetectionError::Store(error)
    }
}

impl From<serde_json::Error> for DetectionError {
    fn from(error: serde_json::Error) -> Self {
        DetectionError::Serialization(error.to_string())
    }
}

impl From<io::Error> for DetectionError {
    fn from(error: io::Error) -> Self {
        DetectionError::Io(error.to_string())
    }
}

impl From<toml::de::Error> for DetectionError {
    fn from(error: toml::de::Error) -> Self {
        DetectionError::Config(error.to_string())
    }
}

impl From<LinesCodecError> for DetectionError {
    fn from(error: LinesCodecError) -> Self {
        match error {
            LinesCodecError::Io(err) => err.into(),
            err => DetectionError::Serialization(err.to_string()),
        }
    }
}
