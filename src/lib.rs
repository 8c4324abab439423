pub mod config;
pub mod detection;
mod detector;
mod error;
pub mod events;
mod handler;
pub mod hijack;
pub mod models;
pub mod rpki;
pub mod rules;
pub mod store;
pub mod utils;

pub use config::{DetectionSettings, EngineConfig};
pub use detector::Detector;
pub use error::DetectionError;
pub use events::{DetectionEvent, EventRx, EventTx};
pub use handler::{serve, Inbound};
pub use rules::{RuleIndex, RuleTable};
pub use store::{CoordinationStore, MemoryStore, StoreError};
