//! Shared coordination store used by every detector instance.
//!
//! Holds the ephemeral hijack records, the per-hijack lock tokens and the
//! auxiliary indices. Any backend providing atomic get-and-set, sets,
//! a blocking list pop and expiring keys can implement [`CoordinationStore`].

pub mod keys;
mod memory;

pub use memory::MemoryStore;

use std::error;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Operation against a key holding another kind of value. [key]
    WrongType(String),
    /// Backend could not be reached. [reason]
    Unavailable(String),
    /// Stored value could not be decoded. [reason]
    Serialization(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Store Error: ")?;
        use StoreError::*;
        match self {
            WrongType(key) => write!(f, "Wrong value type for '{}'", key)?,
            Unavailable(r) => write!(f, "Store unavailable [{}]", r)?,
            Serialization(r) => write!(f, "Bad stored value [{}]", r)?,
        }
        Ok(())
    }
}

impl error::Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::Serialization(error.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;
    /// Set a value that disappears after `ttl`
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;
    /// Atomically set `key` and return its previous value
    async fn getset(&self, key: &str, value: &str) -> StoreResult<Option<String>>;
    async fn exists(&self, key: &str) -> StoreResult<bool>;
    async fn delete(&self, key: &str) -> StoreResult<()>;

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<()>;
    async fn srem(&self, key: &str, member: &str) -> StoreResult<()>;
    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;
    async fn scard(&self, key: &str) -> StoreResult<usize>;

    async fn lpush(&self, key: &str, value: &str) -> StoreResult<()>;
    /// Pop the head of a list, waiting up to `timeout` for an element.
    /// `None` means the wait timed out.
    async fn blpop(&self, key: &str, timeout: Duration) -> StoreResult<Option<String>>;
}
