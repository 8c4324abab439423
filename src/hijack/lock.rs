use std::time::Duration;

use log::trace;

use crate::store::{keys, CoordinationStore, StoreResult};

const TOKEN: &str = "token";
const ACTIVE: &str = "1";

/// Per-hijack mutual exclusion built on a single token kept in a store list.
///
/// Whoever pops the token holds the lock; releasing pushes it back so at
/// most one waiter wakes up. The `token_active` marker tells the first
/// caller that no token exists yet, in which case it owns the lock
/// straight away.
pub struct HijackLock<'a> {
    store: &'a dyn CoordinationStore,
    key: String,
}

impl<'a> HijackLock<'a> {
    /// Wait up to `timeout` for the lock on `hijack_key`.
    /// `Ok(None)` means the wait timed out.
    pub async fn acquire(
        store: &'a dyn CoordinationStore,
        hijack_key: &str,
        timeout: Duration,
    ) -> StoreResult<Option<HijackLock<'a>>> {
        let previous = store
            .getset(&keys::lock_token_active(hijack_key), ACTIVE)
            .await?;
        if previous.as_deref() != Some(ACTIVE) {
            trace!("Initialized lock for {}", hijack_key);
        } else if store
            .blpop(&keys::lock_token(hijack_key), timeout)
            .await?
            .is_none()
        {
            return Ok(None);
        }
        Ok(Some(HijackLock {
            store,
            key: hijack_key.to_string(),
        }))
    }

    /// Hand the token back, waking at most one waiter
    pub async fn release(self) -> StoreResult<()> {
        self.store
            .set(&keys::lock_token_active(&self.key), ACTIVE)
            .await?;
        self.store.lpush(&keys::lock_token(&self.key), TOKEN).await
    }
}
