use std::time::Duration;

use log::{info, trace};

use crate::store::{keys, CoordinationStore, StoreResult};

/// Drop every trace of an ephemeral hijack key from the coordination store.
///
/// Detectors are kept out first by marking the token active and waiting
/// (bounded) for any current holder to finish.
pub async fn purge_hijack_keys(
    store: &dyn CoordinationStore,
    ephemeral_key: &str,
    persistent_key: &str,
    timeout: Duration,
) -> StoreResult<()> {
    let token = keys::lock_token(ephemeral_key);
    store
        .set(&keys::lock_token_active(ephemeral_key), "1")
        .await?;
    if store.exists(&token).await? && store.blpop(&token, timeout).await?.is_none() {
        info!(
            "Cleanup of hijack {} timed out waiting for its token",
            persistent_key
        );
    }

    store.delete(&keys::lock_token_active(ephemeral_key)).await?;
    store.delete(&token).await?;
    store.delete(ephemeral_key).await?;
    store.srem(keys::PERSISTENT_KEYS, persistent_key).await?;
    store
        .delete(&keys::hijack_origin_neighbors(ephemeral_key))
        .await?;

    let reverse = keys::hijack_prefixes_peers(ephemeral_key);
    for member in store.smembers(&reverse).await? {
        let (prefix, peer_asn) = match keys::parse_prefix_peer_member(&member) {
            Some(parsed) => parsed,
            None => continue,
        };
        let index = keys::prefix_peer_hijacks(&prefix, peer_asn);
        // Count before removing: a lone member can only be this key
        if store.scard(&index).await? <= 1 {
            store.delete(&index).await?;
        } else {
            store.srem(&index, ephemeral_key).await?;
        }
    }
    store.delete(&reverse).await?;
    trace!("Purged hijack keys {}/{}", ephemeral_key, persistent_key);
    Ok(())
}
