//! Shared hijack state: every detector folds its observations of a hijack
//! into one record per hijack key, under that key's lock.

mod annotation;
mod lock;
mod purge;

pub use annotation::annotate;
pub use lock::HijackLock;
pub use purge::purge_hijack_keys;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info};

use crate::config::DetectionSettings;
use crate::detection::{Classification, Observation, Verdict};
use crate::events::{publish, DetectionEvent, EventTx, NotifyChannel};
use crate::models::{HijackRecord, PrefixNode};
use crate::rpki::{cached_status, RpkiStatus, RpkiValidator};
use crate::store::{keys, CoordinationStore, StoreResult};
use crate::utils::{asn_or_placeholder, get_hash, hijack_key};

/// ASNs assumed to have accepted the hijacked route, from the canonical path
pub fn infected_asns(path: &[u32], verdict: &Verdict) -> BTreeSet<u32> {
    let keep = if let Some(hops) = verdict.path.and_then(|f| f.dim.hops()) {
        path.len().saturating_sub(hops + 1)
    } else if verdict.is_leak() {
        path.len().saturating_sub(2)
    } else if path.len() > 2 {
        // Worst case, the hijacker forged two more hops
        path.len() - 3
    } else {
        0
    };
    path[..keep].iter().copied().collect()
}

pub struct HijackAggregator {
    store: Arc<dyn CoordinationStore>,
    rpki: Option<Arc<dyn RpkiValidator>>,
    events: EventTx,
    settings: DetectionSettings,
}

impl HijackAggregator {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        rpki: Option<Arc<dyn RpkiValidator>>,
        events: EventTx,
        settings: DetectionSettings,
    ) -> Self {
        Self {
            store,
            rpki,
            events,
            settings,
        }
    }

    /// Merge a hijack verdict into the shared record for its key and
    /// publish the result. Returns `None` when the update was dropped:
    /// the lock wait timed out, or the store failed mid-way.
    pub async fn commit(
        &self,
        obs: &Observation<'_>,
        node: &PrefixNode,
        classification: &Classification,
        outdated_parent: Option<String>,
    ) -> Option<HijackRecord> {
        let hij_type = classification.hijack_type();
        let redis_key = hijack_key(&obs.update.prefix, classification.hijacker, &hij_type);
        let observation = self
            .observe(obs, node, classification, hij_type, outdated_parent)
            .await;

        let lock = match HijackLock::acquire(
            self.store.as_ref(),
            &redis_key,
            self.settings.lock_timeout,
        )
        .await
        {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                info!(
                    "{} timed out waiting for hijack {}, cleared as benign",
                    obs.update, redis_key
                );
                return None;
            }
            Err(err) => {
                error!("Locking hijack {}: {}", redis_key, err);
                return None;
            }
        };

        let merged = match self.merge_locked(&redis_key, observation, obs, node).await {
            Ok((record, is_new)) => {
                if is_new {
                    info!("New hijack {}", record);
                    publish(
                        &self.events,
                        DetectionEvent::Notification {
                            channel: NotifyChannel::Mail,
                            hijack: record.clone(),
                        },
                    );
                } else {
                    debug!("Updated hijack {}", record);
                }
                publish(
                    &self.events,
                    DetectionEvent::HijackUpdate {
                        redis_key: redis_key.clone(),
                        hijack: record.clone(),
                    },
                );
                publish(
                    &self.events,
                    DetectionEvent::Notification {
                        channel: NotifyChannel::Log,
                        hijack: record.clone(),
                    },
                );
                Some(record)
            }
            Err(err) => {
                error!("Committing {} to hijack {}: {}", obs.update, redis_key, err);
                None
            }
        };

        if let Err(err) = lock.release().await {
            error!("Releasing hijack {}: {}", redis_key, err);
        }
        merged
    }

    /// Record of this single observation, before merging
    async fn observe(
        &self,
        obs: &Observation<'_>,
        node: &PrefixNode,
        classification: &Classification,
        hij_type: String,
        outdated_parent: Option<String>,
    ) -> HijackRecord {
        let update = obs.update;
        let rpki_status = match (&self.rpki, obs.origin()) {
            (Some(validator), Some(origin)) => {
                cached_status(
                    self.store.as_ref(),
                    validator.as_ref(),
                    origin,
                    &update.prefix,
                    self.settings.rpki_cache_ttl,
                )
                .await
            }
            _ => RpkiStatus::NotAvailable,
        };
        let update_keys: BTreeSet<String> = vec![update.key.clone()].into_iter().collect();
        HijackRecord {
            key: String::new(),
            prefix: update.prefix,
            hijack_as: classification.hijacker,
            hij_type,
            time_started: update.timestamp,
            time_last: update.timestamp,
            time_detected: update.timestamp,
            peers_seen: vec![update.peer_asn].into_iter().collect(),
            asns_inf: infected_asns(&obs.path, &classification.verdict),
            monitor_keys: update_keys.clone(),
            bgpupdate_keys: update_keys,
            configured_prefix: node.prefix,
            timestamp_of_config: node.timestamp,
            community_annotation: None,
            rpki_status,
            end_tag: None,
            outdated_parent,
        }
    }

    /// Read-merge-write of one hijack key. Caller must hold its lock.
    async fn merge_locked(
        &self,
        redis_key: &str,
        observation: HijackRecord,
        obs: &Observation<'_>,
        node: &PrefixNode,
    ) -> StoreResult<(HijackRecord, bool)> {
        let store = self.store.as_ref();
        let update = obs.update;
        let communities = update.communities.to_set();

        let (mut record, is_new) = match store.get(redis_key).await? {
            Some(existing) => {
                let mut record: HijackRecord = serde_json::from_str(&existing)?;
                record.merge(&observation);
                (record, false)
            }
            None => {
                let mut record = observation;
                record.time_detected = Utc::now();
                record.key = get_hash(&(
                    record.prefix.to_string(),
                    asn_or_placeholder(record.hijack_as),
                    &record.hij_type,
                    record.time_detected.timestamp_micros(),
                ));
                store.sadd(keys::PERSISTENT_KEYS, &record.key).await?;
                (record, true)
            }
        };
        annotate(&communities, &node.confs, &mut record.community_annotation);
        store
            .set(redis_key, &serde_json::to_string(&record)?)
            .await?;

        store
            .sadd(
                &keys::hijack_origin_neighbors(redis_key),
                &keys::origin_neighbor_member(obs.origin(), obs.first_neighbor()),
            )
            .await?;
        store
            .sadd(
                &keys::prefix_peer_hijacks(&update.prefix, update.peer_asn),
                redis_key,
            )
            .await?;
        store
            .sadd(
                &keys::hijack_prefixes_peers(redis_key),
                &keys::prefix_peer_member(&update.prefix, update.peer_asn),
            )
            .await?;
        Ok((record, is_new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{classify, Finding, PathDim, PolicyDim, PrefixDim};
    use crate::events::EventRx;
    use crate::models::{AsnSet, Community, CommunityList, ConfiguredRule, RouteUpdate};
    use crate::rpki::{Roa, StaticRoaValidator};
    use crate::store::MemoryStore;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn node() -> PrefixNode {
        let mut node = PrefixNode::new("10.0.0.0/24".parse().unwrap(), Utc::now());
        node.confs = vec![ConfiguredRule {
            origin_asns: AsnSet::Listed(vec![1]),
            neighbors: AsnSet::Listed(vec![2]),
            ..Default::default()
        }];
        node
    }

    fn hijacked_update(peer: u32) -> RouteUpdate {
        RouteUpdate::announce("10.0.0.0/24".parse().unwrap(), vec![peer, 3, 2, 100], peer, "a")
    }

    fn aggregator(store: Arc<MemoryStore>) -> (HijackAggregator, EventRx) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            HijackAggregator::new(store, None, tx, DetectionSettings::default()),
            rx,
        )
    }

    async fn commit(agg: &HijackAggregator, update: &RouteUpdate, node: &PrefixNode) -> Option<HijackRecord> {
        let obs = Observation::new(update);
        let classification = classify(&obs, node).unwrap();
        agg.commit(&obs, node, &classification, None).await
    }

    fn drain(rx: &mut EventRx) -> Vec<DetectionEvent> {
        let mut events = vec![];
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_infected_asns() {
        let path = vec![5, 4, 3, 2, 1];
        let verdict = |path_dim: Option<PathDim>, leak: bool| Verdict {
            prefix: PrefixDim::Exact,
            path: path_dim.map(|d| Finding::new(d, Some(1))),
            dplane: None,
            policy: if leak {
                Some(Finding::new(PolicyDim::Leak, Some(2)))
            } else {
                None
            },
        };
        let set = |asns: &[u32]| asns.iter().copied().collect::<BTreeSet<_>>();
        assert_eq!(infected_asns(&path, &verdict(Some(PathDim::Type0), false)), set(&[5, 4, 3, 2]));
        assert_eq!(infected_asns(&path, &verdict(Some(PathDim::Type1), true)), set(&[5, 4, 3]));
        assert_eq!(infected_asns(&path, &verdict(None, true)), set(&[5, 4, 3]));
        assert_eq!(infected_asns(&path, &verdict(None, false)), set(&[5, 4]));
        assert_eq!(infected_asns(&path, &verdict(Some(PathDim::TypeP), false)), set(&[5, 4]));
        assert!(infected_asns(&[2, 1], &verdict(None, false)).is_empty());
        assert!(infected_asns(&[], &verdict(Some(PathDim::Type0), false)).is_empty());
    }

    #[tokio::test]
    async fn test_new_hijack() {
        let store = Arc::new(MemoryStore::new());
        let (agg, mut rx) = aggregator(store.clone());
        let node = node();
        let update = hijacked_update(4);
        let record = commit(&agg, &update, &node).await.unwrap();

        assert_eq!(record.hijack_as, Some(100));
        assert_eq!(record.hij_type, "E|0|-|-");
        assert_eq!(record.key.len(), 32);
        assert_eq!(record.configured_prefix, node.prefix);
        assert_eq!(record.asns_inf, vec![4, 3, 2].into_iter().collect::<BTreeSet<_>>());
        assert_eq!(record.rpki_status, RpkiStatus::NotAvailable);

        let redis_key = hijack_key(&update.prefix, Some(100), "E|0|-|-");
        assert!(store.exists(&redis_key).await.unwrap());
        assert_eq!(store.smembers(keys::PERSISTENT_KEYS).await.unwrap(), vec![record.key.clone()]);
        assert_eq!(
            store.smembers(&keys::hijack_origin_neighbors(&redis_key)).await.unwrap(),
            vec!["100_2"]
        );
        assert_eq!(
            store
                .smembers(&keys::prefix_peer_hijacks(&update.prefix, 4))
                .await
                .unwrap(),
            vec![redis_key.clone()]
        );

        let names: Vec<_> = drain(&mut rx).iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["notification", "hijack-update", "notification"]);
        // Lock handed back
        assert!(store.exists(&keys::lock_token(&redis_key)).await.unwrap());
    }

    #[tokio::test]
    async fn test_merge_existing_hijack() {
        let store = Arc::new(MemoryStore::new());
        let (agg, mut rx) = aggregator(store);
        let node = node();
        let first = commit(&agg, &hijacked_update(4), &node).await.unwrap();
        let second_update = hijacked_update(5);
        let second = commit(&agg, &second_update, &node).await.unwrap();

        assert_eq!(second.key, first.key);
        assert_eq!(second.time_detected, first.time_detected);
        assert_eq!(second.peers_seen, vec![4, 5].into_iter().collect::<BTreeSet<_>>());
        assert_eq!(second.bgpupdate_keys.len(), 2);
        assert_eq!(
            second.monitor_keys,
            vec![second_update.key.clone()].into_iter().collect::<BTreeSet<_>>()
        );
        // No second mail for the same hijack
        let mails = drain(&mut rx)
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    DetectionEvent::Notification {
                        channel: NotifyChannel::Mail,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(mails, 1);
    }

    #[tokio::test]
    async fn test_community_annotation() {
        let store = Arc::new(MemoryStore::new());
        let (agg, _rx) = aggregator(store);
        let mut node = node();
        node.confs[0].community_annotations = vec![crate::models::AnnotationRule {
            name: "critical".to_string(),
            rules: vec![crate::models::CommunityRule {
                include: vec![Community::new(1, 666)],
                exclude: vec![],
            }],
        }];
        let mut update = hijacked_update(4);
        update.communities = CommunityList(vec![Community::new(1, 666)]);
        let record = commit(&agg, &update, &node).await.unwrap();
        assert_eq!(record.community_annotation.as_deref(), Some("critical"));
    }

    #[tokio::test]
    async fn test_rpki_status_tagged() {
        let store = Arc::new(MemoryStore::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let validator = StaticRoaValidator::new(vec![Roa {
            prefix: "10.0.0.0/16".parse().unwrap(),
            max_length: Some(24),
            asn: 1,
        }]);
        let agg = HijackAggregator::new(
            store,
            Some(Arc::new(validator)),
            tx,
            DetectionSettings::default(),
        );
        let record = commit(&agg, &hijacked_update(4), &node()).await.unwrap();
        assert_eq!(record.rpki_status, RpkiStatus::InvalidAsn);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_timeout_degrades_to_benign() {
        let store = Arc::new(MemoryStore::new());
        let (agg, mut rx) = aggregator(store.clone());
        let update = hijacked_update(4);
        let redis_key = hijack_key(&update.prefix, Some(100), "E|0|-|-");
        // Someone else holds the token
        store.set(&keys::lock_token_active(&redis_key), "1").await.unwrap();

        assert!(commit(&agg, &update, &node()).await.is_none());
        assert!(drain(&mut rx).is_empty());
        assert!(!store.exists(&redis_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_record_skips_write() {
        let store = Arc::new(MemoryStore::new());
        let (agg, mut rx) = aggregator(store.clone());
        let update = hijacked_update(4);
        let redis_key = hijack_key(&update.prefix, Some(100), "E|0|-|-");
        store.set(&redis_key, "not json").await.unwrap();

        assert!(commit(&agg, &update, &node()).await.is_none());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(store.get(&redis_key).await.unwrap(), Some("not json".to_string()));
        // Lock is still released for the next pass
        assert!(store.exists(&keys::lock_token(&redis_key)).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mutators_lose_nothing() {
        let store = Arc::new(MemoryStore::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut settings = DetectionSettings::default();
        settings.lock_timeout = Duration::from_secs(10);
        let agg = Arc::new(HijackAggregator::new(store.clone(), None, tx, settings));
        let node = Arc::new(node());

        let peers: Vec<u32> = (1000..1032).collect();
        let tasks: Vec<_> = peers
            .iter()
            .map(|&peer| {
                let agg = agg.clone();
                let node = node.clone();
                tokio::spawn(async move { commit(&agg, &hijacked_update(peer), &node).await })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            assert!(task.unwrap().is_some());
        }

        let redis_key = hijack_key(&"10.0.0.0/24".parse().unwrap(), Some(100), "E|0|-|-");
        let stored = store.get(&redis_key).await.unwrap().unwrap();
        let record: HijackRecord = serde_json::from_str(&stored).unwrap();
        assert_eq!(record.peers_seen, peers.into_iter().collect::<BTreeSet<_>>());
        assert_eq!(record.bgpupdate_keys.len(), 32);
        assert_eq!(store.scard(keys::PERSISTENT_KEYS).await.unwrap(), 1);
    }
}
