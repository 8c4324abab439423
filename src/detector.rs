//! Per-update lifecycle: dedup, classification, and the outdate / rekey /
//! implicit withdrawal transitions that keep shared hijack state honest.

use std::sync::Arc;

use log::{debug, error, info, trace, warn};

use crate::config::DetectionSettings;
use crate::detection::{classify, Observation};
use crate::events::{publish, DetectionEvent, EventTx, NotifyChannel};
use crate::hijack::{purge_hijack_keys, HijackAggregator};
use crate::models::{EndTag, HijackRecord, PriorHijack, RouteUpdate, UpdateType};
use crate::rpki::RpkiValidator;
use crate::rules::RuleTable;
use crate::store::{keys, CoordinationStore};
use crate::utils::{hijack_key, supernet};

/// One classifier instance. Cheap to clone; clones share the rule table,
/// the coordination store and the event channel.
#[derive(Clone)]
pub struct Detector {
    rules: Arc<RuleTable>,
    store: Arc<dyn CoordinationStore>,
    aggregator: Arc<HijackAggregator>,
    events: EventTx,
    settings: DetectionSettings,
}

impl Detector {
    pub fn new(
        rules: Arc<RuleTable>,
        store: Arc<dyn CoordinationStore>,
        rpki: Option<Arc<dyn RpkiValidator>>,
        events: EventTx,
        settings: DetectionSettings,
    ) -> Self {
        let aggregator = HijackAggregator::new(
            Arc::clone(&store),
            rpki,
            events.clone(),
            settings.clone(),
        );
        Self {
            rules,
            store,
            aggregator: Arc::new(aggregator),
            events,
            settings,
        }
    }

    pub fn rules(&self) -> &Arc<RuleTable> {
        &self.rules
    }

    /// Ask for ongoing hijacks to be replayed against the current rules
    pub fn request_ongoing(&self) {
        debug!("Requesting ongoing hijacks [rules v{}]", self.rules.version());
        publish(&self.events, DetectionEvent::OngoingRequest);
    }

    /// Replay a batch of ongoing hijacks
    pub async fn handle_ongoing(&self, updates: Vec<RouteUpdate>) {
        debug!("{} ongoing hijack events", updates.len());
        for update in updates {
            self.handle_update(update).await;
        }
    }

    pub async fn handle_update(&self, mut update: RouteUpdate) {
        update.ensure_key();
        if !update.is_replay() && self.is_duplicate(&update.key).await {
            trace!("Dropping duplicate {} [{}]", update, update.key);
            return;
        }
        match update.kind {
            UpdateType::Withdraw => publish(
                &self.events,
                DetectionEvent::Withdraw {
                    prefix: update.prefix,
                    peer_asn: update.peer_asn,
                    timestamp: update.timestamp,
                    key: update.key.clone(),
                },
            ),
            UpdateType::Announce => self.handle_announcement(&update).await,
        }
    }

    async fn handle_announcement(&self, update: &RouteUpdate) {
        // Pin the snapshot for the whole classification
        let rules = self.rules.load();
        let obs = Observation::new(update);
        let verdict = match rules.lookup(&update.prefix) {
            Some(node) => classify(&obs, node).map(|c| (node, c)),
            None if update.is_replay() => None,
            None => {
                error!("Unconfigured update received {}", update);
                return;
            }
        };

        match (verdict, update.hijack.as_ref()) {
            (Some((node, classification)), prior) => {
                let key = hijack_key(
                    &update.prefix,
                    classification.hijacker,
                    &classification.hijack_type(),
                );
                let rekeyed = prior.filter(|p| prior_hijack_key(update, p) != key);
                let parent = rekeyed.map(|p| p.key.clone());
                self.aggregator
                    .commit(&obs, node, &classification, parent)
                    .await;
                if let Some(prior) = rekeyed {
                    debug!("Hijack {} re-filed under {}", prior.key, key);
                    self.outdate(update, prior).await;
                }
            }
            (None, Some(prior)) => self.outdate(update, prior).await,
            (None, None) => {
                self.implicit_withdrawal(update).await;
                publish(
                    &self.events,
                    DetectionEvent::Handled {
                        key: update.key.clone(),
                    },
                );
            }
        }
    }

    /// Has this update key been seen recently. Marks it seen either way.
    async fn is_duplicate(&self, update_key: &str) -> bool {
        let seen = keys::seen_update(update_key);
        let duplicate = match self.store.exists(&seen).await {
            Ok(exists) => exists,
            Err(err) => {
                warn!("Checking {} for duplicates: {}", update_key, err);
                false
            }
        };
        if !duplicate {
            if let Err(err) = self.store.set_ex(&seen, "1", self.settings.dedup_ttl).await {
                warn!("Marking {} seen: {}", update_key, err);
            }
        }
        duplicate
    }

    /// Retire the hijack `update` was previously filed under. Only the
    /// caller that actually found the record publishes anything.
    async fn outdate(&self, update: &RouteUpdate, prior: &PriorHijack) {
        let redis_key = prior_hijack_key(update, prior);
        let existing = match self.store.get(&redis_key).await {
            Ok(existing) => existing,
            Err(err) => {
                error!("Reading hijack {}: {}", redis_key, err);
                return;
            }
        };
        if let Err(err) = purge_hijack_keys(
            self.store.as_ref(),
            &redis_key,
            &prior.key,
            self.settings.lock_timeout,
        )
        .await
        {
            error!("Purging hijack {}: {}", prior.key, err);
            return;
        }
        let raw = match existing {
            Some(raw) => raw,
            None => {
                trace!("Hijack {} already outdated", prior.key);
                return;
            }
        };

        publish(
            &self.events,
            DetectionEvent::Outdate {
                persistent_hijack_key: prior.key.clone(),
                redis_hijack_key: redis_key,
            },
        );
        match serde_json::from_str::<HijackRecord>(&raw) {
            Ok(mut record) => {
                record.end_tag = Some(EndTag::Outdated);
                info!("Outdated hijack {}", record);
                for channel in [NotifyChannel::Mail, NotifyChannel::Log].iter() {
                    publish(
                        &self.events,
                        DetectionEvent::Notification {
                            channel: *channel,
                            hijack: record.clone(),
                        },
                    );
                }
            }
            Err(err) => warn!("Outdated hijack {} has a bad record: {}", prior.key, err),
        }
    }

    /// A benign announcement from a peer that carried a hijacked route for
    /// this prefix (or the one directly covering it) replaces that route
    async fn implicit_withdrawal(&self, update: &RouteUpdate) {
        let mut candidates = vec![update.prefix];
        candidates.extend(supernet(&update.prefix));
        for prefix in candidates {
            let index = keys::prefix_peer_hijacks(&prefix, update.peer_asn);
            match self.store.exists(&index).await {
                Ok(true) => {
                    let withdrawal = update.implicit_withdrawal(prefix);
                    debug!("Implicit withdrawal {} triggered by {}", withdrawal, update.key);
                    publish(&self.events, DetectionEvent::Intake { update: withdrawal });
                    return;
                }
                Ok(false) => continue,
                Err(err) => {
                    warn!("Checking {}: {}", index, err);
                    return;
                }
            }
        }
    }
}

/// Ephemeral key of the hijack a replayed update was filed under
fn prior_hijack_key(update: &RouteUpdate, prior: &PriorHijack) -> String {
    hijack_key(&update.prefix, prior.hijack_as, &prior.hij_type)
}
