use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use log::warn;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::models::{HijackRecord, RouteUpdate};

pub type EventTx = mpsc::UnboundedSender<DetectionEvent>;
pub type EventRx = mpsc::UnboundedReceiver<DetectionEvent>;

/// Where a hijack notification is routed
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum NotifyChannel {
    /// Alerts for operators, sent once per new or outdated hijack
    #[serde(rename = "mail-log")]
    Mail,
    /// Every hijack change
    #[serde(rename = "hij-log")]
    Log,
}

/// Everything the engine publishes downstream
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum DetectionEvent {
    /// Benign update, nothing left to do for it
    Handled { key: String },
    /// Merged hijack state, to be routed by `redis_key`
    HijackUpdate {
        redis_key: String,
        hijack: HijackRecord,
    },
    Notification {
        channel: NotifyChannel,
        hijack: HijackRecord,
    },
    /// Hijack classification no longer holds
    Outdate {
        persistent_hijack_key: String,
        redis_hijack_key: String,
    },
    Withdraw {
        prefix: IpNetwork,
        peer_asn: u32,
        timestamp: DateTime<Utc>,
        key: String,
    },
    /// Update to be fed back into intake (implicit withdrawals)
    Intake { update: RouteUpdate },
    /// Ask for every ongoing hijack to be replayed
    OngoingRequest,
}

impl DetectionEvent {
    pub fn name(&self) -> &'static str {
        use DetectionEvent::*;
        match self {
            Handled { .. } => "handled",
            HijackUpdate { .. } => "hijack-update",
            Notification { .. } => "notification",
            Outdate { .. } => "outdate",
            Withdraw { .. } => "withdraw",
            Intake { .. } => "intake",
            OngoingRequest => "ongoing-request",
        }
    }
}

/// Send an event, logging if nobody is listening anymore
pub fn publish(tx: &EventTx, event: DetectionEvent) {
    if let Err(err) = tx.send(event) {
        warn!("Dropped {} event, receiver is gone", err.0.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_encoding() {
        let event = DetectionEvent::Outdate {
            persistent_hijack_key: "p".to_string(),
            redis_hijack_key: "r".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"event":"outdate","persistent_hijack_key":"p","redis_hijack_key":"r"}"#
        );
        assert_eq!(
            serde_json::to_string(&DetectionEvent::OngoingRequest).unwrap(),
            r#"{"event":"ongoing-request"}"#
        );
    }

    #[test]
    fn test_publish_without_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        // Logged, not a panic
        publish(&tx, DetectionEvent::Handled { key: "k".to_string() });
    }
}
