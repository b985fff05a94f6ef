//! Fan-out of computed payloads to subscribed dashboard clients.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use serde::Serialize;
use tokio::sync::broadcast;

pub const NOTIFICATIONS_GROUP: &str = "notifications";
pub const DEVICE_DATA_UPDATE: &str = "DeviceDataUpdate";
pub const UPDATE_CONSUMPTION_TODAY: &str = "UpdateConsumptionToday";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub event: String,
    pub payload: serde_json::Value,
}

#[derive(thiserror::Error, Debug)]
pub enum BroadcastError {
    #[error("channel registry lock poisoned")]
    Poisoned,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Best-effort delivery of one payload to every member of a channel group.
#[async_trait::async_trait]
pub trait Broadcaster: Send + Sync {
    /// Returns how many members the payload was handed to.
    async fn push(
        &self,
        group: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<usize, BroadcastError>;
}

/// In-process channel groups backed by bounded broadcast channels.
///
/// Members that fall behind by more than the channel capacity lose the
/// oldest notifications.
pub struct ChannelHub {
    capacity: usize,
    groups: RwLock<HashMap<String, broadcast::Sender<Arc<Notification>>>>,
}

impl ChannelHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Joins `group`; the membership lasts as long as the receiver.
    pub fn subscribe(
        &self,
        group: &str,
    ) -> Result<broadcast::Receiver<Arc<Notification>>, BroadcastError> {
        let mut groups = self.groups.write().map_err(|_| BroadcastError::Poisoned)?;
        // Groups whose members all left are dropped before a new one is added.
        groups.retain(|_, tx| tx.receiver_count() > 0);
        let tx = groups
            .entry(group.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Ok(tx.subscribe())
    }

    pub fn member_count(&self, group: &str) -> usize {
        self.groups
            .read()
            .ok()
            .and_then(|groups| groups.get(group).map(broadcast::Sender::receiver_count))
            .unwrap_or(0)
    }

    pub fn group_count(&self) -> usize {
        self.groups.read().map(|groups| groups.len()).unwrap_or(0)
    }

    fn release_if_empty(&self, group: &str) {
        if let Ok(mut groups) = self.groups.write() {
            if groups.get(group).is_some_and(|tx| tx.receiver_count() == 0) {
                groups.remove(group);
            }
        }
    }
}

#[async_trait::async_trait]
impl Broadcaster for ChannelHub {
    async fn push(
        &self,
        group: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<usize, BroadcastError> {
        let notification = Arc::new(Notification {
            event: event.to_string(),
            payload,
        });

        let sent = self
            .groups
            .read()
            .map_err(|_| BroadcastError::Poisoned)?
            .get(group)
            .map(|tx| tx.send(notification));

        match sent {
            Some(Ok(members)) => return Ok(members),
            Some(Err(_)) => self.release_if_empty(group),
            None => {}
        }
        metrics::counter!("notifications_without_members_total").increment(1);
        tracing::debug!(group, event, "no members in channel group, notification dropped");
        Ok(0)
    }
}

#[cfg(test)]
pub mod recording {
    use std::sync::Mutex;

    use super::*;

    /// Broadcaster that keeps every push for inspection.
    #[derive(Default)]
    pub struct RecordingBroadcaster {
        pushes: Mutex<Vec<(String, Notification)>>,
        failing: std::sync::atomic::AtomicBool,
    }

    impl RecordingBroadcaster {
        pub fn set_failing(&self, failing: bool) {
            self.failing
                .store(failing, std::sync::atomic::Ordering::SeqCst);
        }

        pub fn pushes(&self) -> Vec<(String, Notification)> {
            self.pushes.lock().expect("recorder lock").clone()
        }

        pub fn events(&self, event: &str) -> Vec<serde_json::Value> {
            self.pushes()
                .into_iter()
                .filter(|(_, n)| n.event == event)
                .map(|(_, n)| n.payload)
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl Broadcaster for RecordingBroadcaster {
        async fn push(
            &self,
            group: &str,
            event: &str,
            payload: serde_json::Value,
        ) -> Result<usize, BroadcastError> {
            if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(BroadcastError::Transport("hub offline".to_string()));
            }
            self.pushes.lock().expect("recorder lock").push((
                group.to_string(),
                Notification {
                    event: event.to_string(),
                    payload,
                },
            ));
            Ok(1)
        }
    }
}
