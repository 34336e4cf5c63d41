use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::model::StatsSnapshot;

/// Change notification emitted after the store or the selection changed.
///
/// Handlers receive the event after the state lock has been released, so
/// they can read the store to re-render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboxEvent {
    /// A load replaced the whole working set.
    WorkingSetReplaced { generation: u64, len: usize },
    /// A record changed in place (optimistic apply or rollback).
    RecordUpdated { id: String },
    /// A record left the working set (optimistic delete).
    RecordRemoved { id: String },
    /// A deleted record was put back after the gateway refused the delete.
    RecordRestored { id: String, index: usize },
    StatsChanged { stats: StatsSnapshot },
    SelectionChanged { id: Option<String> },
}

/// Coarse grouping of events, for subscribers that only render one area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    WorkingSet,
    Stats,
    Selection,
}

impl InboxEvent {
    pub fn topic(&self) -> Topic {
        match self {
            Self::WorkingSetReplaced { .. }
            | Self::RecordUpdated { .. }
            | Self::RecordRemoved { .. }
            | Self::RecordRestored { .. } => Topic::WorkingSet,
            Self::StatsChanged { .. } => Topic::Stats,
            Self::SelectionChanged { .. } => Topic::Selection,
        }
    }
}

/// Callback type for change notifications.
pub type EventHandler = Arc<dyn Fn(&InboxEvent) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct HandlerEntry {
    id: SubscriptionId,
    topic: Option<Topic>,
    handler: EventHandler,
}

/// Subscriber registry shared by the store and the selection controller.
pub struct Notifier {
    handlers: RwLock<Vec<HandlerEntry>>,
    next_id: AtomicU64,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Receive every event.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&InboxEvent) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(handler))
    }

    /// Receive only events of one topic.
    pub fn subscribe_topic<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&InboxEvent) + Send + Sync + 'static,
    {
        self.register(Some(topic), Arc::new(handler))
    }

    /// Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.retain(|entry| entry.id != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Deliver events in order to every matching handler.
    ///
    /// The handler list is cloned first so a handler may itself emit or
    /// (un)subscribe without deadlocking.
    pub fn emit_all(&self, events: &[InboxEvent]) {
        if events.is_empty() {
            return;
        }
        let entries = self.handlers.read().unwrap_or_else(PoisonError::into_inner).clone();
        for event in events {
            let topic = event.topic();
            for entry in entries.iter().filter(|e| e.topic.is_none_or(|t| t == topic)) {
                (entry.handler)(event);
            }
        }
    }

    pub fn emit(&self, event: InboxEvent) {
        self.emit_all(std::slice::from_ref(&event));
    }

    fn register(&self, topic: Option<Topic>, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.push(HandlerEntry { id, topic, handler });
        id
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
