use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::error::SelectError;
use crate::events::{InboxEvent, SubscriptionId, Topic};
use crate::model::Submission;
use crate::store::SubmissionStore;

/// Tracks the one submission open for detail viewing.
///
/// Only the id is kept; [`current`](Self::current) resolves it against the
/// live working set, so optimistic changes show up immediately. The
/// controller listens to the store and drops the selection when its
/// record is deleted or missing from a freshly loaded working set.
///
/// ```text
/// None ──select(id)──▶ Some(id) ──select(None) / removed / not reloaded──▶ None
/// ```
pub struct SelectionController {
    store: Arc<SubmissionStore>,
    selected: RwLock<Option<String>>,
    subscription: OnceLock<SubscriptionId>,
}

impl SelectionController {
    /// Create a controller observing `store`.
    pub fn attach(store: Arc<SubmissionStore>) -> Arc<Self> {
        let controller = Arc::new(Self {
            store: Arc::clone(&store),
            selected: RwLock::new(None),
            subscription: OnceLock::new(),
        });

        let weak = Arc::downgrade(&controller);
        let id = store.subscribe_topic(Topic::WorkingSet, move |event| {
            if let Some(controller) = weak.upgrade() {
                controller.observe(event);
            }
        });
        let _ = controller.subscription.set(id);
        controller
    }

    /// Select a record by id, or clear with `None`.
    ///
    /// Selecting an id that is not in the working set changes nothing.
    /// The membership check and the assignment happen under the selection
    /// lock, so a concurrent delete either fails the check or clears the
    /// selection afterwards through [`on_removed`](Self::on_removed).
    pub fn select(&self, id: Option<&str>) -> Result<(), SelectError> {
        let Some(id) = id else {
            self.replace(None);
            return Ok(());
        };
        {
            let mut selected = self.selected.write().unwrap_or_else(PoisonError::into_inner);
            if !self.store.contains(id) {
                return Err(SelectError::NotFound(id.to_string()));
            }
            if selected.as_deref() == Some(id) {
                return Ok(());
            }
            *selected = Some(id.to_string());
        }
        self.store.notifier().emit(InboxEvent::SelectionChanged {
            id: Some(id.to_string()),
        });
        Ok(())
    }

    pub fn selected_id(&self) -> Option<String> {
        self.selected.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The selected record as it is in the working set right now.
    pub fn current(&self) -> Option<Submission> {
        self.selected_id().and_then(|id| self.store.get(&id))
    }

    /// Clear the selection if its id is absent from `records`.
    pub fn on_working_set_replaced(&self, records: &[Submission]) {
        self.retain(|id| records.iter().any(|r| r.id == id));
    }

    /// Clear the selection if it points at `id`.
    pub fn on_removed(&self, id: &str) {
        self.retain(|selected| selected != id);
    }

    fn observe(&self, event: &InboxEvent) {
        match event {
            InboxEvent::WorkingSetReplaced { .. } => {
                self.retain(|id| self.store.contains(id));
            }
            InboxEvent::RecordRemoved { id } => self.on_removed(id),
            _ => {}
        }
    }

    fn retain(&self, keep: impl FnOnce(&str) -> bool) {
        let Some(selected) = self.selected_id() else {
            return;
        };
        if !keep(&selected) {
            debug!(id = %selected, "selected submission left the working set");
            self.replace(None);
        }
    }

    fn replace(&self, next: Option<String>) {
        {
            let mut selected = self.selected.write().unwrap_or_else(PoisonError::into_inner);
            if *selected == next {
                return;
            }
            selected.clone_from(&next);
        }
        self.store.notifier().emit(InboxEvent::SelectionChanged { id: next });
    }
}

impl Drop for SelectionController {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.get() {
            self.store.unsubscribe(*id);
        }
    }
}
