use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::error::{FetchError, MutationError, SelectError};
use crate::events::{InboxEvent, SubscriptionId, Topic};
use crate::gateway::SyncGateway;
use crate::model::{FilterSpec, StatsSnapshot, Submission, SubmissionStatus};
use crate::query::build_query;
use crate::selection::SelectionController;
use crate::store::{SubmissionStore, resolved_count};

/// Everything a view needs to render the inbox, in one serializable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxState {
    pub submissions: Vec<Submission>,
    pub stats: StatsSnapshot,
    pub resolved_count: usize,
    pub filter: FilterSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_id: Option<String>,
    pub loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The contact inbox: store, selection and active filter wired together.
///
/// This is the surface a presentation layer talks to:
/// - `apply_filter(spec)` / `refresh()`: fetch a new working set
/// - `set_read_flag` / `set_status` / `remove`: optimistic mutations
/// - `select` / `current` / `open`: detail view
/// - `subscribe`: re-render on change
/// - `state()`: one snapshot for rendering
pub struct Inbox {
    store: Arc<SubmissionStore>,
    selection: Arc<SelectionController>,
    filter: RwLock<FilterSpec>,
    last_error: RwLock<Option<String>>,
    loads_in_flight: AtomicUsize,
}

impl Inbox {
    pub fn new(gateway: Arc<dyn SyncGateway>) -> Self {
        let store = Arc::new(SubmissionStore::new(gateway));
        let selection = SelectionController::attach(Arc::clone(&store));
        Self {
            store,
            selection,
            filter: RwLock::new(FilterSpec::default()),
            last_error: RwLock::new(None),
            loads_in_flight: AtomicUsize::new(0),
        }
    }

    // ====================================================================
    // Loading
    // ====================================================================

    /// Make `spec` the active filter and load its working set.
    pub async fn apply_filter(&self, spec: FilterSpec) -> Result<StatsSnapshot, FetchError> {
        *self.filter.write().unwrap_or_else(PoisonError::into_inner) = spec;
        self.refresh().await
    }

    /// Reload the working set for the active filter.
    pub async fn refresh(&self) -> Result<StatsSnapshot, FetchError> {
        let query = build_query(&self.filter());
        let result = {
            let _loading = LoadingGuard::enter(&self.loads_in_flight);
            self.store.load(&query).await
        };

        match result {
            Ok((_, stats)) => {
                self.set_error(None);
                Ok(stats)
            }
            // A newer load already landed; there is nothing to report.
            Err(FetchError::Superseded) => Err(FetchError::Superseded),
            Err(e) => {
                self.set_error(Some(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn filter(&self) -> FilterSpec {
        self.filter.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    // ====================================================================
    // Mutations
    // ====================================================================

    pub async fn set_read_flag(&self, id: &str, is_read: bool) -> Result<(), MutationError> {
        let result = self.store.set_read_flag(id, is_read).await;
        self.record(result)
    }

    pub async fn set_status(
        &self,
        id: &str,
        status: SubmissionStatus,
    ) -> Result<(), MutationError> {
        let result = self.store.set_status(id, status).await;
        self.record(result)
    }

    /// Delete a submission. Asking the operator for confirmation is the
    /// caller's job.
    pub async fn remove(&self, id: &str) -> Result<(), MutationError> {
        let result = self.store.remove(id).await;
        self.record(result)
    }

    // ====================================================================
    // Selection
    // ====================================================================

    pub fn select(&self, id: Option<&str>) -> Result<(), SelectError> {
        self.selection.select(id)
    }

    pub fn current(&self) -> Option<Submission> {
        self.selection.current()
    }

    /// Select a submission and mark it read if it was unread.
    ///
    /// Returns the record as it stands afterwards. If marking it read
    /// fails, the selection stays and the error is returned.
    pub async fn open(&self, id: &str) -> Result<Submission, MutationError> {
        self.selection.select(Some(id))?;
        let unread = self.current().is_some_and(|s| !s.is_read);
        if unread {
            self.set_read_flag(id, true).await?;
        }
        self.current()
            .ok_or_else(|| MutationError::NotFound(id.to_string()))
    }

    // ====================================================================
    // Observation
    // ====================================================================

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&InboxEvent) + Send + Sync + 'static,
    {
        self.store.subscribe(handler)
    }

    pub fn subscribe_topic<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&InboxEvent) + Send + Sync + 'static,
    {
        self.store.subscribe_topic(topic, handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.store.unsubscribe(id);
    }

    pub fn state(&self) -> InboxState {
        let (submissions, stats) = self.store.snapshot();
        InboxState {
            resolved_count: resolved_count(&submissions),
            submissions,
            stats,
            filter: self.filter(),
            selected_id: self.selection.selected_id(),
            loading: self.loads_in_flight.load(Ordering::SeqCst) > 0,
            error: self.last_error.read().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }

    pub fn store(&self) -> &Arc<SubmissionStore> {
        &self.store
    }

    pub fn selection(&self) -> &Arc<SelectionController> {
        &self.selection
    }

    fn record(&self, result: Result<(), MutationError>) -> Result<(), MutationError> {
        match &result {
            Ok(()) => self.set_error(None),
            Err(e) => self.set_error(Some(e.to_string())),
        }
        result
    }

    fn set_error(&self, error: Option<String>) {
        *self.last_error.write().unwrap_or_else(PoisonError::into_inner) = error;
    }
}

/// Counts a load as in flight for as long as it lives, including when the
/// refresh future is dropped mid-fetch.
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
