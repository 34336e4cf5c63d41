use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::error::{FetchError, GatewayError, MutationError};
use crate::events::{InboxEvent, Notifier, SubscriptionId, Topic};
use crate::gateway::SyncGateway;
use crate::model::{StatsDelta, StatsSnapshot, Submission, SubmissionStatus};
use crate::query::CanonicalQuery;

/// Number of records in `records` whose status is `resolved`.
///
/// Always derived from the current (optimistic) working set, never cached.
pub fn resolved_count(records: &[Submission]) -> usize {
    records
        .iter()
        .filter(|r| r.status == SubmissionStatus::Resolved)
        .count()
}

/// Owner of the working set and its statistics.
///
/// Mutations are two-phase: the change is applied locally and announced
/// right away, then the gateway is called; if the gateway fails, the
/// captured pre-mutation value is put back. While a mutation on a record
/// is in flight, further mutations on that record are refused with
/// [`MutationError::AlreadyPending`]. Reads never wait on the gateway.
///
/// Each applied `load` bumps a generation counter. A mutation that
/// started under an older generation finishes without touching state:
/// the working set it would roll back no longer exists.
pub struct SubmissionStore {
    gateway: Arc<dyn SyncGateway>,
    state: RwLock<StoreState>,
    notifier: Arc<Notifier>,
    /// Monotonic counter handing out load tickets.
    load_tickets: AtomicU64,
}

#[derive(Default)]
struct StoreState {
    records: Vec<Submission>,
    stats: StatsSnapshot,
    /// Position of each record in the server's answer for the current
    /// generation. Removals never reorder, so `records` stays sorted by it.
    ranks: HashMap<String, usize>,
    /// Record ids with a mutation in flight.
    pending: HashSet<String>,
    generation: u64,
    /// Ticket of the load that produced the current working set.
    applied_ticket: u64,
    last_query: Option<CanonicalQuery>,
}

impl StoreState {
    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    /// Where a record of server rank `rank` belongs among the records
    /// still present.
    fn slot_for(&self, rank: usize) -> usize {
        self.records
            .partition_point(|r| self.ranks.get(&r.id).is_some_and(|&k| k < rank))
    }
}

/// What to put back if the gateway refuses a change.
#[derive(Debug)]
enum Undo {
    ReadFlag { previous: bool },
    Status { previous: SubmissionStatus },
    Removed { record: Box<Submission>, rank: usize },
}

/// A mutation that was applied locally and awaits the gateway.
#[derive(Debug)]
struct InFlight {
    id: String,
    generation: u64,
    undo: Undo,
    /// Stats delta actually applied (after saturation).
    applied: StatsDelta,
}

impl SubmissionStore {
    pub fn new(gateway: Arc<dyn SyncGateway>) -> Self {
        Self {
            gateway,
            state: RwLock::new(StoreState::default()),
            notifier: Arc::new(Notifier::new()),
            load_tickets: AtomicU64::new(0),
        }
    }

    // ====================================================================
    // Load
    // ====================================================================

    /// Replace the working set and stats with the gateway's answer for `query`.
    ///
    /// On failure nothing changes. If a load issued later has already been
    /// applied, this response is dropped with [`FetchError::Superseded`].
    /// Applying a load clears every pending marker: responses of mutations
    /// still in flight are ignored from then on.
    pub async fn load(
        &self,
        query: &CanonicalQuery,
    ) -> Result<(Vec<Submission>, StatsSnapshot), FetchError> {
        let ticket = self.load_tickets.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(ticket, query = %query, "fetching submissions");

        let response = match self.gateway.fetch_submissions(query).await {
            Ok(response) => response,
            Err(e) => {
                warn!(ticket, error = %e, "fetch failed, keeping previous working set");
                return Err(e);
            }
        };

        let events = {
            let mut state = self.write();
            if ticket < state.applied_ticket {
                warn!(
                    ticket,
                    applied = state.applied_ticket,
                    "discarding superseded fetch response"
                );
                return Err(FetchError::Superseded);
            }
            let dropped = state.pending.len();
            state.applied_ticket = ticket;
            state.generation += 1;
            state.records = response.records.clone();
            state.ranks = response
                .records
                .iter()
                .enumerate()
                .map(|(rank, r)| (r.id.clone(), rank))
                .collect();
            state.stats = response.stats;
            state.pending.clear();
            state.last_query = Some(query.clone());
            info!(
                generation = state.generation,
                records = state.records.len(),
                unread = state.stats.unread_count,
                total = state.stats.total_submissions,
                dropped_pending = dropped,
                "working set replaced"
            );
            [
                InboxEvent::WorkingSetReplaced {
                    generation: state.generation,
                    len: state.records.len(),
                },
                InboxEvent::StatsChanged { stats: state.stats },
            ]
        };
        self.notifier.emit_all(&events);

        Ok((response.records, response.stats))
    }

    // ====================================================================
    // Mutations
    // ====================================================================

    /// Mark a record read or unread.
    ///
    /// `unread_count` moves by -1 on false→true and +1 on true→false;
    /// setting the value it already has leaves the counters alone.
    pub async fn set_read_flag(&self, id: &str, is_read: bool) -> Result<(), MutationError> {
        let pending = self.begin(id, |state, index| {
            let record = &mut state.records[index];
            let previous = record.is_read;
            record.is_read = is_read;
            let unread = match (previous, is_read) {
                (false, true) => -1,
                (true, false) => 1,
                _ => 0,
            };
            (Undo::ReadFlag { previous }, StatsDelta { unread, total: 0 })
        })?;

        let result = self.gateway.set_read_flag(id, is_read).await;
        pending.finish(result)
    }

    /// Move a record to another status. Counters are not affected.
    pub async fn set_status(
        &self,
        id: &str,
        status: SubmissionStatus,
    ) -> Result<(), MutationError> {
        let pending = self.begin(id, |state, index| {
            let record = &mut state.records[index];
            let previous = record.status;
            record.status = status;
            (Undo::Status { previous }, StatsDelta::default())
        })?;

        let result = self.gateway.set_status(id, status).await;
        pending.finish(result)
    }

    /// Delete a record.
    ///
    /// The record leaves the working set immediately; `total_submissions`
    /// drops by one and `unread_count` too if the record was unread. A
    /// refused delete puts the record back in server order, after the
    /// nearest record that preceded it and is still present.
    pub async fn remove(&self, id: &str) -> Result<(), MutationError> {
        let pending = self.begin(id, |state, index| {
            let record = state.records.remove(index);
            let rank = state.ranks.get(&record.id).copied().unwrap_or(index);
            let unread = if record.is_read { 0 } else { -1 };
            (
                Undo::Removed { record: Box::new(record), rank },
                StatsDelta { unread, total: -1 },
            )
        })?;

        let result = self.gateway.delete_submission(id).await;
        pending.finish(result)
    }

    /// Phase one: check preconditions, apply locally, mark pending.
    fn begin<F>(&self, id: &str, apply: F) -> Result<Pending<'_>, MutationError>
    where
        F: FnOnce(&mut StoreState, usize) -> (Undo, StatsDelta),
    {
        let (in_flight, events) = {
            let mut state = self.write();
            if state.pending.contains(id) {
                debug!(id, "mutation refused, another one is pending");
                return Err(MutationError::AlreadyPending(id.to_string()));
            }
            let index = state
                .position(id)
                .ok_or_else(|| MutationError::NotFound(id.to_string()))?;

            let (undo, delta) = apply(&mut *state, index);
            let applied = delta.apply(&mut state.stats);
            state.pending.insert(id.to_string());
            debug!(id, ?undo, ?applied, "optimistic change applied");

            let mut events = vec![match undo {
                Undo::Removed { .. } => InboxEvent::RecordRemoved { id: id.to_string() },
                _ => InboxEvent::RecordUpdated { id: id.to_string() },
            }];
            if !applied.is_zero() {
                events.push(InboxEvent::StatsChanged { stats: state.stats });
            }
            let in_flight = InFlight {
                id: id.to_string(),
                generation: state.generation,
                undo,
                applied,
            };
            (in_flight, events)
        };
        self.notifier.emit_all(&events);
        Ok(Pending {
            store: self,
            in_flight: Some(in_flight),
        })
    }

    /// Phase two: release the pending marker, roll back unless confirmed.
    fn settle(&self, in_flight: InFlight, outcome: Outcome<'_>) {
        let events = {
            let mut state = self.write();
            if state.generation != in_flight.generation {
                debug!(
                    id = %in_flight.id,
                    started = in_flight.generation,
                    current = state.generation,
                    "mutation response ignored, working set was reloaded"
                );
                Vec::new()
            } else {
                state.pending.remove(&in_flight.id);
                match outcome {
                    Outcome::Confirmed => {
                        debug!(id = %in_flight.id, "mutation confirmed");
                        Vec::new()
                    }
                    Outcome::Refused(e) => {
                        warn!(
                            id = %in_flight.id,
                            error = %e,
                            "gateway refused change, rolling back"
                        );
                        rollback(&mut state, in_flight)
                    }
                    Outcome::Abandoned => {
                        warn!(
                            id = %in_flight.id,
                            "mutation dropped before the gateway answered, rolling back"
                        );
                        rollback(&mut state, in_flight)
                    }
                }
            }
        };
        self.notifier.emit_all(&events);
    }

    // ====================================================================
    // Reads
    // ====================================================================

    /// Clone of the working set, in server order.
    pub fn submissions(&self) -> Vec<Submission> {
        self.read().records.clone()
    }

    /// Run `f` against the working set without cloning it.
    pub fn with_submissions<R>(&self, f: impl FnOnce(&[Submission]) -> R) -> R {
        f(&self.read().records)
    }

    pub fn get(&self, id: &str) -> Option<Submission> {
        self.read().records.iter().find(|r| r.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.read().stats
    }

    /// Working set and stats read under one lock, so they always agree.
    pub fn snapshot(&self) -> (Vec<Submission>, StatsSnapshot) {
        let state = self.read();
        (state.records.clone(), state.stats)
    }

    /// Number of loads applied so far.
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.read().pending.contains(id)
    }

    pub fn last_query(&self) -> Option<CanonicalQuery> {
        self.read().last_query.clone()
    }

    pub fn resolved_count(&self) -> usize {
        self.with_submissions(resolved_count)
    }

    /// Record count per status, in [`SubmissionStatus::ALL`] order.
    pub fn status_breakdown(&self) -> Vec<(SubmissionStatus, usize)> {
        let state = self.read();
        SubmissionStatus::ALL
            .iter()
            .map(|s| (*s, state.records.iter().filter(|r| r.status == *s).count()))
            .collect()
    }

    // ====================================================================
    // Subscriptions
    // ====================================================================

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&InboxEvent) + Send + Sync + 'static,
    {
        self.notifier.subscribe(handler)
    }

    pub fn subscribe_topic<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&InboxEvent) + Send + Sync + 'static,
    {
        self.notifier.subscribe_topic(topic, handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.notifier.unsubscribe(id);
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How a gateway call ended.
enum Outcome<'e> {
    Confirmed,
    Refused(&'e GatewayError),
    /// The caller dropped the mutation future mid-call.
    Abandoned,
}

/// A locally applied mutation waiting on the gateway.
///
/// Dropping it without calling [`finish`](Self::finish) rolls the change
/// back and releases the record, so a cancelled caller never leaves it
/// stuck as pending.
struct Pending<'a> {
    store: &'a SubmissionStore,
    in_flight: Option<InFlight>,
}

impl Pending<'_> {
    fn finish(mut self, result: Result<(), GatewayError>) -> Result<(), MutationError> {
        if let Some(in_flight) = self.in_flight.take() {
            let outcome = match &result {
                Ok(()) => Outcome::Confirmed,
                Err(e) => Outcome::Refused(e),
            };
            self.store.settle(in_flight, outcome);
        }
        result.map_err(MutationError::from)
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            self.store.settle(in_flight, Outcome::Abandoned);
        }
    }
}

fn rollback(state: &mut StoreState, in_flight: InFlight) -> Vec<InboxEvent> {
    let id = in_flight.id;
    let mut events = Vec::new();
    match in_flight.undo {
        Undo::ReadFlag { previous } => {
            if let Some(index) = state.position(&id) {
                state.records[index].is_read = previous;
                events.push(InboxEvent::RecordUpdated { id });
            }
        }
        Undo::Status { previous } => {
            if let Some(index) = state.position(&id) {
                state.records[index].status = previous;
                events.push(InboxEvent::RecordUpdated { id });
            }
        }
        Undo::Removed { record, rank } => {
            let index = state.slot_for(rank);
            state.records.insert(index, *record);
            events.push(InboxEvent::RecordRestored { id, index });
        }
    }
    let reverted = in_flight.applied.inverse().apply(&mut state.stats);
    if !reverted.is_zero() {
        events.push(InboxEvent::StatsChanged { stats: state.stats });
    }
    events
}
