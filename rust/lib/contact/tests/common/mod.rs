//! Shared fixtures for contact integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::oneshot;

use openerp_contact::{
    CanonicalQuery, Category, FetchError, FetchResponse, GatewayError, MemoryGateway, Operation,
    Priority, Submission, SubmissionStatus, SyncGateway,
};

/// Submission created `minute` minutes after a fixed epoch.
pub fn submission(id: &str, minute: u32, status: SubmissionStatus, is_read: bool) -> Submission {
    Submission {
        id: id.to_string(),
        name: format!("Sender {id}"),
        email: format!("{id}@example.org"),
        subject: format!("About {id}"),
        message: "Hello there".to_string(),
        category: Category::Membership,
        priority: Priority::Low,
        status,
        is_read,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap(),
    }
}

/// Wraps a [`MemoryGateway`] and can park calls until the test releases them.
///
/// While an operation is held, each call of it waits on its own channel
/// before reaching the memory gateway, so failures injected with
/// `inner.fail_next` apply at release time.
pub struct HeldGateway {
    pub inner: MemoryGateway,
    state: Mutex<HoldState>,
}

#[derive(Default)]
struct HoldState {
    held: HashSet<Operation>,
    parked: HashMap<Operation, Vec<oneshot::Sender<()>>>,
}

impl HeldGateway {
    pub fn new(records: Vec<Submission>) -> Self {
        Self {
            inner: MemoryGateway::new(records),
            state: Mutex::new(HoldState::default()),
        }
    }

    pub fn hold(&self, op: Operation) {
        self.state.lock().unwrap().held.insert(op);
    }

    pub fn parked(&self, op: Operation) -> usize {
        self.state.lock().unwrap().parked.get(&op).map_or(0, Vec::len)
    }

    /// Let the `index`-th currently parked call of `op` proceed (arrival order).
    pub fn release(&self, op: Operation, index: usize) {
        let tx = self.state.lock().unwrap().parked.get_mut(&op).unwrap().remove(index);
        tx.send(()).unwrap();
    }

    /// Wait until at least `n` calls of `op` are parked.
    pub async fn wait_parked(&self, op: Operation, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.parked(op) < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("calls never reached the gateway");
    }

    async fn pass(&self, op: Operation) {
        let rx = {
            let mut state = self.state.lock().unwrap();
            if !state.held.contains(&op) {
                return;
            }
            let (tx, rx) = oneshot::channel();
            state.parked.entry(op).or_default().push(tx);
            rx
        };
        let _ = rx.await;
    }
}

#[async_trait]
impl SyncGateway for HeldGateway {
    async fn fetch_submissions(&self, query: &CanonicalQuery) -> Result<FetchResponse, FetchError> {
        self.pass(Operation::Fetch).await;
        self.inner.fetch_submissions(query).await
    }

    async fn set_read_flag(&self, id: &str, is_read: bool) -> Result<(), GatewayError> {
        self.pass(Operation::SetReadFlag).await;
        self.inner.set_read_flag(id, is_read).await
    }

    async fn set_status(&self, id: &str, status: SubmissionStatus) -> Result<(), GatewayError> {
        self.pass(Operation::SetStatus).await;
        self.inner.set_status(id, status).await
    }

    async fn delete_submission(&self, id: &str) -> Result<(), GatewayError> {
        self.pass(Operation::Delete).await;
        self.inner.delete_submission(id).await
    }
}
