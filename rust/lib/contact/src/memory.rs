//! In-process [`SyncGateway`] backed by a plain record list.
//!
//! Behaves like the contact service: filters by the canonical query,
//! returns newest first, and reports global statistics. Failures can be
//! injected per operation, which is what the store tests rely on.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{FetchError, GatewayError};
use crate::gateway::{FetchResponse, SyncGateway};
use crate::model::{Category, StatsSnapshot, Submission, SubmissionStatus};
use crate::query::CanonicalQuery;

/// Gateway operation, used to inject failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    SetReadFlag,
    SetStatus,
    Delete,
}

pub struct MemoryGateway {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    records: Vec<Submission>,
    /// Number of upcoming calls per operation that must fail.
    failures: HashMap<Operation, usize>,
    calls: HashMap<Operation, usize>,
}

impl Inner {
    /// Count the call and report whether it should fail.
    fn enter(&mut self, op: Operation) -> bool {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut Submission, GatewayError> {
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| GatewayError::Rejected(format!("submission {id} does not exist")))
    }
}

impl MemoryGateway {
    pub fn new(records: Vec<Submission>) -> Self {
        Self {
            inner: Mutex::new(Inner { records, ..Default::default() }),
        }
    }

    /// Make the next call of `op` fail. Repeated calls stack.
    pub fn fail_next(&self, op: Operation) {
        *self.lock().failures.entry(op).or_default() += 1;
    }

    /// Server-side records, in insertion order.
    pub fn records(&self) -> Vec<Submission> {
        self.lock().records.clone()
    }

    /// How many times `op` has been called, failures included.
    pub fn calls(&self, op: Operation) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn injected() -> String {
    "injected failure".to_string()
}

fn bad_request(field: &str, value: &str) -> FetchError {
    FetchError::Server {
        status: 400,
        message: format!("invalid {field} '{value}'"),
    }
}

/// Compiled form of a canonical query.
struct Matcher {
    status: Option<SubmissionStatus>,
    category: Option<Category>,
    is_read: Option<bool>,
    search: Option<String>,
}

impl Matcher {
    fn compile(query: &CanonicalQuery) -> Result<Self, FetchError> {
        let status = query
            .get("status")
            .map(|v| SubmissionStatus::parse(v).ok_or_else(|| bad_request("status", v)))
            .transpose()?;
        let category = query
            .get("category")
            .map(|v| Category::parse(v).ok_or_else(|| bad_request("category", v)))
            .transpose()?;
        let is_read = query
            .get("isRead")
            .map(|v| v.parse::<bool>().map_err(|_| bad_request("isRead", v)))
            .transpose()?;
        let search = query.get("search").map(str::to_lowercase);
        Ok(Self { status, category, is_read, search })
    }

    fn matches(&self, r: &Submission) -> bool {
        self.status.is_none_or(|s| r.status == s)
            && self.category.is_none_or(|c| r.category == c)
            && self.is_read.is_none_or(|b| r.is_read == b)
            && self.search.as_deref().is_none_or(|needle| {
                [&r.name, &r.email, &r.subject, &r.message]
                    .iter()
                    .any(|field| field.to_lowercase().contains(needle))
            })
    }
}

#[async_trait]
impl SyncGateway for MemoryGateway {
    async fn fetch_submissions(&self, query: &CanonicalQuery) -> Result<FetchResponse, FetchError> {
        let mut inner = self.lock();
        if inner.enter(Operation::Fetch) {
            return Err(FetchError::Network(injected()));
        }
        let matcher = Matcher::compile(query)?;

        let mut records: Vec<Submission> =
            inner.records.iter().filter(|r| matcher.matches(r)).cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let stats = StatsSnapshot {
            unread_count: inner.records.iter().filter(|r| !r.is_read).count() as u64,
            total_submissions: inner.records.len() as u64,
        };
        debug!(query = %query, matched = records.len(), "memory gateway fetch");
        Ok(FetchResponse { records, stats })
    }

    async fn set_read_flag(&self, id: &str, is_read: bool) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        if inner.enter(Operation::SetReadFlag) {
            return Err(GatewayError::Network(injected()));
        }
        inner.find_mut(id)?.is_read = is_read;
        Ok(())
    }

    async fn set_status(&self, id: &str, status: SubmissionStatus) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        if inner.enter(Operation::SetStatus) {
            return Err(GatewayError::Network(injected()));
        }
        inner.find_mut(id)?.status = status;
        Ok(())
    }

    async fn delete_submission(&self, id: &str) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        if inner.enter(Operation::Delete) {
            return Err(GatewayError::Network(injected()));
        }
        let before = inner.records.len();
        inner.records.retain(|r| r.id != id);
        if inner.records.len() == before {
            return Err(GatewayError::Rejected(format!("submission {id} does not exist")));
        }
        Ok(())
    }
}
