//! Sync Gateway boundary.
//!
//! [`SyncGateway`] is the contract the core consumes; transports live
//! outside this crate (see `openerp-contact-client` for HTTP, and
//! [`crate::memory`] for an in-process implementation).
//!
//! The wire types here carry enum fields as plain strings. [`decode`]
//! is the single place where they are checked against the closed
//! enumerations, so a server sending an unknown status fails the fetch
//! instead of leaking a bogus value into the working set.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, GatewayError};
use crate::model::{Category, Priority, StatsSnapshot, Submission, SubmissionStatus};
use crate::query::CanonicalQuery;

/// Result of a filtered fetch: the new working set plus statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub records: Vec<Submission>,
    pub stats: StatsSnapshot,
}

/// Remote operations the Submission Store depends on.
///
/// Implementations own transport concerns: wire format, auth, timeouts.
/// They must not retry on their own behalf unless that is their policy;
/// the store never retries.
#[async_trait]
pub trait SyncGateway: Send + Sync + 'static {
    async fn fetch_submissions(&self, query: &CanonicalQuery) -> Result<FetchResponse, FetchError>;

    async fn set_read_flag(&self, id: &str, is_read: bool) -> Result<(), GatewayError>;

    async fn set_status(&self, id: &str, status: SubmissionStatus) -> Result<(), GatewayError>;

    async fn delete_submission(&self, id: &str) -> Result<(), GatewayError>;
}

// ── Wire format ─────────────────────────────────────────────────────

/// A submission as sent by the server, before enum validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub category: String,
    pub priority: String,
    pub status: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Body of a list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchPayload {
    pub items: Vec<SubmissionRecord>,
    pub stats: StatsSnapshot,
}

impl From<&Submission> for SubmissionRecord {
    fn from(s: &Submission) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
            email: s.email.clone(),
            subject: s.subject.clone(),
            message: s.message.clone(),
            category: s.category.as_str().to_string(),
            priority: s.priority.as_str().to_string(),
            status: s.status.as_str().to_string(),
            is_read: s.is_read,
            created_at: s.created_at,
        }
    }
}

impl TryFrom<SubmissionRecord> for Submission {
    type Error = FetchError;

    fn try_from(r: SubmissionRecord) -> Result<Self, Self::Error> {
        let category = Category::parse(&r.category)
            .ok_or_else(|| unknown("category", &r.id, &r.category))?;
        let priority = Priority::parse(&r.priority)
            .ok_or_else(|| unknown("priority", &r.id, &r.priority))?;
        let status = SubmissionStatus::parse(&r.status)
            .ok_or_else(|| unknown("status", &r.id, &r.status))?;
        if r.id.is_empty() {
            return Err(FetchError::Decode("submission with empty id".into()));
        }
        Ok(Submission {
            id: r.id,
            name: r.name,
            email: r.email,
            subject: r.subject,
            message: r.message,
            category,
            priority,
            status,
            is_read: r.is_read,
            created_at: r.created_at,
        })
    }
}

fn unknown(field: &str, id: &str, value: &str) -> FetchError {
    FetchError::Decode(format!("submission {id}: unknown {field} '{value}'"))
}

/// Validate a list payload into a [`FetchResponse`], keeping server order.
pub fn decode(payload: FetchPayload) -> Result<FetchResponse, FetchError> {
    let records = payload
        .items
        .into_iter()
        .map(Submission::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FetchResponse { records, stats: payload.stats })
}
