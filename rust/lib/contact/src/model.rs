use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Filter value meaning "no constraint". Empty strings mean the same.
pub const ANY: &str = "all";

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// What a contact submission is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    General,
    Membership,
    Events,
    Technical,
    Complaint,
    Suggestion,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::General,
        Self::Membership,
        Self::Events,
        Self::Technical,
        Self::Complaint,
        Self::Suggestion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Membership => "membership",
            Self::Events => "events",
            Self::Technical => "technical",
            Self::Complaint => "complaint",
            Self::Suggestion => "suggestion",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "general" => Some(Self::General),
            "membership" => Some(Self::Membership),
            "events" => Some(Self::Events),
            "technical" => Some(Self::Technical),
            "complaint" => Some(Self::Complaint),
            "suggestion" => Some(Self::Suggestion),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SubmissionStatus
// ---------------------------------------------------------------------------

/// Handling state of a submission.
///
/// ```text
/// PENDING → IN-PROGRESS → RESOLVED → CLOSED
/// ```
///
/// The operator may move a submission to any status; the arrow only shows
/// the usual order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionStatus {
    Pending,
    InProgress,
    Resolved,
    Closed,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Resolved,
        Self::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in-progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// One inbound contact submission.
///
/// Only `status` and `is_read` are changed by the operator; `id` never
/// changes once assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub category: Category,
    pub priority: Priority,
    pub status: SubmissionStatus,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// StatsSnapshot
// ---------------------------------------------------------------------------

/// Aggregate counters tracked next to the working set.
///
/// `unread_count` follows read-flag toggles and deletions of unread
/// records; `total_submissions` only changes on refetch or delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub unread_count: u64,
    pub total_submissions: u64,
}

/// Signed change to a [`StatsSnapshot`].
///
/// `apply` saturates at zero and returns the delta that was actually
/// applied, so reverting that value restores the counters exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct StatsDelta {
    pub unread: i64,
    pub total: i64,
}

impl StatsDelta {
    pub fn is_zero(&self) -> bool {
        self.unread == 0 && self.total == 0
    }

    pub fn apply(self, stats: &mut StatsSnapshot) -> StatsDelta {
        StatsDelta {
            unread: shift(&mut stats.unread_count, self.unread),
            total: shift(&mut stats.total_submissions, self.total),
        }
    }

    pub fn inverse(self) -> StatsDelta {
        StatsDelta { unread: -self.unread, total: -self.total }
    }
}

fn shift(counter: &mut u64, delta: i64) -> i64 {
    let before = *counter;
    *counter = if delta < 0 {
        before.saturating_sub(delta.unsigned_abs())
    } else {
        before.saturating_add(delta as u64)
    };
    *counter as i64 - before as i64
}

// ---------------------------------------------------------------------------
// FilterSpec
// ---------------------------------------------------------------------------

/// Operator-chosen filter for the working set.
///
/// Fields hold raw strings: `"all"` and `""` both mean "no constraint",
/// anything else is sent to the server verbatim (validation is the
/// server's job).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub status: String,
    pub category: String,
    /// `"true"`, `"false"` or `"all"`.
    pub is_read: String,
    pub search: String,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            status: ANY.to_string(),
            category: ANY.to_string(),
            is_read: ANY.to_string(),
            search: String::new(),
        }
    }
}

impl FilterSpec {
    pub fn with_status(mut self, status: SubmissionStatus) -> Self {
        self.status = status.as_str().to_string();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category.as_str().to_string();
        self
    }

    /// `None` clears the read-flag constraint.
    pub fn with_read(mut self, is_read: Option<bool>) -> Self {
        self.is_read = match is_read {
            Some(v) => v.to_string(),
            None => ANY.to_string(),
        };
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }
}

/// Whether a filter value constrains anything.
pub fn is_unconstrained(value: &str) -> bool {
    value.is_empty() || value == ANY
}
