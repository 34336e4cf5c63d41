use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Callers match on these,
// not on the human-readable message.

pub mod error_code {
    pub const NETWORK: &str = "NETWORK";
    pub const SERVER: &str = "SERVER";
    pub const DECODE: &str = "DECODE";
    pub const SUPERSEDED: &str = "SUPERSEDED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_PENDING: &str = "ALREADY_PENDING";
    pub const REJECTED: &str = "REJECTED";
}

// ── FetchError ──────────────────────────────────────────────────────

/// Failure of a filtered fetch. The previous working set is kept.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport-level failure (connection refused, timeout, ...).
    #[error("network: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    /// The response could not be mapped onto the submission model.
    #[error("decode: {0}")]
    Decode(String),

    /// A newer load was applied while this one was in flight.
    #[error("superseded by a newer load")]
    Superseded,
}

impl FetchError {
    pub fn error_code(&self) -> &'static str {
        match self {
            FetchError::Network(_) => error_code::NETWORK,
            FetchError::Server { .. } => error_code::SERVER,
            FetchError::Decode(_) => error_code::DECODE,
            FetchError::Superseded => error_code::SUPERSEDED,
        }
    }
}

// ── GatewayError ────────────────────────────────────────────────────

/// Failure of a single mutation call at the Sync Gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("network: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    /// The server refused the change (validation, conflict, gone).
    #[error("rejected: {0}")]
    Rejected(String),
}

impl GatewayError {
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Network(_) => error_code::NETWORK,
            GatewayError::Server { .. } => error_code::SERVER,
            GatewayError::Rejected(_) => error_code::REJECTED,
        }
    }
}

// ── MutationError ───────────────────────────────────────────────────

/// Error returned by the store's per-record mutations.
///
/// `NotFound` and `AlreadyPending` are local precondition failures: no
/// network call was made and nothing changed. `Gateway` means the
/// optimistic change was rolled back (unless a newer load had already
/// replaced the working set).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("submission '{0}' not found")]
    NotFound(String),

    #[error("submission '{0}' already has a pending change")]
    AlreadyPending(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl MutationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            MutationError::NotFound(_) => error_code::NOT_FOUND,
            MutationError::AlreadyPending(_) => error_code::ALREADY_PENDING,
            MutationError::Gateway(e) => e.error_code(),
        }
    }
}

// ── SelectError ─────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    #[error("submission '{0}' is not in the working set")]
    NotFound(String),
}

impl SelectError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SelectError::NotFound(_) => error_code::NOT_FOUND,
        }
    }
}

impl From<SelectError> for MutationError {
    fn from(e: SelectError) -> Self {
        match e {
            SelectError::NotFound(id) => MutationError::NotFound(id),
        }
    }
}
