//! Contact inbox: client-side management of inbound contact submissions.
//!
//! Keeps a local working set of submissions fetched through a
//! [`SyncGateway`], applies operator changes (read flag, status, delete)
//! optimistically, rolls them back when the gateway refuses, and keeps the
//! unread/total statistics in step without refetching.
//!
//! # Pieces
//!
//! - [`build_query`] turns a [`FilterSpec`] into a [`CanonicalQuery`].
//! - [`SubmissionStore`] owns the working set and [`StatsSnapshot`].
//! - [`SelectionController`] tracks the record open for detail viewing.
//! - [`Inbox`] wires the three together for a presentation layer.
//!
//! # Example
//!
//! ```ignore
//! let inbox = Inbox::new(Arc::new(gateway));
//! inbox.subscribe(|event| println!("changed: {:?}", event.topic()));
//!
//! inbox.apply_filter(FilterSpec::default().with_read(Some(false))).await?;
//! inbox.open("c-42").await?;
//! inbox.set_status("c-42", SubmissionStatus::Resolved).await?;
//! ```

pub mod error;
pub mod events;
pub mod gateway;
pub mod inbox;
pub mod memory;
pub mod model;
pub mod query;
pub mod selection;
pub mod store;

#[cfg(test)]
mod fixtures;

pub use error::{FetchError, GatewayError, MutationError, SelectError};
pub use events::{InboxEvent, Notifier, SubscriptionId, Topic};
pub use gateway::{FetchPayload, FetchResponse, SubmissionRecord, SyncGateway};
pub use inbox::{Inbox, InboxState};
pub use memory::{MemoryGateway, Operation};
pub use model::{Category, FilterSpec, Priority, StatsSnapshot, Submission, SubmissionStatus};
pub use query::{CanonicalQuery, build_query};
pub use selection::SelectionController;
pub use store::{SubmissionStore, resolved_count};
