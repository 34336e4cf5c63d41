//! Record builders shared by unit tests.

use chrono::{Duration, TimeZone, Utc};

use crate::model::{Category, Priority, Submission, SubmissionStatus};

/// A general, medium-priority submission. `created_at` grows with the
/// byte sum of `id`, so "a" < "b" < "c" in time.
pub fn submission(id: &str, status: SubmissionStatus, is_read: bool) -> Submission {
    let offset: i64 = id.bytes().map(i64::from).sum();
    Submission {
        id: id.to_string(),
        name: format!("Sender {id}"),
        email: format!("{id}@example.com"),
        subject: format!("Subject {id}"),
        message: format!("Message body {id}"),
        category: Category::General,
        priority: Priority::Medium,
        status,
        is_read,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(offset),
    }
}
