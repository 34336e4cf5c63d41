//! Submission commands: list, show, read/unread, status, delete, stats.
//!
//! Every command loads a working set first; mutations only apply to
//! records in it.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use openerp_contact::{FilterSpec, Inbox, StatsSnapshot, Submission, SubmissionStatus};
use openerp_contact_client::{HttpGateway, NoAuth, StaticToken, TokenSource};

use super::Output;
use crate::config::ClientConfig;

/// Build an inbox talking to the selected context's server.
pub fn connect(client_config_path: &Path, context: Option<&str>) -> Result<Inbox> {
    let config = ClientConfig::load(client_config_path)?;
    let ctx = config.resolve(context)?;
    if ctx.server.is_empty() {
        anyhow::bail!(
            "No server URL set for context \"{}\". Run `contactctl context set {} --server <url>`.",
            ctx.name,
            ctx.name
        );
    }

    let token: Arc<dyn TokenSource> = if ctx.token.is_empty() {
        Arc::new(NoAuth)
    } else {
        Arc::new(StaticToken::new(ctx.token.clone()))
    };
    tracing::debug!(context = %ctx.name, server = %ctx.server, "connecting");
    Ok(Inbox::new(Arc::new(HttpGateway::new(ctx.server.clone(), token))))
}

pub async fn list(inbox: &Inbox, filter: FilterSpec, output: Output) -> Result<()> {
    inbox.apply_filter(filter).await?;
    let state = inbox.state();
    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        Output::Table => {
            print!("{}", render_table(&state.submissions));
            println!(
                "{} shown, {} unread of {} total",
                state.submissions.len(),
                state.stats.unread_count,
                state.stats.total_submissions
            );
        }
    }
    Ok(())
}

/// Open a submission for reading. Marks it read on the server.
pub async fn show(inbox: &Inbox, id: &str, output: Output) -> Result<()> {
    inbox.refresh().await?;
    let submission = inbox.open(id).await?;
    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(&submission)?),
        Output::Table => print!("{}", render_detail(&submission)),
    }
    Ok(())
}

pub async fn set_read(inbox: &Inbox, id: &str, is_read: bool) -> Result<()> {
    inbox.refresh().await?;
    inbox.set_read_flag(id, is_read).await?;
    println!(
        "Submission \"{}\" marked {}.",
        id,
        if is_read { "read" } else { "unread" }
    );
    Ok(())
}

pub async fn set_status(inbox: &Inbox, id: &str, status: SubmissionStatus) -> Result<()> {
    inbox.refresh().await?;
    inbox.set_status(id, status).await?;
    println!("Submission \"{}\" is now {}.", id, status);
    Ok(())
}

pub async fn delete(inbox: &Inbox, id: &str, yes: bool) -> Result<()> {
    if !yes && !confirm(&format!("Delete submission \"{}\"?", id))? {
        println!("Cancelled.");
        return Ok(());
    }
    inbox.refresh().await?;
    inbox.remove(id).await?;
    println!("Submission \"{}\" deleted.", id);
    Ok(())
}

pub async fn stats(inbox: &Inbox, filter: FilterSpec, output: Output) -> Result<()> {
    inbox.apply_filter(filter).await?;
    let state = inbox.state();
    let breakdown = inbox.store().status_breakdown();
    match output {
        Output::Json => {
            let by_status: serde_json::Map<String, serde_json::Value> = breakdown
                .iter()
                .map(|(s, n)| (s.as_str().to_string(), (*n).into()))
                .collect();
            let body = serde_json::json!({
                "unreadCount": state.stats.unread_count,
                "totalSubmissions": state.stats.total_submissions,
                "resolvedCount": state.resolved_count,
                "byStatus": by_status,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Output::Table => print!("{}", render_stats(state.stats, state.resolved_count, &breakdown)),
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{} [y/N]: ", prompt);
    std::io::stderr().flush()?;
    let mut s = String::new();
    std::io::stdin().read_line(&mut s)?;
    Ok(s.trim().eq_ignore_ascii_case("y"))
}

// ── Rendering ───────────────────────────────────────────────────────

const SUBJECT_WIDTH: usize = 36;

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn render_table(records: &[Submission]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:1} {:14} {:12} {:11} {:7} {:16} {:24} {}",
        "", "ID", "STATUS", "CATEGORY", "PRIO", "CREATED", "FROM", "SUBJECT"
    );
    for r in records {
        let _ = writeln!(
            out,
            "{:1} {:14} {:12} {:11} {:7} {:16} {:24} {}",
            if r.is_read { " " } else { "*" },
            r.id,
            r.status.as_str(),
            r.category.as_str(),
            r.priority.as_str(),
            r.created_at.format("%Y-%m-%d %H:%M").to_string(),
            truncate(&r.email, 24),
            truncate(&r.subject, SUBJECT_WIDTH),
        );
    }
    out
}

fn render_detail(s: &Submission) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ID:        {}", s.id);
    let _ = writeln!(out, "From:      {} <{}>", s.name, s.email);
    let _ = writeln!(out, "Subject:   {}", s.subject);
    let _ = writeln!(out, "Category:  {}", s.category);
    let _ = writeln!(out, "Priority:  {}", s.priority);
    let _ = writeln!(out, "Status:    {}", s.status);
    let _ = writeln!(out, "Received:  {}", s.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", s.message);
    out
}

fn render_stats(
    stats: StatsSnapshot,
    resolved: usize,
    breakdown: &[(SubmissionStatus, usize)],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Unread:    {}", stats.unread_count);
    let _ = writeln!(out, "Total:     {}", stats.total_submissions);
    let _ = writeln!(out, "Resolved:  {} (in current filter)", resolved);
    for (status, n) in breakdown {
        let _ = writeln!(out, "  {:12} {}", status.as_str(), n);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(id: &str, subject: &str, is_read: bool) -> Submission {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "subject": subject,
            "message": "First line\nSecond line",
            "category": "technical",
            "priority": "high",
            "status": "in-progress",
            "isRead": is_read,
            "createdAt": "2024-06-01T08:30:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn table_marks_unread_rows() {
        let out = render_table(&[
            submission("c-1", "Printer on fire", false),
            submission("c-2", "Thanks", true),
        ]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("STATUS"));
        assert!(lines[1].starts_with("* c-1"));
        assert!(lines[1].contains("in-progress"));
        assert!(lines[1].contains("2024-06-01 08:30"));
        assert!(lines[2].starts_with("  c-2"));
    }

    #[test]
    fn long_subjects_are_truncated() {
        let subject = "x".repeat(80);
        let out = render_table(&[submission("c-1", &subject, true)]);
        assert!(out.contains(&format!("{}…", "x".repeat(SUBJECT_WIDTH - 1))));
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn detail_includes_message_body() {
        let out = render_detail(&submission("c-1", "Hello", true));
        assert!(out.contains("From:      Ada Lovelace <ada@example.com>"));
        assert!(out.contains("Status:    in-progress"));
        assert!(out.ends_with("First line\nSecond line\n"));
    }

    #[test]
    fn stats_lists_every_status() {
        let out = render_stats(
            StatsSnapshot { unread_count: 2, total_submissions: 7 },
            3,
            &[
                (SubmissionStatus::Pending, 1),
                (SubmissionStatus::Resolved, 3),
            ],
        );
        assert!(out.contains("Unread:    2"));
        assert!(out.contains("Total:     7"));
        assert!(out.contains("Resolved:  3"));
        assert!(out.contains("  resolved     3"));
    }

    #[test]
    fn connect_requires_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contact.toml");
        assert!(connect(&path, None).is_err());

        crate::commands::context::set("local", Some("http://localhost:1"), None, &path).unwrap();
        assert!(connect(&path, None).is_ok());
        assert!(connect(&path, Some("other")).is_err());
    }
}
