//! Demo command implementation.
//!
//! Signs the same user into two sessions, adds bookmarks from the first,
//! deletes one from the second, and shows that both views converge without
//! the passive session issuing any request.

use super::render_list;
use marks_backend::{bookmark_view, Platform, PlatformClient, PlatformConfig, PlatformView};
use marks_protocol::Bookmark;
use marks_sync::ViewConfig;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Final state of one session.
#[derive(Debug, Serialize)]
pub struct SessionReport {
    /// Visible bookmarks, newest first.
    pub bookmarks: Vec<Bookmark>,
    /// Change events that altered the list.
    pub events_applied: u64,
    /// Change events dropped by reconciliation.
    pub events_ignored: u64,
    /// Inserts this session sent.
    pub inserts_sent: u64,
    /// Deletes this session sent.
    pub deletes_sent: u64,
}

impl SessionReport {
    fn from_view(view: &PlatformView) -> Self {
        let stats = view.stats();
        Self {
            bookmarks: view.bookmarks().to_vec(),
            events_applied: stats.events_applied,
            events_ignored: stats.events_ignored,
            inserts_sent: stats.inserts_sent,
            deletes_sent: stats.deletes_sent,
        }
    }
}

/// Demo result.
#[derive(Debug, Serialize)]
pub struct DemoResult {
    /// User both sessions belong to.
    pub user: String,
    /// Session that wrote.
    pub session_1: SessionReport,
    /// Session that deleted.
    pub session_2: SessionReport,
    /// True if both sessions ended with the same list.
    pub converged: bool,
}

/// Runs the demo command.
pub async fn run(user: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let platform = Platform::shared(PlatformConfig::default());
    let email = format!("{user}@example.com");

    let (client_1, mut view_1) = open_session(&platform).await?;
    let (client_2, mut view_2) = open_session(&platform).await?;
    client_1.sign_in_with("google", user, Some(&email))?;
    client_2.sign_in_with("google", user, Some(&email))?;
    settle(&mut view_1, &mut view_2).await;

    view_1.add("Example", "https://example.com").await?;
    view_1.add("The Rust Book", "https://doc.rust-lang.org/book/").await?;
    settle(&mut view_1, &mut view_2).await;
    info!(
        session_1 = view_1.bookmarks().len(),
        session_2 = view_2.bookmarks().len(),
        "after adds"
    );

    let oldest = view_2
        .bookmarks()
        .last()
        .map(|b| b.id)
        .ok_or("session 2 saw no bookmarks")?;
    view_2.remove(oldest).await?;
    settle(&mut view_1, &mut view_2).await;

    let result = DemoResult {
        user: user.to_string(),
        converged: view_1.bookmarks() == view_2.bookmarks(),
        session_1: SessionReport::from_view(&view_1),
        session_2: SessionReport::from_view(&view_2),
    };

    view_1.unmount().await;
    view_2.unmount().await;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

async fn open_session(
    platform: &Arc<Platform>,
) -> Result<(Arc<PlatformClient>, PlatformView), Box<dyn std::error::Error>> {
    let client = Arc::new(PlatformClient::new(platform.clone()));
    let mut view = bookmark_view(&client, ViewConfig::default());
    view.mount().await?;
    Ok((client, view))
}

async fn settle(a: &mut PlatformView, b: &mut PlatformView) {
    while a.settle().await + b.settle().await > 0 {}
}

fn print_text_output(result: &DemoResult) {
    println!("User: {}", result.user);
    println!();
    for (name, report) in [("Session 1", &result.session_1), ("Session 2", &result.session_2)] {
        println!(
            "{name} (sent {} inserts, {} deletes; applied {} events, ignored {}):",
            report.inserts_sent, report.deletes_sent, report.events_applied, report.events_ignored
        );
        println!("{}", render_list(&report.bookmarks));
        println!();
    }
    println!(
        "Views {}",
        if result.converged { "converged" } else { "diverged" }
    );
}
