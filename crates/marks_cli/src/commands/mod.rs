//! CLI command implementations.

pub mod demo;
pub mod repl;

use marks_protocol::Bookmark;

/// Formats a bookmark list, numbered from 1, newest first.
pub fn render_list(bookmarks: &[Bookmark]) -> String {
    if bookmarks.is_empty() {
        return "  (no bookmarks)".to_string();
    }
    bookmarks
        .iter()
        .enumerate()
        .map(|(i, b)| format!("  {:>2}. {}  <{}>", i + 1, b.title, b.url))
        .collect::<Vec<_>>()
        .join("\n")
}
