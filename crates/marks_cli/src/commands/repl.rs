//! Interactive command implementation.
//!
//! Reads commands from stdin while change events and auth changes are
//! applied on the same loop.

use super::render_list;
use marks_backend::{bookmark_view, Platform, PlatformClient, PlatformConfig, PlatformView};
use marks_sync::{IdentityTransition, SessionState, ViewConfig, ViewUpdate};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
commands:
  login <user>            sign in through the simulated provider
  logout                  sign out
  add <url> <title...>    add a bookmark
  rm <n>                  delete bookmark number n
  ls                      list bookmarks
  reload                  refetch and resubscribe
  quit                    exit";

enum Input {
    Line(std::io::Result<Option<String>>),
    Update(ViewUpdate),
}

/// Runs the repl command.
pub async fn run(user: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let platform = Platform::shared(PlatformConfig::default());
    let client = Arc::new(PlatformClient::new(platform));
    let mut view = bookmark_view(&client, ViewConfig::default());
    view.mount().await?;

    if let Some(user) = user {
        login(&client, &mut view, user).await;
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line),
            Some(update) = view.next_update() => Input::Update(update),
        };

        match input {
            Input::Line(line) => {
                let Some(line) = line? else {
                    break;
                };
                if !execute(&client, &mut view, line.trim()).await {
                    break;
                }
            }
            Input::Update(update) => print_update(&update),
        }
    }

    view.unmount().await;
    Ok(())
}

/// Runs one command. Returns false on `quit`.
async fn execute(client: &Arc<PlatformClient>, view: &mut PlatformView, line: &str) -> bool {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return true;
    };

    match command {
        "login" => match words.next() {
            Some(user) => login(client, view, user).await,
            None => println!("usage: login <user>"),
        },
        "logout" => {
            if let Err(e) = view.sign_out().await {
                println!("error: {e}");
            }
            view.settle().await;
            println!("signed out");
        }
        "add" => {
            let url = words.next().unwrap_or_default();
            let title = words.collect::<Vec<_>>().join(" ");
            *view.draft_mut() = marks_sync::Draft::new(title, url);
            match view.submit().await {
                Ok(stored) => println!("sent: {}", stored.title),
                Err(e) => println!("error: {e}"),
            }
            view.settle().await;
        }
        "rm" => {
            let target = words
                .next()
                .and_then(|n| n.parse::<usize>().ok())
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| view.bookmarks().get(i))
                .map(|b| b.id);
            match target {
                Some(id) => {
                    if let Err(e) = view.remove(id).await {
                        println!("error: {e}");
                    }
                    view.settle().await;
                }
                None => println!("usage: rm <n> (see ls)"),
            }
        }
        "ls" => print_list(view),
        "reload" => match view.reload().await {
            Ok(rows) => println!("reloaded {rows} bookmarks"),
            Err(e) => println!("error: {e}"),
        },
        "help" => println!("{HELP}"),
        "quit" | "exit" => return false,
        other => println!("unknown command: {other} (try help)"),
    }
    true
}

async fn login(client: &Arc<PlatformClient>, view: &mut PlatformView, user: &str) {
    match view.sign_in().await {
        Ok(redirect) => println!("redirecting to {}", redirect.url),
        Err(e) => {
            println!("error: {e}");
            return;
        }
    }
    let email = format!("{user}@example.com");
    if let Err(e) = client.sign_in_with("google", user, Some(&email)) {
        println!("error: {e}");
        return;
    }
    view.settle().await;
    print_list(view);
}

fn print_list(view: &PlatformView) {
    match view.state() {
        SessionState::Loading => println!("loading..."),
        SessionState::SignedOut => println!("not signed in"),
        SessionState::SignedIn(identity) => {
            let who = identity.email.as_deref().unwrap_or("signed in");
            println!("{who}:");
            println!("{}", render_list(view.bookmarks()));
        }
    }
}

fn print_update(update: &ViewUpdate) {
    match update {
        ViewUpdate::Identity(IdentityTransition::Unchanged) => {}
        ViewUpdate::Identity(transition) => println!("* session: {transition:?}"),
        ViewUpdate::FetchFailed { transition, error } => {
            println!("* session: {transition:?}, loading failed: {error}; use reload");
        }
        ViewUpdate::Reconciled { event, outcome } if outcome.changed() => {
            println!("* {:?} {}", event.kind, event.record.title);
        }
        ViewUpdate::Reconciled { .. } => {}
        ViewUpdate::Disconnected => println!("* change stream disconnected; use reload"),
        ViewUpdate::ListenerClosed => println!("* auth listener closed"),
    }
}
