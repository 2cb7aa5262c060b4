//! Marks CLI
//!
//! Drives bookmark views against an in-process platform.
//!
//! # Commands
//!
//! - `demo` - Run two sessions of one user side by side
//! - `repl` - Drive a single session interactively from stdin

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Live bookmark views from the command line.
#[derive(Parser)]
#[command(name = "marks")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run two sessions of the same user and show both views
    Demo {
        /// User to sign in as
        #[arg(short, long, default_value = "alice")]
        user: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Drive one session interactively
    Repl {
        /// Sign in as this user on start
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Show version information
    Version,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Demo { user, format } => {
            commands::demo::run(&user, &format).await?;
        }
        Commands::Repl { user } => {
            commands::repl::run(user.as_deref()).await?;
        }
        Commands::Version => {
            println!("Marks CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
