//! chat-replay - Feed a recorded chat session through the unread tracker
//!
//! Usage: `chat-replay <script.json> [--db <path>]`
//!
//! Without `--db` the session runs against an in-memory store. With it, state
//! is loaded from and written back to a SQLite database, so consecutive runs
//! continue where the previous one stopped.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chat::{
    ChatStore, InMemoryChatStore, LogNotificationSink, SqliteChatStore, TrackerConfig,
    UnreadTracker, event_channel, list_conversations,
};
use clap::Parser;
use log::{info, warn};

mod script;

use script::ReplayScript;

/// Feed a recorded chat session through the unread tracker
#[derive(Parser, Debug)]
#[command(name = "chat-replay")]
#[command(version, about, long_about = None)]
struct Args {
    /// Session script (JSON)
    script: PathBuf,

    /// SQLite database to load state from and write it back to
    #[arg(long)]
    db: Option<PathBuf>,
}

fn open_store(db: Option<&PathBuf>) -> Result<Arc<dyn ChatStore>> {
    match db {
        Some(path) => {
            info!("Using database {}", path.display());
            Ok(Arc::new(SqliteChatStore::new(path)?))
        }
        None => Ok(Arc::new(InMemoryChatStore::new())),
    }
}

fn run(args: Args) -> Result<()> {
    let script = ReplayScript::from_file(&args.script)?;
    let config = script.apply_settings(TrackerConfig::load()?);
    if config.current_user.is_empty() {
        warn!("No current user configured; own messages will not be recognised");
    }

    let store = open_store(args.db.as_ref())?;
    let tracker = Arc::new(UnreadTracker::open(
        config,
        store,
        Arc::new(LogNotificationSink),
    )?);

    let (events, event_loop) = event_channel(Arc::clone(&tracker));
    for event in script.events {
        events.send(event)?;
    }
    drop(events);

    let stats = event_loop.run();
    info!(
        "Replayed {} events ({} failed)",
        stats.applied + stats.failed,
        stats.failed
    );

    for row in list_conversations(&tracker) {
        let bold = if row.is_unread { "*" } else { " " };
        let boundary = row
            .unread_boundary
            .map(|b| format!("new from #{} ({} unread)", b, row.unread_count))
            .unwrap_or_else(|| "read".to_string());
        println!(
            "{} {:<12} {:<30} {:<28} {}",
            bold,
            row.id,
            row.display_name,
            boundary,
            row.last_message_text
        );
    }

    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run(Args::parse()) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
