//! # console
//!
//! Command-line front end for the gateway console.
//!
//! ```text
//! console <COLLECTION> [PAGE] [--search <KEYWORD>] [--sort-id]
//! ```
//!
//! `collection` is one of `channels`, `tokens`, `users`, `redemptions`,
//! `logs`, `my-logs` or `drawings`. Rows are printed as JSON lines;
//! notifications go to stderr.

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use console_client::views::LogScope;
use console_client::{init_tracing, ChannelNotifier, ConsoleConfig, ConsoleState, Level, ListingView};
use console_net::HttpTransport;
use console_shared::protocol::Transport;
use console_shared::query::SearchQuery;
use console_shared::records::Record;
use console_store::{Database, MemorySettings, SettingsStorage, SqliteSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Collection {
    Channels,
    Tokens,
    Users,
    Redemptions,
    Logs,
    MyLogs,
    Drawings,
}

#[derive(Debug, Parser)]
#[command(name = "console", version, about = "Browse the gateway's admin collections")]
struct Args {
    /// Collection to list.
    #[arg(value_enum)]
    collection: Collection,

    /// Page to show; earlier pages are fetched on the way.
    #[arg(default_value_t = 0)]
    page: usize,

    /// Server-side keyword search instead of plain paging.
    #[arg(short, long, value_name = "KEYWORD")]
    search: Option<String>,

    /// Flip the persisted id sort before listing.
    #[arg(long)]
    sort_id: bool,
}

fn open_settings(config: &ConsoleConfig) -> Arc<dyn SettingsStorage> {
    let opened = match &config.settings_path {
        Some(path) => Database::open_at(path),
        None => Database::open_default(),
    };
    match opened {
        Ok(db) => Arc::new(SqliteSettings::new(db)),
        Err(e) => {
            warn!(error = %e, "Preferences database unavailable, preferences will not persist");
            Arc::new(MemorySettings::new())
        }
    }
}

async fn show<R: Record, T: Transport>(view: ListingView<R, T>, args: &Args) -> anyhow::Result<()> {
    view.mount().await?;
    if args.sort_id {
        view.toggle_id_sort().await?;
    }
    if let Some(keyword) = &args.search {
        view.search(SearchQuery::new().keyword(keyword)).await?;
    }

    // Pages can only be reached one at a time.
    let mut rows = view.page_rows();
    for page in 1..=args.page {
        rows = view.change_page(page).await?;
    }

    for row in rows {
        println!("{}", serde_json::to_string(&row)?);
    }
    let snapshot = view.store().snapshot();
    info!(
        page = view.current_page(),
        pages = view.page_count(),
        estimated_total = snapshot.estimated_total,
        filtered = snapshot.filtered,
        "Listing shown"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = ConsoleConfig::from_env();
    info!(server = %config.server_url, language = %config.language, "Starting gateway console");

    let transport = HttpTransport::new(config.transport_config())?;
    let settings = open_settings(&config);

    let (notifier, mut notifications) = ChannelNotifier::new();
    let printer = tokio::spawn(async move {
        while let Some(n) = notifications.recv().await {
            let tag = match n.level {
                Level::Success => "ok",
                Level::Warning => "warning",
                Level::Error => "error",
            };
            eprintln!("[{tag}] {}", n.message);
        }
    });

    let state = ConsoleState::new(transport, settings, Arc::new(notifier));
    let result = match args.collection {
        Collection::Channels => show(state.channels(), &args).await,
        Collection::Tokens => show(state.tokens(), &args).await,
        Collection::Users => show(state.users(), &args).await,
        Collection::Redemptions => show(state.redemptions(), &args).await,
        Collection::Logs => show(state.logs(LogScope::Admin), &args).await,
        Collection::MyLogs => show(state.logs(LogScope::User), &args).await,
        Collection::Drawings => show(state.drawings(), &args).await,
    };

    // Closing the last sender ends the printer.
    drop(state);
    printer.await?;
    result
}
