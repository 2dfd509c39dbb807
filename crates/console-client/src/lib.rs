//! # console-client
//!
//! The gateway console's controller layer: one [`ListingView`] per
//! administered collection on top of a [`console_store::CollectionStore`],
//! the row-action command layer with its confirmation step, user
//! notifications, and configuration from the environment.

pub mod actions;
pub mod config;
pub mod notify;
pub mod state;
pub mod views;

use tracing_subscriber::{fmt, EnvFilter};

pub use actions::{ActionDescriptor, Confirmed, Prepared, Unconfirmed};
pub use config::ConsoleConfig;
pub use notify::{ChannelNotifier, Level, Notification, Notifier};
pub use state::ConsoleState;
pub use views::ListingView;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("console_client=debug,console_store=info,console_net=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
