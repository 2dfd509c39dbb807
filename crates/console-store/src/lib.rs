//! # console-store
//!
//! Client-side state of the console's listing views.
//!
//! [`CollectionStore`] is the incremental, server-backed paginated cache each
//! view instantiates: it fetches pages through a
//! [`Transport`](console_shared::Transport), merges them by id, searches,
//! sorts, and applies row mutations only once the server confirms them.
//! [`OptionStore`] does the same for the gateway's system options. The
//! crate also persists per-view preferences (page size, sort order) in a small
//! SQLite database.

pub mod collection;
pub mod database;
pub mod migrations;
pub mod options;
pub mod settings;
pub mod state;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

mod error;

pub use collection::{CollectionStore, LoadOutcome, MutationOutcome, Snapshot};
pub use database::Database;
pub use options::{OptionEntry, OptionStore, SaveReport};
pub use error::StoreError;
pub use settings::{MemorySettings, SettingsStorage, SqliteSettings, ViewPreferences};
pub use state::{CollectionState, LoadMode};
