//! # console-shared
//!
//! Types shared by every layer of the gateway console: the record models of
//! each administered collection, the request/envelope protocol spoken with the
//! gateway's REST API, the search query builder and the error taxonomy.

pub mod actions;
pub mod constants;
pub mod error;
pub mod protocol;
pub mod query;
pub mod records;
pub mod types;

pub use actions::{ActionKind, BatchAction, RowAction};
pub use error::{ConsoleError, Result};
pub use protocol::{ApiRequest, Envelope, Method, Transport};
pub use query::{SearchField, SearchQuery};
pub use records::Record;
pub use types::{RecordId, SortOrder, TimestampUnit};
