//! Record models of the collections the console administers.
//!
//! Every model derives `Serialize` and `Deserialize` with `#[serde(default)]`
//! so partially populated rows (the gateway omits secrets in listings) still
//! decode.

mod channel;
mod drawing;
mod log;
mod redemption;
mod token;
mod user;

pub use channel::Channel;
pub use drawing::DrawingJob;
pub use log::{LogEntry, LogStat, LogType};
pub use redemption::Redemption;
pub use token::Token;
pub use user::{User, UserRole};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::actions::{ActionKind, RowAction};
use crate::error::{ConsoleError, Result};
use crate::protocol::ApiRequest;
use crate::query::{SearchField, SearchQuery};
use crate::types::{RecordId, SortOrder, TimestampUnit};

/// A row of a server-paginated collection.
pub trait Record:
    Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Collection name, used for logging and settings keys.
    const COLLECTION: &'static str;
    /// REST base path, without trailing slash.
    const BASE_PATH: &'static str;
    /// Filters accepted by this collection's search.
    const SEARCH_FIELDS: &'static [SearchField];
    /// Status changes go through `PUT {base}/?status_only=true`.
    const STATUS_ONLY_UPDATES: bool = false;
    /// Rows cannot be mutated from the console.
    const READ_ONLY: bool = false;
    const TIMESTAMP_UNIT: TimestampUnit = TimestampUnit::Seconds;
    const ENABLED_STATUS: i64 = 1;
    const DISABLED_STATUS: i64 = 2;

    fn id(&self) -> RecordId;

    fn status(&self) -> Option<i64> {
        None
    }

    /// Human-readable name used in notifications.
    fn label(&self) -> String {
        format!("#{}", self.id())
    }

    /// Row menu entries for this record.
    fn available_actions(&self) -> Vec<ActionKind> {
        default_actions(self)
    }

    /// Body of the create request that duplicates this record, if copying is
    /// supported.
    fn copy_payload(&self) -> Option<Value> {
        None
    }

    fn list_request(base: &str, page: usize, page_size: usize, sort: SortOrder) -> ApiRequest {
        ApiRequest::get(format!("{base}/"))
            .query("p", page)
            .query("page_size", page_size)
            .query("id_sort", sort.id_sort())
    }

    fn search_request(base: &str, query: &SearchQuery) -> ApiRequest {
        ApiRequest::get(format!("{base}/search"))
            .query_pairs(query.to_params(Self::SEARCH_FIELDS, Self::TIMESTAMP_UNIT))
    }

    fn mutation_request(&self, base: &str, action: &RowAction) -> Result<ApiRequest> {
        rest_mutation_request(self, base, action)
    }
}

/// Status toggle, edit and delete, plus copy where supported.
pub fn default_actions<R: Record>(record: &R) -> Vec<ActionKind> {
    if R::READ_ONLY {
        return Vec::new();
    }
    let mut actions = Vec::new();
    match record.status() {
        Some(status) if status == R::ENABLED_STATUS => actions.push(ActionKind::Disable),
        Some(_) => actions.push(ActionKind::Enable),
        None => {}
    }
    actions.push(ActionKind::Edit);
    if record.copy_payload().is_some() {
        actions.push(ActionKind::Copy);
    }
    actions.push(ActionKind::Delete);
    actions
}

pub fn unsupported<R: Record>(action: &RowAction) -> ConsoleError {
    ConsoleError::Unsupported {
        collection: R::COLLECTION,
        action: action.name(),
    }
}

/// The gateway's standard REST mapping of a row action.
pub fn rest_mutation_request<R: Record>(
    record: &R,
    base: &str,
    action: &RowAction,
) -> Result<ApiRequest> {
    if R::READ_ONLY {
        return Err(unsupported::<R>(action));
    }
    let id = record.id();
    match action {
        RowAction::Delete => Ok(ApiRequest::delete(format!("{base}/{id}/"))),
        RowAction::Copy => record
            .copy_payload()
            .map(|payload| ApiRequest::post(format!("{base}/"), payload))
            .ok_or_else(|| unsupported::<R>(action)),
        RowAction::Promote | RowAction::Demote => Err(unsupported::<R>(action)),
        RowAction::Enable | RowAction::Disable => {
            let request = put_patch::<R>(base, id, action);
            Ok(if R::STATUS_ONLY_UPDATES {
                request.query("status_only", true)
            } else {
                request
            })
        }
        RowAction::SetPriority(_) | RowAction::SetWeight(_) | RowAction::Update(_) => {
            Ok(put_patch::<R>(base, id, action))
        }
    }
}

fn put_patch<R: Record>(base: &str, id: RecordId, action: &RowAction) -> ApiRequest {
    let mut body = action.patch::<R>();
    body.insert("id".into(), id.0.into());
    ApiRequest::put(format!("{base}/"), Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Method;

    fn channel(id: i64, status: i64) -> Channel {
        Channel {
            id,
            status,
            name: format!("channel-{id}"),
            ..Channel::default()
        }
    }

    #[test]
    fn disable_is_a_put_with_id_and_status() {
        let req = channel(7, 1)
            .mutation_request(Channel::BASE_PATH, &RowAction::Disable)
            .unwrap();
        assert_eq!(req.method, Method::Put);
        assert_eq!(req.path, "/api/channel/");
        let body = req.body.clone().unwrap();
        assert_eq!(body["id"], 7);
        assert_eq!(body["status"], 2);
        assert_eq!(req.query_value("status_only"), None);
    }

    #[test]
    fn status_only_collections_flag_the_update() {
        let token = Token {
            id: 3,
            status: 1,
            ..Token::default()
        };
        let req = token
            .mutation_request(Token::BASE_PATH, &RowAction::Disable)
            .unwrap();
        assert_eq!(req.query_value("status_only"), Some("true"));
    }

    #[test]
    fn delete_targets_the_record_path() {
        let req = channel(9, 1)
            .mutation_request(Channel::BASE_PATH, &RowAction::Delete)
            .unwrap();
        assert_eq!(req.method, Method::Delete);
        assert_eq!(req.path, "/api/channel/9/");
    }

    #[test]
    fn read_only_collections_refuse_mutations() {
        let entry = LogEntry {
            id: 1,
            ..LogEntry::default()
        };
        let err = entry
            .mutation_request(LogEntry::BASE_PATH, &RowAction::Delete)
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Unsupported { collection: "log", .. }));
        assert!(entry.available_actions().is_empty());
    }

    #[test]
    fn default_actions_follow_status() {
        assert!(channel(1, 1).available_actions().contains(&ActionKind::Disable));
        assert!(channel(1, 3).available_actions().contains(&ActionKind::Enable));
        assert!(channel(1, 1).available_actions().contains(&ActionKind::Copy));
    }

    #[test]
    fn list_request_carries_paging_and_sort() {
        let req = Channel::list_request(Channel::BASE_PATH, 2, 20, SortOrder::IdDescending);
        assert_eq!(req.path, "/api/channel/");
        assert_eq!(req.query_value("p"), Some("2"));
        assert_eq!(req.query_value("page_size"), Some("20"));
        assert_eq!(req.query_value("id_sort"), Some("true"));
    }
}
