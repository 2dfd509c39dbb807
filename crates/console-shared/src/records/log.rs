use serde::{Deserialize, Serialize};

use crate::constants::MAX_PAGE_SIZE;
use crate::protocol::ApiRequest;
use crate::query::{SearchField, SearchQuery};
use crate::records::Record;
use crate::types::{RecordId, SortOrder};

/// Log type codes.
pub struct LogType;

impl LogType {
    pub const UNKNOWN: i64 = 0;
    pub const TOPUP: i64 = 1;
    pub const CONSUME: i64 = 2;
    pub const MANAGE: i64 = 3;
    pub const SYSTEM: i64 = 4;

    pub fn name(code: i64) -> &'static str {
        match code {
            Self::TOPUP => "topup",
            Self::CONSUME => "consume",
            Self::MANAGE => "manage",
            Self::SYSTEM => "system",
            _ => "unknown",
        }
    }
}

/// One usage or audit log line. Read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEntry {
    pub id: i64,
    pub user_id: i64,
    pub created_at: i64,
    #[serde(rename = "type")]
    pub log_type: i64,
    pub content: String,
    pub username: String,
    pub token_name: String,
    pub model_name: String,
    pub quota: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    /// Id of the channel that served the request.
    pub channel: i64,
    pub is_stream: bool,
}

/// Aggregate returned by the log stat endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogStat {
    pub quota: i64,
}

impl Record for LogEntry {
    const COLLECTION: &'static str = "log";
    const BASE_PATH: &'static str = "/api/log";
    const SEARCH_FIELDS: &'static [SearchField] = &[
        SearchField::Keyword,
        SearchField::LogType,
        SearchField::Username,
        SearchField::TokenName,
        SearchField::ModelName,
        SearchField::Channel,
        SearchField::DateRange,
    ];
    const READ_ONLY: bool = true;

    fn id(&self) -> RecordId {
        RecordId(self.id)
    }

    /// A bare keyword uses the search endpoint; structured filters are
    /// applied by the list endpoint to a single oversized first page.
    fn search_request(base: &str, query: &SearchQuery) -> ApiRequest {
        if query.is_keyword_only(Self::SEARCH_FIELDS) {
            return ApiRequest::get(format!("{base}/search"))
                .query("keyword", query.keyword.trim());
        }
        Self::list_request(base, 0, MAX_PAGE_SIZE, SortOrder::Default)
            .query_pairs(query.to_params(Self::SEARCH_FIELDS, Self::TIMESTAMP_UNIT))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn keyword_search_hits_search_endpoint() {
        let req = LogEntry::search_request("/api/log", &SearchQuery::new().keyword(" gpt "));
        assert_eq!(req.path, "/api/log/search");
        assert_eq!(req.query_value("keyword"), Some("gpt"));
    }

    #[test]
    fn structured_search_uses_list_endpoint() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let query = SearchQuery::new()
            .log_type(LogType::CONSUME)
            .username("bob")
            .date_range(start, end);
        let req = LogEntry::search_request("/api/log/self", &query);
        assert_eq!(req.path, "/api/log/self/");
        assert_eq!(req.query_value("p"), Some("0"));
        assert_eq!(req.query_value("page_size"), Some("100"));
        assert_eq!(req.query_value("type"), Some("2"));
        assert_eq!(req.query_value("username"), Some("bob"));
        assert_eq!(req.query_value("start_timestamp"), Some("1709251200"));
    }

    #[test]
    fn decodes_type_field() {
        let entry: LogEntry =
            serde_json::from_str(r#"{"id":1,"type":3,"content":"user promoted"}"#).unwrap();
        assert_eq!(entry.log_type, LogType::MANAGE);
        assert_eq!(LogType::name(entry.log_type), "manage");
    }
}
