use serde::{Deserialize, Serialize};

use crate::query::SearchField;
use crate::records::Record;
use crate::types::RecordId;

/// An API key issued to a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    pub id: i64,
    pub user_id: i64,
    pub key: String,
    /// 1 enabled, 2 disabled, 3 expired, 4 exhausted.
    pub status: i64,
    pub name: String,
    pub created_time: i64,
    pub accessed_time: i64,
    /// Unix seconds, `-1` for never.
    pub expired_time: i64,
    pub remain_quota: i64,
    pub unlimited_quota: bool,
    pub used_quota: i64,
}

impl Token {
    pub const STATUS_EXPIRED: i64 = 3;
    pub const STATUS_EXHAUSTED: i64 = 4;

    pub fn never_expires(&self) -> bool {
        self.expired_time == -1
    }
}

impl Record for Token {
    const COLLECTION: &'static str = "token";
    const BASE_PATH: &'static str = "/api/token";
    const SEARCH_FIELDS: &'static [SearchField] = &[SearchField::Keyword, SearchField::Token];
    const STATUS_ONLY_UPDATES: bool = true;

    fn id(&self) -> RecordId {
        RecordId(self.id)
    }

    fn status(&self) -> Option<i64> {
        Some(self.status)
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}
