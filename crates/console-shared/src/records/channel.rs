use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::COPY_SUFFIX;
use crate::query::SearchField;
use crate::records::Record;
use crate::types::RecordId;

/// An upstream provider channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Channel {
    pub id: i64,
    /// Provider type code.
    #[serde(rename = "type")]
    pub channel_type: i64,
    /// Upstream API key. Listings leave it empty.
    pub key: String,
    /// 1 enabled, 2 manually disabled, 3 disabled by the health checker.
    pub status: i64,
    pub name: String,
    pub weight: i64,
    pub priority: i64,
    pub created_time: i64,
    pub test_time: i64,
    /// Last measured response time in milliseconds.
    pub response_time: i64,
    pub base_url: Option<String>,
    pub balance: f64,
    pub balance_updated_time: i64,
    /// Comma-separated model names.
    pub models: String,
    /// Comma-separated group names.
    pub group: String,
    pub used_quota: i64,
    pub model_mapping: Option<String>,
}

impl Channel {
    pub const STATUS_AUTO_DISABLED: i64 = 3;

    pub fn model_list(&self) -> Vec<&str> {
        split_list(&self.models)
    }

    pub fn group_list(&self) -> Vec<&str> {
        split_list(&self.group)
    }
}

fn split_list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

impl Record for Channel {
    const COLLECTION: &'static str = "channel";
    const BASE_PATH: &'static str = "/api/channel";
    const SEARCH_FIELDS: &'static [SearchField] =
        &[SearchField::Keyword, SearchField::Group, SearchField::Model];

    fn id(&self) -> RecordId {
        RecordId(self.id)
    }

    fn status(&self) -> Option<i64> {
        Some(self.status)
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    /// A new channel with the same configuration, fresh counters and a
    /// suffixed name; the gateway assigns id and creation time.
    fn copy_payload(&self) -> Option<Value> {
        let mut copy = self.clone();
        copy.name.push_str(COPY_SUFFIX);
        copy.balance = 0.0;
        copy.used_quota = 0;
        copy.response_time = 0;
        copy.test_time = 0;

        let mut payload = serde_json::to_value(copy).ok()?;
        if let Some(object) = payload.as_object_mut() {
            object.remove("id");
            object.insert("created_time".into(), Value::Null);
        }
        Some(payload)
    }
}
