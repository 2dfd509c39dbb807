use serde::{Deserialize, Serialize};

use crate::constants::MAX_PAGE_SIZE;
use crate::protocol::ApiRequest;
use crate::query::{SearchField, SearchQuery};
use crate::records::Record;
use crate::types::{RecordId, SortOrder, TimestampUnit};

/// An image generation job relayed to a drawing provider. Read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawingJob {
    pub id: i64,
    pub code: i64,
    pub user_id: i64,
    /// Provider action, e.g. `IMAGINE` or `UPSCALE`.
    pub action: String,
    pub mj_id: String,
    pub prompt: String,
    pub prompt_en: String,
    pub description: String,
    pub state: String,
    /// Unix milliseconds.
    pub submit_time: i64,
    pub start_time: i64,
    pub finish_time: i64,
    pub image_url: String,
    pub status: String,
    pub progress: String,
    pub fail_reason: String,
    pub channel_id: i64,
}

impl Record for DrawingJob {
    const COLLECTION: &'static str = "drawing";
    const BASE_PATH: &'static str = "/api/mj";
    const SEARCH_FIELDS: &'static [SearchField] = &[
        SearchField::ChannelId,
        SearchField::MjId,
        SearchField::DateRange,
    ];
    const READ_ONLY: bool = true;
    const TIMESTAMP_UNIT: TimestampUnit = TimestampUnit::Milliseconds;

    fn id(&self) -> RecordId {
        RecordId(self.id)
    }

    fn label(&self) -> String {
        if self.mj_id.is_empty() {
            format!("#{}", self.id)
        } else {
            self.mj_id.clone()
        }
    }

    /// The drawing API has no search endpoint; filters go to the list endpoint.
    fn search_request(base: &str, query: &SearchQuery) -> ApiRequest {
        Self::list_request(base, 0, MAX_PAGE_SIZE, SortOrder::Default)
            .query_pairs(query.to_params(Self::SEARCH_FIELDS, Self::TIMESTAMP_UNIT))
    }
}
