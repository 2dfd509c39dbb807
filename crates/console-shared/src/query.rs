//! Structured search filters.
//!
//! A [`SearchQuery`] carries every filter any listing view offers; each
//! collection declares the subset it supports (`Record::SEARCH_FIELDS`) and
//! only those reach the wire. A query whose supported fields are all blank is
//! not a search at all: the store falls back to a plain first-page load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, Result};
use crate::types::TimestampUnit;

/// A filter a collection can be searched by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchField {
    Keyword,
    Group,
    Model,
    Token,
    LogType,
    Username,
    TokenName,
    ModelName,
    Channel,
    ChannelId,
    MjId,
    /// Expands to `start_timestamp` / `end_timestamp`.
    DateRange,
}

impl SearchField {
    /// Query parameter name (the first one for [`SearchField::DateRange`]).
    pub fn param(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Group => "group",
            Self::Model => "model",
            Self::Token => "token",
            Self::LogType => "type",
            Self::Username => "username",
            Self::TokenName => "token_name",
            Self::ModelName => "model_name",
            Self::Channel => "channel",
            Self::ChannelId => "channel_id",
            Self::MjId => "mj_id",
            Self::DateRange => "start_timestamp",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub keyword: String,
    pub group: String,
    pub model: String,
    pub token: String,
    /// Log type code; `0` means every type.
    pub log_type: Option<i64>,
    pub username: String,
    pub token_name: String,
    pub model_name: String,
    pub channel: String,
    pub channel_id: String,
    pub mj_id: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn log_type(mut self, log_type: i64) -> Self {
        self.log_type = Some(log_type);
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn token_name(mut self, token_name: impl Into<String>) -> Self {
        self.token_name = token_name.into();
        self
    }

    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn channel_id(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    pub fn mj_id(mut self, mj_id: impl Into<String>) -> Self {
        self.mj_id = mj_id.into();
        self
    }

    pub fn date_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// `true` when every field is empty.
    pub fn is_blank(&self) -> bool {
        self.is_blank_for(&[
            SearchField::Keyword,
            SearchField::Group,
            SearchField::Model,
            SearchField::Token,
            SearchField::LogType,
            SearchField::Username,
            SearchField::TokenName,
            SearchField::ModelName,
            SearchField::Channel,
            SearchField::ChannelId,
            SearchField::MjId,
            SearchField::DateRange,
        ])
    }

    /// `true` when every field in `fields` is empty; other fields are ignored.
    pub fn is_blank_for(&self, fields: &[SearchField]) -> bool {
        fields.iter().all(|field| match field {
            SearchField::LogType => matches!(self.log_type, None | Some(0)),
            SearchField::DateRange => self.start.is_none() && self.end.is_none(),
            text => self.text(*text).trim().is_empty(),
        })
    }

    /// `true` when only the keyword is set among `fields`.
    pub fn is_keyword_only(&self, fields: &[SearchField]) -> bool {
        let others: Vec<SearchField> = fields
            .iter()
            .copied()
            .filter(|f| *f != SearchField::Keyword)
            .collect();
        !self.keyword.trim().is_empty() && self.is_blank_for(&others)
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(ConsoleError::InvalidQuery(format!(
                    "start {} is after end {}",
                    start.to_rfc3339(),
                    end.to_rfc3339()
                )));
            }
        }
        Ok(())
    }

    /// Non-empty query parameters for `fields`, in the order given.
    pub fn to_params(&self, fields: &[SearchField], unit: TimestampUnit) -> Vec<(String, String)> {
        let mut params = Vec::new();
        for field in fields {
            match field {
                SearchField::LogType => {
                    if let Some(log_type) = self.log_type.filter(|t| *t != 0) {
                        params.push((field.param().to_string(), log_type.to_string()));
                    }
                }
                SearchField::DateRange => {
                    if let Some(start) = self.start {
                        params.push(("start_timestamp".to_string(), timestamp(start, unit)));
                    }
                    if let Some(end) = self.end {
                        params.push(("end_timestamp".to_string(), timestamp(end, unit)));
                    }
                }
                text => {
                    let value = self.text(*text).trim();
                    if !value.is_empty() {
                        params.push((field.param().to_string(), value.to_string()));
                    }
                }
            }
        }
        params
    }

    fn text(&self, field: SearchField) -> &str {
        match field {
            SearchField::Keyword => &self.keyword,
            SearchField::Group => &self.group,
            SearchField::Model => &self.model,
            SearchField::Token => &self.token,
            SearchField::Username => &self.username,
            SearchField::TokenName => &self.token_name,
            SearchField::ModelName => &self.model_name,
            SearchField::Channel => &self.channel,
            SearchField::ChannelId => &self.channel_id,
            SearchField::MjId => &self.mj_id,
            SearchField::LogType | SearchField::DateRange => "",
        }
    }
}

fn timestamp(at: DateTime<Utc>, unit: TimestampUnit) -> String {
    match unit {
        TimestampUnit::Seconds => at.timestamp().to_string(),
        TimestampUnit::Milliseconds => at.timestamp_millis().to_string(),
    }
}
