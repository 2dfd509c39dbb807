use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::actions::{ActionKind, RowAction};
use crate::error::Result;
use crate::protocol::ApiRequest;
use crate::query::SearchField;
use crate::records::{put_patch, Record};
use crate::types::RecordId;

/// Role codes understood by the gateway.
pub struct UserRole;

impl UserRole {
    pub const GUEST: i64 = 0;
    pub const COMMON: i64 = 1;
    pub const ADMIN: i64 = 10;
    pub const ROOT: i64 = 100;

    pub fn name(role: i64) -> &'static str {
        match role {
            Self::COMMON => "common",
            Self::ADMIN => "admin",
            Self::ROOT => "root",
            _ => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: i64,
    /// 1 enabled, 2 disabled.
    pub status: i64,
    pub email: String,
    pub quota: i64,
    pub used_quota: i64,
    pub request_count: i64,
    pub group: String,
}

impl User {
    pub fn is_root(&self) -> bool {
        self.role >= UserRole::ROOT
    }
}

impl Record for User {
    const COLLECTION: &'static str = "user";
    const BASE_PATH: &'static str = "/api/user";
    const SEARCH_FIELDS: &'static [SearchField] = &[SearchField::Keyword, SearchField::Group];

    fn id(&self) -> RecordId {
        RecordId(self.id)
    }

    fn status(&self) -> Option<i64> {
        Some(self.status)
    }

    fn label(&self) -> String {
        self.username.clone()
    }

    /// The root account can only be edited. Everyone else can be toggled,
    /// promoted to admin or demoted back, and deleted.
    fn available_actions(&self) -> Vec<ActionKind> {
        if self.is_root() {
            return vec![ActionKind::Edit];
        }
        let mut actions = Vec::new();
        if self.status == Self::ENABLED_STATUS {
            actions.push(ActionKind::Disable);
        } else {
            actions.push(ActionKind::Enable);
        }
        actions.push(ActionKind::Edit);
        if self.role < UserRole::ADMIN {
            actions.push(ActionKind::Promote);
        } else {
            actions.push(ActionKind::Demote);
        }
        actions.push(ActionKind::Delete);
        actions
    }

    /// Account state changes go through `POST {base}/manage` keyed by
    /// username; the gateway echoes the new `{role, status}`.
    fn mutation_request(&self, base: &str, action: &RowAction) -> Result<ApiRequest> {
        match action {
            RowAction::Update(_) => Ok(put_patch::<Self>(base, self.id(), action)),
            RowAction::Copy | RowAction::SetPriority(_) | RowAction::SetWeight(_) => {
                Err(super::unsupported::<Self>(action))
            }
            RowAction::Enable
            | RowAction::Disable
            | RowAction::Delete
            | RowAction::Promote
            | RowAction::Demote => Ok(ApiRequest::post(
                format!("{base}/manage"),
                json!({ "username": self.username, "action": action.name() }),
            )),
        }
    }
}
