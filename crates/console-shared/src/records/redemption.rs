use serde::{Deserialize, Serialize};

use crate::actions::ActionKind;
use crate::query::SearchField;
use crate::records::{default_actions, Record};
use crate::types::RecordId;

/// A prepaid top-up code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Redemption {
    pub id: i64,
    pub user_id: i64,
    pub key: String,
    /// 1 unused, 2 disabled, 3 used.
    pub status: i64,
    pub name: String,
    pub quota: i64,
    pub created_time: i64,
    pub redeemed_time: i64,
}

impl Redemption {
    pub const STATUS_USED: i64 = 3;

    pub fn is_used(&self) -> bool {
        self.status == Self::STATUS_USED
    }
}

impl Record for Redemption {
    const COLLECTION: &'static str = "redemption";
    const BASE_PATH: &'static str = "/api/redemption";
    const SEARCH_FIELDS: &'static [SearchField] = &[SearchField::Keyword];
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

    /// A used code can no longer be toggled.
    fn available_actions(&self) -> Vec<ActionKind> {
        let actions = default_actions(self);
        if self.is_used() {
            actions
                .into_iter()
                .filter(|a| !matches!(a, ActionKind::Enable | ActionKind::Disable))
                .collect()
        } else {
            actions
        }
    }
}
