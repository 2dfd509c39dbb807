use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::MIN_CHANNEL_PRIORITY;
use crate::records::Record;

/// A server-side change to one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowAction {
    Enable,
    Disable,
    Delete,
    /// Duplicate the record server-side.
    Copy,
    SetPriority(i64),
    SetWeight(i64),
    Promote,
    Demote,
    /// Save an edit form: the listed fields are replaced.
    Update(Map<String, Value>),
}

impl RowAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Delete => "delete",
            Self::Copy => "copy",
            Self::SetPriority(_) => "priority",
            Self::SetWeight(_) => "weight",
            Self::Promote => "promote",
            Self::Demote => "demote",
            Self::Update(_) => "update",
        }
    }

    /// The field patch sent to the gateway for record type `R`.
    pub fn patch<R: Record>(&self) -> Map<String, Value> {
        let mut patch = Map::new();
        match self {
            Self::Enable => {
                patch.insert("status".into(), R::ENABLED_STATUS.into());
            }
            Self::Disable => {
                patch.insert("status".into(), R::DISABLED_STATUS.into());
            }
            Self::SetPriority(priority) => {
                patch.insert("priority".into(), (*priority).max(MIN_CHANNEL_PRIORITY).into());
            }
            Self::SetWeight(weight) => {
                patch.insert("weight".into(), (*weight).max(0).into());
            }
            Self::Update(fields) => patch.extend(fields.clone()),
            Self::Delete | Self::Copy | Self::Promote | Self::Demote => {}
        }
        patch
    }

    /// Fields whose new value the gateway echoes back in `data` and which
    /// therefore replace the cached values on success.
    pub fn confirmed_fields(&self) -> Vec<String> {
        match self {
            Self::Enable | Self::Disable => vec!["status".to_string()],
            Self::SetPriority(_) => vec!["priority".to_string()],
            Self::SetWeight(_) => vec!["weight".to_string()],
            Self::Promote | Self::Demote => vec!["role".to_string()],
            Self::Update(fields) => fields.keys().filter(|k| *k != "id").cloned().collect(),
            Self::Delete | Self::Copy => Vec::new(),
        }
    }
}

/// A change applied to several rows in one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchAction {
    Delete,
}

impl BatchAction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Delete => "batch delete",
        }
    }
}

/// Row menu entries a view can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Enable,
    Disable,
    Delete,
    Copy,
    /// Opens the edit form; not a mutation by itself.
    Edit,
    Promote,
    Demote,
}

impl ActionKind {
    /// Whether the UI must ask before running the action.
    pub fn requires_confirmation(self) -> bool {
        matches!(self, Self::Delete | Self::Copy)
    }

    /// The mutation this entry triggers, if it triggers one directly.
    pub fn row_action(self) -> Option<RowAction> {
        match self {
            Self::Enable => Some(RowAction::Enable),
            Self::Disable => Some(RowAction::Disable),
            Self::Delete => Some(RowAction::Delete),
            Self::Copy => Some(RowAction::Copy),
            Self::Promote => Some(RowAction::Promote),
            Self::Demote => Some(RowAction::Demote),
            Self::Edit => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::records::{Channel, User};

    #[test]
    fn weight_and_priority_are_clamped() {
        assert_eq!(RowAction::SetWeight(-5).patch::<Channel>()["weight"], 0);
        assert_eq!(
            RowAction::SetPriority(-5000).patch::<Channel>()["priority"],
            MIN_CHANNEL_PRIORITY
        );
    }

    #[test]
    fn status_patch_uses_collection_codes() {
        assert_eq!(RowAction::Disable.patch::<Channel>()["status"], 2);
        assert_eq!(RowAction::Enable.patch::<User>()["status"], 1);
    }

    #[test]
    fn update_confirms_edited_fields_except_id() {
        let mut fields = Map::new();
        fields.insert("id".into(), json!(3));
        fields.insert("name".into(), json!("primary"));
        let mut confirmed = RowAction::Update(fields).confirmed_fields();
        confirmed.sort();
        assert_eq!(confirmed, vec!["name".to_string()]);
    }

    #[test]
    fn edit_is_not_a_mutation() {
        assert!(ActionKind::Edit.row_action().is_none());
        assert!(ActionKind::Delete.requires_confirmation());
        assert!(!ActionKind::Disable.requires_confirmation());
    }
}
