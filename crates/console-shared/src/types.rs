use serde::{Deserialize, Serialize};

/// Identifier of a record in any collection. The gateway uses integer
/// primary keys everywhere.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-side ordering of a paged listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    /// Gateway default ordering (priority / creation order).
    #[default]
    Default,
    /// Descending by id (`id_sort=true`).
    IdDescending,
}

impl SortOrder {
    pub fn from_id_sort(id_sort: bool) -> Self {
        if id_sort {
            Self::IdDescending
        } else {
            Self::Default
        }
    }

    pub fn id_sort(self) -> bool {
        matches!(self, Self::IdDescending)
    }

    pub fn toggled(self) -> Self {
        Self::from_id_sort(!self.id_sort())
    }
}

/// Unit in which a collection expects its date-range filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampUnit {
    Seconds,
    Milliseconds,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_is_transparent_in_json() {
        let id: RecordId = serde_json::from_str("42").unwrap();
        assert_eq!(id, RecordId(42));
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
    }

    #[test]
    fn sort_order_toggles() {
        assert_eq!(SortOrder::Default.toggled(), SortOrder::IdDescending);
        assert!(SortOrder::Default.toggled().id_sort());
        assert_eq!(SortOrder::from_id_sort(false), SortOrder::Default);
    }
}
