//! The locally cached view of one server-paginated collection.
//!
//! [`CollectionState`] is plain data plus the merge rules that keep it
//! consistent: no duplicate ids, `estimated_total >= items.len()`, and a
//! single load mode at a time. It performs no I/O; the async
//! [`CollectionStore`](crate::CollectionStore) drives it from responses.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use console_shared::constants::ITEMS_PER_PAGE;
use console_shared::error::{ConsoleError, Result};
use console_shared::query::SearchQuery;
use console_shared::records::Record;
use console_shared::types::{RecordId, SortOrder};

/// How the cached items were obtained.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Nothing loaded yet.
    #[default]
    Idle,
    /// Contiguous pages fetched from page 0.
    Paged { page_size: usize, sort: SortOrder },
    /// One complete search result.
    Filtered { query: SearchQuery },
}

#[derive(Debug, Clone)]
pub struct CollectionState<R: Record> {
    items: Vec<R>,
    /// Page each cached record was fetched with.
    origins: HashMap<RecordId, usize>,
    estimated_total: usize,
    total_frozen: bool,
    loaded_up_to: Option<usize>,
    mode: LoadMode,
    pending: HashSet<RecordId>,
    /// Preferred page size and sort for the next first-page load.
    page_size: usize,
    sort: SortOrder,
    /// Bumped whenever the items are replaced wholesale.
    generation: u64,
    /// Sequence number of the last replacing response applied.
    applied_seq: u64,
}

impl<R: Record> Default for CollectionState<R> {
    fn default() -> Self {
        Self::new(ITEMS_PER_PAGE, SortOrder::Default)
    }
}

impl<R: Record> CollectionState<R> {
    pub fn new(page_size: usize, sort: SortOrder) -> Self {
        Self {
            items: Vec::new(),
            origins: HashMap::new(),
            estimated_total: 0,
            total_frozen: false,
            loaded_up_to: None,
            mode: LoadMode::Idle,
            pending: HashSet::new(),
            page_size,
            sort,
            generation: 0,
            applied_seq: 0,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn items(&self) -> &[R] {
        &self.items
    }

    pub fn get(&self, id: RecordId) -> Option<&R> {
        self.items.iter().find(|r| r.id() == id)
    }

    pub fn estimated_total(&self) -> usize {
        self.estimated_total
    }

    /// `true` once a partial page (or a search result) fixed the total.
    pub fn is_total_frozen(&self) -> bool {
        self.total_frozen
    }

    pub fn loaded_up_to(&self) -> Option<usize> {
        self.loaded_up_to
    }

    pub fn mode(&self) -> &LoadMode {
        &self.mode
    }

    pub fn is_filtered(&self) -> bool {
        matches!(self.mode, LoadMode::Filtered { .. })
    }

    pub fn is_pending(&self, id: RecordId) -> bool {
        self.pending.contains(&id)
    }

    pub fn pending_ids(&self) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self.pending.iter().copied().collect();
        ids.sort();
        ids
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn applied_seq(&self) -> u64 {
        self.applied_seq
    }

    pub(crate) fn set_preferences(&mut self, page_size: usize, sort: SortOrder) {
        self.page_size = page_size;
        self.sort = sort;
    }

    // ------------------------------------------------------------------
    // Paging rules
    // ------------------------------------------------------------------

    /// The page a gap-free load may request next.
    pub fn next_page(&self) -> usize {
        match (&self.mode, self.loaded_up_to) {
            (LoadMode::Paged { .. }, Some(frontier)) => frontier + 1,
            _ => 0,
        }
    }

    /// Whether `page > 0` can be merged into the current paged listing.
    pub fn check_frontier(&self, page: usize, page_size: usize, sort: SortOrder) -> Result<()> {
        let compatible = match (&self.mode, self.loaded_up_to) {
            (LoadMode::Paged { page_size: size, sort: current }, Some(frontier)) => {
                *size == page_size && *current == sort && page <= frontier + 1
            }
            _ => false,
        };
        if page == 0 || compatible {
            Ok(())
        } else {
            Err(ConsoleError::GapLoad {
                requested: page,
                next: self.next_page(),
            })
        }
    }

    /// Number of pages of `page_size` the pagination control should offer.
    pub fn page_count(&self, page_size: usize) -> usize {
        if page_size == 0 {
            return 1;
        }
        self.estimated_total.div_ceil(page_size).max(1)
    }

    /// Records shown on `page`, clamped to what is cached.
    pub fn window(&self, page: usize, page_size: usize) -> &[R] {
        let start = page.saturating_mul(page_size).min(self.items.len());
        let end = start.saturating_add(page_size).min(self.items.len());
        &self.items[start..end]
    }

    /// Whether showing `page` requires fetching the next frontier page first.
    pub fn needs_fetch(&self, page: usize, page_size: usize) -> bool {
        match &self.mode {
            LoadMode::Idle => true,
            LoadMode::Filtered { .. } => false,
            LoadMode::Paged { page_size: size, .. } => {
                let window_end = page.saturating_add(1).saturating_mul(page_size);
                *size == page_size
                    && !self.total_frozen
                    && window_end > self.items.len()
                    && page == self.next_page()
            }
        }
    }

    // ------------------------------------------------------------------
    // Applying responses
    // ------------------------------------------------------------------

    /// Replace everything with a fresh first page. `returned` is the row
    /// count the server sent, before de-duplication.
    pub(crate) fn replace_first_page(
        &mut self,
        records: Vec<R>,
        returned: usize,
        page_size: usize,
        sort: SortOrder,
        seq: u64,
    ) {
        self.items = dedupe(records);
        self.origins = self.items.iter().map(|r| (r.id(), 0)).collect();
        self.loaded_up_to = Some(0);
        self.mode = LoadMode::Paged { page_size, sort };
        self.page_size = page_size;
        self.sort = sort;
        self.generation += 1;
        self.applied_seq = seq;

        if returned >= page_size {
            self.estimated_total = self.items.len() + page_size;
            self.total_frozen = false;
        } else {
            self.estimated_total = self.items.len();
            self.total_frozen = true;
        }
    }

    /// Merge page `page` by id at its position in the listing.
    pub(crate) fn merge_page(&mut self, page: usize, records: Vec<R>, returned: usize) {
        let page_size = match &self.mode {
            LoadMode::Paged { page_size, .. } => *page_size,
            _ => return,
        };
        let incoming = dedupe(records);
        let incoming_ids: HashSet<RecordId> = incoming.iter().map(Record::id).collect();

        let mut removed = Vec::new();
        {
            let origins = &self.origins;
            self.items.retain(|r| {
                let id = r.id();
                let stale = incoming_ids.contains(&id) || origins.get(&id) == Some(&page);
                if stale {
                    removed.push(id);
                }
                !stale
            });
        }
        for id in removed {
            self.origins.remove(&id);
        }

        let at = self
            .items
            .iter()
            .position(|r| self.origins.get(&r.id()).is_some_and(|origin| *origin > page))
            .unwrap_or(self.items.len());
        for record in &incoming {
            self.origins.insert(record.id(), page);
        }
        self.items.splice(at..at, incoming);

        if returned < page_size {
            // Nothing exists past a partial page.
            let origins = &self.origins;
            self.items
                .retain(|r| origins.get(&r.id()).map_or(true, |origin| *origin <= page));
            let kept: HashSet<RecordId> = self.items.iter().map(Record::id).collect();
            self.origins.retain(|id, _| kept.contains(id));
            self.loaded_up_to = Some(page);
            self.estimated_total = self.items.len();
            self.total_frozen = true;
        } else {
            let frontier = self.loaded_up_to.map_or(page, |f| f.max(page));
            self.loaded_up_to = Some(frontier);
            if page == frontier {
                self.estimated_total = self.items.len() + page_size;
                self.total_frozen = false;
            } else {
                self.estimated_total = self.estimated_total.max(self.items.len());
            }
        }
    }

    /// Replace everything with a complete search result.
    pub(crate) fn replace_filtered(&mut self, records: Vec<R>, query: SearchQuery, seq: u64) {
        self.items = dedupe(records);
        self.origins = self.items.iter().map(|r| (r.id(), 0)).collect();
        self.loaded_up_to = None;
        self.mode = LoadMode::Filtered { query };
        self.estimated_total = self.items.len();
        self.total_frozen = true;
        self.generation += 1;
        self.applied_seq = seq;
    }

    /// Drop records the server deleted. Returns how many were cached.
    pub(crate) fn remove(&mut self, ids: &[RecordId]) -> usize {
        let targets: HashSet<RecordId> = ids.iter().copied().collect();
        let before = self.items.len();
        self.items.retain(|r| !targets.contains(&r.id()));
        for id in &targets {
            self.origins.remove(id);
        }
        let removed = before - self.items.len();
        self.estimated_total = self
            .estimated_total
            .saturating_sub(removed)
            .max(self.items.len());
        removed
    }

    /// Overlay the server-echoed values of `fields` onto a record.
    ///
    /// `fallback` is used when the record left the cache while the request
    /// was in flight; the merged value is still returned but not cached.
    pub(crate) fn apply_confirmed(
        &mut self,
        id: RecordId,
        fallback: &R,
        fields: &[String],
        echo: &Map<String, Value>,
    ) -> Result<R> {
        let base = self.get(id).unwrap_or(fallback);
        let mut value = serde_json::to_value(base).map_err(ConsoleError::malformed)?;
        let object = value
            .as_object_mut()
            .ok_or_else(|| ConsoleError::malformed("record is not an object"))?;
        for field in fields {
            let confirmed = echo.get(field).ok_or_else(|| {
                ConsoleError::malformed(format!("response does not confirm `{field}`"))
            })?;
            object.insert(field.clone(), confirmed.clone());
        }
        let updated: R = serde_json::from_value(value).map_err(ConsoleError::malformed)?;
        self.replace(updated.clone());
        Ok(updated)
    }

    /// Swap in a new version of a cached record. Returns `false` if the id is
    /// not cached.
    pub(crate) fn replace(&mut self, record: R) -> bool {
        let id = record.id();
        match self.items.iter_mut().find(|r| r.id() == id) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    /// Edit a cached record in place and return the result. `f` must not
    /// change the id.
    pub(crate) fn update(&mut self, id: RecordId, f: impl FnOnce(&mut R)) -> Option<R> {
        let slot = self.items.iter_mut().find(|r| r.id() == id)?;
        f(slot);
        Some(slot.clone())
    }

    pub(crate) fn mark_pending(&mut self, ids: &[RecordId]) {
        self.pending.extend(ids.iter().copied());
    }

    pub(crate) fn release_pending(&mut self, ids: &[RecordId]) {
        for id in ids {
            self.pending.remove(id);
        }
    }

    // ------------------------------------------------------------------
    // Local sort
    // ------------------------------------------------------------------

    /// Stable local reorder by a JSON field of the records.
    ///
    /// Sorting again by a key that leaves the same record first reverses the
    /// order instead, so repeated clicks on a column header toggle direction.
    pub fn sort_by_field(&mut self, field: &str) {
        let Some(first) = self.items.first().map(Record::id) else {
            return;
        };
        let mut keyed: Vec<(Value, R)> = self
            .items
            .drain(..)
            .map(|r| {
                let key = serde_json::to_value(&r)
                    .ok()
                    .and_then(|v| v.get(field).cloned())
                    .unwrap_or(Value::Null);
                (key, r)
            })
            .collect();
        keyed.sort_by(|(a, _), (b, _)| compare_values(a, b));
        self.items = keyed.into_iter().map(|(_, r)| r).collect();

        if self.items.first().map(Record::id) == Some(first) {
            self.items.reverse();
        }
    }
}

fn dedupe<R: Record>(records: Vec<R>) -> Vec<R> {
    let mut seen = HashSet::with_capacity(records.len());
    records.into_iter().filter(|r| seen.insert(r.id())).collect()
}

/// Missing values first, then numbers, then everything else by its text.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => match rank(a).cmp(&rank(b)) {
            Ordering::Equal => a.to_string().cmp(&b.to_string()),
            other => other,
        },
    }
}
