//! The async, server-backed paginated collection.
//!
//! A [`CollectionStore`] owns the [`CollectionState`] of one listing and the
//! [`Transport`] it is fetched through. All operations take `&self` and may
//! run concurrently: the state lock is only held between awaits, stale
//! responses are recognised by sequence number and dropped, and per-record
//! pending marks serialise mutations of the same row.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use console_shared::actions::{BatchAction, RowAction};
use console_shared::constants::{ITEMS_PER_PAGE, MAX_PAGE_SIZE};
use console_shared::error::{ConsoleError, Result};
use console_shared::protocol::{ApiRequest, Envelope, Transport};
use console_shared::query::SearchQuery;
use console_shared::records::Record;
use console_shared::types::{RecordId, SortOrder};

use crate::state::{CollectionState, LoadMode};

/// What became of a load or search response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The response was merged; `received` rows came back for `page`.
    Applied { page: usize, received: usize },
    /// A newer response had already replaced the listing.
    Discarded,
}

impl LoadOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Result of a successful row mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome<R> {
    /// The record with its server-confirmed fields.
    Updated(R),
    Removed(RecordId),
    /// The server created a duplicate; the listing needs a refresh to show
    /// it. Carries the created record when the server returned one.
    Copied(Option<Value>),
}

/// Point-in-time copy of a store's observable state.
#[derive(Debug, Clone)]
pub struct Snapshot<R> {
    pub items: Vec<R>,
    pub estimated_total: usize,
    pub loaded_up_to: Option<usize>,
    pub filtered: bool,
    pub loading: bool,
    pub pending: Vec<RecordId>,
}

pub struct CollectionStore<R: Record, T: Transport> {
    transport: T,
    base: String,
    state: Mutex<CollectionState<R>>,
    request_seq: AtomicU64,
    in_flight: AtomicUsize,
}

impl<R: Record, T: Transport> CollectionStore<R, T> {
    /// A store for `R::BASE_PATH` with the default page size.
    pub fn new(transport: T) -> Self {
        Self::with_base(transport, R::BASE_PATH)
    }

    /// A store for a collection served from another base path (the
    /// per-user log endpoint, for instance).
    pub fn with_base(transport: T, base: impl Into<String>) -> Self {
        Self {
            transport,
            base: base.into().trim_end_matches('/').to_string(),
            state: Mutex::new(CollectionState::new(ITEMS_PER_PAGE, SortOrder::Default)),
            request_seq: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Page size and server sort used when nothing else is specified.
    pub fn with_preferences(self, page_size: usize, sort: SortOrder) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.set_preferences(clamp_page_size(page_size), sort);
        }
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Fetch one page.
    ///
    /// Page 0 replaces the listing. Any later page must be at most one past
    /// the contiguous frontier of a listing loaded with the same page size
    /// and sort, and is merged by id; otherwise this fails with
    /// [`ConsoleError::GapLoad`] without touching the network. `sort`
    /// defaults to the store's current order.
    pub async fn load_page(
        &self,
        page: usize,
        page_size: usize,
        sort: Option<SortOrder>,
    ) -> Result<LoadOutcome> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ConsoleError::InvalidPageSize(page_size));
        }

        let (seq, sort, generation) = {
            let state = self.lock("load_page")?;
            let sort = sort.unwrap_or(state.sort());
            state.check_frontier(page, page_size, sort)?;
            (self.next_seq(), sort, state.generation())
        };

        let _loading = LoadingGuard::new(&self.in_flight);
        debug!(
            collection = R::COLLECTION,
            page,
            page_size,
            id_sort = sort.id_sort(),
            seq,
            "Loading page"
        );
        let request = R::list_request(&self.base, page, page_size, sort);
        let records: Vec<R> = self.fetch(request).await?.data_list()?;
        let received = records.len();

        let mut state = self.lock("load_page")?;
        if page == 0 {
            if seq < state.applied_seq() {
                warn!(collection = R::COLLECTION, seq, "Discarding stale first page");
                return Ok(LoadOutcome::Discarded);
            }
            state.replace_first_page(records, received, page_size, sort, seq);
        } else {
            if state.generation() != generation
                || state.check_frontier(page, page_size, sort).is_err()
            {
                warn!(
                    collection = R::COLLECTION,
                    page, seq, "Discarding page for a listing that changed meanwhile"
                );
                return Ok(LoadOutcome::Discarded);
            }
            state.merge_page(page, records, received);
        }

        debug!(
            collection = R::COLLECTION,
            page,
            received,
            cached = state.items().len(),
            estimated_total = state.estimated_total(),
            "Page applied"
        );
        Ok(LoadOutcome::Applied { page, received })
    }

    /// Replace the listing with the server's search result.
    ///
    /// A query with no supported field set is a plain first-page load with
    /// the current page size.
    pub async fn search(&self, query: SearchQuery) -> Result<LoadOutcome> {
        query.validate()?;
        if query.is_blank_for(R::SEARCH_FIELDS) {
            let page_size = self.page_size();
            return self.load_page(0, page_size, None).await;
        }

        let seq = self.next_seq();
        let _loading = LoadingGuard::new(&self.in_flight);
        debug!(collection = R::COLLECTION, seq, ?query, "Searching");

        let request = R::search_request(&self.base, &query);
        let records: Vec<R> = self
            .fetch(request)
            .await
            .and_then(Envelope::data_list)
            .map_err(|e| match e {
                ConsoleError::ServerRejected(message) => ConsoleError::SearchFailed(message),
                other => ConsoleError::SearchFailed(other.to_string()),
            })?;
        let received = records.len();

        let mut state = self.lock("search")?;
        if seq < state.applied_seq() {
            warn!(collection = R::COLLECTION, seq, "Discarding stale search result");
            return Ok(LoadOutcome::Discarded);
        }
        state.replace_filtered(records, query, seq);
        info!(collection = R::COLLECTION, received, "Search applied");
        Ok(LoadOutcome::Applied { page: 0, received })
    }

    /// Repeat whatever produced the current listing.
    ///
    /// A paged listing refetches page 0 and each page up to the former
    /// frontier, stopping early at a partial page, and swaps them in only
    /// once every page arrived. A filtered listing repeats its search. An
    /// idle store loads its first page.
    pub async fn refresh(&self) -> Result<LoadOutcome> {
        let (mode, frontier, page_size) = {
            let state = self.lock("refresh")?;
            (state.mode().clone(), state.loaded_up_to(), state.page_size())
        };
        info!(collection = R::COLLECTION, ?frontier, "Refreshing");

        match mode {
            LoadMode::Idle => self.load_page(0, page_size, None).await,
            LoadMode::Filtered { query } => self.search(query).await,
            LoadMode::Paged { page_size, sort } => {
                self.reload_pages(frontier.unwrap_or(0), page_size, sort)
                    .await
            }
        }
    }

    /// Switch the server-side order; invalidates the cache and reloads page 0.
    pub async fn set_sort(&self, sort: SortOrder) -> Result<LoadOutcome> {
        let page_size = self.page_size();
        info!(collection = R::COLLECTION, id_sort = sort.id_sort(), "Changing sort");
        self.load_page(0, page_size, Some(sort)).await
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Apply `action` to one cached record on the server.
    ///
    /// The cached record only changes once the server confirms: deletes
    /// remove it, updates take the values the server echoes back. A record
    /// with a mutation already in flight is refused without a request.
    pub async fn mutate_record(
        &self,
        id: RecordId,
        action: RowAction,
    ) -> Result<MutationOutcome<R>> {
        let (record, request, _pending) = {
            let mut state = self.lock("mutate_record")?;
            if state.is_pending(id) {
                return Err(ConsoleError::AlreadyPending(id));
            }
            let record = state.get(id).cloned().ok_or(ConsoleError::UnknownRecord(id))?;
            let request = record.mutation_request(&self.base, &action)?;
            state.mark_pending(&[id]);
            (record, request, PendingGuard::new(&self.state, vec![id]))
        };

        debug!(collection = R::COLLECTION, %id, action = action.name(), "Mutating record");
        let envelope = self.fetch(request).await?;

        let outcome = match &action {
            RowAction::Delete => {
                self.lock("mutate_record")?.remove(&[id]);
                MutationOutcome::Removed(id)
            }
            RowAction::Copy => MutationOutcome::Copied(envelope.data.filter(|d| !d.is_null())),
            _ => {
                let echo = envelope.data_object()?;
                let fields = action.confirmed_fields();
                let updated =
                    self.lock("mutate_record")?
                        .apply_confirmed(id, &record, &fields, &echo)?;
                MutationOutcome::Updated(updated)
            }
        };
        info!(collection = R::COLLECTION, %id, action = action.name(), "Mutation confirmed");
        Ok(outcome)
    }

    /// Apply `action` to several records in one request. Returns the count
    /// the server reports.
    pub async fn batch_mutate(&self, ids: &[RecordId], action: BatchAction) -> Result<usize> {
        if R::READ_ONLY {
            return Err(ConsoleError::Unsupported {
                collection: R::COLLECTION,
                action: action.name(),
            });
        }
        let mut seen = HashSet::new();
        let ids: Vec<RecordId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if ids.is_empty() {
            return Err(ConsoleError::EmptySelection);
        }

        let _pending = {
            let mut state = self.lock("batch_mutate")?;
            if let Some(busy) = ids.iter().find(|id| state.is_pending(**id)) {
                return Err(ConsoleError::AlreadyPending(*busy));
            }
            state.mark_pending(&ids);
            PendingGuard::new(&self.state, ids.clone())
        };

        let request = match action {
            BatchAction::Delete => ApiRequest::post(
                format!("{}/batch", self.base),
                json!({ "ids": ids.iter().map(|id| id.0).collect::<Vec<_>>() }),
            ),
        };
        debug!(collection = R::COLLECTION, count = ids.len(), "Batch mutation");
        let affected = self.fetch(request).await?.data_count()?;

        self.lock("batch_mutate")?.remove(&ids);
        info!(collection = R::COLLECTION, affected, "Batch mutation confirmed");
        Ok(affected)
    }

    /// `POST {base}/`. Returns the server's `data`; the listing is not
    /// touched, callers refresh when they want the new row shown.
    pub async fn create(&self, payload: Value) -> Result<Option<Value>> {
        if R::READ_ONLY {
            return Err(ConsoleError::Unsupported {
                collection: R::COLLECTION,
                action: "create",
            });
        }
        let request = ApiRequest::post(format!("{}/", self.base), payload);
        let envelope = self.fetch(request).await?;
        info!(collection = R::COLLECTION, "Record created");
        Ok(envelope.data.filter(|d| !d.is_null()))
    }

    /// Amend a cached record in place with values the server reported
    /// through some other endpoint. Only what `f` touches changes, so
    /// confirmed updates that landed meanwhile are kept.
    pub fn update_local(&self, id: RecordId, f: impl FnOnce(&mut R)) -> Result<R> {
        self.lock("update_local")?
            .update(id, f)
            .ok_or(ConsoleError::UnknownRecord(id))
    }

    /// `GET {base}/{id}`: the full record, as an edit form needs it. The
    /// cached row, if any, is replaced by the fresh copy.
    pub async fn fetch_record(&self, id: RecordId) -> Result<R> {
        let request = ApiRequest::get(format!("{}/{id}", self.base));
        let record: R = self.fetch(request).await?.data_as()?;
        if record.id() != id {
            return Err(ConsoleError::malformed(format!(
                "asked for record {id}, got {}",
                record.id()
            )));
        }
        self.lock("fetch_record")?.replace(record.clone());
        debug!(collection = R::COLLECTION, %id, "Record fetched");
        Ok(record)
    }

    /// Reorder the cached items by a field without a server call.
    pub fn sort_by_field(&self, field: &str) -> Result<()> {
        self.lock("sort_by_field")?.sort_by_field(field);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> Snapshot<R> {
        let loading = self.is_loading();
        self.read(|state| Snapshot {
            items: state.items().to_vec(),
            estimated_total: state.estimated_total(),
            loaded_up_to: state.loaded_up_to(),
            filtered: state.is_filtered(),
            loading,
            pending: state.pending_ids(),
        })
    }

    pub fn items(&self) -> Vec<R> {
        self.read(|state| state.items().to_vec())
    }

    pub fn get(&self, id: RecordId) -> Option<R> {
        self.read(|state| state.get(id).cloned())
    }

    pub fn estimated_total(&self) -> usize {
        self.read(CollectionState::estimated_total)
    }

    pub fn loaded_up_to(&self) -> Option<usize> {
        self.read(CollectionState::loaded_up_to)
    }

    pub fn is_filtered(&self) -> bool {
        self.read(CollectionState::is_filtered)
    }

    pub fn is_total_frozen(&self) -> bool {
        self.read(CollectionState::is_total_frozen)
    }

    pub fn is_pending(&self, id: RecordId) -> bool {
        self.read(|state| state.is_pending(id))
    }

    /// `true` while any load or search is in flight.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn page_size(&self) -> usize {
        self.read(CollectionState::page_size)
    }

    pub fn sort(&self) -> SortOrder {
        self.read(CollectionState::sort)
    }

    pub fn window(&self, page: usize, page_size: usize) -> Vec<R> {
        self.read(|state| state.window(page, page_size).to_vec())
    }

    pub fn page_count(&self, page_size: usize) -> usize {
        self.read(|state| state.page_count(page_size))
    }

    pub fn needs_fetch(&self, page: usize, page_size: usize) -> bool {
        self.read(|state| state.needs_fetch(page, page_size))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn next_seq(&self) -> u64 {
        self.request_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fetch pages `0..=last` into a staging buffer and apply them in one
    /// step. Any failure leaves the cached listing as it was.
    async fn reload_pages(
        &self,
        last: usize,
        page_size: usize,
        sort: SortOrder,
    ) -> Result<LoadOutcome> {
        let seq = self.next_seq();
        let _loading = LoadingGuard::new(&self.in_flight);

        let mut staged = Vec::with_capacity(last + 1);
        for page in 0..=last {
            let request = R::list_request(&self.base, page, page_size, sort);
            let records: Vec<R> = self.fetch(request).await?.data_list()?;
            let received = records.len();
            staged.push((records, received));
            if received < page_size {
                break;
            }
        }

        let mut state = self.lock("refresh")?;
        if seq < state.applied_seq() {
            warn!(collection = R::COLLECTION, seq, "Discarding stale refresh");
            return Ok(LoadOutcome::Discarded);
        }
        let mut outcome = LoadOutcome::Discarded;
        for (page, (records, received)) in staged.into_iter().enumerate() {
            if page == 0 {
                state.replace_first_page(records, received, page_size, sort, seq);
            } else {
                state.merge_page(page, records, received);
            }
            outcome = LoadOutcome::Applied { page, received };
        }
        debug!(
            collection = R::COLLECTION,
            cached = state.items().len(),
            frontier = ?state.loaded_up_to(),
            "Refresh applied"
        );
        Ok(outcome)
    }

    /// Send and turn `success=false` into an error.
    async fn fetch(&self, request: ApiRequest) -> Result<Envelope<Value>> {
        let method = request.method;
        let path = request.path.clone();
        match self.transport.send(request).await.and_then(Envelope::into_result) {
            Ok(envelope) => Ok(envelope),
            Err(e) => {
                warn!(collection = R::COLLECTION, %method, %path, error = %e, "Request failed");
                Err(e)
            }
        }
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, CollectionState<R>>> {
        self.state
            .lock()
            .map_err(|_| ConsoleError::LockPoisoned(operation))
    }

    /// Read through the lock, recovering the data if a panic poisoned it.
    fn read<V>(&self, f: impl FnOnce(&CollectionState<R>) -> V) -> V {
        let state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&state)
    }
}

fn clamp_page_size(page_size: usize) -> usize {
    page_size.clamp(1, MAX_PAGE_SIZE)
}

/// Releases pending marks when the mutation finishes, whatever the outcome.
struct PendingGuard<'a, R: Record> {
    state: &'a Mutex<CollectionState<R>>,
    ids: Vec<RecordId>,
}

impl<'a, R: Record> PendingGuard<'a, R> {
    fn new(state: &'a Mutex<CollectionState<R>>, ids: Vec<RecordId>) -> Self {
        Self { state, ids }
    }
}

impl<R: Record> Drop for PendingGuard<'_, R> {
    fn drop(&mut self) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.release_pending(&self.ids);
    }
}

/// Counts in-flight loads for [`CollectionStore::is_loading`].
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
