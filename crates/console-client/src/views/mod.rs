//! Listing views.
//!
//! [`ListingView`] is the controller behind every table in the console. It
//! owns the [`CollectionStore`] of its collection, remembers the page being
//! shown, persists page size and sort order through the injected
//! [`SettingsStorage`], and turns every failed load into exactly one error
//! notification. Collection-specific extras live in the submodules, next to
//! the [`OptionsPanel`] of the settings page.

pub mod channels;
pub mod logs;
pub mod options;
pub mod redemptions;
pub mod users;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use console_shared::actions::{ActionKind, BatchAction, RowAction};
use console_shared::constants::MAX_PAGE_SIZE;
use console_shared::error::{ConsoleError, Result};
use console_shared::protocol::{ApiRequest, Envelope, Transport};
use console_shared::query::SearchQuery;
use console_shared::records::Record;
use console_shared::types::RecordId;
use console_store::{CollectionStore, LoadOutcome, MutationOutcome, SettingsStorage, ViewPreferences};

use crate::actions::{self, ActionDescriptor, BatchCommand, Confirmed, Prepared, RowCommand};
use crate::notify::{Notification, Notifier};

pub use channels::DeleteDisabled;
pub use logs::LogScope;
pub use options::OptionsPanel;
pub use redemptions::RedemptionBatch;
pub use users::NewUser;

pub struct ListingView<R: Record, T: Transport> {
    store: CollectionStore<R, T>,
    settings: Arc<dyn SettingsStorage>,
    notifier: Arc<dyn Notifier>,
    current_page: AtomicUsize,
}

impl<R: Record, T: Transport> ListingView<R, T> {
    /// A view over `R::BASE_PATH` with the persisted preferences applied.
    pub fn new(transport: T, settings: Arc<dyn SettingsStorage>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_store(CollectionStore::new(transport), settings, notifier)
    }

    pub fn with_store(
        store: CollectionStore<R, T>,
        settings: Arc<dyn SettingsStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let prefs = ViewPreferences::load(settings.as_ref(), R::COLLECTION);
        Self {
            store: store.with_preferences(prefs.page_size, prefs.sort()),
            settings,
            notifier,
            current_page: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &CollectionStore<R, T> {
        &self.store
    }

    pub fn current_page(&self) -> usize {
        self.current_page.load(Ordering::SeqCst)
    }

    pub fn page_size(&self) -> usize {
        self.store.page_size()
    }

    /// Rows of the page being shown.
    pub fn page_rows(&self) -> Vec<R> {
        self.store.window(self.current_page(), self.page_size())
    }

    pub fn page_count(&self) -> usize {
        self.store.page_count(self.page_size())
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Load the first page with the persisted preferences.
    pub async fn mount(&self) -> Result<LoadOutcome> {
        info!(collection = R::COLLECTION, page_size = self.page_size(), "Mounting view");
        self.current_page.store(0, Ordering::SeqCst);
        let outcome = self.store.load_page(0, self.page_size(), None).await;
        self.reported(outcome)
    }

    /// Show `page`, fetching it first when it lies just past the cache.
    pub async fn change_page(&self, page: usize) -> Result<Vec<R>> {
        let page_size = self.page_size();
        if self.store.needs_fetch(page, page_size) {
            let outcome = self.store.load_page(page, page_size, None).await;
            self.reported(outcome)?;
        } else if page >= self.page_count() {
            let err = ConsoleError::GapLoad {
                requested: page,
                next: self.page_count().saturating_sub(1),
            };
            self.notifier.notify(Notification::error(err.user_message()));
            return Err(err);
        }
        self.current_page.store(page, Ordering::SeqCst);
        Ok(self.page_rows())
    }

    /// Persist a new page size and reload from the first page.
    pub async fn change_page_size(&self, page_size: usize) -> Result<LoadOutcome> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            let err = ConsoleError::InvalidPageSize(page_size);
            self.notifier.notify(Notification::error(err.user_message()));
            return Err(err);
        }
        self.persist(ViewPreferences {
            page_size,
            id_sort: self.store.sort().id_sort(),
        });
        self.current_page.store(0, Ordering::SeqCst);
        let outcome = self.store.load_page(0, page_size, None).await;
        self.reported(outcome)
    }

    /// Flip the server-side id sort, persist it and reload.
    pub async fn toggle_id_sort(&self) -> Result<LoadOutcome> {
        let sort = self.store.sort().toggled();
        self.persist(ViewPreferences {
            page_size: self.page_size(),
            id_sort: sort.id_sort(),
        });
        self.current_page.store(0, Ordering::SeqCst);
        let outcome = self.store.set_sort(sort).await;
        self.reported(outcome)
    }

    pub async fn search(&self, query: SearchQuery) -> Result<LoadOutcome> {
        self.current_page.store(0, Ordering::SeqCst);
        let outcome = self.store.search(query).await;
        self.reported(outcome)
    }

    pub async fn refresh(&self) -> Result<LoadOutcome> {
        let outcome = self.store.refresh().await;
        self.reported(outcome)
    }

    /// Fetch the full record behind an edit form.
    ///
    /// The listing only carries summary fields for some collections, so edit
    /// forms start from the server's copy, which also replaces the cached row.
    pub async fn load_for_edit(&self, id: RecordId) -> Result<R> {
        let record = self.store.fetch_record(id).await;
        self.reported(record)
    }

    /// Column-header sort of the cached rows.
    pub fn sort_by(&self, field: &str) -> Result<()> {
        self.store.sort_by_field(field)
    }

    // ------------------------------------------------------------------
    // Row actions
    // ------------------------------------------------------------------

    /// Menu of a cached row.
    pub fn row_actions(&self, id: RecordId) -> Result<Vec<ActionDescriptor>> {
        let record = self.cached(id)?;
        Ok(actions::row_descriptors(&record, self.store.is_pending(id)))
    }

    pub fn prepare(&self, id: RecordId, kind: ActionKind) -> Result<Prepared<RowCommand>> {
        actions::prepare_row(&self.cached(id)?, kind)
    }

    pub fn prepare_action(&self, id: RecordId, action: RowAction) -> Result<Prepared<RowCommand>> {
        Ok(actions::prepare_action(&self.cached(id)?, action))
    }

    pub async fn execute(&self, command: Confirmed<RowCommand>) -> Result<MutationOutcome<R>> {
        actions::execute_row(&self.store, self.notifier.as_ref(), command).await
    }

    pub fn prepare_batch(&self, ids: Vec<RecordId>, action: BatchAction) -> Prepared<BatchCommand> {
        actions::prepare_batch(ids, action)
    }

    pub async fn execute_batch(&self, command: Confirmed<BatchCommand>) -> Result<usize> {
        actions::execute_batch(&self.store, self.notifier.as_ref(), command).await
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn cached(&self, id: RecordId) -> Result<R> {
        self.store.get(id).ok_or(ConsoleError::UnknownRecord(id))
    }

    fn persist(&self, prefs: ViewPreferences) {
        if let Err(e) = prefs.save(self.settings.as_ref(), R::COLLECTION) {
            warn!(collection = R::COLLECTION, error = %e, "Failed to save view preferences");
        }
    }

    /// Pass a result through, notifying once on failure.
    fn reported<V>(&self, result: Result<V>) -> Result<V> {
        if let Err(e) = &result {
            self.notifier.notify(Notification::error(e.user_message()));
        }
        result
    }

    pub(crate) fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Send a request outside the store's own operations.
    pub(crate) async fn send(&self, request: ApiRequest) -> Result<Envelope<Value>> {
        let path = request.path.clone();
        let result = self
            .store
            .transport()
            .send(request)
            .await
            .and_then(Envelope::into_result);
        if let Err(e) = &result {
            warn!(collection = R::COLLECTION, %path, error = %e, "Request failed");
        }
        result
    }
}


#[cfg(test)]
mod tests {
    use console_shared::records::Channel;
    use console_shared::types::SortOrder;
    use console_store::memory::MemoryGateway;

    use super::testing::Harness;
    use super::*;
    use crate::notify::Level;

    fn channels(count: i64) -> Vec<Channel> {
        (1..=count)
            .map(|id| Channel {
                id,
                name: format!("channel-{id}"),
                status: 1,
                priority: count - id,
                ..Channel::default()
            })
            .collect()
    }

    fn view(h: &Harness) -> ListingView<Channel, Arc<MemoryGateway>> {
        ListingView::new(
            Arc::clone(&h.gateway),
            h.settings.clone(),
            h.notifier.clone(),
        )
    }

    #[tokio::test]
    async fn mount_uses_persisted_preferences() {
        let h = Harness::new(MemoryGateway::new().with_records(&channels(30)));
        h.settings.set("channel.page-size", "20").unwrap();
        h.settings.set("id-sort", "true").unwrap();

        let view = view(&h);
        view.mount().await.unwrap();

        assert_eq!(view.page_size(), 20);
        assert_eq!(view.store().sort(), SortOrder::IdDescending);
        let rows = view.page_rows();
        assert_eq!(rows.len(), 20);
        assert_eq!(rows[0].id, 30);
    }

    #[tokio::test]
    async fn paging_forward_fetches_the_frontier() {
        let mut h = Harness::new(MemoryGateway::new().with_records(&channels(25)));
        let view = view(&h);
        view.mount().await.unwrap();

        let rows = view.change_page(1).await.unwrap();
        assert_eq!(rows.first().map(|c| c.id), Some(11));
        let rows = view.change_page(2).await.unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(view.page_count(), 3);

        // Going back is served from the cache.
        let before = h.gateway.request_count();
        view.change_page(0).await.unwrap();
        assert_eq!(h.gateway.request_count(), before);
        assert!(h.notifications().is_empty());
    }

    #[tokio::test]
    async fn jumping_past_the_known_pages_is_one_error() {
        let mut h = Harness::new(MemoryGateway::new().with_records(&channels(25)));
        let view = view(&h);
        view.mount().await.unwrap();

        assert!(matches!(
            view.change_page(5).await,
            Err(ConsoleError::GapLoad { requested: 5, .. })
        ));
        assert_eq!(view.current_page(), 0);
        let sent = h.notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].level, Level::Error);
    }

    #[tokio::test]
    async fn page_size_change_is_persisted_and_reloads() {
        let h = Harness::new(MemoryGateway::new().with_records(&channels(25)));
        let view = view(&h);
        view.mount().await.unwrap();
        view.change_page(1).await.unwrap();

        view.change_page_size(50).await.unwrap();
        assert_eq!(view.current_page(), 0);
        assert_eq!(view.page_rows().len(), 25);
        assert_eq!(
            h.settings.get("channel.page-size").unwrap().as_deref(),
            Some("50")
        );
    }

    #[tokio::test]
    async fn id_sort_toggle_is_persisted() {
        let h = Harness::new(MemoryGateway::new().with_records(&channels(5)));
        let view = view(&h);
        view.mount().await.unwrap();

        view.toggle_id_sort().await.unwrap();
        assert_eq!(view.page_rows()[0].id, 5);
        assert_eq!(
            h.settings.get("channel.id-sort").unwrap().as_deref(),
            Some("true")
        );

        let remounted = ListingView::<Channel, _>::new(
            Arc::clone(&h.gateway),
            h.settings.clone(),
            h.notifier.clone(),
        );
        assert_eq!(remounted.store().sort(), SortOrder::IdDescending);
    }

    #[tokio::test]
    async fn failed_load_notifies_once() {
        let mut h = Harness::new(MemoryGateway::new().with_records(&channels(5)));
        let view = view(&h);
        h.gateway.reject_next("session expired");

        assert!(view.mount().await.is_err());
        assert_eq!(
            h.notifications(),
            vec![Notification::error("session expired")]
        );
    }

    #[tokio::test]
    async fn failed_search_notifies_once() {
        let mut h = Harness::new(MemoryGateway::new().with_records(&channels(5)));
        let view = view(&h);
        view.mount().await.unwrap();
        h.gateway.reject_next("search disabled");

        let err = view
            .search(SearchQuery::new().keyword("channel"))
            .await
            .unwrap_err();
        assert_eq!(err, ConsoleError::SearchFailed("search disabled".into()));
        assert_eq!(h.notifications().len(), 1);
        assert_eq!(view.page_rows().len(), 5);
    }

    #[tokio::test]
    async fn local_sort_reorders_the_page() {
        let h = Harness::new(MemoryGateway::new().with_records(&channels(5)));
        let view = view(&h);
        view.mount().await.unwrap();

        view.sort_by("priority").unwrap();
        let ids: Vec<i64> = view.page_rows().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn row_menu_is_disabled_while_pending() {
        let h = Harness::new(MemoryGateway::new().with_records(&channels(3)));
        let view = view(&h);
        view.mount().await.unwrap();
        let hold = h.gateway.hold_next();

        let command = view
            .prepare(RecordId(1), ActionKind::Disable)
            .unwrap()
            .into_immediate()
            .unwrap();
        let run = view.execute(command);
        let inspect = async {
            hold.arrived().await;
            let menu = view.row_actions(RecordId(1)).unwrap();
            hold.release();
            menu
        };
        let (run, menu) = tokio::join!(run, inspect);

        run.unwrap();
        assert!(menu.iter().all(|d| !d.enabled));
        assert!(view
            .row_actions(RecordId(1))
            .unwrap()
            .iter()
            .all(|d| d.enabled));
        assert_eq!(view.store().get(RecordId(1)).unwrap().status, 2);
    }

    #[tokio::test]
    async fn edit_form_loads_the_server_copy() {
        let mut h = Harness::new(MemoryGateway::new().with_records(&channels(3)));
        let view = view(&h);
        view.mount().await.unwrap();
        let mut rows = channels(3);
        rows[0].base_url = Some("https://upstream.example".into());
        h.gateway.set_records(Channel::BASE_PATH, &rows);

        let channel = view.load_for_edit(RecordId(1)).await.unwrap();
        assert_eq!(channel.base_url.as_deref(), Some("https://upstream.example"));
        assert_eq!(view.store().get(RecordId(1)), Some(channel));

        assert!(view.load_for_edit(RecordId(8)).await.is_err());
        let sent = h.notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].level, Level::Error);
    }
}
