//! Usage logs, either gateway-wide or the caller's own.

use std::sync::Arc;

use console_shared::error::Result;
use console_shared::protocol::{ApiRequest, Transport};
use console_shared::query::{SearchField, SearchQuery};
use console_shared::records::{LogEntry, LogStat, Record};
use console_store::{CollectionStore, SettingsStorage};

use super::ListingView;
use crate::notify::{Notification, Notifier};

/// Which log listing a view shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogScope {
    /// Every user's requests (`/api/log`).
    #[default]
    Admin,
    /// The signed-in user's requests (`/api/log/self`).
    User,
}

impl LogScope {
    pub fn base(self) -> &'static str {
        match self {
            Self::Admin => LogEntry::BASE_PATH,
            Self::User => "/api/log/self",
        }
    }
}

impl<T: Transport> ListingView<LogEntry, T> {
    pub fn logs(
        transport: T,
        scope: LogScope,
        settings: Arc<dyn SettingsStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::with_store(
            CollectionStore::with_base(transport, scope.base()),
            settings,
            notifier,
        )
    }

    /// Quota consumed by the requests matching `query`'s filters.
    /// The keyword is not a stat filter and is ignored.
    pub async fn stat(&self, query: &SearchQuery) -> Result<LogStat> {
        let filters: Vec<SearchField> = LogEntry::SEARCH_FIELDS
            .iter()
            .copied()
            .filter(|f| *f != SearchField::Keyword)
            .collect();
        let request = ApiRequest::get(format!("{}/stat", self.store().base()))
            .query_pairs(query.to_params(&filters, LogEntry::TIMESTAMP_UNIT));

        let result = match query.validate() {
            Ok(()) => self.send(request).await.and_then(|e| e.data_as::<LogStat>()),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            self.notifier().notify(Notification::error(e.user_message()));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use console_shared::records::LogType;
    use console_store::memory::MemoryGateway;

    use super::*;
    use crate::views::testing::Harness;

    fn entries(base_user: &str) -> Vec<LogEntry> {
        (1..=6)
            .map(|id| LogEntry {
                id,
                log_type: if id % 2 == 0 { LogType::CONSUME } else { LogType::TOPUP },
                username: base_user.to_string(),
                quota: id * 100,
                ..LogEntry::default()
            })
            .collect()
    }

    fn harness() -> Harness {
        let gateway = MemoryGateway::new().with_records(&entries("alice"));
        gateway.set_records("/api/log/self", &entries("me")[..2]);
        Harness::new(gateway)
    }

    fn view(h: &Harness, scope: LogScope) -> ListingView<LogEntry, Arc<MemoryGateway>> {
        ListingView::logs(Arc::clone(&h.gateway), scope, h.settings.clone(), h.notifier.clone())
    }

    #[tokio::test]
    async fn scope_selects_the_endpoint() {
        let h = harness();
        let admin = view(&h, LogScope::Admin);
        let own = view(&h, LogScope::User);
        admin.mount().await.unwrap();
        own.mount().await.unwrap();

        assert_eq!(admin.page_rows().len(), 6);
        assert_eq!(own.page_rows().len(), 2);
        assert!(own.page_rows().iter().all(|e| e.username == "me"));
        assert_eq!(h.gateway.requests()[1].path, "/api/log/self/");
    }

    #[tokio::test]
    async fn stat_sums_matching_quota() {
        let mut h = harness();
        let view = view(&h, LogScope::Admin);

        let stat = view
            .stat(&SearchQuery::new().log_type(LogType::CONSUME).keyword("ignored"))
            .await
            .unwrap();
        assert_eq!(stat.quota, 200 + 400 + 600);

        let request = h.gateway.requests().pop().unwrap();
        assert_eq!(request.path, "/api/log/stat");
        assert_eq!(request.query_value("keyword"), None);
        assert!(h.notifications().is_empty());
    }

    #[tokio::test]
    async fn stat_failure_notifies_once() {
        let mut h = harness();
        let view = view(&h, LogScope::User);
        h.gateway.reject_next("not logged in");

        assert!(view.stat(&SearchQuery::new()).await.is_err());
        assert_eq!(h.notifications(), vec![Notification::error("not logged in")]);
    }

    #[tokio::test]
    async fn logs_have_no_row_actions() {
        let h = harness();
        let view = view(&h, LogScope::Admin);
        view.mount().await.unwrap();
        assert!(view.row_actions(console_shared::types::RecordId(1)).unwrap().is_empty());
    }
}
