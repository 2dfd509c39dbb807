//! Channel-only operations: connectivity tests, balance updates, the bulk
//! removal of disabled channels, ability repair, and the inline priority and
//! weight inputs.

use chrono::Utc;
use tracing::{info, warn};

use console_shared::actions::RowAction;
use console_shared::error::{ConsoleError, Result};
use console_shared::protocol::{ApiRequest, Method, Transport};
use console_shared::records::{Channel, Record};
use console_shared::types::RecordId;
use console_store::MutationOutcome;

use super::ListingView;
use crate::actions::{notify_after_refresh, Confirmed, Prepared, RowCommand};
use crate::notify::Notification;

/// Remove every channel that is not enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteDisabled;

impl<T: Transport> ListingView<Channel, T> {
    pub fn prepare_delete_disabled(&self) -> Prepared<DeleteDisabled> {
        Prepared::new(
            DeleteDisabled,
            Some("Delete every disabled channel? This cannot be undone.".to_string()),
        )
    }

    /// `DELETE /api/channel/disabled`, then reload the listing.
    pub async fn execute_delete_disabled(&self, confirmed: Confirmed<DeleteDisabled>) -> Result<usize> {
        let DeleteDisabled = confirmed.into_command();
        let request = ApiRequest::delete(format!("{}/disabled", self.store().base()));
        match self.send(request).await.and_then(|e| e.data_count()) {
            Ok(count) => {
                info!(count, "Disabled channels deleted");
                notify_after_refresh(
                    self.store(),
                    self.notifier(),
                    format!("Deleted {count} disabled channels"),
                )
                .await;
                Ok(count)
            }
            Err(e) => {
                self.notifier().notify(Notification::error(e.user_message()));
                Err(e)
            }
        }
    }

    /// Ask the gateway to send a test request through channel `id`.
    ///
    /// Returns the response time in seconds and records it on the cached row.
    pub async fn test_channel(&self, id: RecordId, model: Option<&str>) -> Result<f64> {
        let label = self.cached_label(id)?;
        let mut request = ApiRequest::get(format!("{}/test/{id}/", self.store().base()));
        if let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) {
            request = request.query("model", model);
        }

        let result = self.send(request).await.and_then(|envelope| {
            envelope
                .extra_f64("time")
                .ok_or_else(|| ConsoleError::malformed("missing time"))
        });
        let seconds = self.notified(result)?;

        // Only the measured fields; the row may have changed while waiting.
        let tested = self.store().update_local(id, |channel| {
            channel.response_time = (seconds * 1000.0).round() as i64;
            channel.test_time = Utc::now().timestamp();
        });
        if let Err(e) = tested {
            warn!(%id, error = %e, "Tested channel left the listing before the result arrived");
        }
        self.notifier().notify(Notification::success(format!(
            "{label} responded in {seconds:.2}s"
        )));
        Ok(seconds)
    }

    /// Queue a test of every enabled channel on the gateway.
    pub async fn test_all(&self) -> Result<()> {
        let request = ApiRequest::get(format!("{}/test", self.store().base()));
        self.notified(self.send(request).await)?;
        info!("Channel tests started");
        self.notifier()
            .notify(Notification::success("Testing all enabled channels"));
        Ok(())
    }

    /// Fetch the upstream balance of channel `id` and record it on the row.
    pub async fn update_balance(&self, id: RecordId) -> Result<f64> {
        let label = self.cached_label(id)?;
        let request = ApiRequest::get(format!("{}/update_balance/{id}/", self.store().base()));
        let result = self.send(request).await.and_then(|envelope| {
            envelope
                .extra_f64("balance")
                .ok_or_else(|| ConsoleError::malformed("missing balance"))
        });
        let balance = self.notified(result)?;

        let updated = self.store().update_local(id, |channel| {
            channel.balance = balance;
            channel.balance_updated_time = Utc::now().timestamp();
        });
        if let Err(e) = updated {
            warn!(%id, error = %e, "Channel left the listing before its balance arrived");
        }
        self.notifier().notify(Notification::success(format!(
            "Balance of {label} is {balance:.2}"
        )));
        Ok(balance)
    }

    /// Refresh the balance of every channel, then reload the listing.
    pub async fn update_all_balances(&self) -> Result<()> {
        let request = ApiRequest::get(format!("{}/update_balance", self.store().base()));
        self.notified(self.send(request).await)?;
        notify_after_refresh(
            self.store(),
            self.notifier(),
            "Updated the balance of every channel".to_string(),
        )
        .await;
        Ok(())
    }

    /// Rebuild the gateway's channel abilities and reload the listing.
    ///
    /// Returns how many channels were fixed.
    pub async fn fix_abilities(&self) -> Result<usize> {
        let request = ApiRequest::new(Method::Post, format!("{}/fix", self.store().base()));
        let fixed = self.notified(self.send(request).await.and_then(|e| e.data_count()))?;
        info!(fixed, "Channel abilities rebuilt");
        notify_after_refresh(
            self.store(),
            self.notifier(),
            format!("Fixed the abilities of {fixed} channels"),
        )
        .await;
        Ok(fixed)
    }

    pub async fn set_priority(&self, id: RecordId, priority: i64) -> Result<MutationOutcome<Channel>> {
        self.run_inline(id, RowAction::SetPriority(priority)).await
    }

    pub async fn set_weight(&self, id: RecordId, weight: i64) -> Result<MutationOutcome<Channel>> {
        self.run_inline(id, RowAction::SetWeight(weight)).await
    }

    async fn run_inline(&self, id: RecordId, action: RowAction) -> Result<MutationOutcome<Channel>> {
        let label = self.cached_label(id)?;
        let command = RowCommand { id, label, action };
        self.execute(Confirmed::unprompted(command)).await
    }

    fn cached_label(&self, id: RecordId) -> Result<String> {
        let result = self
            .store()
            .get(id)
            .map(|channel| channel.label())
            .ok_or(ConsoleError::UnknownRecord(id));
        self.notified(result)
    }

    /// Pass a result through, notifying once on failure.
    fn notified<V>(&self, result: Result<V>) -> Result<V> {
        if let Err(e) = &result {
            self.notifier().notify(Notification::error(e.user_message()));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use console_shared::constants::MIN_CHANNEL_PRIORITY;
    use console_store::memory::MemoryGateway;

    use super::*;
    use crate::notify::Level;
    use crate::views::testing::Harness;

    fn channels(count: i64) -> Vec<Channel> {
        (1..=count)
            .map(|id| Channel {
                id,
                name: format!("channel-{id}"),
                status: if id % 5 == 0 { 2 } else { 1 },
                ..Channel::default()
            })
            .collect()
    }

    async fn mounted(h: &Harness) -> ListingView<Channel, Arc<MemoryGateway>> {
        let view = ListingView::new(Arc::clone(&h.gateway), h.settings.clone(), h.notifier.clone());
        view.mount().await.unwrap();
        view
    }

    #[tokio::test]
    async fn delete_disabled_asks_then_reloads() {
        let mut h = Harness::new(MemoryGateway::new().with_records(&channels(12)));
        let view = mounted(&h).await;

        let Prepared::NeedsConfirmation(dialog) = view.prepare_delete_disabled() else {
            panic!("bulk delete must ask first");
        };
        let count = view.execute_delete_disabled(dialog.confirm()).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(view.page_rows().len(), 10);
        assert!(view.store().items().iter().all(|c| c.status == 1));
        let sent = h.notifications();
        assert_eq!(sent, vec![Notification::success("Deleted 2 disabled channels")]);
    }

    #[tokio::test]
    async fn delete_disabled_with_failed_reload_warns_once() {
        let mut h = Harness::new(MemoryGateway::new().with_records(&channels(12)));
        let view = mounted(&h).await;
        h.gateway.respond_next(json!(2));
        h.gateway.fail_next("connection reset");

        let Prepared::NeedsConfirmation(dialog) = view.prepare_delete_disabled() else {
            panic!("bulk delete must ask first");
        };
        assert_eq!(view.execute_delete_disabled(dialog.confirm()).await, Ok(2));

        let sent = h.notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].level, Level::Warning);
    }

    #[tokio::test]
    async fn channel_test_records_response_time() {
        let mut h = Harness::new(MemoryGateway::new().with_records(&channels(3)));
        let view = mounted(&h).await;

        let seconds = view.test_channel(RecordId(2), Some("gpt-4o")).await.unwrap();
        assert!((seconds - 0.42).abs() < f64::EPSILON);

        let channel = view.store().get(RecordId(2)).unwrap();
        assert_eq!(channel.response_time, 420);
        assert!(channel.test_time > 0);

        let last = h.gateway.requests().pop().unwrap();
        assert_eq!(last.path, "/api/channel/test/2/");
        assert_eq!(last.query_value("model"), Some("gpt-4o"));
        assert_eq!(h.notifications().len(), 1);
    }

    #[tokio::test]
    async fn channel_test_keeps_a_disable_confirmed_meanwhile() {
        let mut h = Harness::new(MemoryGateway::new().with_records(&channels(3)));
        let view = mounted(&h).await;
        let hold = h.gateway.hold_next();

        let test = view.test_channel(RecordId(1), None);
        let disable = async {
            hold.arrived().await;
            let command = view
                .prepare_action(RecordId(1), RowAction::Disable)
                .unwrap()
                .into_immediate()
                .unwrap();
            let outcome = view.execute(command).await;
            hold.release();
            outcome
        };
        let (tested, disabled) = tokio::join!(test, disable);

        tested.unwrap();
        disabled.unwrap();
        let channel = view.store().get(RecordId(1)).unwrap();
        assert_eq!(channel.status, 2);
        assert_eq!(channel.response_time, 420);
        assert_eq!(h.notifications().len(), 2);
    }

    #[tokio::test]
    async fn channel_test_of_an_unloaded_row_sends_nothing() {
        let mut h = Harness::new(MemoryGateway::new().with_records(&channels(3)));
        let view = mounted(&h).await;
        let before = h.gateway.request_count();

        assert_eq!(
            view.test_channel(RecordId(9), None).await,
            Err(ConsoleError::UnknownRecord(RecordId(9)))
        );
        assert_eq!(h.gateway.request_count(), before);
        assert_eq!(h.notifications().len(), 1);
    }

    #[tokio::test]
    async fn failed_channel_test_leaves_row_alone() {
        let mut h = Harness::new(MemoryGateway::new().with_records(&channels(3)));
        let view = mounted(&h).await;
        h.gateway.reject_next("upstream returned 401");

        let err = view.test_channel(RecordId(1), None).await.unwrap_err();
        assert_eq!(err, ConsoleError::ServerRejected("upstream returned 401".into()));
        assert_eq!(view.store().get(RecordId(1)).unwrap().response_time, 0);
        assert_eq!(
            h.notifications(),
            vec![Notification::error("upstream returned 401")]
        );
    }

    #[tokio::test]
    async fn balance_update_is_recorded_on_the_row() {
        let mut h = Harness::new(MemoryGateway::new().with_records(&channels(3)));
        let view = mounted(&h).await;

        let balance = view.update_balance(RecordId(2)).await.unwrap();
        assert!((balance - 12.5).abs() < f64::EPSILON);

        let channel = view.store().get(RecordId(2)).unwrap();
        assert!((channel.balance - 12.5).abs() < f64::EPSILON);
        assert!(channel.balance_updated_time > 0);
        let last = h.gateway.requests().pop().unwrap();
        assert_eq!(last.path, "/api/channel/update_balance/2/");
        assert_eq!(
            h.notifications(),
            vec![Notification::success("Balance of channel-2 is 12.50")]
        );
    }

    #[tokio::test]
    async fn failed_balance_update_notifies_once() {
        let mut h = Harness::new(MemoryGateway::new().with_records(&channels(3)));
        let view = mounted(&h).await;
        h.gateway.reject_next("balance query is not supported for this channel type");

        assert!(view.update_balance(RecordId(1)).await.is_err());
        assert_eq!(view.store().get(RecordId(1)).unwrap().balance_updated_time, 0);
        assert_eq!(
            h.notifications(),
            vec![Notification::error(
                "balance query is not supported for this channel type"
            )]
        );
    }

    #[tokio::test]
    async fn bulk_maintenance_reports_once_each() {
        let mut h = Harness::new(MemoryGateway::new().with_records(&channels(12)));
        let view = mounted(&h).await;

        view.test_all().await.unwrap();
        view.update_all_balances().await.unwrap();
        assert_eq!(view.fix_abilities().await, Ok(12));

        let levels: Vec<Level> = h.notifications().into_iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![Level::Success; 3]);
        let paths: Vec<String> = h.gateway.requests().into_iter().map(|r| r.path).collect();
        assert!(paths.contains(&"/api/channel/test".to_string()));
        assert!(paths.contains(&"/api/channel/fix".to_string()));
    }

    #[tokio::test]
    async fn fix_with_failed_reload_warns_once() {
        let mut h = Harness::new(MemoryGateway::new().with_records(&channels(12)));
        let view = mounted(&h).await;
        h.gateway.respond_next(json!(4));
        h.gateway.fail_next("connection reset");

        assert_eq!(view.fix_abilities().await, Ok(4));
        let sent = h.notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].level, Level::Warning);
    }

    #[tokio::test]
    async fn priority_is_clamped_and_confirmed() {
        let h = Harness::new(MemoryGateway::new().with_records(&channels(3)));
        let view = mounted(&h).await;

        view.set_priority(RecordId(3), -5000).await.unwrap();
        assert_eq!(view.store().get(RecordId(3)).unwrap().priority, MIN_CHANNEL_PRIORITY);

        view.set_weight(RecordId(3), 7).await.unwrap();
        assert_eq!(view.store().get(RecordId(3)).unwrap().weight, 7);
    }
}
