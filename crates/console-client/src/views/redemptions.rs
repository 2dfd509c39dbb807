//! Batch creation of redemption codes.

use serde_json::Value;

use console_shared::constants::{REDEMPTION_MAX_BATCH, REDEMPTION_NAME_MAX_CHARS};
use console_shared::error::{ConsoleError, Result};
use console_shared::protocol::Transport;
use console_shared::records::Redemption;

use super::ListingView;
use crate::actions::notify_after_refresh;
use crate::notify::Notification;

/// The "generate codes" form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionBatch {
    pub name: String,
    pub count: usize,
    pub quota: i64,
}

impl RedemptionBatch {
    pub fn new(name: impl Into<String>, count: usize, quota: i64) -> Self {
        Self {
            name: name.into(),
            count,
            quota,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let chars = self.name.trim().chars().count();
        if chars == 0 || chars > REDEMPTION_NAME_MAX_CHARS {
            return Err(ConsoleError::InvalidInput(format!(
                "name must be 1 to {REDEMPTION_NAME_MAX_CHARS} characters"
            )));
        }
        if self.count == 0 || self.count > REDEMPTION_MAX_BATCH {
            return Err(ConsoleError::InvalidInput(format!(
                "count must be between 1 and {REDEMPTION_MAX_BATCH}"
            )));
        }
        if self.quota < 0 {
            return Err(ConsoleError::InvalidInput("quota cannot be negative".into()));
        }
        Ok(())
    }
}

impl<T: Transport> ListingView<Redemption, T> {
    /// Generate codes and reload the listing. Returns the new keys so the
    /// operator can copy them; the listing only shows them masked.
    pub async fn create_batch(&self, batch: RedemptionBatch) -> Result<Vec<String>> {
        let result = match batch.validate() {
            Ok(()) => {
                let payload = serde_json::json!({
                    "name": batch.name.trim(),
                    "count": batch.count,
                    "quota": batch.quota,
                });
                self.store().create(payload).await.and_then(keys)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(keys) => {
                let message = format!("Created {} redemption codes", keys.len());
                notify_after_refresh(self.store(), self.notifier(), message).await;
                Ok(keys)
            }
            Err(e) => {
                self.notifier().notify(Notification::error(e.user_message()));
                Err(e)
            }
        }
    }
}

fn keys(data: Option<Value>) -> Result<Vec<String>> {
    match data {
        Some(value) => serde_json::from_value(value).map_err(ConsoleError::malformed),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use console_store::memory::MemoryGateway;

    use super::*;
    use crate::notify::Level;
    use crate::views::testing::Harness;

    fn view(h: &Harness) -> ListingView<Redemption, Arc<MemoryGateway>> {
        ListingView::new(Arc::clone(&h.gateway), h.settings.clone(), h.notifier.clone())
    }

    #[test]
    fn form_limits() {
        assert!(RedemptionBatch::new("promo", 10, 500).validate().is_ok());
        assert!(RedemptionBatch::new("  ", 10, 500).validate().is_err());
        assert!(RedemptionBatch::new("a".repeat(21), 1, 0).validate().is_err());
        assert!(RedemptionBatch::new("promo", 0, 0).validate().is_err());
        assert!(RedemptionBatch::new("promo", 101, 0).validate().is_err());
        assert!(RedemptionBatch::new("promo", 1, -1).validate().is_err());
    }

    #[tokio::test]
    async fn batch_returns_keys_and_reloads() {
        let mut h = Harness::new(MemoryGateway::new().with_records::<Redemption>(&[]));
        let view = view(&h);
        view.mount().await.unwrap();

        let keys = view
            .create_batch(RedemptionBatch::new("promo", 3, 500))
            .await
            .unwrap();

        assert_eq!(keys, vec!["code-00000001", "code-00000002", "code-00000003"]);
        assert_eq!(view.page_rows().len(), 3);
        assert!(view.page_rows().iter().all(|r| r.quota == 500));
        assert_eq!(
            h.notifications(),
            vec![Notification::success("Created 3 redemption codes")]
        );
    }

    #[tokio::test]
    async fn invalid_form_sends_nothing() {
        let mut h = Harness::new(MemoryGateway::new().with_records::<Redemption>(&[]));
        let view = view(&h);

        let err = view
            .create_batch(RedemptionBatch::new("promo", 500, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidInput(_)));
        assert_eq!(h.gateway.request_count(), 0);
        let sent = h.notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].level, Level::Error);
    }
}
