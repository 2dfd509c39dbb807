//! The system settings page.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use console_shared::error::Result;
use console_shared::protocol::Transport;
use console_store::{LoadOutcome, OptionStore, SaveReport};

use crate::notify::{Notification, Notifier};

/// Controller of the settings forms: one notification per operation, like
/// the listing views.
pub struct OptionsPanel<T: Transport> {
    store: OptionStore<T>,
    notifier: Arc<dyn Notifier>,
}

impl<T: Transport> OptionsPanel<T> {
    pub fn new(transport: T, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store: OptionStore::new(transport),
            notifier,
        }
    }

    pub fn store(&self) -> &OptionStore<T> {
        &self.store
    }

    pub async fn mount(&self) -> Result<LoadOutcome> {
        let outcome = self.store.load().await;
        self.reported(outcome)
    }

    /// Flip a switch-style option.
    pub async fn toggle(&self, key: &str) -> Result<bool> {
        let enabled = self.reported(self.store.toggle(key).await)?;
        let state = if enabled { "enabled" } else { "disabled" };
        self.notifier
            .notify(Notification::success(format!("{key} {state}")));
        Ok(enabled)
    }

    /// Submit an edited form, then reload the options.
    ///
    /// An unchanged form only warns. Otherwise every changed key is saved
    /// and the outcome is reported once: an error naming the refused keys,
    /// or a success (a warning when the reload fails).
    pub async fn submit(&self, edited: &BTreeMap<String, String>) -> Result<SaveReport> {
        let report = self.reported(self.store.save_changes(edited).await)?;
        if report.is_noop() {
            self.notifier.notify(Notification::warning("No changes to save"));
            return Ok(report);
        }
        info!(saved = report.saved.len(), failed = report.failed.len(), "Options submitted");

        if !report.failed.is_empty() {
            let reasons: Vec<String> = report
                .failed
                .iter()
                .map(|(key, e)| format!("{key}: {}", e.user_message()))
                .collect();
            self.notifier.notify(Notification::error(format!(
                "Some settings were not saved ({})",
                reasons.join("; ")
            )));
            // The cache already holds every accepted value.
            return Ok(report);
        }

        match self.store.load().await {
            Ok(_) => self.notifier.notify(Notification::success("Settings saved")),
            Err(e) => self.notifier.notify(Notification::warning(format!(
                "Settings saved, but they could not be reloaded: {}",
                e.user_message()
            ))),
        }
        Ok(report)
    }

    fn reported<V>(&self, result: Result<V>) -> Result<V> {
        if let Err(e) = &result {
            self.notifier.notify(Notification::error(e.user_message()));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use console_store::memory::MemoryGateway;
    use console_store::OptionEntry;

    use super::*;
    use crate::notify::Level;
    use crate::views::testing::Harness;

    fn panel(h: &Harness) -> OptionsPanel<Arc<MemoryGateway>> {
        h.gateway.set_records(
            "/api/option",
            &[
                OptionEntry::new("SystemName", "Gateway"),
                OptionEntry::new("EmailVerificationEnabled", "false"),
                OptionEntry::new("Footer", ""),
            ],
        );
        OptionsPanel::new(Arc::clone(&h.gateway), h.notifier.clone())
    }

    #[tokio::test]
    async fn unchanged_form_warns_without_requests() {
        let mut h = Harness::new(MemoryGateway::new());
        let panel = panel(&h);
        panel.mount().await.unwrap();
        let before = h.gateway.request_count();

        let report = panel.submit(&panel.store().entries()).await.unwrap();
        assert!(report.is_noop());
        assert_eq!(h.gateway.request_count(), before);
        assert_eq!(h.notifications(), vec![Notification::warning("No changes to save")]);
    }

    #[tokio::test]
    async fn submit_saves_then_reloads() {
        let mut h = Harness::new(MemoryGateway::new());
        let panel = panel(&h);
        panel.mount().await.unwrap();

        let mut edited = panel.store().entries();
        edited.insert("Footer".into(), "Powered by the gateway".into());
        let report = panel.submit(&edited).await.unwrap();

        assert_eq!(report.saved, vec!["Footer".to_string()]);
        assert_eq!(
            panel.store().get("Footer").as_deref(),
            Some("Powered by the gateway")
        );
        assert_eq!(h.gateway.requests().last().unwrap().path, "/api/option/");
        assert_eq!(h.notifications(), vec![Notification::success("Settings saved")]);
    }

    #[tokio::test]
    async fn partial_failure_is_one_error() {
        let mut h = Harness::new(MemoryGateway::new());
        let panel = panel(&h);
        panel.mount().await.unwrap();

        let mut edited = panel.store().entries();
        edited.insert("Footer".into(), "hello".into());
        edited.insert("SystemName".into(), "Console".into());
        h.gateway.reject_next("footer too long");
        let report = panel.submit(&edited).await.unwrap();

        assert_eq!(report.saved, vec!["SystemName".to_string()]);
        let sent = h.notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].level, Level::Error);
        assert!(sent[0].message.contains("Footer: footer too long"));
    }

    #[tokio::test]
    async fn toggle_reports_the_new_state() {
        let mut h = Harness::new(MemoryGateway::new());
        let panel = panel(&h);
        panel.mount().await.unwrap();

        assert_eq!(panel.toggle("EmailVerificationEnabled").await, Ok(true));
        assert_eq!(
            h.notifications(),
            vec![Notification::success("EmailVerificationEnabled enabled")]
        );

        assert!(panel.toggle("SystemName").await.is_err());
        let sent = h.notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].level, Level::Error);
    }
}
