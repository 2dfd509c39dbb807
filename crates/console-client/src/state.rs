//! Application state shared by every listing view.
//!
//! [`ConsoleState`] holds the collaborators each view needs (the transport,
//! preference storage and the notification sink) and builds one
//! [`ListingView`] per administered collection, plus the settings page.

use std::sync::Arc;

use console_shared::protocol::Transport;
use console_shared::records::{Channel, DrawingJob, LogEntry, Record, Redemption, Token, User};
use console_store::SettingsStorage;

use crate::notify::Notifier;
use crate::views::{ListingView, LogScope, OptionsPanel};

/// Central application state.
pub struct ConsoleState<T: Transport> {
    /// REST transport shared by every view.
    pub transport: Arc<T>,

    /// Where page size and sort preferences are persisted.
    pub settings: Arc<dyn SettingsStorage>,

    /// Sink for success, warning and error notifications.
    pub notifier: Arc<dyn Notifier>,
}

impl<T: Transport> Clone for ConsoleState<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            settings: Arc::clone(&self.settings),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<T: Transport> ConsoleState<T> {
    pub fn new(
        transport: T,
        settings: Arc<dyn SettingsStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            settings,
            notifier,
        }
    }

    pub fn channels(&self) -> ListingView<Channel, Arc<T>> {
        self.view()
    }

    pub fn tokens(&self) -> ListingView<Token, Arc<T>> {
        self.view()
    }

    pub fn users(&self) -> ListingView<User, Arc<T>> {
        self.view()
    }

    pub fn redemptions(&self) -> ListingView<Redemption, Arc<T>> {
        self.view()
    }

    pub fn logs(&self, scope: LogScope) -> ListingView<LogEntry, Arc<T>> {
        ListingView::logs(
            Arc::clone(&self.transport),
            scope,
            Arc::clone(&self.settings),
            Arc::clone(&self.notifier),
        )
    }

    pub fn drawings(&self) -> ListingView<DrawingJob, Arc<T>> {
        self.view()
    }

    pub fn options(&self) -> OptionsPanel<Arc<T>> {
        OptionsPanel::new(Arc::clone(&self.transport), Arc::clone(&self.notifier))
    }

    fn view<R: Record>(&self) -> ListingView<R, Arc<T>> {
        ListingView::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.settings),
            Arc::clone(&self.notifier),
        )
    }
}
