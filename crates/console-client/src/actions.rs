//! Row actions and their confirmation step.
//!
//! A row menu is a list of [`ActionDescriptor`]s derived from the record. To
//! run one, the view first *prepares* it into a [`Prepared`] command. Cheap,
//! reversible actions come back as [`Prepared::Immediate`]; destructive ones
//! come back as [`Prepared::NeedsConfirmation`] and only turn into the
//! [`Confirmed`] value the executors accept after [`Unconfirmed::confirm`].
//! `Confirmed` has no public constructor, so skipping the dialog does not
//! compile.
//!
//! Executors send exactly one [`Notification`] per run.

use tracing::{info, warn};

use console_shared::actions::{ActionKind, BatchAction, RowAction};
use console_shared::error::{ConsoleError, Result};
use console_shared::protocol::Transport;
use console_shared::records::Record;
use console_shared::types::RecordId;
use console_store::{CollectionStore, MutationOutcome};

use crate::notify::{Notification, Notifier};

/// One entry of a row menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub kind: ActionKind,
    /// `false` while a mutation of the row is in flight.
    pub enabled: bool,
    /// The action asks for confirmation before running.
    pub confirm: bool,
}

/// Menu entries for `record`.
pub fn row_descriptors<R: Record>(record: &R, pending: bool) -> Vec<ActionDescriptor> {
    record
        .available_actions()
        .into_iter()
        .map(|kind| ActionDescriptor {
            kind,
            enabled: !pending,
            confirm: kind.requires_confirmation(),
        })
        .collect()
}

/// A single-row mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct RowCommand {
    pub id: RecordId,
    pub label: String,
    pub action: RowAction,
}

/// A mutation of several rows in one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCommand {
    pub ids: Vec<RecordId>,
    pub action: BatchAction,
}

/// A command that has not been confirmed yet.
#[derive(Debug, Clone)]
pub struct Unconfirmed<C> {
    command: C,
    prompt: String,
}

impl<C> Unconfirmed<C> {
    /// Question to put in the confirmation dialog.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn command(&self) -> &C {
        &self.command
    }

    pub fn confirm(self) -> Confirmed<C> {
        Confirmed {
            command: self.command,
        }
    }
}

/// A command cleared to run.
#[derive(Debug, Clone)]
pub struct Confirmed<C> {
    command: C,
}

impl<C> Confirmed<C> {
    /// For commands the console issues itself without a dialog.
    pub(crate) fn unprompted(command: C) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &C {
        &self.command
    }

    pub(crate) fn into_command(self) -> C {
        self.command
    }
}

#[derive(Debug, Clone)]
pub enum Prepared<C> {
    Immediate(Confirmed<C>),
    NeedsConfirmation(Unconfirmed<C>),
}

impl<C> Prepared<C> {
    pub(crate) fn new(command: C, prompt: Option<String>) -> Self {
        match prompt {
            Some(prompt) => Self::NeedsConfirmation(Unconfirmed { command, prompt }),
            None => Self::Immediate(Confirmed::unprompted(command)),
        }
    }

    pub fn needs_confirmation(&self) -> bool {
        matches!(self, Self::NeedsConfirmation(_))
    }

    /// The confirmed command, if no dialog is needed.
    pub fn into_immediate(self) -> Option<Confirmed<C>> {
        match self {
            Self::Immediate(confirmed) => Some(confirmed),
            Self::NeedsConfirmation(_) => None,
        }
    }
}

/// Prepare the mutation behind a row menu entry.
pub fn prepare_row<R: Record>(record: &R, kind: ActionKind) -> Result<Prepared<RowCommand>> {
    let unsupported = || ConsoleError::Unsupported {
        collection: R::COLLECTION,
        action: kind_name(kind),
    };
    if !record.available_actions().contains(&kind) {
        return Err(unsupported());
    }
    let action = kind.row_action().ok_or_else(unsupported)?;
    Ok(prepare_action(record, action))
}

/// Prepare an arbitrary row mutation (edit forms, priority and weight
/// inputs).
pub fn prepare_action<R: Record>(record: &R, action: RowAction) -> Prepared<RowCommand> {
    let label = record.label();
    let prompt = match action {
        RowAction::Delete => Some(format!("Delete {label}? This cannot be undone.")),
        RowAction::Copy => Some(format!("Create a copy of {label}?")),
        _ => None,
    };
    Prepared::new(
        RowCommand {
            id: record.id(),
            label,
            action,
        },
        prompt,
    )
}

/// Batch actions are all destructive and always ask first.
pub fn prepare_batch(ids: Vec<RecordId>, action: BatchAction) -> Prepared<BatchCommand> {
    let prompt = match action {
        BatchAction::Delete => format!("Delete {} selected records?", ids.len()),
    };
    Prepared::new(BatchCommand { ids, action }, Some(prompt))
}

/// Run a row command and report its outcome.
///
/// A successful copy refreshes the listing so the duplicate shows up; if that
/// refresh fails the single notification is a warning instead.
pub async fn execute_row<R: Record, T: Transport>(
    store: &CollectionStore<R, T>,
    notifier: &dyn Notifier,
    confirmed: Confirmed<RowCommand>,
) -> Result<MutationOutcome<R>> {
    let RowCommand { id, label, action } = confirmed.into_command();
    info!(collection = R::COLLECTION, %id, action = action.name(), "Executing row action");

    match store.mutate_record(id, action.clone()).await {
        Ok(MutationOutcome::Copied(created)) => {
            notify_after_refresh(store, notifier, format!("Copied {label}")).await;
            Ok(MutationOutcome::Copied(created))
        }
        Ok(outcome) => {
            notifier.notify(Notification::success(success_message(&action, &label)));
            Ok(outcome)
        }
        Err(e) => {
            notifier.notify(Notification::error(e.user_message()));
            Err(e)
        }
    }
}

/// Run a batch command and report its outcome.
pub async fn execute_batch<R: Record, T: Transport>(
    store: &CollectionStore<R, T>,
    notifier: &dyn Notifier,
    confirmed: Confirmed<BatchCommand>,
) -> Result<usize> {
    let BatchCommand { ids, action } = confirmed.into_command();
    match store.batch_mutate(&ids, action).await {
        Ok(count) => {
            notifier.notify(Notification::success(format!("Deleted {count} records")));
            Ok(count)
        }
        Err(e) => {
            notifier.notify(Notification::error(e.user_message()));
            Err(e)
        }
    }
}

/// Refresh after a server-side change the cache cannot apply by itself, then
/// send one notification: `message` on success, a warning otherwise.
pub(crate) async fn notify_after_refresh<R: Record, T: Transport>(
    store: &CollectionStore<R, T>,
    notifier: &dyn Notifier,
    message: String,
) {
    match store.refresh().await {
        Ok(_) => notifier.notify(Notification::success(message)),
        Err(e) => {
            warn!(collection = R::COLLECTION, error = %e, "Refresh after change failed");
            notifier.notify(Notification::warning(format!(
                "{message}, but the list could not be reloaded: {}",
                e.user_message()
            )));
        }
    }
}

fn success_message(action: &RowAction, label: &str) -> String {
    match action {
        RowAction::Enable => format!("Enabled {label}"),
        RowAction::Disable => format!("Disabled {label}"),
        RowAction::Delete => format!("Deleted {label}"),
        RowAction::Copy => format!("Copied {label}"),
        RowAction::SetPriority(p) => format!("Priority of {label} set to {p}"),
        RowAction::SetWeight(w) => format!("Weight of {label} set to {w}"),
        RowAction::Promote => format!("Promoted {label}"),
        RowAction::Demote => format!("Demoted {label}"),
        RowAction::Update(_) => format!("Saved {label}"),
    }
}

fn kind_name(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Enable => "enable",
        ActionKind::Disable => "disable",
        ActionKind::Delete => "delete",
        ActionKind::Copy => "copy",
        ActionKind::Edit => "edit",
        ActionKind::Promote => "promote",
        ActionKind::Demote => "demote",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use console_shared::records::{Channel, LogEntry, User, UserRole};
    use console_store::memory::MemoryGateway;

    use super::*;
    use crate::notify::{ChannelNotifier, Level};

    fn channel(id: i64, status: i64) -> Channel {
        Channel {
            id,
            status,
            name: format!("channel-{id}"),
            ..Channel::default()
        }
    }

    async fn loaded(
        rows: &[Channel],
    ) -> (
        Arc<MemoryGateway>,
        CollectionStore<Channel, Arc<MemoryGateway>>,
    ) {
        let gateway = Arc::new(MemoryGateway::new().with_records(rows));
        let store = CollectionStore::new(Arc::clone(&gateway));
        store.load_page(0, 10, None).await.unwrap();
        (gateway, store)
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }

    #[test]
    fn descriptors_follow_status_and_pending() {
        let descriptors = row_descriptors(&channel(1, 1), false);
        let kinds: Vec<ActionKind> = descriptors.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::Disable,
                ActionKind::Edit,
                ActionKind::Copy,
                ActionKind::Delete
            ]
        );
        assert!(descriptors.iter().all(|d| d.enabled));
        assert!(descriptors
            .iter()
            .filter(|d| d.confirm)
            .all(|d| matches!(d.kind, ActionKind::Delete | ActionKind::Copy)));

        assert!(row_descriptors(&channel(1, 2), true)
            .iter()
            .all(|d| !d.enabled));
        assert!(row_descriptors(&LogEntry::default(), false).is_empty());
    }

    #[test]
    fn destructive_actions_need_confirmation() {
        let record = channel(4, 1);
        let delete = prepare_row(&record, ActionKind::Delete).unwrap();
        assert!(delete.needs_confirmation());
        let Prepared::NeedsConfirmation(pending) = delete else {
            panic!("delete must ask first");
        };
        assert!(pending.prompt().contains("channel-4"));
        let confirmed = pending.confirm();
        assert_eq!(confirmed.command().action, RowAction::Delete);

        let disable = prepare_row(&record, ActionKind::Disable).unwrap();
        assert!(disable.into_immediate().is_some());

        assert!(prepare_batch(vec![RecordId(1)], BatchAction::Delete).needs_confirmation());
    }

    #[test]
    fn unavailable_entries_cannot_be_prepared() {
        let root = User {
            id: 1,
            role: UserRole::ROOT,
            status: 1,
            ..User::default()
        };
        assert!(matches!(
            prepare_row(&root, ActionKind::Delete),
            Err(ConsoleError::Unsupported { action: "delete", .. })
        ));
        assert!(prepare_row(&channel(1, 1), ActionKind::Edit).is_err());
        assert!(prepare_row(&channel(1, 1), ActionKind::Enable).is_err());
    }

    #[tokio::test]
    async fn success_sends_one_notification() {
        let (_gw, store) = loaded(&[channel(1, 1)]).await;
        let (notifier, mut rx) = ChannelNotifier::new();

        let confirmed = prepare_row(&channel(1, 1), ActionKind::Disable)
            .unwrap()
            .into_immediate()
            .unwrap();
        execute_row(&store, &notifier, confirmed).await.unwrap();

        let sent = drain(&mut rx);
        assert_eq!(sent, vec![Notification::success("Disabled channel-1")]);
    }

    #[tokio::test]
    async fn failure_sends_one_error() {
        let (gw, store) = loaded(&[channel(1, 1)]).await;
        let (notifier, mut rx) = ChannelNotifier::new();
        gw.reject_next("permission denied");

        let confirmed = prepare_row(&channel(1, 1), ActionKind::Disable)
            .unwrap()
            .into_immediate()
            .unwrap();
        assert!(execute_row(&store, &notifier, confirmed).await.is_err());

        let sent = drain(&mut rx);
        assert_eq!(sent, vec![Notification::error("permission denied")]);
        assert_eq!(store.get(RecordId(1)).unwrap().status, 1);
    }

    #[tokio::test]
    async fn copy_refreshes_and_reports_once() {
        let (gw, store) = loaded(&[channel(1, 1)]).await;
        let (notifier, mut rx) = ChannelNotifier::new();

        let Prepared::NeedsConfirmation(copy) =
            prepare_row(&channel(1, 1), ActionKind::Copy).unwrap()
        else {
            panic!("copy must ask first");
        };
        execute_row(&store, &notifier, copy.confirm()).await.unwrap();

        assert_eq!(store.items().len(), 2);
        assert_eq!(drain(&mut rx), vec![Notification::success("Copied channel-1")]);
        // Load, copy, refresh.
        assert_eq!(gw.request_count(), 3);
    }

    #[tokio::test]
    async fn copy_with_failed_refresh_is_a_single_warning() {
        let (gw, store) = loaded(&[channel(1, 1)]).await;
        let (notifier, mut rx) = ChannelNotifier::new();

        let Prepared::NeedsConfirmation(copy) =
            prepare_row(&channel(1, 1), ActionKind::Copy).unwrap()
        else {
            panic!("copy must ask first");
        };
        // The copy succeeds; the refresh that follows does not.
        gw.respond_next(serde_json::json!({ "id": 2 }));
        gw.fail_next("connection reset");
        let outcome = execute_row(&store, &notifier, copy.confirm()).await.unwrap();
        assert!(matches!(outcome, MutationOutcome::Copied(Some(_))));

        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].level, Level::Warning);
        assert!(sent[0].message.contains("connection reset"));
    }

    #[tokio::test]
    async fn batch_delete_reports_the_count() {
        let rows: Vec<Channel> = (1..=4).map(|id| channel(id, 1)).collect();
        let (_gw, store) = loaded(&rows).await;
        let (notifier, mut rx) = ChannelNotifier::new();

        let Prepared::NeedsConfirmation(batch) =
            prepare_batch(vec![RecordId(1), RecordId(2)], BatchAction::Delete)
        else {
            panic!("batch delete must ask first");
        };
        let count = execute_batch(&store, &notifier, batch.confirm()).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(drain(&mut rx), vec![Notification::success("Deleted 2 records")]);
    }

    #[tokio::test]
    async fn empty_batch_is_one_error() {
        let (gw, store) = loaded(&[channel(1, 1)]).await;
        let (notifier, mut rx) = ChannelNotifier::new();

        let Prepared::NeedsConfirmation(batch) = prepare_batch(Vec::new(), BatchAction::Delete)
        else {
            panic!("batch delete must ask first");
        };
        assert_eq!(
            execute_batch(&store, &notifier, batch.confirm()).await,
            Err(ConsoleError::EmptySelection)
        );
        assert_eq!(drain(&mut rx).len(), 1);
        assert_eq!(gw.request_count(), 1);
    }
}
