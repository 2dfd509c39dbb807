//! System options (`/api/option/`).
//!
//! The gateway exposes its settings as a flat list of string `{key, value}`
//! pairs; booleans are the strings `"true"` and `"false"`. [`OptionStore`]
//! caches that list and only changes an entry after the gateway accepted
//! the new value.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use console_shared::error::{ConsoleError, Result};
use console_shared::protocol::{ApiRequest, Envelope, Transport};

use crate::collection::LoadOutcome;

pub const OPTIONS_PATH: &str = "/api/option/";

/// One row of the option list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub key: String,
    pub value: String,
}

impl OptionEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Outcome of [`OptionStore::save_changes`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveReport {
    /// Keys the gateway accepted, in key order.
    pub saved: Vec<String>,
    /// Keys it refused, with the reason.
    pub failed: Vec<(String, ConsoleError)>,
}

impl SaveReport {
    /// Nothing differed from the cached values.
    pub fn is_noop(&self) -> bool {
        self.saved.is_empty() && self.failed.is_empty()
    }
}

#[derive(Default)]
struct OptionsState {
    values: BTreeMap<String, String>,
    loaded: bool,
    applied_seq: u64,
}

pub struct OptionStore<T: Transport> {
    transport: T,
    state: Mutex<OptionsState>,
    request_seq: AtomicU64,
}

impl<T: Transport> OptionStore<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: Mutex::new(OptionsState::default()),
            request_seq: AtomicU64::new(0),
        }
    }

    /// Replace the cache with the gateway's current option list. A response
    /// older than one already applied is dropped.
    pub async fn load(&self) -> Result<LoadOutcome> {
        let seq = self.request_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let entries: Vec<OptionEntry> = self
            .send(ApiRequest::get(OPTIONS_PATH))
            .await?
            .data_list()?;
        let received = entries.len();

        let mut state = self.lock();
        if seq < state.applied_seq {
            warn!(seq, "Discarding stale option list");
            return Ok(LoadOutcome::Discarded);
        }
        state.values = entries.into_iter().map(|e| (e.key, e.value)).collect();
        state.loaded = true;
        state.applied_seq = seq;
        debug!(received, "Options loaded");
        Ok(LoadOutcome::Applied { page: 0, received })
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().values.get(key).cloned()
    }

    /// `Some` only for the strings `"true"` and `"false"`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.lock().values.get(key).map(String::as_str) {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        }
    }

    /// Every cached option, for seeding an edit form.
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.lock().values.clone()
    }

    /// `PUT` one option; the cache changes only once the gateway accepts it.
    pub async fn update(&self, key: &str, value: &str) -> Result<()> {
        if key.trim().is_empty() {
            return Err(ConsoleError::InvalidInput("option key is empty".into()));
        }
        let body = json!({ "key": key, "value": value });
        self.send(ApiRequest::put(OPTIONS_PATH, body)).await?;
        self.lock().values.insert(key.to_string(), value.to_string());
        info!(key, "Option updated");
        Ok(())
    }

    /// Flip a boolean option and return its new value.
    pub async fn toggle(&self, key: &str) -> Result<bool> {
        let current = self
            .get_bool(key)
            .ok_or_else(|| ConsoleError::InvalidInput(format!("{key} is not a boolean option")))?;
        let next = !current;
        self.update(key, if next { "true" } else { "false" }).await?;
        Ok(next)
    }

    /// Save every entry of `edited` whose value differs from the cache, one
    /// request per key. A refused key does not stop the others.
    pub async fn save_changes(&self, edited: &BTreeMap<String, String>) -> Result<SaveReport> {
        let changed: Vec<(&String, &String)> = {
            let state = self.lock();
            edited
                .iter()
                .filter(|(key, value)| state.values.get(*key) != Some(*value))
                .collect()
        };

        let mut report = SaveReport::default();
        for (key, value) in changed {
            match self.update(key, value).await {
                Ok(()) => report.saved.push(key.clone()),
                Err(e) => report.failed.push((key.clone(), e)),
            }
        }
        if !report.failed.is_empty() {
            warn!(
                failed = report.failed.len(),
                saved = report.saved.len(),
                "Some options were not saved"
            );
        }
        Ok(report)
    }

    async fn send(&self, request: ApiRequest) -> Result<Envelope<Value>> {
        let method = request.method;
        match self.transport.send(request).await.and_then(Envelope::into_result) {
            Ok(envelope) => Ok(envelope),
            Err(e) => {
                warn!(%method, path = OPTIONS_PATH, error = %e, "Option request failed");
                Err(e)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, OptionsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
