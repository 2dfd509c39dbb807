//! An in-process stand-in for the gateway's REST API.
//!
//! [`MemoryGateway`] serves every collection from JSON rows held in memory
//! and answers with the same envelopes the real gateway sends. It records
//! each request, can be told to fail or to hold the next request open, and
//! is what the store and view tests run against.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::Notify;

use console_shared::constants::ITEMS_PER_PAGE;
use console_shared::error::{ConsoleError, Result};
use console_shared::protocol::{ApiRequest, Envelope, Method, Transport};
use console_shared::records::Record;

/// A scripted failure for the next request.
#[derive(Debug, Clone)]
enum Fault {
    Reject(String),
    Network(String),
    Malformed,
    /// Answer `success=true` with this `data`, bypassing the handlers.
    Respond(Value),
}

/// Gate returned by [`MemoryGateway::hold_next`].
#[derive(Debug, Clone, Default)]
pub struct Hold {
    arrived: Arc<Notify>,
    release: Arc<Notify>,
}

impl Hold {
    /// Resolves once the held request has reached the gateway.
    pub async fn arrived(&self) {
        self.arrived.notified().await;
    }

    /// Let the held request proceed.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, Vec<Value>>,
    faults: VecDeque<Fault>,
    holds: VecDeque<Hold>,
    requests: Vec<ApiRequest>,
}

#[derive(Default)]
pub struct MemoryGateway {
    inner: Mutex<Inner>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `records` from `R::BASE_PATH`.
    pub fn with_records<R: Record>(self, records: &[R]) -> Self {
        self.set_records(R::BASE_PATH, records);
        self
    }

    /// Replace the rows served from `base`.
    pub fn set_records<S: Serialize>(&self, base: &str, records: &[S]) {
        let rows = records
            .iter()
            .filter_map(|r| serde_json::to_value(r).ok())
            .collect();
        self.lock().collections.insert(base.to_string(), rows);
    }

    pub fn rows(&self, base: &str) -> Vec<Value> {
        self.lock().collections.get(base).cloned().unwrap_or_default()
    }

    /// Make the next request answer `success=false` with `message`.
    pub fn reject_next(&self, message: impl Into<String>) {
        self.lock().faults.push_back(Fault::Reject(message.into()));
    }

    /// Make the next request fail at the transport level.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.lock().faults.push_back(Fault::Network(message.into()));
    }

    /// Make the next request answer with a body that is not an envelope.
    pub fn malform_next(&self) {
        self.lock().faults.push_back(Fault::Malformed);
    }

    /// Make the next request succeed with `data`, whatever it asked for.
    pub fn respond_next(&self, data: Value) {
        self.lock().faults.push_back(Fault::Respond(data));
    }

    /// Hold the next request open until [`Hold::release`] is called.
    pub fn hold_next(&self) -> Hold {
        let hold = Hold::default();
        self.lock().holds.push_back(hold.clone());
        hold
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn handle(&self, request: ApiRequest) -> Result<Envelope<Value>> {
        let (hold, fault) = {
            let mut inner = self.lock();
            inner.requests.push(request.clone());
            (inner.holds.pop_front(), inner.faults.pop_front())
        };

        if let Some(hold) = hold {
            hold.arrived.notify_one();
            hold.release.notified().await;
        }

        match fault {
            Some(Fault::Reject(message)) => return Ok(Envelope::rejected(message)),
            Some(Fault::Network(message)) => return Err(ConsoleError::Network(message)),
            Some(Fault::Malformed) => return Envelope::decode("<html>502 Bad Gateway</html>"),
            Some(Fault::Respond(data)) => return Ok(Envelope::ok(data)),
            None => {}
        }

        Ok(self.route(&request))
    }

    fn route(&self, request: &ApiRequest) -> Envelope<Value> {
        let path = request.path.trim_end_matches('/');
        let mut inner = self.lock();

        if path == "/api/user/manage" && request.method == Method::Post {
            return manage_user(&mut inner, request.body.as_ref());
        }
        if path == "/api/channel/disabled" && request.method == Method::Delete {
            let rows = inner.collections.entry("/api/channel".into()).or_default();
            let before = rows.len();
            rows.retain(|r| r["status"] == 1);
            return Envelope::ok(json!(before - rows.len()));
        }
        if let Some(rest) = path.strip_prefix("/api/channel/test/") {
            return test_channel(&mut inner, rest);
        }
        if let Some(rest) = path.strip_prefix("/api/channel/update_balance/") {
            return update_balance(&mut inner, rest);
        }
        match (request.method, path) {
            (Method::Get, "/api/channel/test" | "/api/channel/update_balance") => {
                return Envelope::ok_empty()
            }
            (Method::Post, "/api/channel/fix") => {
                let fixed = inner.collections.get("/api/channel").map_or(0, Vec::len);
                return Envelope::ok(json!(fixed));
            }
            (Method::Get, "/api/option") => {
                let options = inner.collections.get("/api/option").cloned();
                return Envelope::ok(Value::Array(options.unwrap_or_default()));
            }
            (Method::Put, "/api/option") => {
                let options = inner.collections.entry("/api/option".into()).or_default();
                return put_option(options, request.body.as_ref());
            }
            _ => {}
        }

        let (base, tail) = match split_collection(&inner, path) {
            Some(found) => found,
            None => return Envelope::rejected(format!("no route for {path}")),
        };
        let rows = inner.collections.entry(base.clone()).or_default();

        match (request.method, tail.as_str()) {
            (Method::Get, "") => Envelope::ok(Value::Array(list(rows, request))),
            (Method::Get, "search") => Envelope::ok(Value::Array(search(rows, request))),
            (Method::Get, "stat") => {
                let quota: i64 = filter(rows, request, &["p", "page_size", "id_sort"])
                    .iter()
                    .filter_map(|r| r["quota"].as_i64())
                    .sum();
                Envelope::ok(json!({ "quota": quota }))
            }
            (Method::Put, "") => update(rows, request),
            (Method::Post, "") => create(&base, rows, request.body.clone()),
            (Method::Post, "batch") => {
                let ids: Vec<i64> = request
                    .body
                    .as_ref()
                    .and_then(|b| b["ids"].as_array().cloned())
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Value::as_i64)
                    .collect();
                let before = rows.len();
                rows.retain(|r| !r["id"].as_i64().is_some_and(|id| ids.contains(&id)));
                Envelope::ok(json!(before - rows.len()))
            }
            (Method::Get, id) => match id.parse::<i64>() {
                Ok(id) => match rows.iter().find(|r| r["id"].as_i64() == Some(id)) {
                    Some(row) => Envelope::ok(row.clone()),
                    None => Envelope::rejected(format!("record {id} not found")),
                },
                Err(_) => Envelope::rejected(format!("no route for GET {path}")),
            },
            (Method::Delete, id) => match id.parse::<i64>() {
                Ok(id) => {
                    let before = rows.len();
                    rows.retain(|r| r["id"].as_i64() != Some(id));
                    if rows.len() == before {
                        Envelope::rejected(format!("record {id} not found"))
                    } else {
                        Envelope::ok_empty()
                    }
                }
                Err(_) => Envelope::rejected(format!("invalid id {id}")),
            },
            _ => Envelope::rejected(format!("no route for {} {path}", request.method)),
        }
    }
}

impl Transport for MemoryGateway {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<Envelope<Value>>> + Send {
        self.handle(request)
    }
}

/// Longest registered collection base that prefixes `path`, and the rest.
fn split_collection(inner: &Inner, path: &str) -> Option<(String, String)> {
    inner
        .collections
        .keys()
        .filter(|base| path == base.as_str() || path.starts_with(&format!("{base}/")))
        .max_by_key(|base| base.len())
        .map(|base| {
            let tail = path[base.len()..].trim_start_matches('/').to_string();
            (base.clone(), tail)
        })
}

fn query_usize(request: &ApiRequest, key: &str, default: usize) -> usize {
    request
        .query_value(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn list(rows: &[Value], request: &ApiRequest) -> Vec<Value> {
    let mut rows = filter(rows, request, &["p", "page_size", "id_sort"]);
    if request.query_value("id_sort") == Some("true") {
        rows.sort_by_key(|r| std::cmp::Reverse(r["id"].as_i64().unwrap_or_default()));
    }
    let page = query_usize(request, "p", 0);
    let size = query_usize(request, "page_size", ITEMS_PER_PAGE);
    rows.into_iter().skip(page * size).take(size).collect()
}

fn search(rows: &[Value], request: &ApiRequest) -> Vec<Value> {
    filter(rows, request, &[])
}

/// Rows matching every query parameter not listed in `skip`.
fn filter(rows: &[Value], request: &ApiRequest, skip: &[&str]) -> Vec<Value> {
    rows.iter()
        .filter(|row| {
            request
                .query
                .iter()
                .filter(|(key, _)| !skip.contains(&key.as_str()))
                .all(|(key, value)| matches(row, key, value))
        })
        .cloned()
        .collect()
}

fn matches(row: &Value, key: &str, value: &str) -> bool {
    match key {
        "keyword" => row.as_object().is_some_and(|fields| {
            fields.values().any(|field| match field {
                Value::String(s) => s.contains(value),
                Value::Number(n) => n.to_string() == value,
                _ => false,
            })
        }),
        "start_timestamp" | "end_timestamp" => true,
        _ => match &row[key] {
            Value::String(s) => s.contains(value),
            Value::Null => false,
            other => other.to_string() == value,
        },
    }
}

fn update(rows: &mut [Value], request: &ApiRequest) -> Envelope<Value> {
    let Some(Value::Object(patch)) = request.body.as_ref() else {
        return Envelope::rejected("missing body");
    };
    let Some(id) = patch.get("id").and_then(Value::as_i64) else {
        return Envelope::rejected("missing id");
    };
    match rows.iter_mut().find(|r| r["id"].as_i64() == Some(id)) {
        Some(Value::Object(row)) => {
            for (key, value) in patch {
                row.insert(key.clone(), value.clone());
            }
            Envelope::ok(Value::Object(row.clone()))
        }
        _ => Envelope::rejected(format!("record {id} not found")),
    }
}

fn create(base: &str, rows: &mut Vec<Value>, body: Option<Value>) -> Envelope<Value> {
    let Some(Value::Object(mut fields)) = body else {
        return Envelope::rejected("missing body");
    };
    let mut next_id = rows
        .iter()
        .filter_map(|r| r["id"].as_i64())
        .max()
        .unwrap_or(0)
        + 1;

    if base == "/api/redemption" {
        let count = fields.get("count").and_then(Value::as_u64).unwrap_or(1);
        let mut keys = Vec::new();
        for _ in 0..count {
            let key = format!("code-{next_id:08}");
            let mut row: Map<String, Value> = fields.clone();
            row.remove("count");
            row.insert("id".into(), json!(next_id));
            row.insert("key".into(), json!(key));
            row.insert("status".into(), json!(1));
            rows.push(Value::Object(row));
            keys.push(Value::String(key));
            next_id += 1;
        }
        return Envelope::ok(Value::Array(keys));
    }

    fields.insert("id".into(), json!(next_id));
    if fields.get("status").map_or(true, Value::is_null) {
        fields.insert("status".into(), json!(1));
    }
    let row = Value::Object(fields);
    rows.push(row.clone());
    Envelope::ok(row)
}

fn manage_user(inner: &mut Inner, body: Option<&Value>) -> Envelope<Value> {
    let username = body.and_then(|b| b["username"].as_str()).unwrap_or_default();
    let action = body.and_then(|b| b["action"].as_str()).unwrap_or_default();
    let users = inner.collections.entry("/api/user".into()).or_default();
    let Some(index) = users.iter().position(|u| u["username"] == username) else {
        return Envelope::rejected(format!("user {username} not found"));
    };
    if action == "delete" {
        users.remove(index);
        return Envelope::ok_empty();
    }
    let user = &mut users[index];
    match action {
        "enable" => user["status"] = json!(1),
        "disable" => user["status"] = json!(2),
        "promote" => user["role"] = json!(10),
        "demote" => user["role"] = json!(1),
        other => return Envelope::rejected(format!("unknown action {other}")),
    }
    Envelope::ok(json!({ "role": user["role"], "status": user["status"] }))
}

fn test_channel(inner: &mut Inner, rest: &str) -> Envelope<Value> {
    let id = rest.trim_end_matches('/').parse::<i64>().ok();
    let channels = inner.collections.entry("/api/channel".into()).or_default();
    match channels.iter_mut().find(|c| c["id"].as_i64() == id && id.is_some()) {
        Some(channel) => {
            channel["response_time"] = json!(420);
            let mut envelope = Envelope::ok_empty();
            envelope.extra.insert("time".into(), json!(0.42));
            envelope
        }
        None => Envelope::rejected("channel not found"),
    }
}

fn update_balance(inner: &mut Inner, rest: &str) -> Envelope<Value> {
    let id = rest.parse::<i64>().ok();
    let channels = inner.collections.entry("/api/channel".into()).or_default();
    match channels.iter_mut().find(|c| c["id"].as_i64() == id && id.is_some()) {
        Some(channel) => {
            let balance = channel["balance"].as_f64().unwrap_or_default() + 12.5;
            channel["balance"] = json!(balance);
            let mut envelope = Envelope::ok_empty();
            envelope.extra.insert("balance".into(), json!(balance));
            envelope
        }
        None => Envelope::rejected("channel not found"),
    }
}

/// Upsert one `{key, value}` option row.
fn put_option(options: &mut Vec<Value>, body: Option<&Value>) -> Envelope<Value> {
    let Some(key) = body.and_then(|b| b["key"].as_str()) else {
        return Envelope::rejected("missing key");
    };
    let value = body.map(|b| b["value"].clone()).unwrap_or(Value::Null);
    if !value.is_string() {
        return Envelope::rejected(format!("option {key} must be a string"));
    }
    match options.iter_mut().find(|o| o["key"] == key) {
        Some(option) => option["value"] = value,
        None => options.push(json!({ "key": key, "value": value })),
    }
    Envelope::ok_empty()
}
