//! Request and response shapes of the gateway's REST API.
//!
//! Every endpoint answers with the same envelope, `{success, message, data}`.
//! Decoding happens once, at the transport boundary, into [`Envelope`]; the
//! typed accessors on `Envelope<Value>` then validate `data` for the caller.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConsoleError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A single call against the gateway, independent of the HTTP client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute path below the gateway root, e.g. `/api/channel/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Append one query parameter.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_pairs(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    /// First value of a query parameter, if present.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// The `{success, message, data}` wrapper used by every gateway response.
///
/// Fields outside the envelope (the channel test endpoint reports `time` next
/// to `data`, for instance) are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default = "none")]
    pub data: Option<T>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn none<T>() -> Option<T> {
    None
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: String::new(),
            data: Some(data),
            extra: Map::new(),
        }
    }

    pub fn ok_empty() -> Self {
        Self {
            success: true,
            message: String::new(),
            data: None,
            extra: Map::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            extra: Map::new(),
        }
    }

    /// Turn `success=false` into [`ConsoleError::ServerRejected`].
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(ConsoleError::ServerRejected(self.message))
        }
    }
}

impl Envelope<Value> {
    /// Decode a raw response body, failing fast on anything that is not an envelope.
    pub fn decode(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(ConsoleError::malformed)
    }

    /// `data` as a list of records. The gateway sends `null` for empty lists.
    pub fn data_list<R: DeserializeOwned>(self) -> Result<Vec<R>> {
        match self.data {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value).map_err(ConsoleError::malformed),
        }
    }

    /// `data` decoded as a single value; absence is malformed.
    pub fn data_as<R: DeserializeOwned>(self) -> Result<R> {
        match self.data {
            None | Some(Value::Null) => Err(ConsoleError::malformed("missing data")),
            Some(value) => serde_json::from_value(value).map_err(ConsoleError::malformed),
        }
    }

    /// `data` as a JSON object; absence or any other shape is malformed.
    pub fn data_object(self) -> Result<Map<String, Value>> {
        match self.data {
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(ConsoleError::malformed(format!(
                "expected an object in data, got {other}"
            ))),
            None => Err(ConsoleError::malformed("missing data")),
        }
    }

    /// `data` as an affected-row count.
    pub fn data_count(self) -> Result<usize> {
        self.data_as::<u64>().map(|n| n as usize)
    }

    /// A numeric field sent next to the envelope fields.
    pub fn extra_f64(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(Value::as_f64)
    }
}

/// The REST collaborator every collection store talks to.
///
/// Implementations decode the response body into an [`Envelope`] but do not
/// interpret `success`; that is left to the caller.
pub trait Transport: Send + Sync {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<Envelope<Value>>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<Envelope<Value>>> + Send {
        (**self).send(request)
    }
}
