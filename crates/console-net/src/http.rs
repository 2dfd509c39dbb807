use std::future::Future;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use console_shared::error::{ConsoleError, Result};
use console_shared::protocol::{ApiRequest, Envelope, Method, Transport};

use crate::config::TransportConfig;

/// [`Transport`] over HTTP.
///
/// Every response body is decoded as an envelope regardless of the HTTP
/// status, since the gateway reports most failures as `success=false` with a
/// 200. `success` itself is left for the caller to interpret.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: TransportConfig,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConsoleError::Network(format!("HTTP client init: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn execute(&self, request: ApiRequest) -> Result<Envelope<Value>> {
        let url = self.config.url(&request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &url)
            .header(ACCEPT, "application/json")
            .header(ACCEPT_LANGUAGE, &self.config.language);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &self.config.access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, path = %request.path, "Gateway request");

        let response = builder.send().await.map_err(|e| self.network_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.network_error(e))?;

        match Envelope::decode(&body) {
            Ok(envelope) => {
                debug!(
                    path = %request.path,
                    status = status.as_u16(),
                    success = envelope.success,
                    "Gateway response"
                );
                Ok(envelope)
            }
            Err(_) if !status.is_success() => {
                warn!(path = %request.path, status = status.as_u16(), "Gateway error status");
                Err(ConsoleError::ServerRejected(format!("HTTP {status}")))
            }
            Err(e) => {
                warn!(path = %request.path, error = %e, "Undecodable gateway response");
                Err(e)
            }
        }
    }

    fn network_error(&self, e: reqwest::Error) -> ConsoleError {
        if e.is_timeout() {
            ConsoleError::Network(format!(
                "request timed out after {}s",
                self.config.timeout.as_secs_f64()
            ))
        } else {
            ConsoleError::Network(e.to_string())
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<Envelope<Value>>> + Send {
        self.execute(request)
    }
}
