// HTTP transport to the gateway's REST API, built on reqwest.

pub mod config;
pub mod http;

pub use config::TransportConfig;
pub use http::HttpTransport;
