//! Console configuration loaded from environment variables.
//!
//! Every setting has a default so the console can start against a local
//! gateway with zero configuration.

use std::path::PathBuf;
use std::time::Duration;

use console_net::TransportConfig;
use console_shared::constants::{DEFAULT_LANGUAGE, DEFAULT_SERVER_URL, DEFAULT_TIMEOUT_SECS};

/// Console configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Gateway root URL.
    /// Env: `CONSOLE_SERVER_URL`
    /// Default: `http://localhost:3000`
    pub server_url: String,

    /// Admin access token, sent as a bearer token.
    /// Env: `CONSOLE_ACCESS_TOKEN`
    /// Default: none (session-less requests).
    pub access_token: Option<String>,

    /// `Accept-Language` for server messages.
    /// Env: `CONSOLE_LANGUAGE`
    /// Default: `en`
    pub language: String,

    /// HTTP request timeout in seconds.
    /// Env: `CONSOLE_TIMEOUT_SECS`
    /// Default: `30`
    pub timeout_secs: u64,

    /// Location of the preferences database.
    /// Env: `CONSOLE_SETTINGS_PATH`
    /// Default: the platform data directory.
    pub settings_path: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            access_token: None,
            language: DEFAULT_LANGUAGE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            settings_path: None,
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("CONSOLE_SERVER_URL") {
            let url = url.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                config.server_url = url.trim_end_matches('/').to_string();
            } else {
                tracing::warn!(value = %url, "Invalid CONSOLE_SERVER_URL, using default");
            }
        }

        if let Some(token) = lookup("CONSOLE_ACCESS_TOKEN") {
            if !token.trim().is_empty() {
                config.access_token = Some(token.trim().to_string());
            }
        }

        if let Some(language) = lookup("CONSOLE_LANGUAGE") {
            if !language.trim().is_empty() {
                config.language = language.trim().to_string();
            }
        }

        if let Some(val) = lookup("CONSOLE_TIMEOUT_SECS") {
            match val.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout_secs = secs,
                _ => tracing::warn!(value = %val, "Invalid CONSOLE_TIMEOUT_SECS, using default"),
            }
        }

        if let Some(path) = lookup("CONSOLE_SETTINGS_PATH") {
            if !path.trim().is_empty() {
                config.settings_path = Some(PathBuf::from(path.trim()));
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    pub fn transport_config(&self) -> TransportConfig {
        let config = TransportConfig::new(&self.server_url)
            .with_language(&self.language)
            .with_timeout(Duration::from_secs(self.timeout_secs));
        match &self.access_token {
            Some(token) => config.with_access_token(token),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> ConsoleConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConsoleConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = load(&[]);
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.server_url, "http://localhost:3000");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("CONSOLE_SERVER_URL", "https://gw.example.com/"),
            ("CONSOLE_ACCESS_TOKEN", "abc"),
            ("CONSOLE_LANGUAGE", "zh-CN"),
            ("CONSOLE_TIMEOUT_SECS", "5"),
            ("CONSOLE_SETTINGS_PATH", "/tmp/console.db"),
        ]);
        assert_eq!(config.server_url, "https://gw.example.com");
        assert_eq!(config.access_token.as_deref(), Some("abc"));
        assert_eq!(config.language, "zh-CN");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.settings_path, Some(PathBuf::from("/tmp/console.db")));

        let transport = config.transport_config();
        assert_eq!(transport.timeout, Duration::from_secs(5));
        assert_eq!(transport.access_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = load(&[
            ("CONSOLE_SERVER_URL", "gw.example.com"),
            ("CONSOLE_TIMEOUT_SECS", "soon"),
            ("CONSOLE_ACCESS_TOKEN", "   "),
        ]);
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.access_token.is_none());
    }
}
