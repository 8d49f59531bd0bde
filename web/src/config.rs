//! HTTP adapter configuration.
//!
//! | Variable | Default |
//! |---|---|
//! | `HTTP_HOST` | `0.0.0.0` |
//! | `HTTP_PORT` | `8000` |

use serde::{Deserialize, Serialize};

/// Listen address of the HTTP adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl WebConfig {
    /// Load from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` for variable access. Blank or invalid values fall
    /// back to defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: value("HTTP_HOST").unwrap_or(defaults.host),
            port: value("HTTP_PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
        }
    }

    /// `host:port` string for binding.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_bind_all_interfaces_on_8000() {
        let config = WebConfig::from_lookup(|_| None);
        assert_eq!(config.addr(), "0.0.0.0:8000");
    }

    #[test]
    fn environment_overrides_and_fallbacks() {
        let env: HashMap<&str, &str> = [("HTTP_HOST", "127.0.0.1"), ("HTTP_PORT", "not-a-port")]
            .into_iter()
            .collect();
        let config = WebConfig::from_lookup(|key| env.get(key).map(ToString::to_string));
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
    }
}
