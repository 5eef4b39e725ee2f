use crate::error::{Result, TrackerError};
use std::time::Duration;

pub const DEFAULT_FALLBACK_DELAY: Duration = Duration::from_secs(60);

/// Runtime settings for the tracker and its network adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Base URL of the REST backend, e.g. `https://api.example.com/api`.
    pub api_base_url: String,
    /// Base URL of the push channel, e.g. `wss://api.example.com/ws`.
    pub ws_base_url: String,
    /// Bearer token sent with every REST request. Never logged.
    pub api_token: Option<String>,
    /// How long to wait for a push confirmation before querying the gateway.
    pub fallback_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            ws_base_url: "ws://localhost:5000/ws".to_string(),
            api_token: None,
            fallback_delay: DEFAULT_FALLBACK_DELAY,
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl TrackerConfig {
    /// Defaults overridden by `PAYMENT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(url) = lookup("PAYMENT_API_URL") {
            cfg.api_base_url = url;
        }
        if let Some(url) = lookup("PAYMENT_WS_URL") {
            cfg.ws_base_url = url;
        }
        cfg.api_token = lookup("PAYMENT_API_TOKEN").filter(|token| !token.is_empty());
        if let Some(secs) = lookup("PAYMENT_FALLBACK_DELAY_SECS") {
            cfg.fallback_delay = parse_secs("PAYMENT_FALLBACK_DELAY_SECS", &secs)?;
        }
        if let Some(secs) = lookup("PAYMENT_REQUEST_TIMEOUT_SECS") {
            cfg.request_timeout = parse_secs("PAYMENT_REQUEST_TIMEOUT_SECS", &secs)?;
        }
        Ok(cfg)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| TrackerError::ConfigError(format!("{key} must be whole seconds, got {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_without_env() {
        let cfg = TrackerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg, TrackerConfig::default());
        assert_eq!(cfg.fallback_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PAYMENT_API_URL", "https://billing.example.com/api"),
            ("PAYMENT_API_TOKEN", ""),
            ("PAYMENT_FALLBACK_DELAY_SECS", "90"),
        ]);
        let cfg = TrackerConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(cfg.api_base_url, "https://billing.example.com/api");
        assert_eq!(cfg.api_token, None);
        assert_eq!(cfg.fallback_delay, Duration::from_secs(90));
    }

    #[test]
    fn test_invalid_delay_is_rejected() {
        let result = TrackerConfig::from_lookup(|key| {
            (key == "PAYMENT_FALLBACK_DELAY_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(TrackerError::ConfigError(_))));
    }
}
