use anyhow::{Context, Result};
use escalation_core::{DispatchConfig, EscalationConfig, NotifyChannel};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_channel_timeout_secs() -> u64 {
    8
}

/// Hosted backend (REST tables + notification relay functions).
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSettings {
    /// Upper bound on one channel send, in seconds.
    #[serde(default = "default_channel_timeout_secs")]
    pub channel_timeout_secs: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            channel_timeout_secs: default_channel_timeout_secs(),
        }
    }
}

impl DispatchSettings {
    pub fn to_dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            channel_timeout: Duration::from_secs(self.channel_timeout_secs.max(1)),
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Required for live escalation; dry runs work without it.
    pub backend: Option<BackendConfig>,
    pub escalation: EscalationConfig,
    pub dispatch: DispatchSettings,
}

/// On-disk layout of the TOML config file.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    backend: Option<BackendConfig>,
    #[serde(default)]
    escalation: EscalationConfig,
    #[serde(default)]
    dispatch: DispatchSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let mut escalation = EscalationConfig::default();
        if let Some(threshold) = env_parse::<f64>("ESCALATION_CONFIDENCE_THRESHOLD") {
            escalation.confidence_threshold = threshold;
        }
        if let Some(threshold) = env_parse::<u32>("ESCALATION_FAILURE_THRESHOLD") {
            escalation.failure_count_threshold = threshold;
        }
        if let Ok(ids) = std::env::var("ESCALATION_VIP_IDS") {
            escalation.vip_customer_ids = split_list(&ids).map(str::to_string).collect();
        }
        if let Ok(raw) = std::env::var("ESCALATION_CHANNELS") {
            escalation.notify_channels = parse_channels(&raw);
        }

        let dispatch = DispatchSettings {
            channel_timeout_secs: env_parse("ESCALATION_CHANNEL_TIMEOUT_SECS")
                .unwrap_or_else(default_channel_timeout_secs),
        };

        Self {
            backend: Self::backend_from_env(),
            escalation,
            dispatch,
        }
    }
}

impl ServiceConfig {
    fn backend_from_env() -> Option<BackendConfig> {
        let url = std::env::var("ESCALATION_BACKEND_URL").ok()?;
        let api_key = std::env::var("ESCALATION_BACKEND_KEY").ok()?;
        Some(BackendConfig {
            url,
            api_key,
            request_timeout_secs: default_request_timeout_secs(),
        })
    }

    /// Load from a TOML file. Missing tables fall back to defaults; a missing
    /// `[backend]` table falls back to the environment.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw).context("Failed to parse TOML")?;
        let config = Self {
            backend: file.backend.or_else(Self::backend_from_env),
            escalation: file.escalation,
            dispatch: file.dispatch,
        };
        config.validate()?;
        Ok(config)
    }

    /// File if given, otherwise environment defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_toml_file(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.escalation
            .validate()
            .context("Invalid [escalation] settings")?;
        if let Some(backend) = &self.backend {
            anyhow::ensure!(!backend.url.trim().is_empty(), "backend url is empty");
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_channels(raw: &str) -> BTreeSet<NotifyChannel> {
    split_list(raw)
        .filter_map(|name| match name.parse() {
            Ok(channel) => Some(channel),
            Err(e) => {
                warn!(error = %e, "ignoring notification channel");
                None
            }
        })
        .collect()
}
