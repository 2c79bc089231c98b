//! Runtime configuration loaded from environment variables.

use crate::error::ControllerError;
use std::time::Duration;
use tunnel_model::{DEFAULT_MANAGED_BY, OwnershipMarker};

const DEFAULT_POLL_INTERVAL: &str = "30s";

/// All runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub docker: DockerConfig,
    pub cloudflare: CloudflareConfig,
    pub controller: ControllerConfig,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Default)]
pub struct DockerConfig {
    pub host: Option<String>,
    pub api_version: Option<String>,
}

#[derive(Clone)]
pub struct CloudflareConfig {
    pub api_token: String,
    pub account_id: String,
    pub tunnel_id: String,
    pub base_url: String,
}

impl std::fmt::Debug for CloudflareConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareConfig")
            .field("api_token", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("tunnel_id", &self.tunnel_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Loop timing and the mutation gates threaded into each reconciler.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub poll_interval: Duration,
    pub run_once: bool,
    pub dry_run: bool,
    pub manage_tunnel: bool,
    pub manage_dns: bool,
    pub delete_dns: bool,
    pub manage_access: bool,
    pub managed_by: String,
}

impl ControllerConfig {
    pub fn ownership_marker(&self) -> OwnershipMarker {
        OwnershipMarker::new(&self.managed_by)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ControllerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ControllerError::InvalidConfig(format!("invalid LOG_LEVEL: {}", value))),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            get(key).ok_or_else(|| ControllerError::InvalidConfig(format!("missing required {}", key)))
        };
        let flag = |key: &str| -> Result<bool, ControllerError> {
            match get(key) {
                None => Ok(false),
                Some(value) => parse_bool(&value)
                    .ok_or_else(|| ControllerError::InvalidConfig(format!("invalid {}: {:?} is not a boolean", key, value))),
            }
        };

        let interval = get("SYNC_POLL_INTERVAL").unwrap_or_else(|| DEFAULT_POLL_INTERVAL.to_string());
        let poll_interval = parse_duration(&interval)
            .ok_or_else(|| ControllerError::InvalidConfig(format!("invalid SYNC_POLL_INTERVAL: {:?}", interval)))?;

        let log_level = get("LOG_LEVEL").as_deref().unwrap_or("info").parse()?;

        Ok(Self {
            docker: DockerConfig {
                host: get("DOCKER_HOST"),
                api_version: get("DOCKER_API_VERSION"),
            },
            cloudflare: CloudflareConfig {
                api_token: required("CF_API_TOKEN")?,
                account_id: required("CF_ACCOUNT_ID")?,
                tunnel_id: required("CF_TUNNEL_ID")?,
                base_url: get("CF_API_BASE_URL")
                    .unwrap_or_else(|| cloudflare_client::client::DEFAULT_BASE_URL.to_string()),
            },
            controller: ControllerConfig {
                poll_interval,
                run_once: flag("SYNC_RUN_ONCE")?,
                dry_run: flag("SYNC_DRY_RUN")?,
                manage_tunnel: flag("SYNC_MANAGED_TUNNEL")?,
                manage_dns: flag("SYNC_MANAGED_DNS")?,
                delete_dns: flag("SYNC_DELETE_DNS")?,
                manage_access: flag("SYNC_MANAGED_ACCESS")?,
                managed_by: get("SYNC_MANAGED_BY").unwrap_or_else(|| DEFAULT_MANAGED_BY.to_string()),
            },
            log_level,
        })
    }
}

/// `true/t/1/yes` or `false/f/0/no`, case-insensitive.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" => Some(true),
        "false" | "f" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Parse durations like `30s`, `1m30s`, `1h`, `250ms`. Zero is rejected.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let mut total = Duration::ZERO;
    let mut rest = value;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let amount: f64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit() || c == '.').unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        let nanos = (amount * nanos_per_unit).round();
        if !nanos.is_finite() || nanos > u64::MAX as f64 {
            return None;
        }
        total = total.checked_add(Duration::from_nanos(nanos as u64))?;
    }

    (!total.is_zero()).then_some(total)
}
