//! # Configuration
//!
//! Process-wide controller settings read once at start-up.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `METRICS_PORT` | 5000 |
//! | `FEDERATION_STYLE` | `boundary-protection` |
//! | `DEFAULT_CONFIG_SELECTOR` | `federation.mesh.io/default=true` |
//! | `CONFLICT_REQUEUE_SECS` | 1 |
//! | `PENDING_REQUEUE_SECS` | 30 |
//! | `BACKOFF_MIN_MINUTES` | 1 |
//! | `BACKOFF_MAX_MINUTES` | 10 |
//! | `LOG_FORMAT` | `text` |
//! | `WATCH_NAMESPACE` | empty (all namespaces) |

use crate::constants::{
    DEFAULT_BACKOFF_MAX_MINUTES, DEFAULT_BACKOFF_MIN_MINUTES, DEFAULT_CONFIG_SELECTOR,
    DEFAULT_CONFLICT_REQUEUE_SECS, DEFAULT_FEDERATION_STYLE, DEFAULT_METRICS_PORT,
    DEFAULT_PENDING_REQUEUE_SECS,
};
use crate::controller::resolver::parse_selector;
use crate::observability::logging::LogFormat;
use crate::style::StyleKind;
use anyhow::{anyhow, Context, Result};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub metrics_port: u16,
    pub federation_style: StyleKind,
    /// Selector used for intents with an empty `federationConfigSelector`
    pub default_config_selector: String,
    pub conflict_requeue: Duration,
    /// Requeue interval while an exposure waits for its external address
    pub pending_requeue: Duration,
    pub backoff_min_minutes: u64,
    pub backoff_max_minutes: u64,
    pub log_format: LogFormat,
    /// Restrict intent watches to one namespace. FederationConfigs are
    /// always resolved cluster-wide.
    pub watch_namespace: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            federation_style: StyleKind::BoundaryProtection,
            default_config_selector: DEFAULT_CONFIG_SELECTOR.to_string(),
            conflict_requeue: Duration::from_secs(DEFAULT_CONFLICT_REQUEUE_SECS),
            pending_requeue: Duration::from_secs(DEFAULT_PENDING_REQUEUE_SECS),
            backoff_min_minutes: DEFAULT_BACKOFF_MIN_MINUTES,
            backoff_max_minutes: DEFAULT_BACKOFF_MAX_MINUTES,
            log_format: LogFormat::Text,
            watch_namespace: None,
        }
    }
}

impl ControllerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let federation_style = var("FEDERATION_STYLE")
            .unwrap_or_else(|| DEFAULT_FEDERATION_STYLE.to_string());
        let federation_style = StyleKind::from_str(&federation_style)
            .map_err(|e| anyhow!(e))
            .context("Invalid FEDERATION_STYLE")?;

        let default_config_selector = var("DEFAULT_CONFIG_SELECTOR")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_CONFIG_SELECTOR.to_string());
        parse_selector(&default_config_selector).context("Invalid DEFAULT_CONFIG_SELECTOR")?;

        let log_format = var("LOG_FORMAT")
            .map(|s| LogFormat::from_str(&s))
            .transpose()
            .map_err(|e| anyhow!(e))
            .context("Invalid LOG_FORMAT")?
            .unwrap_or_default();

        let backoff_min_minutes = parse_or(&var, "BACKOFF_MIN_MINUTES", DEFAULT_BACKOFF_MIN_MINUTES).max(1);
        let backoff_max_minutes =
            parse_or(&var, "BACKOFF_MAX_MINUTES", DEFAULT_BACKOFF_MAX_MINUTES).max(backoff_min_minutes);

        Ok(Self {
            metrics_port: parse_or(&var, "METRICS_PORT", DEFAULT_METRICS_PORT),
            federation_style,
            default_config_selector,
            conflict_requeue: Duration::from_secs(
                parse_or(&var, "CONFLICT_REQUEUE_SECS", DEFAULT_CONFLICT_REQUEUE_SECS).max(1),
            ),
            pending_requeue: Duration::from_secs(
                parse_or(&var, "PENDING_REQUEUE_SECS", DEFAULT_PENDING_REQUEUE_SECS).max(1),
            ),
            backoff_min_minutes,
            backoff_max_minutes,
            log_format,
            watch_namespace: var("WATCH_NAMESPACE").map(|s| s.trim().to_string()),
        })
    }
}

/// Parse a numeric variable, keeping the default on absence or garbage
fn parse_or<T, V>(var: &V, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}='{}', using {}", key, raw, default);
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ControllerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = ControllerConfig::from_lookup(lookup(&[
            ("METRICS_PORT", "9090"),
            ("DEFAULT_CONFIG_SELECTOR", "team=east"),
            ("PENDING_REQUEUE_SECS", "5"),
            ("LOG_FORMAT", "json"),
            ("WATCH_NAMESPACE", "shop"),
        ]))
        .unwrap();
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.default_config_selector, "team=east");
        assert_eq!(config.pending_requeue, Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.watch_namespace.as_deref(), Some("shop"));
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config =
            ControllerConfig::from_lookup(lookup(&[("METRICS_PORT", "not-a-port")])).unwrap();
        assert_eq!(config.metrics_port, DEFAULT_METRICS_PORT);
    }

    #[test]
    fn test_backoff_bounds_are_ordered() {
        let config = ControllerConfig::from_lookup(lookup(&[
            ("BACKOFF_MIN_MINUTES", "5"),
            ("BACKOFF_MAX_MINUTES", "2"),
        ]))
        .unwrap();
        assert_eq!(config.backoff_min_minutes, 5);
        assert_eq!(config.backoff_max_minutes, 5);
    }

    #[test]
    fn test_zero_requeue_intervals_are_clamped() {
        let config = ControllerConfig::from_lookup(lookup(&[
            ("CONFLICT_REQUEUE_SECS", "0"),
            ("PENDING_REQUEUE_SECS", "0"),
            ("BACKOFF_MIN_MINUTES", "0"),
        ]))
        .unwrap();
        assert_eq!(config.conflict_requeue, Duration::from_secs(1));
        assert_eq!(config.pending_requeue, Duration::from_secs(1));
        assert_eq!(config.backoff_min_minutes, 1);
    }

    #[test]
    fn test_invalid_style_and_selector_are_errors() {
        assert!(ControllerConfig::from_lookup(lookup(&[("FEDERATION_STYLE", "peering")])).is_err());
        assert!(
            ControllerConfig::from_lookup(lookup(&[("DEFAULT_CONFIG_SELECTOR", "nope")])).is_err()
        );
    }
}
