//! # Config Resolver
//!
//! Finds the single FederationConfig an intent must use.
//!
//! Selector grammar is `key=value`, one pair, exact match. An empty selector
//! resolves through the deployment default selector (see
//! [`crate::constants::DEFAULT_CONFIG_SELECTOR`]). Zero or several matches are
//! errors; resolution never proceeds with an arbitrary config.

use crate::crd::FederationConfig;
use crate::store::{FederationConfigLister, LabelMatch, StoreError};
use kube::ResourceExt;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    #[error("invalid federation config selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("no FederationConfig matches selector '{selector}'")]
    ConfigNotFound { selector: String },

    #[error("selector '{selector}' matches {} FederationConfigs: {}", .matches.len(), .matches.join(", "))]
    AmbiguousConfig {
        selector: String,
        matches: Vec<String>,
    },

    #[error("failed to list FederationConfigs: {0}")]
    Store(#[from] StoreError),
}

impl ResolveError {
    fn invalid(selector: &str, reason: impl Into<String>) -> Self {
        ResolveError::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parse and validate a `key=value` selector.
///
/// Key: optional DNS-subdomain prefix and `/`, then a 1-63 character name.
/// Value: 1-63 characters, alphanumeric at both ends.
pub fn parse_selector(selector: &str) -> Result<LabelMatch, ResolveError> {
    let selector = selector.trim();

    let parts: Vec<&str> = selector.split('=').collect();
    if parts.len() != 2 {
        return Err(ResolveError::invalid(
            selector,
            "expected exactly one '=' separating key and value",
        ));
    }
    let (key, value) = (parts[0].trim(), parts[1].trim());

    validate_label_key(selector, key)?;
    validate_label_value(selector, value)?;

    Ok(LabelMatch::new(key, value))
}

// RFC 1123 subdomain
static LABEL_PREFIX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("Failed to compile LABEL_PREFIX_REGEX - this should never happen")
});

/// Label key names and label values share one grammar
static LABEL_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$")
        .expect("Failed to compile LABEL_NAME_REGEX - this should never happen")
});

fn validate_label_key(selector: &str, key: &str) -> Result<(), ResolveError> {
    if key.is_empty() {
        return Err(ResolveError::invalid(selector, "label key cannot be empty"));
    }

    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if prefix.is_empty() || prefix.len() > 253 {
            return Err(ResolveError::invalid(
                selector,
                format!("label key prefix '{prefix}' must be 1-253 characters"),
            ));
        }
        if !LABEL_PREFIX_REGEX.is_match(prefix) {
            return Err(ResolveError::invalid(
                selector,
                format!("label key prefix '{prefix}' must be a DNS subdomain"),
            ));
        }
    }

    if name.is_empty() || name.len() > 63 {
        return Err(ResolveError::invalid(
            selector,
            format!("label key name '{name}' must be 1-63 characters"),
        ));
    }
    if !LABEL_NAME_REGEX.is_match(name) {
        return Err(ResolveError::invalid(
            selector,
            format!("label key name '{name}' must be alphanumeric, '-', '_' or '.', starting and ending alphanumeric"),
        ));
    }

    Ok(())
}

fn validate_label_value(selector: &str, value: &str) -> Result<(), ResolveError> {
    if value.is_empty() {
        return Err(ResolveError::invalid(selector, "label value cannot be empty"));
    }
    if value.len() > 63 {
        return Err(ResolveError::invalid(
            selector,
            format!(
                "label value '{value}' exceeds maximum length of 63 characters (got {})",
                value.len()
            ),
        ));
    }
    if !LABEL_NAME_REGEX.is_match(value) {
        return Err(ResolveError::invalid(
            selector,
            format!("label value '{value}' must be alphanumeric, '-', '_' or '.', starting and ending alphanumeric"),
        ));
    }
    Ok(())
}

/// The selector actually used for an intent: its own, or the default when blank
#[must_use]
pub fn effective_selector<'a>(selector: &'a str, default_selector: &'a str) -> &'a str {
    if selector.trim().is_empty() {
        default_selector
    } else {
        selector
    }
}

/// Resolve the FederationConfig selected by `selector`.
pub async fn resolve<L>(
    selector: &str,
    default_selector: &str,
    lister: &L,
) -> Result<FederationConfig, ResolveError>
where
    L: FederationConfigLister + ?Sized,
{
    if selector.trim().is_empty() {
        debug!(
            "No federation config selector, using default selector '{}'",
            default_selector
        );
    }
    let selector = effective_selector(selector, default_selector).trim();
    let label = parse_selector(selector)?;

    let mut configs = lister.list_federation_configs(&label).await?;

    match configs.len() {
        0 => Err(ResolveError::ConfigNotFound {
            selector: selector.to_string(),
        }),
        1 => {
            let config = configs.remove(0);
            debug!(
                "Selector '{}' resolved to FederationConfig {}/{}",
                selector,
                config.namespace().unwrap_or_default(),
                config.name_any()
            );
            Ok(config)
        }
        _ => {
            let mut matches: Vec<String> = configs
                .iter()
                .map(|c| format!("{}/{}", c.namespace().unwrap_or_default(), c.name_any()))
                .collect();
            matches.sort();
            warn!("Selector '{}' is ambiguous: {:?}", selector, matches);
            Err(ResolveError::AmbiguousConfig {
                selector: selector.to_string(),
                matches,
            })
        }
    }
}

/// True when an intent with `selector` would select a config carrying `labels`.
/// Invalid selectors select nothing.
#[must_use]
pub fn selector_matches(
    selector: &str,
    default_selector: &str,
    labels: &BTreeMap<String, String>,
) -> bool {
    parse_selector(effective_selector(selector, default_selector))
        .map(|label| label.matches(Some(labels)))
        .unwrap_or(false)
}
