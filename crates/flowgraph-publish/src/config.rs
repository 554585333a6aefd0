//! Publish pipeline configuration.
//!
//! Read from environment variables by [`PublishConfig::from_env`]:
//! - `FLOWGRAPH_MAX_PORTAL_DEPTH`: deepest allowed chain of nested external
//!   portals (default: 16)
//! - `FLOWGRAPH_VALIDATE_SECTIONS`: check section placement before
//!   publishing (default: true)
//! - `FLOWGRAPH_VALIDATE_INVITE_TO_PAY`: check invite-to-pay requirements
//!   before publishing (default: true)
//! - `FLOWGRAPH_NAMESPACE_SEPARATOR`: joins a splice point and an imported
//!   node id (default: ".")

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_MAX_PORTAL_DEPTH: &str = "FLOWGRAPH_MAX_PORTAL_DEPTH";
pub const ENV_VALIDATE_SECTIONS: &str = "FLOWGRAPH_VALIDATE_SECTIONS";
pub const ENV_VALIDATE_INVITE_TO_PAY: &str = "FLOWGRAPH_VALIDATE_INVITE_TO_PAY";
pub const ENV_NAMESPACE_SEPARATOR: &str = "FLOWGRAPH_NAMESPACE_SEPARATOR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub max_portal_depth: usize,
    pub validate_sections: bool,
    pub validate_invite_to_pay: bool,
    pub namespace_separator: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        PublishConfig {
            max_portal_depth: 16,
            validate_sections: true,
            validate_invite_to_pay: true,
            namespace_separator: ".".to_string(),
        }
    }
}

fn parse_bool(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { var, value }),
    }
}

impl PublishConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads overrides through `lookup`; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = PublishConfig::default();

        if let Some(value) = lookup(ENV_MAX_PORTAL_DEPTH) {
            config.max_portal_depth = value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: ENV_MAX_PORTAL_DEPTH,
                value,
            })?;
        }
        if let Some(value) = lookup(ENV_VALIDATE_SECTIONS) {
            config.validate_sections = parse_bool(ENV_VALIDATE_SECTIONS, value)?;
        }
        if let Some(value) = lookup(ENV_VALIDATE_INVITE_TO_PAY) {
            config.validate_invite_to_pay = parse_bool(ENV_VALIDATE_INVITE_TO_PAY, value)?;
        }
        if let Some(value) = lookup(ENV_NAMESPACE_SEPARATOR) {
            if value.is_empty() {
                return Err(ConfigError::Invalid {
                    var: ENV_NAMESPACE_SEPARATOR,
                    value,
                });
            }
            config.namespace_separator = value;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(
            PublishConfig::from_lookup(lookup(&[])).unwrap(),
            PublishConfig::default()
        );
    }

    #[test]
    fn reads_overrides() {
        let config = PublishConfig::from_lookup(lookup(&[
            (ENV_MAX_PORTAL_DEPTH, "4"),
            (ENV_VALIDATE_SECTIONS, "false"),
            (ENV_NAMESPACE_SEPARATOR, "/"),
        ]))
        .unwrap();
        assert_eq!(config.max_portal_depth, 4);
        assert!(!config.validate_sections);
        assert!(config.validate_invite_to_pay);
        assert_eq!(config.namespace_separator, "/");
    }

    #[test]
    fn rejects_garbage() {
        let err = PublishConfig::from_lookup(lookup(&[(ENV_MAX_PORTAL_DEPTH, "deep")])).unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_PORTAL_DEPTH));
        assert!(PublishConfig::from_lookup(lookup(&[(ENV_VALIDATE_SECTIONS, "maybe")])).is_err());
    }

    #[test]
    fn deserializes_partial_documents() {
        let config: PublishConfig = serde_json::from_str(r#"{"max_portal_depth": 2}"#).unwrap();
        assert_eq!(config.max_portal_depth, 2);
        assert_eq!(config.namespace_separator, ".");
    }
}
