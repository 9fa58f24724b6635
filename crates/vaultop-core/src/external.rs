//! The declarative external configuration applied by Configure.
//!
//! Decoding is strict at the top level and inside `purgeUnmanagedConfig`:
//! an unknown field is an error, never silently dropped. That strictness
//! is a safety feature: with the purge option enabled, a typo'd section
//! name would otherwise read as "this resource is unmanaged, delete it".
//! The elements of each section are opaque to the operator; their inner
//! shape belongs to Vault.

use serde::Deserialize;
use serde_json::Value;

use crate::error::OperatorError;

/// Top-level external configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalConfig {
    #[serde(default, rename = "purgeUnmanagedConfig")]
    pub purge_unmanaged_config: PurgeUnmanagedConfig,
    #[serde(default)]
    pub audit: Vec<Value>,
    #[serde(default)]
    pub auth: Vec<Value>,
    #[serde(default)]
    pub groups: Vec<Value>,
    #[serde(default, rename = "group-aliases")]
    pub group_aliases: Vec<Value>,
    #[serde(default)]
    pub plugins: Vec<Value>,
    #[serde(default)]
    pub policies: Vec<Value>,
    #[serde(default)]
    pub secrets: Vec<Value>,
    #[serde(default, rename = "startupSecrets")]
    pub startup_secrets: Vec<Value>,
}

/// Controls purging of resources not present in the managed config. The
/// purge pass itself belongs to the full declarative configurator; the
/// operator only decodes the shape strictly.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurgeUnmanagedConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub exclude: PurgeExclude,
}

/// Per-resource opt-outs from purging.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurgeExclude {
    #[serde(default)]
    pub audit: bool,
    #[serde(default)]
    pub auth: bool,
    #[serde(default)]
    pub groups: bool,
    #[serde(default, rename = "group-aliases")]
    pub group_aliases: bool,
    #[serde(default)]
    pub plugins: bool,
    #[serde(default)]
    pub policies: bool,
    #[serde(default)]
    pub secrets: bool,
}

impl ExternalConfig {
    /// Decode an incoming document onto a fresh default instance.
    ///
    /// # Errors
    ///
    /// [`OperatorError::Config`] on unknown fields or type mismatches.
    pub fn decode(document: Value) -> Result<Self, OperatorError> {
        serde_json::from_value(document).map_err(|err| OperatorError::Config {
            reason: format!("error decoding external config: {err}"),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_document_decodes_to_defaults() {
        let cfg = ExternalConfig::decode(json!({})).unwrap();
        assert!(cfg.audit.is_empty());
        assert!(cfg.policies.is_empty());
        assert!(!cfg.purge_unmanaged_config.enabled);
    }

    #[test]
    fn recognized_sections_decode() {
        let cfg = ExternalConfig::decode(json!({
            "purgeUnmanagedConfig": {
                "enabled": true,
                "exclude": { "audit": true, "group-aliases": true }
            },
            "audit": [{"type": "file"}],
            "auth": [{"type": "kubernetes", "path": "kubernetes"}],
            "groups": [{"name": "admins"}],
            "group-aliases": [{"name": "admins-alias"}],
            "plugins": [{"plugin_name": "mysql", "type": "database"}],
            "policies": [{"name": "allow_secrets", "rules": "path ..."}],
            "secrets": [{"type": "kv", "path": "secret"}],
            "startupSecrets": [{"type": "kv", "path": "secret/data/app", "data": {}}]
        }))
        .unwrap();

        assert!(cfg.purge_unmanaged_config.enabled);
        assert!(cfg.purge_unmanaged_config.exclude.audit);
        assert!(cfg.purge_unmanaged_config.exclude.group_aliases);
        assert!(!cfg.purge_unmanaged_config.exclude.policies);
        assert_eq!(cfg.audit.len(), 1);
        assert_eq!(cfg.group_aliases.len(), 1);
        assert_eq!(cfg.startup_secrets.len(), 1);
    }

    #[test]
    fn unknown_top_level_field_is_an_error() {
        let err = ExternalConfig::decode(json!({ "polices": [] })).unwrap_err();
        assert!(matches!(err, OperatorError::Config { .. }));
    }

    #[test]
    fn unknown_purge_field_is_an_error() {
        let err = ExternalConfig::decode(json!({
            "purgeUnmanagedConfig": { "enabled": true, "excludes": {} }
        }))
        .unwrap_err();
        assert!(matches!(err, OperatorError::Config { .. }));
    }

    #[test]
    fn unknown_exclude_resource_is_an_error() {
        let err = ExternalConfig::decode(json!({
            "purgeUnmanagedConfig": { "exclude": { "tokens": true } }
        }))
        .unwrap_err();
        assert!(matches!(err, OperatorError::Config { .. }));
    }

    #[test]
    fn inner_element_shapes_are_opaque() {
        // Unrecognized fields inside list elements are fine; only the
        // operator-facing layers are strict.
        let cfg = ExternalConfig::decode(json!({
            "secrets": [{"type": "kv", "path": "secret", "anything": {"goes": true}}]
        }))
        .unwrap();
        assert_eq!(cfg.secrets.len(), 1);
    }
}
