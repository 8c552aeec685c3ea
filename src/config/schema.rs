//! Configuration schema definitions.
//!
//! This module defines the on-disk configuration structure for the registry
//! daemon. All types derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{AuthRecipient, AuthSource};

/// Root configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MsgsecConfig {
    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Registry identity and reload behaviour.
    pub registry: RegistrySettings,

    /// One record per message layer, in declaration order.
    pub message_security: Vec<MessageSecurityConfig>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Registry settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Name this registry registers under with the registration authority.
    pub provider_name: String,

    /// Poll interval for the config file watcher, in seconds.
    pub watch_poll_secs: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            provider_name: "msgsec: self registration".to_string(),
            watch_poll_secs: 2,
        }
    }
}

/// Providers configured for one message layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageSecurityConfig {
    /// Layer name (e.g., "HttpServlet", "SOAP").
    pub auth_layer: String,

    /// Default provider id for the server role.
    #[serde(default)]
    pub default_provider: Option<String>,

    /// Default provider id for the client role.
    #[serde(default)]
    pub default_client_provider: Option<String>,

    /// Provider blocks, in declaration order.
    #[serde(default, rename = "provider")]
    pub providers: Vec<ProviderConfig>,
}

/// A single provider block.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Provider id, unique within its layer.
    pub provider_id: String,

    /// Declared roles: "client", "server" or "client-server".
    pub provider_type: String,

    /// Module factory identifier.
    #[serde(alias = "class_name")]
    pub module: String,

    #[serde(default)]
    pub request_policy: Option<PolicyConfig>,

    #[serde(default)]
    pub response_policy: Option<PolicyConfig>,

    /// Module options. Values may contain `${name}` placeholders.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Declared request or response policy.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub auth_source: Option<AuthSource>,
    pub auth_recipient: Option<AuthRecipient>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: MsgsecConfig = toml::from_str("").unwrap();
        assert_eq!(config.observability.log_level, "info");
        assert!(!config.observability.metrics_enabled);
        assert_eq!(config.registry.watch_poll_secs, 2);
        assert!(config.message_security.is_empty());
    }

    #[test]
    fn test_provider_blocks_deserialize() {
        let config: MsgsecConfig = toml::from_str(
            r#"
            [[message_security]]
            auth_layer = "HttpServlet"
            default_provider = "p1"

            [[message_security.provider]]
            provider_id = "p1"
            provider_type = "server"
            class_name = "form-login"
            request_policy = { auth_source = "sender" }
            options = { realm = "file" }
            "#,
        )
        .unwrap();

        let layer = &config.message_security[0];
        assert_eq!(layer.auth_layer, "HttpServlet");
        assert_eq!(layer.default_provider.as_deref(), Some("p1"));
        assert_eq!(layer.default_client_provider, None);

        let provider = &layer.providers[0];
        assert_eq!(provider.module, "form-login");
        assert_eq!(
            provider.request_policy.as_ref().and_then(|p| p.auth_source),
            Some(AuthSource::Sender)
        );
        assert!(provider.response_policy.is_none());
        assert_eq!(provider.options["realm"], "file");
    }
}
