//! Turning message-security records into a parsed configuration.
//!
//! # Responsibilities
//! - Build one `InterceptEntry` per declared layer
//! - Reject duplicate layers and providers declared against unknown layers
//! - Expand option placeholders, keeping the raw text when a property is missing
//! - Track which layers carry a default provider
//!
//! # Design Decisions
//! - Parsing is all-or-nothing: any error discards the partial result
//! - `SnapshotBuilder` enforces declaration order so other record sources get
//!   the same checks as the TOML loader

use std::collections::{hash_map::Entry, BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;

use crate::config::expand::{expand, EnvProperties, ExpandError, PropertySource};
use crate::config::schema::{MessageSecurityConfig, PolicyConfig, ProviderConfig};
use crate::model::{IdEntry, InterceptEntry, MessagePolicy, Options, ParsedConfig, ProviderType};

/// Errors that abort a parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The records are malformed.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Two records declare the same layer.
    #[error("found multiple message-security entries for auth layer '{0}'")]
    DuplicateLayer(String),

    /// A provider references a layer that has not been declared yet.
    #[error("auth layer '{layer}' must be declared before provider '{provider_id}'")]
    MissingLayerOrder { layer: String, provider_id: String },

    /// A refresh was requested before any configuration was installed.
    #[error("no configuration has been installed")]
    NothingInstalled,
}

/// Produces a parsed configuration from records.
pub trait ConfigParser: Send + Sync {
    fn parse(&self, records: &[MessageSecurityConfig]) -> Result<ParsedConfig, ParseError>;
}

/// Incrementally assembles a `ParsedConfig`.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    by_layer: HashMap<String, InterceptEntry>,
    layers_with_default: BTreeSet<String>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a layer. Must precede every provider of that layer.
    pub fn add_layer(
        &mut self,
        layer: &str,
        default_server_id: Option<String>,
        default_client_id: Option<String>,
    ) -> Result<(), ParseError> {
        if layer.trim().is_empty() {
            return Err(ParseError::Invalid("auth layer name must not be empty".into()));
        }

        let entry = InterceptEntry::new(
            default_client_id.filter(|id| !id.is_empty()),
            default_server_id.filter(|id| !id.is_empty()),
        );

        tracing::debug!(
            layer = %layer,
            default_server_id = ?entry.default_server_id,
            default_client_id = ?entry.default_client_id,
            "Intercept entry"
        );

        match self.by_layer.entry(layer.to_string()) {
            Entry::Occupied(_) => Err(ParseError::DuplicateLayer(layer.to_string())),
            Entry::Vacant(slot) => {
                if entry.has_default() {
                    self.layers_with_default.insert(layer.to_string());
                }
                slot.insert(entry);
                Ok(())
            }
        }
    }

    /// Add a provider to an already declared layer.
    pub fn add_provider(
        &mut self,
        layer: &str,
        provider_id: &str,
        entry: IdEntry,
    ) -> Result<(), ParseError> {
        let intercept = self
            .by_layer
            .get_mut(layer)
            .ok_or_else(|| ParseError::MissingLayerOrder {
                layer: layer.to_string(),
                provider_id: provider_id.to_string(),
            })?;

        tracing::debug!(
            layer = %layer,
            provider_id = %provider_id,
            provider_type = entry.provider_type.as_str(),
            module = %entry.module,
            request_policy = ?entry.request_policy,
            response_policy = ?entry.response_policy,
            options = ?entry.options,
            "ID entry"
        );

        if intercept.id_map.insert(provider_id.to_string(), entry).is_some() {
            tracing::warn!(
                layer = %layer,
                provider_id = %provider_id,
                "Provider id declared twice in layer; keeping the later declaration"
            );
        }
        Ok(())
    }

    pub fn build(self) -> ParsedConfig {
        ParsedConfig {
            by_layer: self.by_layer,
            layers_with_default: self.layers_with_default,
        }
    }
}

/// The standard parser for `[[message_security]]` records.
pub struct MessageSecurityParser {
    properties: Arc<dyn PropertySource>,
}

impl MessageSecurityParser {
    pub fn new(properties: Arc<dyn PropertySource>) -> Self {
        Self { properties }
    }

    /// A parser that expands placeholders from the process environment.
    pub fn from_env() -> Self {
        Self::new(Arc::new(EnvProperties))
    }

    fn id_entry(&self, provider: &ProviderConfig) -> Result<IdEntry, ParseError> {
        if provider.provider_id.trim().is_empty() {
            return Err(ParseError::Invalid("provider id must not be empty".into()));
        }
        if provider.module.trim().is_empty() {
            return Err(ParseError::Invalid(format!(
                "provider '{}' does not name a module",
                provider.provider_id
            )));
        }
        let provider_type = ProviderType::from_declared(&provider.provider_type).ok_or_else(|| {
            ParseError::Invalid(format!(
                "provider '{}' declares unknown type '{}'",
                provider.provider_id, provider.provider_type
            ))
        })?;

        Ok(IdEntry {
            provider_type,
            module: provider.module.clone(),
            request_policy: policy(provider.request_policy.as_ref()),
            response_policy: policy(provider.response_policy.as_ref()),
            options: self.expand_options(provider),
        })
    }

    fn expand_options(&self, provider: &ProviderConfig) -> Options {
        provider
            .options
            .iter()
            .map(|(name, raw)| {
                let value = match expand(raw, self.properties.as_ref()) {
                    Ok(value) => value,
                    Err(ExpandError::Unresolved(placeholder)) => {
                        tracing::warn!(
                            provider_id = %provider.provider_id,
                            option = %name,
                            placeholder = %placeholder,
                            "Unable to expand provider option, passing unexpanded value to provider"
                        );
                        raw.clone()
                    }
                };
                (name.clone(), value)
            })
            .collect()
    }
}

impl Default for MessageSecurityParser {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ConfigParser for MessageSecurityParser {
    fn parse(&self, records: &[MessageSecurityConfig]) -> Result<ParsedConfig, ParseError> {
        let mut builder = SnapshotBuilder::new();
        for record in records {
            builder.add_layer(
                &record.auth_layer,
                record.default_provider.clone(),
                record.default_client_provider.clone(),
            )?;
            for provider in &record.providers {
                let entry = self.id_entry(provider)?;
                builder.add_provider(&record.auth_layer, &provider.provider_id, entry)?;
            }
        }
        Ok(builder.build())
    }
}

fn policy(config: Option<&PolicyConfig>) -> Option<MessagePolicy> {
    config.and_then(|c| MessagePolicy::from_parts(c.auth_source, c.auth_recipient))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::expand::MapProperties;
    use crate::config::loader::parse_config;
    use crate::model::AuthSource;

    const SAMPLE: &str = r#"
        [[message_security]]
        auth_layer = "HttpServlet"
        default_provider = "p1"

        [[message_security.provider]]
        provider_id = "p1"
        provider_type = "server"
        module = "form-login"
        request_policy = { auth_source = "sender" }
        options = { realm = "${realm.name}", escaped = "${{realm.name}}", broken = "${nope}" }

        [[message_security]]
        auth_layer = "SOAP"

        [[message_security.provider]]
        provider_id = "x509"
        provider_type = "client-server"
        module = "x509-signature"
    "#;

    fn parser(props: Arc<MapProperties>) -> MessageSecurityParser {
        MessageSecurityParser::new(props)
    }

    #[test]
    fn test_parse_sample() {
        let props = Arc::new(MapProperties::from_iter([("realm.name", "file")]));
        let records = parse_config(SAMPLE).unwrap().message_security;
        let parsed = parser(props).parse(&records).unwrap();

        assert_eq!(parsed.by_layer.len(), 2);
        assert_eq!(
            parsed.layers_with_default.iter().collect::<Vec<_>>(),
            vec!["HttpServlet"]
        );

        let servlet = &parsed.by_layer["HttpServlet"];
        assert_eq!(servlet.default_server_id.as_deref(), Some("p1"));
        let p1 = &servlet.id_map["p1"];
        assert_eq!(p1.provider_type, ProviderType::Server);
        assert_eq!(
            p1.request_policy.as_ref().and_then(|p| p.auth_source),
            Some(AuthSource::Sender)
        );
        assert_eq!(p1.response_policy, None);
        assert_eq!(p1.options["realm"], "file");
        assert_eq!(p1.options["escaped"], "${realm.name}");
        // unresolved placeholders fall back to the raw text
        assert_eq!(p1.options["broken"], "${nope}");

        let soap = &parsed.by_layer["SOAP"];
        assert_eq!(soap.id_map["x509"].provider_type, ProviderType::ClientServer);
    }

    #[test]
    fn test_duplicate_layer_is_rejected() {
        let records = parse_config(
            r#"
            [[message_security]]
            auth_layer = "SOAP"
            [[message_security]]
            auth_layer = "SOAP"
            "#,
        )
        .unwrap()
        .message_security;

        let err = MessageSecurityParser::default().parse(&records).unwrap_err();
        assert_eq!(err, ParseError::DuplicateLayer("SOAP".into()));
    }

    #[test]
    fn test_provider_before_layer_is_rejected() {
        let mut builder = SnapshotBuilder::new();
        let entry = IdEntry {
            provider_type: ProviderType::Server,
            module: "m".into(),
            request_policy: None,
            response_policy: None,
            options: Options::new(),
        };

        let err = builder.add_provider("SOAP", "p1", entry.clone()).unwrap_err();
        assert!(matches!(err, ParseError::MissingLayerOrder { ref layer, .. } if layer == "SOAP"));

        builder.add_layer("SOAP", None, None).unwrap();
        builder.add_provider("SOAP", "p1", entry).unwrap();
        let parsed = builder.build();
        assert!(parsed.layers_with_default.is_empty());
        assert!(parsed.by_layer["SOAP"].id_map.contains_key("p1"));
    }

    #[test]
    fn test_unknown_provider_type_is_invalid() {
        let records = parse_config(
            r#"
            [[message_security]]
            auth_layer = "SOAP"
            [[message_security.provider]]
            provider_id = "p1"
            provider_type = "gateway"
            module = "m"
            "#,
        )
        .unwrap()
        .message_security;

        let err = MessageSecurityParser::default().parse(&records).unwrap_err();
        assert!(matches!(err, ParseError::Invalid(_)));
    }

    #[test]
    fn test_empty_default_ids_do_not_count() {
        let mut builder = SnapshotBuilder::new();
        builder.add_layer("SOAP", Some(String::new()), None).unwrap();
        assert!(builder.build().layers_with_default.is_empty());
    }

    #[test]
    fn test_expansion_happens_at_parse_time() {
        let props = Arc::new(MapProperties::from_iter([("realm.name", "file")]));
        let records = parse_config(SAMPLE).unwrap().message_security;
        let parser = parser(props.clone());

        let first = parser.parse(&records).unwrap();
        props.set("realm.name", "ldap");
        let second = parser.parse(&records).unwrap();

        assert_eq!(first.by_layer["HttpServlet"].id_map["p1"].options["realm"], "file");
        assert_eq!(second.by_layer["HttpServlet"].id_map["p1"].options["realm"], "ldap");
    }
}
