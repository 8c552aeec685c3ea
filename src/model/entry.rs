//! Provider entries and the roles they serve.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::model::{MessagePolicy, Options};

/// Side of a message exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Server => "server",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "server" => Ok(Role::Server),
            other => Err(format!("unknown role '{}', expected client or server", other)),
        }
    }
}

/// Roles a configured provider may serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    Client,
    Server,
    ClientServer,
}

impl ProviderType {
    /// Interpret a declared type string.
    ///
    /// A declared type covers every role whose name it contains, so
    /// `"client-server"` covers both sides.
    pub fn from_declared(declared: &str) -> Option<Self> {
        match (declared.contains("client"), declared.contains("server")) {
            (true, true) => Some(ProviderType::ClientServer),
            (true, false) => Some(ProviderType::Client),
            (false, true) => Some(ProviderType::Server),
            (false, false) => None,
        }
    }

    /// Returns true if a provider of this type may serve `role`.
    pub fn supports(self, role: Role) -> bool {
        matches!(
            (self, role),
            (ProviderType::ClientServer, _)
                | (ProviderType::Client, Role::Client)
                | (ProviderType::Server, Role::Server)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderType::Client => "client",
            ProviderType::Server => "server",
            ProviderType::ClientServer => "client-server",
        }
    }
}

/// One configured provider within a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdEntry {
    pub provider_type: ProviderType,
    /// Identifier of the module factory that builds this provider's module.
    pub module: String,
    pub request_policy: Option<MessagePolicy>,
    pub response_policy: Option<MessagePolicy>,
    pub options: Options,
}

/// All providers configured for one message layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InterceptEntry {
    pub default_client_id: Option<String>,
    pub default_server_id: Option<String>,
    pub id_map: HashMap<String, IdEntry>,
}

impl InterceptEntry {
    pub fn new(default_client_id: Option<String>, default_server_id: Option<String>) -> Self {
        Self {
            default_client_id,
            default_server_id,
            id_map: HashMap::new(),
        }
    }

    /// Default provider id for the given role, if one is configured.
    pub fn default_id(&self, role: Role) -> Option<&str> {
        match role {
            Role::Client => self.default_client_id.as_deref(),
            Role::Server => self.default_server_id.as_deref(),
        }
    }

    /// Returns true if either role has a default provider.
    pub fn has_default(&self) -> bool {
        self.default_client_id.is_some() || self.default_server_id.is_some()
    }
}

/// Outcome of a successful resolution.
///
/// Carries the effective policies, which may come from the caller rather
/// than from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEntry {
    pub module: String,
    pub request_policy: Option<MessagePolicy>,
    pub response_policy: Option<MessagePolicy>,
    pub options: Options,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_containment() {
        assert_eq!(ProviderType::from_declared("server"), Some(ProviderType::Server));
        assert_eq!(ProviderType::from_declared("client"), Some(ProviderType::Client));
        assert_eq!(
            ProviderType::from_declared("client-server"),
            Some(ProviderType::ClientServer)
        );
        assert_eq!(ProviderType::from_declared("gateway"), None);
    }

    #[test]
    fn test_provider_type_supports_roles() {
        assert!(ProviderType::ClientServer.supports(Role::Client));
        assert!(ProviderType::ClientServer.supports(Role::Server));
        assert!(ProviderType::Server.supports(Role::Server));
        assert!(!ProviderType::Server.supports(Role::Client));
        assert!(!ProviderType::Client.supports(Role::Server));
    }

    #[test]
    fn test_default_id_by_role() {
        let entry = InterceptEntry::new(Some("c1".into()), None);
        assert_eq!(entry.default_id(Role::Client), Some("c1"));
        assert_eq!(entry.default_id(Role::Server), None);
        assert!(entry.has_default());
        assert!(!InterceptEntry::default().has_default());
    }
}
