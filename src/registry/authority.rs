//! Registration authority: the external factory that routes layers to providers.

use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Opaque id handed out by a registration authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RegistrationId(String);

impl RegistrationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The outbound side of default-layer reconciliation.
///
/// The registry treats the authority as the source of truth for which
/// layers currently carry its self-registered default.
pub trait RegistrationAuthority: Send + Sync {
    /// Register `provider` as the default for `layer`.
    fn register_default(&self, provider: &str, layer: &str) -> RegistrationId;

    /// Drop a registration. Returns false if the id was unknown.
    fn unregister(&self, id: &RegistrationId) -> bool;
}

/// A single layer → provider route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub provider: String,
    pub layer: String,
}

/// In-process registration authority.
///
/// Registering a layer that already has a route replaces the old route, as a
/// provider factory would.
#[derive(Debug, Default)]
pub struct InMemoryAuthority {
    registrations: DashMap<RegistrationId, Registration>,
    by_layer: DashMap<String, RegistrationId>,
}

impl InMemoryAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider currently routed for `layer`.
    pub fn provider_for(&self, layer: &str) -> Option<String> {
        let id = self.by_layer.get(layer)?.value().clone();
        self.registrations.get(&id).map(|r| r.provider.clone())
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// Layers with a live route, sorted.
    pub fn routed_layers(&self) -> Vec<String> {
        let mut layers: Vec<String> = self.by_layer.iter().map(|r| r.key().clone()).collect();
        layers.sort();
        layers
    }
}

impl RegistrationAuthority for InMemoryAuthority {
    fn register_default(&self, provider: &str, layer: &str) -> RegistrationId {
        let id = RegistrationId::generate();
        self.registrations.insert(
            id.clone(),
            Registration {
                provider: provider.to_string(),
                layer: layer.to_string(),
            },
        );
        if let Some(previous) = self.by_layer.insert(layer.to_string(), id.clone()) {
            self.registrations.remove(&previous);
        }
        tracing::debug!(layer = %layer, provider = %provider, registration_id = %id, "Registered default provider");
        id
    }

    fn unregister(&self, id: &RegistrationId) -> bool {
        match self.registrations.remove(id) {
            Some((_, registration)) => {
                self.by_layer
                    .remove_if(&registration.layer, |_, current| current == id);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_unregister() {
        let authority = InMemoryAuthority::new();
        let id = authority.register_default("msgsec", "SOAP");

        assert_eq!(authority.provider_for("SOAP").as_deref(), Some("msgsec"));
        assert_eq!(authority.registration_count(), 1);

        assert!(authority.unregister(&id));
        assert!(!authority.unregister(&id));
        assert_eq!(authority.provider_for("SOAP"), None);
        assert!(authority.routed_layers().is_empty());
    }

    #[test]
    fn test_reregistration_replaces_route() {
        let authority = InMemoryAuthority::new();
        let first = authority.register_default("a", "SOAP");
        let second = authority.register_default("b", "SOAP");

        assert_ne!(first, second);
        assert_eq!(authority.provider_for("SOAP").as_deref(), Some("b"));
        assert_eq!(authority.registration_count(), 1);

        // the stale id no longer removes the live route
        assert!(!authority.unregister(&first));
        assert_eq!(authority.provider_for("SOAP").as_deref(), Some("b"));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(RegistrationId::generate(), RegistrationId::generate());
        assert_eq!(RegistrationId::new("r-1").to_string(), "r-1");
    }
}
