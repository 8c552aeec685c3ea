//! Module identifiers → constructors.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::convention::{
    ClientAuthModule, LegacyClientAuthModule, LegacyServerAuthModule, ModuleError,
    ServerAuthModule,
};

/// Calling convention a constructed module speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    Current,
    Legacy,
}

impl Convention {
    pub fn as_str(self) -> &'static str {
        match self {
            Convention::Current => "current",
            Convention::Legacy => "legacy",
        }
    }
}

/// A server-side module in either convention.
pub enum ServerModule {
    Current(Box<dyn ServerAuthModule>),
    Legacy(Box<dyn LegacyServerAuthModule>),
}

impl ServerModule {
    pub fn convention(&self) -> Convention {
        match self {
            ServerModule::Current(_) => Convention::Current,
            ServerModule::Legacy(_) => Convention::Legacy,
        }
    }
}

impl fmt::Debug for ServerModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerModule::{:?}", self.convention())
    }
}

/// A client-side module in either convention.
pub enum ClientModule {
    Current(Box<dyn ClientAuthModule>),
    Legacy(Box<dyn LegacyClientAuthModule>),
}

impl ClientModule {
    pub fn convention(&self) -> Convention {
        match self {
            ClientModule::Current(_) => Convention::Current,
            ClientModule::Legacy(_) => Convention::Legacy,
        }
    }
}

impl fmt::Debug for ClientModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientModule::{:?}", self.convention())
    }
}

/// Builds a fresh, uninitialized module.
pub type Constructor<M> = Arc<dyn Fn() -> Result<M, ModuleError> + Send + Sync>;

/// Constructors registered under one module identifier.
#[derive(Clone, Default)]
pub struct ModuleConstructors {
    pub server: Option<Constructor<ServerModule>>,
    pub client: Option<Constructor<ClientModule>>,
}

/// Registry of module constructors, populated at startup and then shared.
///
/// Configuration refers to modules by identifier; an identifier may carry
/// a server constructor, a client constructor, or both.
#[derive(Clone, Default)]
pub struct ModuleFactory {
    modules: HashMap<String, ModuleConstructors>,
}

impl ModuleFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_server<T, F>(&mut self, id: impl Into<String>, make: F) -> &mut Self
    where
        T: ServerAuthModule + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.register_server_with(id, move || {
            Ok(ServerModule::Current(Box::new(make())))
        })
    }

    pub fn register_legacy_server<T, F>(&mut self, id: impl Into<String>, make: F) -> &mut Self
    where
        T: LegacyServerAuthModule + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.register_server_with(id, move || Ok(ServerModule::Legacy(Box::new(make()))))
    }

    pub fn register_client<T, F>(&mut self, id: impl Into<String>, make: F) -> &mut Self
    where
        T: ClientAuthModule + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.register_client_with(id, move || Ok(ClientModule::Current(Box::new(make()))))
    }

    pub fn register_legacy_client<T, F>(&mut self, id: impl Into<String>, make: F) -> &mut Self
    where
        T: LegacyClientAuthModule + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.register_client_with(id, move || Ok(ClientModule::Legacy(Box::new(make()))))
    }

    /// Register a server constructor that may fail.
    pub fn register_server_with<F>(&mut self, id: impl Into<String>, make: F) -> &mut Self
    where
        F: Fn() -> Result<ServerModule, ModuleError> + Send + Sync + 'static,
    {
        let id = id.into();
        tracing::debug!(module = %id, role = "server", "Registered module constructor");
        self.modules.entry(id).or_default().server = Some(Arc::new(make));
        self
    }

    /// Register a client constructor that may fail.
    pub fn register_client_with<F>(&mut self, id: impl Into<String>, make: F) -> &mut Self
    where
        F: Fn() -> Result<ClientModule, ModuleError> + Send + Sync + 'static,
    {
        let id = id.into();
        tracing::debug!(module = %id, role = "client", "Registered module constructor");
        self.modules.entry(id).or_default().client = Some(Arc::new(make));
        self
    }

    pub fn get(&self, id: &str) -> Option<&ModuleConstructors> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// Registered identifiers, sorted.
    pub fn module_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for ModuleFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleFactory")
            .field("modules", &self.module_ids())
            .finish()
    }
}
