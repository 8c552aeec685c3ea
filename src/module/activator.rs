//! Module activation: construct, merge options, initialize.

use std::sync::Arc;
use thiserror::Error;

use super::convention::{CallbackHandler, LegacyAuthPolicy, ModuleError};
use super::factory::{ClientModule, Constructor, Convention, ModuleFactory, ServerModule};
use crate::model::{MessagePolicy, Options, ResolvedEntry, Role};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("no module registered as '{0}'")]
    UnknownModule(String),

    #[error("module '{module}' has no {role} constructor")]
    UnsupportedRole { module: String, role: Role },

    #[error("failed to construct module '{module}': {source}")]
    Construction {
        module: String,
        #[source]
        source: ModuleError,
    },

    #[error("failed to initialize module '{module}': {source}")]
    Initialization {
        module: String,
        #[source]
        source: ModuleError,
    },
}

/// An initialized module together with the options it was initialized with.
#[derive(Debug)]
pub struct ActivatedModule<M> {
    pub module: M,
    pub options: Options,
}

/// A convention-tagged module for one role.
pub trait RoleModule: Sized {
    const ROLE: Role;

    fn constructor(factory: &ModuleFactory, id: &str) -> Option<Constructor<Self>>;

    fn convention(&self) -> Convention;

    fn initialize(
        &mut self,
        request_policy: Option<&MessagePolicy>,
        response_policy: Option<&MessagePolicy>,
        handler: Arc<dyn CallbackHandler>,
        options: &Options,
    ) -> Result<(), ModuleError>;
}

impl RoleModule for ServerModule {
    const ROLE: Role = Role::Server;

    fn constructor(factory: &ModuleFactory, id: &str) -> Option<Constructor<Self>> {
        factory.get(id)?.server.clone()
    }

    fn convention(&self) -> Convention {
        ServerModule::convention(self)
    }

    fn initialize(
        &mut self,
        request_policy: Option<&MessagePolicy>,
        response_policy: Option<&MessagePolicy>,
        handler: Arc<dyn CallbackHandler>,
        options: &Options,
    ) -> Result<(), ModuleError> {
        match self {
            ServerModule::Current(m) => m.initialize(request_policy, response_policy, handler, options),
            ServerModule::Legacy(m) => {
                let request = request_policy.map(LegacyAuthPolicy::from);
                let response = response_policy.map(LegacyAuthPolicy::from);
                m.initialize(request.as_ref(), response.as_ref(), handler, options)
            }
        }
    }
}

impl RoleModule for ClientModule {
    const ROLE: Role = Role::Client;

    fn constructor(factory: &ModuleFactory, id: &str) -> Option<Constructor<Self>> {
        factory.get(id)?.client.clone()
    }

    fn convention(&self) -> Convention {
        ClientModule::convention(self)
    }

    fn initialize(
        &mut self,
        request_policy: Option<&MessagePolicy>,
        response_policy: Option<&MessagePolicy>,
        handler: Arc<dyn CallbackHandler>,
        options: &Options,
    ) -> Result<(), ModuleError> {
        match self {
            ClientModule::Current(m) => m.initialize(request_policy, response_policy, handler, options),
            ClientModule::Legacy(m) => {
                let request = request_policy.map(LegacyAuthPolicy::from);
                let response = response_policy.map(LegacyAuthPolicy::from);
                m.initialize(request.as_ref(), response.as_ref(), handler, options)
            }
        }
    }
}

/// Instantiate and initialize the module named by `entry`.
///
/// `request_options` are call-scoped; configured options overlay them.
pub fn activate<M: RoleModule>(
    factory: &ModuleFactory,
    entry: &ResolvedEntry,
    handler: Arc<dyn CallbackHandler>,
    request_options: Option<&Options>,
) -> Result<ActivatedModule<M>, ActivationError> {
    if !factory.contains(&entry.module) {
        metrics::record_activation("unknown", "unknown_module");
        return Err(ActivationError::UnknownModule(entry.module.clone()));
    }
    let make = M::constructor(factory, &entry.module).ok_or_else(|| {
        metrics::record_activation("unknown", "unsupported_role");
        ActivationError::UnsupportedRole {
            module: entry.module.clone(),
            role: M::ROLE,
        }
    })?;

    let mut module = make().map_err(|source| {
        tracing::warn!(module = %entry.module, error = %source, "Module construction failed");
        metrics::record_activation("unknown", "construction_failed");
        ActivationError::Construction {
            module: entry.module.clone(),
            source,
        }
    })?;

    let options = merge_options(request_options, &entry.options);
    let convention = module.convention();

    if let Err(source) = module.initialize(
        entry.request_policy.as_ref(),
        entry.response_policy.as_ref(),
        handler,
        &options,
    ) {
        tracing::warn!(module = %entry.module, convention = convention.as_str(), error = %source, "Module initialization failed");
        metrics::record_activation(convention.as_str(), "initialization_failed");
        return Err(ActivationError::Initialization {
            module: entry.module.clone(),
            source,
        });
    }

    tracing::debug!(
        module = %entry.module,
        role = %M::ROLE,
        convention = convention.as_str(),
        options = ?options,
        "Module activated"
    );
    metrics::record_activation(convention.as_str(), "activated");
    Ok(ActivatedModule { module, options })
}

/// Call-scoped options first, configured options on top.
pub fn merge_options(request: Option<&Options>, configured: &Options) -> Options {
    let mut merged = request.cloned().unwrap_or_default();
    merged.extend(configured.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AuthSource;
    use crate::module::convention::{
        AuthParam, DefaultCallbackHandler, LegacyAuthError, LegacyServerAuthModule, MessageInfo,
        PrincipalChannel, Subject,
    };
    use std::sync::Mutex;

    /// Records the policy it was initialized with.
    struct Recording {
        seen: Arc<Mutex<Option<(bool, bool)>>>,
        fail: bool,
    }

    impl LegacyServerAuthModule for Recording {
        fn initialize(
            &mut self,
            request_policy: Option<&LegacyAuthPolicy>,
            response_policy: Option<&LegacyAuthPolicy>,
            _: Arc<dyn CallbackHandler>,
            _: &Options,
        ) -> Result<(), ModuleError> {
            if self.fail {
                return Err(ModuleError::new("bad options"));
            }
            *self.seen.lock().unwrap() = Some((
                request_policy.is_some_and(LegacyAuthPolicy::authenticate_sender),
                response_policy.is_some(),
            ));
            Ok(())
        }

        fn validate_request(&self, _: &mut AuthParam<'_>, _: &mut Subject, _: &mut PrincipalChannel) -> Result<(), LegacyAuthError> {
            Ok(())
        }

        fn secure_response(&self, _: &mut AuthParam<'_>, _: &Subject) -> Result<(), LegacyAuthError> {
            Ok(())
        }

        fn dispose_subject(&self, _: &mut Subject, _: &MessageInfo) -> Result<(), LegacyAuthError> {
            Ok(())
        }
    }

    fn entry(module: &str) -> ResolvedEntry {
        ResolvedEntry {
            module: module.to_string(),
            request_policy: Some(MessagePolicy::mandatory(AuthSource::Sender)),
            response_policy: None,
            options: Options::from([("realm".to_string(), "configured".to_string())]),
        }
    }

    fn factory(seen: Arc<Mutex<Option<(bool, bool)>>>) -> ModuleFactory {
        let mut factory = ModuleFactory::new();
        let ok = seen.clone();
        factory.register_legacy_server("legacy", move || Recording { seen: ok.clone(), fail: false });
        factory.register_legacy_server("failing", move || Recording { seen: seen.clone(), fail: true });
        factory
    }

    #[test]
    fn test_merge_prefers_configured_options() {
        let request = Options::from([
            ("realm".to_string(), "request".to_string()),
            ("debug".to_string(), "true".to_string()),
        ]);
        let configured = Options::from([("realm".to_string(), "configured".to_string())]);

        let merged = merge_options(Some(&request), &configured);
        assert_eq!(merged["realm"], "configured");
        assert_eq!(merged["debug"], "true");
        assert_eq!(merge_options(None, &configured), configured);
    }

    #[test]
    fn test_legacy_module_gets_wrapped_policies() {
        let seen = Arc::new(Mutex::new(None));
        let activated: ActivatedModule<ServerModule> = activate(
            &factory(seen.clone()),
            &entry("legacy"),
            Arc::new(DefaultCallbackHandler),
            None,
        )
        .unwrap();

        assert_eq!(activated.module.convention(), Convention::Legacy);
        assert_eq!(activated.options["realm"], "configured");
        assert_eq!(*seen.lock().unwrap(), Some((true, false)));
    }

    #[test]
    fn test_unknown_module() {
        let err = activate::<ServerModule>(
            &ModuleFactory::new(),
            &entry("ghost"),
            Arc::new(DefaultCallbackHandler),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ActivationError::UnknownModule(id) if id == "ghost"));
    }

    #[test]
    fn test_missing_role_constructor() {
        let err = activate::<ClientModule>(
            &factory(Arc::new(Mutex::new(None))),
            &entry("legacy"),
            Arc::new(DefaultCallbackHandler),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ActivationError::UnsupportedRole { role: Role::Client, .. }));
    }

    #[test]
    fn test_initialization_failure() {
        let err = activate::<ServerModule>(
            &factory(Arc::new(Mutex::new(None))),
            &entry("failing"),
            Arc::new(DefaultCallbackHandler),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ActivationError::Initialization { .. }));
        assert!(err.to_string().contains("bad options"));
    }

    #[test]
    fn test_construction_failure() {
        let mut factory = ModuleFactory::new();
        factory.register_server_with("broken", || Err(ModuleError::new("missing key")));

        let err = activate::<ServerModule>(&factory, &entry("broken"), Arc::new(DefaultCallbackHandler), None)
            .unwrap_err();
        assert!(matches!(err, ActivationError::Construction { .. }));
    }
}
