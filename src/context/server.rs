//! Server-side adapter.

use std::sync::Arc;

use super::adapter::{auth_param, AdapterCore};
use super::binding::BindingProvider;
use super::error::AuthError;
use crate::model::{Options, Role, HTTP_SERVLET_LAYER};
use crate::module::{
    activate, ActivatedModule, AuthStatus, Callback, CallbackHandler, Convention,
    DefaultCallbackHandler, LegacyAuthError, MessageInfo, ModuleFactory, PrincipalChannel,
    ServerModule, Subject, REGISTER_WITH_AUTHENTICATOR_PROPERTY,
};
use crate::registry::Registry;

/// Module option telling the adapter the module registers sessions itself.
pub const MANAGES_SESSIONS_OPTION: &str = "managessessions";

/// Server-side configuration for one (layer, application context).
///
/// Nothing is resolved at construction. The first call for an auth context
/// id binds the adapter, resolves an entry and activates its module; the
/// resulting context is reused until `refresh`.
pub struct ServerAuthConfig {
    core: AdapterCore<ServerAuthContext>,
}

impl ServerAuthConfig {
    /// `handler = None` selects the `DefaultCallbackHandler`.
    pub fn new(
        registry: Arc<Registry>,
        factory: Arc<ModuleFactory>,
        binding: Arc<dyn BindingProvider>,
        layer: impl Into<String>,
        app_context: impl Into<String>,
        handler: Option<Arc<dyn CallbackHandler>>,
    ) -> Self {
        Self {
            core: AdapterCore::new(
                registry,
                factory,
                binding,
                layer.into(),
                app_context.into(),
                handler.unwrap_or_else(|| Arc::new(DefaultCallbackHandler)),
                Role::Server,
            ),
        }
    }

    pub fn layer(&self) -> &str {
        self.core.layer()
    }

    pub fn app_context(&self) -> &str {
        self.core.app_context()
    }

    pub fn auth_context_id(&self, message: &MessageInfo) -> Option<String> {
        self.core.auth_context_id(message)
    }

    /// The context for `auth_context_id`, or `None` if no module applies.
    ///
    /// `properties` bind the adapter on first use and are merged under the
    /// configured module options.
    pub fn auth_context(
        &self,
        auth_context_id: Option<&str>,
        properties: &Options,
    ) -> Result<Option<Arc<ServerAuthContext>>, AuthError> {
        self.core.context(auth_context_id, properties, |entry| {
            let activated = activate::<ServerModule>(
                &self.core.factory,
                &entry,
                Arc::clone(&self.core.handler),
                Some(properties),
            )?;
            Ok(ServerAuthContext::new(
                self.core.layer().to_string(),
                activated,
                Arc::clone(&self.core.handler),
            ))
        })
    }

    pub fn refresh(&self) -> Result<(), AuthError> {
        self.core.refresh()
    }

    pub fn validate_request(
        &self,
        message: &mut MessageInfo,
        client: &mut Subject,
        service: &Subject,
        properties: &Options,
    ) -> Result<AuthStatus, AuthError> {
        self.require(message, properties)?
            .validate_request(message, client, service)
    }

    pub fn secure_response(
        &self,
        message: &mut MessageInfo,
        service: &Subject,
        properties: &Options,
    ) -> Result<AuthStatus, AuthError> {
        self.require(message, properties)?
            .secure_response(message, service)
    }

    pub fn clean_subject(
        &self,
        message: &MessageInfo,
        subject: &mut Subject,
        properties: &Options,
    ) -> Result<(), AuthError> {
        self.require(message, properties)?
            .clean_subject(message, subject)
    }

    fn require(
        &self,
        message: &MessageInfo,
        properties: &Options,
    ) -> Result<Arc<ServerAuthContext>, AuthError> {
        let id = self.auth_context_id(message);
        self.auth_context(id.as_deref(), properties)?
            .ok_or_else(|| AuthError::NoModule {
                layer: self.core.layer().to_string(),
                role: self.core.role(),
            })
    }
}

impl std::fmt::Debug for ServerAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerAuthConfig")
            .field("layer", &self.core.layer())
            .field("app_context", &self.core.app_context())
            .finish()
    }
}

/// An activated server module bound to its layer.
pub struct ServerAuthContext {
    layer: String,
    module: ServerModule,
    options: Options,
    handler: Arc<dyn CallbackHandler>,
    manages_sessions: bool,
}

impl ServerAuthContext {
    fn new(layer: String, activated: ActivatedModule<ServerModule>, handler: Arc<dyn CallbackHandler>) -> Self {
        let manages_sessions = activated
            .options
            .get(MANAGES_SESSIONS_OPTION)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        Self {
            layer,
            module: activated.module,
            options: activated.options,
            handler,
            manages_sessions,
        }
    }

    pub fn convention(&self) -> Convention {
        self.module.convention()
    }

    /// Options the module was initialized with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn validate_request(
        &self,
        message: &mut MessageInfo,
        client: &mut Subject,
        service: &Subject,
    ) -> Result<AuthStatus, AuthError> {
        let module = match &self.module {
            ServerModule::Current(m) => return Ok(m.validate_request(message, client, service)?),
            ServerModule::Legacy(m) => m,
        };

        // dropped on every return path below
        let mut channel = PrincipalChannel::default();
        let outcome = {
            let mut param = auth_param(&self.layer, message)?;
            module.validate_request(&mut param, client, &mut channel)
        };

        match outcome {
            Ok(()) => {}
            Err(LegacyAuthError::Pending) => return Ok(AuthStatus::SendContinue),
            Err(LegacyAuthError::Failure(reason)) => {
                tracing::debug!(layer = %self.layer, reason = %reason, "Legacy module rejected request");
                return Ok(AuthStatus::SendFailure);
            }
            Err(LegacyAuthError::Module(e)) => return Err(AuthError::Module(e)),
        }

        self.set_caller_principals(client, channel.take())?;
        if !self.manages_sessions && self.layer == HTTP_SERVLET_LAYER {
            message.properties.insert(
                REGISTER_WITH_AUTHENTICATOR_PROPERTY.to_string(),
                "true".to_string(),
            );
        }
        Ok(AuthStatus::Success)
    }

    pub fn secure_response(
        &self,
        message: &mut MessageInfo,
        service: &Subject,
    ) -> Result<AuthStatus, AuthError> {
        match &self.module {
            ServerModule::Current(m) => Ok(m.secure_response(message, service)?),
            ServerModule::Legacy(m) => {
                let mut param = auth_param(&self.layer, message)?;
                m.secure_response(&mut param, service)?;
                Ok(AuthStatus::SendSuccess)
            }
        }
    }

    pub fn clean_subject(&self, message: &MessageInfo, subject: &mut Subject) -> Result<(), AuthError> {
        match &self.module {
            ServerModule::Current(m) => Ok(m.clean_subject(message, subject)?),
            ServerModule::Legacy(m) => Ok(m.dispose_subject(subject, message)?),
        }
    }

    /// Name the caller after the client's first principal, then add the
    /// principals the module deposited.
    ///
    /// Nothing happens when the module established no principal on the client.
    fn set_caller_principals(&self, client: &mut Subject, deposited: Option<Subject>) -> Result<(), AuthError> {
        let Some(name) = client.principals().first().map(|p| p.name().to_string()) else {
            return Ok(());
        };
        if let Some(deposited) = deposited {
            client.extend(deposited.into_principals());
        }
        self.handler
            .handle(&mut [Callback::CallerPrincipal { subject: client, name }])?;
        Ok(())
    }
}

impl std::fmt::Debug for ServerAuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerAuthContext")
            .field("layer", &self.layer)
            .field("convention", &self.convention())
            .field("options", &self.options)
            .finish()
    }
}
