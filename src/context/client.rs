//! Client-side adapter.

use std::sync::Arc;

use super::adapter::{auth_param, AdapterCore};
use super::binding::BindingProvider;
use super::error::AuthError;
use crate::model::{Options, Role};
use crate::module::{
    activate, ActivatedModule, AuthStatus, CallbackHandler, ClientModule, Convention,
    DefaultCallbackHandler, MessageInfo, ModuleFactory, Subject,
};
use crate::registry::Registry;

/// Client-side configuration for one (layer, application context).
pub struct ClientAuthConfig {
    core: AdapterCore<ClientAuthContext>,
}

impl ClientAuthConfig {
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
                Role::Client,
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
    pub fn auth_context(
        &self,
        auth_context_id: Option<&str>,
        properties: &Options,
    ) -> Result<Option<Arc<ClientAuthContext>>, AuthError> {
        self.core.context(auth_context_id, properties, |entry| {
            let activated = activate::<ClientModule>(
                &self.core.factory,
                &entry,
                Arc::clone(&self.core.handler),
                Some(properties),
            )?;
            Ok(ClientAuthContext::new(self.core.layer().to_string(), activated))
        })
    }

    pub fn refresh(&self) -> Result<(), AuthError> {
        self.core.refresh()
    }

    pub fn secure_request(
        &self,
        message: &mut MessageInfo,
        client: &Subject,
        properties: &Options,
    ) -> Result<AuthStatus, AuthError> {
        self.require(message, properties)?
            .secure_request(message, client)
    }

    pub fn validate_response(
        &self,
        message: &mut MessageInfo,
        client: &mut Subject,
        service: &Subject,
        properties: &Options,
    ) -> Result<AuthStatus, AuthError> {
        self.require(message, properties)?
            .validate_response(message, client, service)
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
    ) -> Result<Arc<ClientAuthContext>, AuthError> {
        let id = self.auth_context_id(message);
        self.auth_context(id.as_deref(), properties)?
            .ok_or_else(|| AuthError::NoModule {
                layer: self.core.layer().to_string(),
                role: self.core.role(),
            })
    }
}

impl std::fmt::Debug for ClientAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientAuthConfig")
            .field("layer", &self.core.layer())
            .field("app_context", &self.core.app_context())
            .finish()
    }
}

/// An activated client module bound to its layer.
pub struct ClientAuthContext {
    layer: String,
    module: ClientModule,
    options: Options,
}

impl ClientAuthContext {
    fn new(layer: String, activated: ActivatedModule<ClientModule>) -> Self {
        Self {
            layer,
            module: activated.module,
            options: activated.options,
        }
    }

    pub fn convention(&self) -> Convention {
        self.module.convention()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn secure_request(&self, message: &mut MessageInfo, client: &Subject) -> Result<AuthStatus, AuthError> {
        match &self.module {
            ClientModule::Current(m) => Ok(m.secure_request(message, client)?),
            ClientModule::Legacy(m) => {
                let mut param = auth_param(&self.layer, message)?;
                m.secure_request(&mut param, client)?;
                Ok(AuthStatus::SendSuccess)
            }
        }
    }

    /// Legacy modules do not see the service subject.
    pub fn validate_response(
        &self,
        message: &mut MessageInfo,
        client: &mut Subject,
        service: &Subject,
    ) -> Result<AuthStatus, AuthError> {
        match &self.module {
            ClientModule::Current(m) => Ok(m.validate_response(message, client, service)?),
            ClientModule::Legacy(m) => {
                let mut param = auth_param(&self.layer, message)?;
                m.validate_response(&mut param, client)?;
                Ok(AuthStatus::Success)
            }
        }
    }

    pub fn clean_subject(&self, message: &MessageInfo, subject: &mut Subject) -> Result<(), AuthError> {
        match &self.module {
            ClientModule::Current(m) => Ok(m.clean_subject(message, subject)?),
            ClientModule::Legacy(m) => Ok(m.dispose_subject(subject, message)?),
        }
    }
}

impl std::fmt::Debug for ClientAuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientAuthContext")
            .field("layer", &self.layer)
            .field("convention", &self.convention())
            .finish()
    }
}
