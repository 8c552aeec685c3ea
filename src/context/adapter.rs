//! State shared by the server and client adapters.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::binding::{Binding, BindingProvider};
use super::error::AuthError;
use crate::config::ParseError;
use crate::model::{Options, ResolvedEntry, Role, HTTP_SERVLET_LAYER};
use crate::module::{AuthParam, CallbackHandler, MessageInfo, ModuleFactory};
use crate::registry::Registry;

struct AdapterState<C> {
    binding: Option<Binding>,
    /// Keyed by auth context id and the call properties merged into the
    /// module options. `None` records "no module applies".
    contexts: HashMap<ContextKey, Option<Arc<C>>>,
    /// Bumped by `refresh` so contexts built from stale state are not cached.
    epoch: u64,
}

type ContextKey = (Option<String>, Options);

impl<C> Default for AdapterState<C> {
    fn default() -> Self {
        Self {
            binding: None,
            contexts: HashMap::new(),
            epoch: 0,
        }
    }
}

pub(crate) struct AdapterCore<C> {
    registry: Arc<Registry>,
    pub(crate) factory: Arc<ModuleFactory>,
    binding_provider: Arc<dyn BindingProvider>,
    layer: String,
    app_context: String,
    pub(crate) handler: Arc<dyn CallbackHandler>,
    role: Role,
    state: Mutex<AdapterState<C>>,
}

impl<C> AdapterCore<C> {
    pub(crate) fn new(
        registry: Arc<Registry>,
        factory: Arc<ModuleFactory>,
        binding_provider: Arc<dyn BindingProvider>,
        layer: String,
        app_context: String,
        handler: Arc<dyn CallbackHandler>,
        role: Role,
    ) -> Self {
        Self {
            registry,
            factory,
            binding_provider,
            layer,
            app_context,
            handler,
            role,
            state: Mutex::new(AdapterState::default()),
        }
    }

    pub(crate) fn layer(&self) -> &str {
        &self.layer
    }

    pub(crate) fn app_context(&self) -> &str {
        &self.app_context
    }

    pub(crate) fn role(&self) -> Role {
        self.role
    }

    /// `"true"`/`"false"` from the mandatory flag in the servlet layer,
    /// otherwise whatever the binding provider says.
    pub(crate) fn auth_context_id(&self, message: &MessageInfo) -> Option<String> {
        if self.layer == HTTP_SERVLET_LAYER {
            return Some(message.is_mandatory().to_string());
        }
        self.binding_provider.auth_context_id(&self.layer, message)
    }

    /// Resolve, activate and cache the context for `auth_context_id` and
    /// `properties`.
    ///
    /// `build` runs without any lock held. Activation failures are returned
    /// and not cached, so the next call tries again.
    pub(crate) fn context<F>(
        &self,
        auth_context_id: Option<&str>,
        properties: &Options,
        build: F,
    ) -> Result<Option<Arc<C>>, AuthError>
    where
        F: FnOnce(ResolvedEntry) -> Result<C, AuthError>,
    {
        let key = (auth_context_id.map(str::to_string), properties.clone());
        let (binding, epoch) = {
            let mut state = self.lock_state();
            if let Some(cached) = state.contexts.get(&key) {
                return Ok(cached.clone());
            }
            let binding = match state.binding.clone() {
                Some(binding) => binding,
                None => {
                    let binding = self.binding_provider.bind(&self.layer, &self.app_context, properties);
                    tracing::debug!(
                        layer = %self.layer,
                        app_context = %self.app_context,
                        provider_id = ?binding.provider_id,
                        one_policy = binding.one_policy,
                        "Adapter bound"
                    );
                    state.binding = Some(binding.clone());
                    binding
                }
            };
            (binding, state.epoch)
        };

        let policies = self
            .binding_provider
            .policies(&self.layer, &binding, auth_context_id);
        let entry = self.registry.resolve(
            &self.layer,
            binding.provider_id.as_deref(),
            policies.request.as_ref(),
            policies.response.as_ref(),
            self.role,
        );
        let built = match entry {
            Some(entry) => Some(Arc::new(build(entry)?)),
            None => None,
        };

        let mut state = self.lock_state();
        if state.epoch != epoch {
            return Ok(built);
        }
        Ok(state.contexts.entry(key).or_insert(built).clone())
    }

    /// Re-parse the registry's configuration and drop binding and cached contexts.
    pub(crate) fn refresh(&self) -> Result<(), AuthError> {
        match self.registry.refresh() {
            Ok(_) | Err(ParseError::NothingInstalled) => {}
            Err(e) => return Err(AuthError::Refresh(e)),
        }
        let mut state = self.lock_state();
        state.binding = None;
        state.contexts.clear();
        state.epoch = state.epoch.wrapping_add(1);
        tracing::debug!(layer = %self.layer, app_context = %self.app_context, "Adapter refreshed");
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, AdapterState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Wrap `message` for a legacy module in `layer`.
pub(crate) fn auth_param<'a>(layer: &str, message: &'a mut MessageInfo) -> Result<AuthParam<'a>, AuthError> {
    AuthParam::for_layer(layer, message).ok_or_else(|| AuthError::UnsupportedAuthParam(layer.to_string()))
}

