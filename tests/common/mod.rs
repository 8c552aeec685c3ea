//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use msgsec_registry::config::loader::parse_config;
use msgsec_registry::config::MessageSecurityConfig;
use msgsec_registry::model::{MessagePolicy, Options};
use msgsec_registry::module::{
    AuthParam, AuthStatus, Callback, CallbackError, CallbackHandler, ClientAuthModule,
    LegacyAuthError, LegacyAuthPolicy, LegacyClientAuthModule, LegacyServerAuthModule,
    MessageInfo, ModuleError, ModuleFactory, Principal, PrincipalChannel, ServerAuthModule,
    Subject,
};
use msgsec_registry::registry::{RegistrationAuthority, RegistrationId};

/// Parse `[[message_security]]` records from inline TOML.
pub fn records(toml: &str) -> Vec<MessageSecurityConfig> {
    parse_config(toml).unwrap().message_security
}

/// Authority event, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityEvent {
    Register(String),
    Unregister(String),
}

/// Authority that records every call.
#[derive(Default)]
pub struct RecordingAuthority {
    events: Mutex<Vec<AuthorityEvent>>,
    live: Mutex<Vec<(RegistrationId, String)>>,
}

impl RecordingAuthority {
    pub fn events(&self) -> Vec<AuthorityEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn live_layers(&self) -> Vec<String> {
        let mut layers: Vec<String> = self.live.lock().unwrap().iter().map(|(_, l)| l.clone()).collect();
        layers.sort();
        layers
    }
}

impl RegistrationAuthority for RecordingAuthority {
    fn register_default(&self, _provider: &str, layer: &str) -> RegistrationId {
        let id = RegistrationId::generate();
        self.events.lock().unwrap().push(AuthorityEvent::Register(layer.to_string()));
        self.live.lock().unwrap().push((id.clone(), layer.to_string()));
        id
    }

    fn unregister(&self, id: &RegistrationId) -> bool {
        let mut live = self.live.lock().unwrap();
        match live.iter().position(|(live_id, _)| live_id == id) {
            Some(pos) => {
                let (_, layer) = live.remove(pos);
                self.events.lock().unwrap().push(AuthorityEvent::Unregister(layer));
                true
            }
            None => false,
        }
    }
}

/// Callback handler that records caller names before establishing them.
#[derive(Default)]
pub struct RecordingHandler {
    pub callers: Mutex<Vec<String>>,
}

impl CallbackHandler for RecordingHandler {
    fn handle(&self, callbacks: &mut [Callback<'_>]) -> Result<(), CallbackError> {
        for callback in callbacks.iter_mut() {
            if let Callback::CallerPrincipal { subject, name } = callback {
                self.callers.lock().unwrap().push(name.clone());
                subject.add_principal(Principal::new(name.clone()));
            }
        }
        Ok(())
    }
}

/// Number of modules constructed, per test.
#[derive(Default)]
pub struct Counters {
    pub constructed: AtomicUsize,
    pub last_options: Mutex<Option<Options>>,
}

impl Counters {
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }
}

/// Current-convention server module.
///
/// Requests of the form `user:<name>` succeed and name the client; anything
/// else is a `SendFailure`.
pub struct TokenServerModule {
    pub label: &'static str,
    pub counters: Arc<Counters>,
}

impl ServerAuthModule for TokenServerModule {
    fn initialize(
        &mut self,
        _request_policy: Option<&MessagePolicy>,
        _response_policy: Option<&MessagePolicy>,
        _handler: Arc<dyn CallbackHandler>,
        options: &Options,
    ) -> Result<(), ModuleError> {
        if options.get("fail").is_some_and(|v| v == "true") {
            return Err(ModuleError::new("refusing to initialize"));
        }
        *self.counters.last_options.lock().unwrap() = Some(options.clone());
        Ok(())
    }

    fn validate_request(
        &self,
        message: &mut MessageInfo,
        client: &mut Subject,
        _service: &Subject,
    ) -> Result<AuthStatus, ModuleError> {
        let request = String::from_utf8_lossy(&message.request).into_owned();
        match request.strip_prefix("user:") {
            Some(name) => {
                client.add_principal(Principal::new(name));
                message.properties.insert("validated.by".into(), self.label.into());
                Ok(AuthStatus::Success)
            }
            None => Ok(AuthStatus::SendFailure),
        }
    }

    fn secure_response(&self, message: &mut MessageInfo, _service: &Subject) -> Result<AuthStatus, ModuleError> {
        message.response = format!("signed-by:{}", self.label).into_bytes();
        Ok(AuthStatus::SendSuccess)
    }

    fn clean_subject(&self, _message: &MessageInfo, subject: &mut Subject) -> Result<(), ModuleError> {
        subject.clear();
        Ok(())
    }
}

/// Legacy-convention server module.
///
/// `pending` → pending, `deny` → failure, `user:<name>` → success with the
/// name on the client subject and `group:staff` deposited in the channel.
/// Anything else succeeds without establishing a principal.
pub struct LegacyFormModule {
    pub counters: Arc<Counters>,
}

impl LegacyServerAuthModule for LegacyFormModule {
    fn initialize(
        &mut self,
        request_policy: Option<&LegacyAuthPolicy>,
        _response_policy: Option<&LegacyAuthPolicy>,
        _handler: Arc<dyn CallbackHandler>,
        options: &Options,
    ) -> Result<(), ModuleError> {
        if request_policy.is_some_and(|p| !p.authenticate_sender()) {
            return Err(ModuleError::new("form login authenticates senders only"));
        }
        *self.counters.last_options.lock().unwrap() = Some(options.clone());
        Ok(())
    }

    fn validate_request(
        &self,
        param: &mut AuthParam<'_>,
        client: &mut Subject,
        channel: &mut PrincipalChannel,
    ) -> Result<(), LegacyAuthError> {
        channel.deposit(Subject::with_principal("group:staff"));
        let request = String::from_utf8_lossy(&param.message().request).into_owned();
        match request.as_str() {
            "pending" => Err(LegacyAuthError::Pending),
            "deny" => Err(LegacyAuthError::Failure("bad password".into())),
            other => {
                if let Some(name) = other.strip_prefix("user:") {
                    client.add_principal(Principal::new(name));
                }
                Ok(())
            }
        }
    }

    fn secure_response(&self, param: &mut AuthParam<'_>, _service: &Subject) -> Result<(), LegacyAuthError> {
        param.message_mut().response = b"legacy-secured".to_vec();
        Ok(())
    }

    fn dispose_subject(&self, subject: &mut Subject, _message: &MessageInfo) -> Result<(), LegacyAuthError> {
        subject.clear();
        Ok(())
    }
}

/// Current-convention client module.
pub struct TokenClientModule;

impl ClientAuthModule for TokenClientModule {
    fn initialize(
        &mut self,
        _request_policy: Option<&MessagePolicy>,
        _response_policy: Option<&MessagePolicy>,
        _handler: Arc<dyn CallbackHandler>,
        _options: &Options,
    ) -> Result<(), ModuleError> {
        Ok(())
    }

    fn secure_request(&self, message: &mut MessageInfo, client: &Subject) -> Result<AuthStatus, ModuleError> {
        let name = client.principals().first().map(|p| p.name().to_string()).unwrap_or_default();
        message.request = format!("user:{}", name).into_bytes();
        Ok(AuthStatus::SendSuccess)
    }

    fn validate_response(
        &self,
        message: &mut MessageInfo,
        _client: &mut Subject,
        service: &Subject,
    ) -> Result<AuthStatus, ModuleError> {
        if message.response.starts_with(b"signed-by:") && !service.is_empty() {
            Ok(AuthStatus::Success)
        } else {
            Ok(AuthStatus::Failure)
        }
    }

    fn clean_subject(&self, _message: &MessageInfo, subject: &mut Subject) -> Result<(), ModuleError> {
        subject.clear();
        Ok(())
    }
}

/// Legacy-convention client module.
pub struct LegacyTokenClient;

impl LegacyClientAuthModule for LegacyTokenClient {
    fn initialize(
        &mut self,
        _request_policy: Option<&LegacyAuthPolicy>,
        _response_policy: Option<&LegacyAuthPolicy>,
        _handler: Arc<dyn CallbackHandler>,
        _options: &Options,
    ) -> Result<(), ModuleError> {
        Ok(())
    }

    fn secure_request(&self, param: &mut AuthParam<'_>, _client: &Subject) -> Result<(), LegacyAuthError> {
        param.message_mut().request = b"legacy-token".to_vec();
        Ok(())
    }

    fn validate_response(&self, param: &mut AuthParam<'_>, _client: &mut Subject) -> Result<(), LegacyAuthError> {
        if param.message().response.is_empty() {
            return Err(LegacyAuthError::Failure("empty response".into()));
        }
        Ok(())
    }

    fn dispose_subject(&self, subject: &mut Subject, _message: &MessageInfo) -> Result<(), LegacyAuthError> {
        subject.clear();
        Ok(())
    }
}

/// Factory with every sample module registered.
///
/// | id          | server              | client            |
/// |-------------|---------------------|-------------------|
/// | `token-a`   | TokenServerModule a | TokenClientModule |
/// | `token-b`   | TokenServerModule b |                   |
/// | `form`      | LegacyFormModule    | LegacyTokenClient |
pub fn factory(counters: Arc<Counters>) -> ModuleFactory {
    let mut factory = ModuleFactory::new();

    let c = counters.clone();
    factory.register_server("token-a", move || {
        c.constructed.fetch_add(1, Ordering::SeqCst);
        TokenServerModule { label: "a", counters: c.clone() }
    });
    let c = counters.clone();
    factory.register_server("token-b", move || {
        c.constructed.fetch_add(1, Ordering::SeqCst);
        TokenServerModule { label: "b", counters: c.clone() }
    });
    let c = counters;
    factory.register_legacy_server("form", move || {
        c.constructed.fetch_add(1, Ordering::SeqCst);
        LegacyFormModule { counters: c.clone() }
    });
    factory.register_client("token-a", || TokenClientModule);
    factory.register_legacy_client("form", || LegacyTokenClient);
    factory
}
