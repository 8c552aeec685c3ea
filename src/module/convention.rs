//! The two module calling conventions and the types they exchange.
//!
//! Current-convention modules report an `AuthStatus` directly. Legacy
//! modules return `()` and signal "pending" or "failure" through
//! `LegacyAuthError`; they see policies through `LegacyAuthPolicy` and
//! messages through a layer-typed `AuthParam`.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::model::{
    AuthRecipient, AuthSource, MessagePolicy, Options, HTTP_SERVLET_LAYER, SOAP_LAYER,
};

/// Message property carrying whether authentication is mandatory.
pub const IS_MANDATORY_PROPERTY: &str = "is.mandatory";

/// Message property asking the container to register the authenticated session.
pub const REGISTER_WITH_AUTHENTICATOR_PROPERTY: &str = "register.with.authenticator";

/// Outcome of a message-exchange operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Success,
    SendSuccess,
    SendContinue,
    SendFailure,
    Failure,
}

/// A named identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal(String);

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// The identities established for one side of an exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subject {
    principals: Vec<Principal>,
}

impl Subject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principal(name: impl Into<String>) -> Self {
        let mut subject = Self::new();
        subject.add_principal(Principal::new(name));
        subject
    }

    /// Add a principal unless an equal one is present. Insertion order is kept.
    pub fn add_principal(&mut self, principal: Principal) {
        if !self.principals.contains(&principal) {
            self.principals.push(principal);
        }
    }

    pub fn extend<I: IntoIterator<Item = Principal>>(&mut self, principals: I) {
        for principal in principals {
            self.add_principal(principal);
        }
    }

    pub fn principals(&self) -> &[Principal] {
        &self.principals
    }

    pub fn has_principal(&self, name: &str) -> bool {
        self.principals.iter().any(|p| p.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }

    pub fn clear(&mut self) {
        self.principals.clear();
    }

    pub fn into_principals(self) -> Vec<Principal> {
        self.principals
    }
}

/// A request/response pair travelling through a layer.
///
/// Payloads are opaque here; modules interpret them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageInfo {
    pub request: Vec<u8>,
    pub response: Vec<u8>,
    pub properties: HashMap<String, String>,
}

impl MessageInfo {
    pub fn new(request: impl Into<Vec<u8>>) -> Self {
        Self {
            request: request.into(),
            ..Self::default()
        }
    }

    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.properties
            .insert(IS_MANDATORY_PROPERTY.to_string(), mandatory.to_string());
        self
    }

    pub fn is_mandatory(&self) -> bool {
        self.properties
            .get(IS_MANDATORY_PROPERTY)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// Requests a module makes of its container.
#[derive(Debug)]
#[non_exhaustive]
pub enum Callback<'a> {
    /// Establish `name` as the caller principal of `subject`.
    CallerPrincipal { subject: &'a mut Subject, name: String },
}

#[derive(Debug, Error)]
#[error("callback handler failed: {0}")]
pub struct CallbackError(pub String);

/// Container-side handler for module callbacks.
pub trait CallbackHandler: Send + Sync {
    fn handle(&self, callbacks: &mut [Callback<'_>]) -> Result<(), CallbackError>;
}

/// Handler used when an adapter is created without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCallbackHandler;

impl CallbackHandler for DefaultCallbackHandler {
    fn handle(&self, callbacks: &mut [Callback<'_>]) -> Result<(), CallbackError> {
        for callback in callbacks.iter_mut() {
            match callback {
                Callback::CallerPrincipal { subject, name } => {
                    tracing::debug!(caller = %name, "Caller principal established");
                    subject.add_principal(Principal::new(name.clone()));
                }
            }
        }
        Ok(())
    }
}

/// Failure raised by a module's own code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ModuleError(String);

impl ModuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Server side, current convention.
pub trait ServerAuthModule: Send + Sync {
    fn initialize(
        &mut self,
        request_policy: Option<&MessagePolicy>,
        response_policy: Option<&MessagePolicy>,
        handler: Arc<dyn CallbackHandler>,
        options: &Options,
    ) -> Result<(), ModuleError>;

    fn validate_request(
        &self,
        message: &mut MessageInfo,
        client: &mut Subject,
        service: &Subject,
    ) -> Result<AuthStatus, ModuleError>;

    fn secure_response(
        &self,
        message: &mut MessageInfo,
        service: &Subject,
    ) -> Result<AuthStatus, ModuleError>;

    fn clean_subject(&self, message: &MessageInfo, subject: &mut Subject) -> Result<(), ModuleError>;
}

/// Client side, current convention.
pub trait ClientAuthModule: Send + Sync {
    fn initialize(
        &mut self,
        request_policy: Option<&MessagePolicy>,
        response_policy: Option<&MessagePolicy>,
        handler: Arc<dyn CallbackHandler>,
        options: &Options,
    ) -> Result<(), ModuleError>;

    fn secure_request(
        &self,
        message: &mut MessageInfo,
        client: &Subject,
    ) -> Result<AuthStatus, ModuleError>;

    fn validate_response(
        &self,
        message: &mut MessageInfo,
        client: &mut Subject,
        service: &Subject,
    ) -> Result<AuthStatus, ModuleError>;

    fn clean_subject(&self, message: &MessageInfo, subject: &mut Subject) -> Result<(), ModuleError>;
}

/// Policy as seen by legacy modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyAuthPolicy {
    source: Option<AuthSource>,
    recipient: Option<AuthRecipient>,
    mandatory: bool,
}

impl LegacyAuthPolicy {
    pub fn authenticate_sender(&self) -> bool {
        matches!(
            self.source,
            Some(AuthSource::Sender) | Some(AuthSource::UsernamePassword)
        )
    }

    pub fn authenticate_content(&self) -> bool {
        self.source == Some(AuthSource::Content)
    }

    pub fn authenticate_recipient(&self) -> bool {
        self.recipient.is_some()
    }

    pub fn recipient_before_content(&self) -> bool {
        self.recipient == Some(AuthRecipient::BeforeContent)
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }
}

impl From<&MessagePolicy> for LegacyAuthPolicy {
    fn from(policy: &MessagePolicy) -> Self {
        Self {
            source: policy.auth_source,
            recipient: policy.auth_recipient,
            mandatory: policy.mandatory,
        }
    }
}

/// Layer-typed view of a message for legacy modules.
#[derive(Debug)]
pub enum AuthParam<'a> {
    HttpServlet(&'a mut MessageInfo),
    Soap(&'a mut MessageInfo),
}

impl<'a> AuthParam<'a> {
    /// Wrap `message` for `layer`; only the servlet and SOAP layers have one.
    pub fn for_layer(layer: &str, message: &'a mut MessageInfo) -> Option<Self> {
        match layer {
            HTTP_SERVLET_LAYER => Some(AuthParam::HttpServlet(message)),
            SOAP_LAYER => Some(AuthParam::Soap(message)),
            _ => None,
        }
    }

    pub fn message(&self) -> &MessageInfo {
        match self {
            AuthParam::HttpServlet(m) | AuthParam::Soap(m) => m,
        }
    }

    pub fn message_mut(&mut self) -> &mut MessageInfo {
        match self {
            AuthParam::HttpServlet(m) | AuthParam::Soap(m) => m,
        }
    }
}

/// How legacy modules signal anything other than plain success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LegacyAuthError {
    #[error("authentication pending")]
    Pending,

    #[error("authentication failed: {0}")]
    Failure(String),

    #[error(transparent)]
    Module(#[from] ModuleError),
}

/// Where a legacy module deposits principals established during validation.
///
/// Legacy modules cannot attach principals to the caller's subject
/// themselves. One channel exists per call and is drained by the adapter
/// only when validation succeeds.
#[derive(Debug, Default)]
pub struct PrincipalChannel {
    deposited: Option<Subject>,
}

impl PrincipalChannel {
    pub fn deposit(&mut self, subject: Subject) {
        match &mut self.deposited {
            Some(existing) => existing.extend(subject.into_principals()),
            None => self.deposited = Some(subject),
        }
    }

    pub fn take(&mut self) -> Option<Subject> {
        self.deposited.take()
    }

    pub fn is_empty(&self) -> bool {
        self.deposited.is_none()
    }
}

/// Server side, legacy convention.
pub trait LegacyServerAuthModule: Send + Sync {
    fn initialize(
        &mut self,
        request_policy: Option<&LegacyAuthPolicy>,
        response_policy: Option<&LegacyAuthPolicy>,
        handler: Arc<dyn CallbackHandler>,
        options: &Options,
    ) -> Result<(), ModuleError>;

    fn validate_request(
        &self,
        param: &mut AuthParam<'_>,
        client: &mut Subject,
        channel: &mut PrincipalChannel,
    ) -> Result<(), LegacyAuthError>;

    fn secure_response(
        &self,
        param: &mut AuthParam<'_>,
        service: &Subject,
    ) -> Result<(), LegacyAuthError>;

    fn dispose_subject(
        &self,
        subject: &mut Subject,
        message: &MessageInfo,
    ) -> Result<(), LegacyAuthError>;
}

/// Client side, legacy convention.
pub trait LegacyClientAuthModule: Send + Sync {
    fn initialize(
        &mut self,
        request_policy: Option<&LegacyAuthPolicy>,
        response_policy: Option<&LegacyAuthPolicy>,
        handler: Arc<dyn CallbackHandler>,
        options: &Options,
    ) -> Result<(), ModuleError>;

    fn secure_request(
        &self,
        param: &mut AuthParam<'_>,
        client: &Subject,
    ) -> Result<(), LegacyAuthError>;

    fn validate_response(
        &self,
        param: &mut AuthParam<'_>,
        client: &mut Subject,
    ) -> Result<(), LegacyAuthError>;

    fn dispose_subject(
        &self,
        subject: &mut Subject,
        message: &MessageInfo,
    ) -> Result<(), LegacyAuthError>;
}
