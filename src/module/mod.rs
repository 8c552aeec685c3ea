//! Authentication modules and their activation.
//!
//! # Data Flow
//! ```text
//! ResolvedEntry
//!     → factory: module id → constructor (server or client side)
//!     → activator: construct, merge options, initialize
//!     → ActivatedModule { Current(..) | Legacy(..), options }
//! ```
//!
//! # Responsibilities
//! - Define the current and legacy module calling conventions
//! - Map configured module identifiers to constructors
//! - Initialize modules with the convention-appropriate policy view
//!
//! # Design Decisions
//! - Modules are registered by identifier at startup; nothing is looked up by type name
//! - The convention is fixed at construction and dispatched on once per call, by tag
//! - Legacy principals travel through an explicit per-call channel, never ambient state

pub mod activator;
pub mod convention;
pub mod factory;

pub use activator::{activate, merge_options, ActivatedModule, ActivationError, RoleModule};
pub use convention::{
    AuthParam, AuthStatus, Callback, CallbackError, CallbackHandler, ClientAuthModule,
    DefaultCallbackHandler, LegacyAuthError, LegacyAuthPolicy, LegacyClientAuthModule,
    LegacyServerAuthModule, MessageInfo, ModuleError, Principal, PrincipalChannel,
    ServerAuthModule, Subject, IS_MANDATORY_PROPERTY, REGISTER_WITH_AUTHENTICATOR_PROPERTY,
};
pub use factory::{ClientModule, Constructor, Convention, ModuleConstructors, ModuleFactory, ServerModule};
