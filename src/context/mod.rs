//! Per-deployment authentication context adapters.
//!
//! # Data Flow
//! ```text
//! ServerAuthConfig / ClientAuthConfig  (one per layer + application context)
//!     first call for an auth context id:
//!         → BindingProvider: provider id from call properties (once)
//!         → BindingProvider: policies for the auth context id
//!         → Registry::resolve → module::activate
//!         → cached ServerAuthContext / ClientAuthContext
//!     each exchange:
//!         → context dispatches on the module's convention
//! ```
//!
//! # Responsibilities
//! - Resolve lazily; deployment binding is not known at construction
//! - Cache one context per auth context id until `refresh`
//! - Translate legacy module outcomes into `AuthStatus`
//! - Carry principals validated by legacy modules back to the caller subject
//!
//! # Design Decisions
//! - Activation and module calls run with no adapter lock held
//! - "No module applies" is cached like a context; activation failures are not
//! - `refresh` re-parses the registry and forgets the binding, so the next
//!   call re-resolves against the newest snapshot

mod adapter;
pub mod binding;
pub mod client;
pub mod error;
pub mod server;

pub use binding::{Binding, BindingProvider, PolicyPair, PropertyBinding, ONE_POLICY_PROPERTY, PROVIDER_ID_PROPERTY};
pub use client::{ClientAuthConfig, ClientAuthContext};
pub use error::AuthError;
pub use server::{ServerAuthConfig, ServerAuthContext, MANAGES_SESSIONS_OPTION};
