//! Pluggable authentication-module configuration registry.
//!
//! Holds a versioned mapping from message-processing layer and provider id
//! to authentication-module entries, resolves the entry that applies to a
//! request, activates modules in either calling convention, and swaps the
//! whole configuration atomically on reload.

pub mod config;
pub mod context;
pub mod lifecycle;
pub mod model;
pub mod module;
pub mod observability;
pub mod registry;
pub mod resolver;

pub use config::schema::MsgsecConfig;
pub use lifecycle::Control;
pub use registry::Registry;
