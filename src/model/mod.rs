//! Configuration entry model.
//!
//! # Data Flow
//! ```text
//! message_security records
//!     → config::parser (expand options, validate)
//!     → IdEntry / InterceptEntry per layer
//!     → ConfigSnapshot (immutable, one generation)
//!     → resolver produces a transient ResolvedEntry per request
//! ```
//!
//! # Design Decisions
//! - Every type here is plain data; snapshots are shared behind `Arc` and never mutated
//! - Options use a sorted map so logs and CLI output are deterministic
//! - Module classes are referenced by factory identifier, not by type name

pub mod entry;
pub mod policy;
pub mod snapshot;

use std::collections::BTreeMap;

pub use entry::{IdEntry, InterceptEntry, ProviderType, ResolvedEntry, Role};
pub use policy::{AuthRecipient, AuthSource, MessagePolicy};
pub use snapshot::{ConfigSnapshot, ParsedConfig};

/// Module options, keyed by option name.
pub type Options = BTreeMap<String, String>;

/// Layer name for servlet-style HTTP message processing.
pub const HTTP_SERVLET_LAYER: &str = "HttpServlet";

/// Layer name for SOAP message processing.
pub const SOAP_LAYER: &str = "SOAP";
