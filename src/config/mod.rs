//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize into records)
//!     → parser.rs (validate, expand placeholders via expand.rs)
//!     → ParsedConfig
//!     → registry installs it as the next ConfigSnapshot
//!
//! On change:
//!     watcher.rs detects the write
//!     → loader.rs loads the new records
//!     → registry re-parses and swaps atomically
//!     → resolutions observe the new generation
//! ```
//!
//! # Design Decisions
//! - The file format is owned by the loader; the registry only sees records
//! - Parsing is all-or-nothing; a bad file never replaces a good snapshot
//! - Placeholders expand at parse time, never lazily

pub mod expand;
pub mod loader;
pub mod parser;
pub mod schema;
pub mod watcher;

pub use expand::{EnvProperties, ExpandError, MapProperties, PropertySource};
pub use loader::{load_config, ConfigError};
pub use parser::{ConfigParser, MessageSecurityParser, ParseError, SnapshotBuilder};
pub use schema::{MessageSecurityConfig, MsgsecConfig, PolicyConfig, ProviderConfig};
