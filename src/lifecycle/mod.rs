//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     Ctrl+C / SIGTERM → SignalEvent::Shutdown
//!     SIGHUP           → SignalEvent::Reload (re-read the config file)
//!
//! Control (control.rs):
//!     forward(signals) ─┐
//!     request_reload ───┼→ broadcast → watch loop reloads or leaves
//!     shutdown ─────────┘
//! ```

pub mod control;
pub mod signals;

pub use control::Control;
pub use signals::{SignalEvent, Signals};
