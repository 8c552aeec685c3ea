use thiserror::Error;

use crate::config::ParseError;
use crate::model::Role;
use crate::module::{ActivationError, CallbackError, LegacyAuthError, ModuleError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no {role} module configured for layer '{layer}'")]
    NoModule { layer: String, role: Role },

    #[error(transparent)]
    Activation(#[from] ActivationError),

    #[error("module error: {0}")]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Callback(#[from] CallbackError),

    #[error("legacy module error: {0}")]
    Legacy(#[from] LegacyAuthError),

    #[error("unsupported auth param for layer '{0}'")]
    UnsupportedAuthParam(String),

    #[error("configuration refresh failed: {0}")]
    Refresh(#[from] ParseError),
}
