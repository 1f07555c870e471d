// error.rs
use thiserror::Error;

use crate::renderer::passes::PassKind;
use crate::renderer::state::{StateId, StateKind};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{pass} program '{hash}' failed to compile:\n{}", errors.join("\n"))]
    ShaderCompile {
        pass: PassKind,
        hash: String,
        errors: Vec<String>,
    },

    #[error("render object not found")]
    UnknownObject,

    #[error("{kind} state {id} not found")]
    UnknownState { kind: StateKind, id: StateId },

    #[error("invalid render settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
