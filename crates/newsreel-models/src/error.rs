//! Validation errors for loosely-typed payloads.

use thiserror::Error;

/// Errors raised while converting external payloads into models.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Script is empty")]
    EmptyScript,

    #[error("Unsupported payload shape for {field}: {found}")]
    UnsupportedShape { field: &'static str, found: String },
}

pub type ModelResult<T> = Result<T, ModelError>;
