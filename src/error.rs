//! Error types for conversion entry points.

use thiserror::Error;

use crate::validate::SchemaViolation;

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Tree building itself never fails; these come from the edges around it.
#[derive(Error, Debug)]
pub enum Error {
    /// Input could not be parsed into documents.
    #[error("Invalid input JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Converted output did not pass validation.
    #[error(transparent)]
    Schema(#[from] SchemaViolation),
}
