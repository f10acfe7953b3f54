pub mod access_error;
pub mod registry_error;
pub mod schema_error;

pub use access_error::AccessError;
pub use registry_error::RegistryError;
pub use schema_error::{SchemaError, SchemaErrorCode};

use thiserror::Error;

/// Umbrella error for callers that drive an import and a validation run
/// through a single `?` chain.
#[derive(Error, Debug)]
pub enum TreeshapeError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TreeshapeError>;
