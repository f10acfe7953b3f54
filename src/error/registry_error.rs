use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("'{0}' is already registered")]
    DuplicateName(String),

    #[error("No validator registered under '{0}'")]
    UnknownValidator(String),
}
