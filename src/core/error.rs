use super::types::ContextId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error(
        "Only one root context may be live in this registry. To ignore this error, set \
         allow_multiple_roots = true. Use SessionRegistry::get_or_create instead of \
         constructing a root context directly. The live root context {existing} was created at: {created_at}"
    )]
    DuplicateRoot {
        existing: ContextId,
        created_at: String,
    },

    #[error("No active or default context found")]
    NoActiveContext,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

impl<T> From<std::sync::PoisonError<T>> for RegistryError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
