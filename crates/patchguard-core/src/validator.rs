//! Validator trait.
//!
//! A validator runs an external test command and reports what it saw. A
//! failing test suite is a normal [`ValidationResult`]; `Err` is reserved for
//! "could not run the command at all".

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ValidationCommand, ValidationResult};

/// Errors that prevent a validation from producing a result.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("validation command has an empty program")]
    EmptyCommand,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error while running validator: {0}")]
    Io(#[from] std::io::Error),
}

/// Backend that executes a [`ValidationCommand`].
///
/// Implementations must never modify the artifact under test.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn run(
        &self,
        command: &ValidationCommand,
    ) -> std::result::Result<ValidationResult, ValidatorError>;
}

#[async_trait]
impl<V: Validator + ?Sized> Validator for std::sync::Arc<V> {
    async fn run(
        &self,
        command: &ValidationCommand,
    ) -> std::result::Result<ValidationResult, ValidatorError> {
        (**self).run(command).await
    }
}
