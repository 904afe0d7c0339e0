use thiserror::Error;

use crate::database::manager::DatabaseError;
use crate::registry::RegistryError;

/// Error taxonomy shared by the query builder, the schema layer and the repository.
///
/// Public operations of those components return `Result<_, QueryError>` and never panic;
/// the controller turns the first error it sees into the client-visible envelope.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Module, schema or record absent
    #[error("{0}")]
    NotFound(String),

    /// Unknown column, malformed clause, missing required field
    #[error("{0}")]
    Validation(String),

    /// API key lacks the access level the verb needs
    #[error("{0}")]
    Permission(String),

    /// API key missing, unknown, inactive or expired
    #[error("{0}")]
    Auth(String),

    /// The module does not enable the requested verb
    #[error("{verb} request is not enabled for module \"{module}\"")]
    VerbDisabled { verb: String, module: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl QueryError {
    pub fn validation(message: impl Into<String>) -> Self {
        QueryError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        QueryError::NotFound(message.into())
    }

    pub fn unknown_column(column: &str) -> Self {
        QueryError::Validation(format!("Column \"{}\" does not exist in provided schema", column))
    }
}

impl From<RegistryError> for QueryError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ModuleNotFound(_) | RegistryError::SchemaNotFound(_) => QueryError::NotFound(err.to_string()),
            other => QueryError::Validation(other.to_string()),
        }
    }
}
