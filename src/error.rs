//! Service-level error taxonomy shared by the domain modules.

use crate::db::DatabaseError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        ServiceError::Database(DatabaseError::Sqlite(err))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
