use thiserror::Error;

use crate::error::ValidationError;
use crate::sqlite::DatabaseError;

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("validation failed: {0}")]
    Invalid(#[from] ValidationError),
    #[error("budget {budget_id} not found")]
    NotFound { budget_id: String },
    #[error(transparent)]
    Store(#[from] DatabaseError),
}

pub type BudgetResult<T> = std::result::Result<T, BudgetError>;
