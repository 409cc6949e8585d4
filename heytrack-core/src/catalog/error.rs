use thiserror::Error;

use crate::error::ValidationError;
use crate::sqlite::DatabaseError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("validation failed: {0}")]
    Invalid(#[from] ValidationError),
    #[error("ingredient {ingredient_id} not found")]
    IngredientNotFound { ingredient_id: String },
    #[error("recipe {recipe_id} not found")]
    RecipeNotFound { recipe_id: String },
    #[error("insufficient stock for {ingredient_id}: available {available}, requested {requested}")]
    InsufficientStock {
        ingredient_id: String,
        available: f64,
        requested: f64,
    },
    #[error(transparent)]
    Store(#[from] DatabaseError),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
