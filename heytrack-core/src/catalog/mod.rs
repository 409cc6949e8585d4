pub mod error;
pub mod models;
pub mod store;

pub use error::{CatalogError, CatalogResult};
pub use models::{
    Ingredient, IngredientUpdate, NewIngredient, NewRecipe, Purchase, Recipe, RecipeLine,
    StockTransaction, StockTransactionKind,
};
pub use store::{CatalogSummary, RecipeMaterial, SqliteCatalogStore};
