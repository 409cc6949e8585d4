use thiserror::Error;

use crate::catalog::CatalogError;
use crate::error::ValidationError;
use crate::sqlite::DatabaseError;

use super::models::PurchaseOrderStatus;

#[derive(Debug, Error)]
pub enum ReorderError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("validation failed: {0}")]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("supplier {supplier_id} not found")]
    SupplierNotFound { supplier_id: String },
    #[error("no preferred supplier set for {ingredient_id}")]
    NoSupplier { ingredient_id: String },
    #[error("purchase order {order_id} not found")]
    PurchaseOrderNotFound { order_id: String },
    #[error("purchase order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: String,
        from: PurchaseOrderStatus,
        to: PurchaseOrderStatus,
    },
    #[error(transparent)]
    Store(#[from] DatabaseError),
}

pub type ReorderResult<T> = std::result::Result<T, ReorderError>;
