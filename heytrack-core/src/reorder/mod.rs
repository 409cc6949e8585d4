pub mod engine;
pub mod error;
pub mod models;
pub mod service;
pub mod store;

pub use engine::ReorderEngine;
pub use error::{ReorderError, ReorderResult};
pub use models::{
    NewPurchaseOrder, NewPurchaseOrderItem, NewSupplier, PurchaseOrder, PurchaseOrderItem,
    PurchaseOrderStatus, ReorderAlertRecord, ReorderRule, ReorderSuggestion, ReorderSummary,
    ReorderUrgency, Supplier,
};
pub use service::AutoReorder;
pub use store::SqliteReorderStore;
