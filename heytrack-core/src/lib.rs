pub mod automation;
pub mod budget;
pub mod catalog;
pub mod config;
pub mod error;
pub mod hpp;
pub mod reorder;
pub mod sqlite;
pub mod validation;

pub use automation::{Automation, TickReport};
pub use budget::{
    Budget, BudgetAlert, BudgetAlertKind, BudgetAnalytics, BudgetCategory, BudgetError,
    BudgetResult, BudgetStatus, BudgetTracker, BudgetType, BudgetUpdate, Expense, NewBudget,
    SqliteBudgetStore,
};
pub use catalog::{
    CatalogError, CatalogResult, Ingredient, IngredientUpdate, NewIngredient, NewRecipe, Purchase,
    Recipe, RecipeLine, SqliteCatalogStore, StockTransaction, StockTransactionKind,
};
pub use config::{load_heytrack_config, parse_heytrack_config, HeyTrackConfig, PriceBasis};
pub use error::{ConfigError, Result, ValidationError};
pub use hpp::{
    HppAlert, HppBreakdown, HppCalculator, HppRecord, HppRun, HppService, PriceSuggestion,
};
pub use reorder::{
    AutoReorder, NewPurchaseOrder, NewPurchaseOrderItem, NewSupplier, PurchaseOrder,
    PurchaseOrderStatus, ReorderEngine, ReorderError, ReorderResult, ReorderRule,
    ReorderSuggestion, ReorderSummary, ReorderUrgency, SqliteReorderStore, Supplier,
};
pub use sqlite::{DatabaseError, SqliteDatabase, SqliteDatabaseBuilder};
