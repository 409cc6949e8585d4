pub mod error;
pub mod models;
pub mod store;
pub mod tracker;

pub use error::{BudgetError, BudgetResult};
pub use models::{
    crossed_alerts, AlertSeverity, Budget, BudgetAlert, BudgetAlertKind, BudgetAnalytics,
    BudgetCategory, BudgetStatus, BudgetType, BudgetUpdate, CategorySpend, Expense, NewBudget,
};
pub use store::{BudgetDraft, SqliteBudgetStore};
pub use tracker::{BudgetImpact, BudgetTracker};
