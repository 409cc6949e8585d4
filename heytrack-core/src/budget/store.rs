use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use crate::sqlite::SqliteDatabase;

use super::models::{
    Budget, BudgetAlert, BudgetAlertKind, BudgetCategory, BudgetType, BudgetUpdate, Expense,
};
use super::{BudgetError, BudgetResult};

/// Fully resolved budget row ready for insertion.
#[derive(Debug, Clone)]
pub struct BudgetDraft {
    pub name: String,
    pub description: Option<String>,
    pub budget_type: BudgetType,
    pub category: BudgetCategory,
    pub target_amount: f64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub alert_threshold: f64,
}

#[derive(Debug, Clone)]
pub struct SqliteBudgetStore {
    db: SqliteDatabase,
}

impl SqliteBudgetStore {
    pub fn new(db: SqliteDatabase) -> Self {
        Self { db }
    }

    fn open(&self) -> BudgetResult<Connection> {
        Ok(self.db.open()?)
    }

    pub fn insert(&self, draft: &BudgetDraft) -> BudgetResult<Budget> {
        let id = format!("bgt-{}", Uuid::new_v4().simple());
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO budgets (
                id, name, description, budget_type, category, target_amount,
                period_start, period_end, alert_threshold
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                draft.name.trim(),
                draft.description,
                draft.budget_type.as_str(),
                draft.category.as_str(),
                draft.target_amount,
                draft.period_start,
                draft.period_end,
                draft.alert_threshold,
            ],
        )?;
        require(&conn, &id)
    }

    pub fn fetch(&self, budget_id: &str) -> BudgetResult<Option<Budget>> {
        let conn = self.open()?;
        Ok(fetch(&conn, budget_id)?)
    }

    pub fn list(&self, include_inactive: bool) -> BudgetResult<Vec<Budget>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM budgets
             WHERE (?1 OR is_active = 1)
             ORDER BY period_start DESC, name COLLATE NOCASE ASC",
        )?;
        let rows = stmt
            .query_map([include_inactive], |row| Budget::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Active budgets whose period contains `date` and that count `category`.
    pub fn matching(&self, date: NaiveDate, category: BudgetCategory) -> BudgetResult<Vec<Budget>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM budgets
             WHERE is_active = 1
               AND period_start <= ?1
               AND period_end >= ?1
               AND category IN ('total', ?2)
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![date, category.as_str()], |row| Budget::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update(&self, budget_id: &str, update: &BudgetUpdate) -> BudgetResult<Budget> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE budgets
             SET name = COALESCE(?2, name),
                 description = COALESCE(?3, description),
                 target_amount = COALESCE(?4, target_amount),
                 alert_threshold = COALESCE(?5, alert_threshold),
                 period_end = COALESCE(?6, period_end),
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?1",
            params![
                budget_id,
                update.name.as_deref().map(str::trim),
                update.description,
                update.target_amount,
                update.alert_threshold,
                update.period_end,
            ],
        )?;
        if affected == 0 {
            return Err(not_found(budget_id));
        }
        require(&conn, budget_id)
    }

    pub fn set_active(&self, budget_id: &str, active: bool) -> BudgetResult<()> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE budgets SET is_active = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
            params![budget_id, active],
        )?;
        if affected == 0 {
            return Err(not_found(budget_id));
        }
        Ok(())
    }

    pub fn delete(&self, budget_id: &str) -> BudgetResult<()> {
        let conn = self.open()?;
        let affected = conn.execute("DELETE FROM budgets WHERE id = ?1", [budget_id])?;
        if affected == 0 {
            return Err(not_found(budget_id));
        }
        Ok(())
    }

    /// Books the expense against one budget and returns it with the updated spend.
    /// The ledger row and the running total move together or not at all.
    pub fn apply_expense(&self, budget_id: &str, expense: &Expense) -> BudgetResult<Budget> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO budget_transactions (budget_id, amount, kind, description, reference)
             VALUES (?1, ?2, 'expense', ?3, ?4)",
            params![budget_id, expense.amount, expense.description, expense.reference],
        )?;
        let affected = tx.execute(
            "UPDATE budgets
             SET current_spent = current_spent + ?2, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?1",
            params![budget_id, expense.amount],
        )?;
        if affected == 0 {
            return Err(not_found(budget_id));
        }
        let budget = require(&tx, budget_id)?;
        tx.commit()?;
        debug!(budget_id, amount = expense.amount, spent = budget.current_spent, "expense booked");
        Ok(budget)
    }

    /// Returns `false` when this kind already fired for the budget period.
    pub fn insert_alert(
        &self,
        budget: &Budget,
        kind: BudgetAlertKind,
        spent_percentage: f64,
        message: &str,
    ) -> BudgetResult<bool> {
        let conn = self.open()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO budget_alerts (
                budget_id, period_start, kind, severity, spent_percentage, message
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                budget.id,
                budget.period_start,
                kind.as_str(),
                kind.severity().as_str(),
                spent_percentage,
                message,
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn alerts(&self, budget_id: Option<&str>) -> BudgetResult<Vec<BudgetAlert>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM budget_alerts
             WHERE (?1 IS NULL OR budget_id = ?1)
             ORDER BY id DESC",
        )?;
        let rows = stmt
            .query_map([budget_id], |row| BudgetAlert::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn successor_exists(&self, budget: &Budget, period_start: NaiveDate) -> BudgetResult<bool> {
        let conn = self.open()?;
        let found: Option<String> = conn
            .query_row(
                "SELECT id FROM budgets
                 WHERE name = ?1 AND category = ?2 AND budget_type = ?3 AND period_start = ?4
                 LIMIT 1",
                params![
                    budget.name,
                    budget.category.as_str(),
                    budget.budget_type.as_str(),
                    period_start,
                ],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn fetch(conn: &Connection, budget_id: &str) -> rusqlite::Result<Option<Budget>> {
    conn.query_row("SELECT * FROM budgets WHERE id = ?1", [budget_id], |row| {
        Budget::from_row(row)
    })
    .optional()
}

fn require(conn: &Connection, budget_id: &str) -> BudgetResult<Budget> {
    fetch(conn, budget_id)?.ok_or_else(|| not_found(budget_id))
}

fn not_found(budget_id: &str) -> BudgetError {
    BudgetError::NotFound {
        budget_id: budget_id.to_string(),
    }
}
