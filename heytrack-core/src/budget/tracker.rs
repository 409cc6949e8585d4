use chrono::{Months, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::BudgetSection;

use super::models::{
    crossed_alerts, percentage_of, Budget, BudgetAlert, BudgetAlertKind, BudgetAnalytics,
    BudgetCategory, BudgetStatus, BudgetType, BudgetUpdate, Expense, NewBudget,
};
use super::store::{BudgetDraft, SqliteBudgetStore};
use super::{BudgetError, BudgetResult};

/// Effect of one expense on one budget.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetImpact {
    pub budget_id: String,
    pub budget_name: String,
    pub previous_percentage: f64,
    pub spent_percentage: f64,
    pub alerts: Vec<BudgetAlertKind>,
}

pub struct BudgetTracker {
    store: SqliteBudgetStore,
    config: BudgetSection,
}

impl BudgetTracker {
    pub fn new(store: SqliteBudgetStore, config: BudgetSection) -> Self {
        Self { store, config }
    }

    pub fn create(&self, input: &NewBudget) -> BudgetResult<Budget> {
        input.validate()?;
        let draft = BudgetDraft {
            name: input.name.clone(),
            description: input.description.clone(),
            budget_type: input.budget_type,
            category: input.category,
            target_amount: input.target_amount,
            period_start: input.period_start,
            period_end: input
                .period_end
                .unwrap_or_else(|| input.budget_type.period_end_from(input.period_start)),
            alert_threshold: input
                .alert_threshold
                .unwrap_or(self.config.default_alert_threshold),
        };
        let budget = self.store.insert(&draft)?;
        info!(
            budget_id = %budget.id,
            category = %budget.category,
            target = budget.target_amount,
            period_start = %budget.period_start,
            period_end = %budget.period_end,
            "budget created"
        );
        Ok(budget)
    }

    /// Books an expense against every active budget covering its date and category,
    /// raising each alert kind at most once per budget period.
    ///
    /// Each budget is booked in its own transaction. A budget that fails to book is
    /// logged and left out of the returned impacts; the others are still charged.
    pub fn record_expense(&self, expense: &Expense) -> BudgetResult<Vec<BudgetImpact>> {
        expense.validate()?;
        let category = BudgetCategory::for_expense(&expense.category);
        let budgets = self.store.matching(expense.date, category)?;
        let matched = budgets.len();
        let mut impacts = Vec::with_capacity(matched);

        for budget in budgets {
            let previous_percentage = budget.spent_percentage();
            let updated = match self.store.apply_expense(&budget.id, expense) {
                Ok(updated) => updated,
                Err(err) => {
                    warn!(
                        budget_id = %budget.id,
                        amount = expense.amount,
                        error = %err,
                        "failed to book expense on budget"
                    );
                    continue;
                }
            };
            let spent_percentage = updated.spent_percentage();
            let mut raised = Vec::new();

            for kind in crossed_alerts(previous_percentage, spent_percentage, updated.alert_threshold)
            {
                let message = alert_message(&updated, kind, spent_percentage);
                match self
                    .store
                    .insert_alert(&updated, kind, round2(spent_percentage), &message)
                {
                    Ok(true) => {
                        warn!(
                            budget_id = %updated.id,
                            kind = %kind,
                            spent_percentage,
                            "budget alert raised"
                        );
                        raised.push(kind);
                    }
                    Ok(false) => {}
                    Err(err) => {
                        warn!(budget_id = %updated.id, kind = %kind, error = %err, "failed to store budget alert");
                    }
                }
            }

            impacts.push(BudgetImpact {
                budget_id: updated.id.clone(),
                budget_name: updated.name.clone(),
                previous_percentage: round2(previous_percentage),
                spent_percentage: round2(spent_percentage),
                alerts: raised,
            });
        }

        if matched == 0 {
            info!(
                category = %category,
                date = %expense.date,
                amount = expense.amount,
                "expense matched no active budget"
            );
        }
        Ok(impacts)
    }

    pub fn status(&self, budget_id: &str, today: NaiveDate) -> BudgetResult<BudgetStatus> {
        let budget = self.get(budget_id)?;
        Ok(BudgetStatus::evaluate(budget, today))
    }

    /// Status of every active budget, most consumed first.
    pub fn statuses(&self, today: NaiveDate) -> BudgetResult<Vec<BudgetStatus>> {
        let mut statuses: Vec<BudgetStatus> = self
            .store
            .list(false)?
            .into_iter()
            .map(|budget| BudgetStatus::evaluate(budget, today))
            .collect();
        statuses.sort_by(|a, b| b.spent_percentage.total_cmp(&a.spent_percentage));
        Ok(statuses)
    }

    pub fn analytics(&self, today: NaiveDate) -> BudgetResult<BudgetAnalytics> {
        Ok(BudgetAnalytics::from_statuses(self.statuses(today)?))
    }

    /// Rolls monthly budgets that ended within the grace window into the next month.
    pub fn auto_renew(&self, today: NaiveDate) -> BudgetResult<Vec<Budget>> {
        let mut renewed = Vec::new();
        for budget in self.store.list(false)? {
            if budget.budget_type != BudgetType::Monthly {
                continue;
            }
            let days_since_end = (today - budget.period_end).num_days();
            if !(0..=self.config.renewal_grace_days).contains(&days_since_end) {
                continue;
            }
            let (Some(next_start), Some(next_end)) = (
                budget.period_start.checked_add_months(Months::new(1)),
                budget.period_end.checked_add_months(Months::new(1)),
            ) else {
                continue;
            };
            if self.store.successor_exists(&budget, next_start)? {
                continue;
            }
            let draft = BudgetDraft {
                name: budget.name.clone(),
                description: budget.description.clone(),
                budget_type: budget.budget_type,
                category: budget.category,
                target_amount: budget.target_amount,
                period_start: next_start,
                period_end: next_end,
                alert_threshold: budget.alert_threshold,
            };
            renewed.push(self.store.insert(&draft)?);
        }
        if !renewed.is_empty() {
            info!(count = renewed.len(), "budgets auto-renewed");
        }
        Ok(renewed)
    }

    pub fn get(&self, budget_id: &str) -> BudgetResult<Budget> {
        self.store
            .fetch(budget_id)?
            .ok_or_else(|| BudgetError::NotFound {
                budget_id: budget_id.to_string(),
            })
    }

    pub fn list(&self, include_inactive: bool) -> BudgetResult<Vec<Budget>> {
        self.store.list(include_inactive)
    }

    pub fn update(&self, budget_id: &str, update: &BudgetUpdate) -> BudgetResult<Budget> {
        update.validate()?;
        if let Some(end) = update.period_end {
            let current = self.get(budget_id)?;
            if end < current.period_start {
                return Err(crate::error::ValidationError::new(
                    "period_end",
                    "must not be before period_start",
                )
                .into());
            }
        }
        self.store.update(budget_id, update)
    }

    pub fn deactivate(&self, budget_id: &str) -> BudgetResult<()> {
        self.store.set_active(budget_id, false)?;
        info!(budget_id, "budget deactivated");
        Ok(())
    }

    pub fn delete(&self, budget_id: &str) -> BudgetResult<()> {
        self.store.delete(budget_id)?;
        info!(budget_id, "budget deleted");
        Ok(())
    }

    pub fn alerts(&self, budget_id: Option<&str>) -> BudgetResult<Vec<BudgetAlert>> {
        self.store.alerts(budget_id)
    }
}

fn alert_message(budget: &Budget, kind: BudgetAlertKind, spent_percentage: f64) -> String {
    match kind {
        BudgetAlertKind::ThresholdExceeded => format!(
            "Budget '{}' sudah terpakai {:.1}% (batas peringatan {:.0}%)",
            budget.name,
            spent_percentage,
            budget.alert_threshold * 100.0
        ),
        BudgetAlertKind::BudgetExceeded => format!(
            "Budget '{}' terlampaui: {:.1}% dari target, lebih {:.0}",
            budget.name,
            spent_percentage,
            (budget.current_spent - budget.target_amount).max(0.0)
        ),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
