use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::catalog::models::to_utc;
use crate::error::ValidationError;
use crate::validation::{self, MAX_NAME_LEN, MAX_NOTE_LEN};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BudgetType {
    Daily,
    Weekly,
    Monthly,
    Project,
}

impl BudgetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetType::Daily => "daily",
            BudgetType::Weekly => "weekly",
            BudgetType::Monthly => "monthly",
            BudgetType::Project => "project",
        }
    }

    /// Default period end for a budget starting on `start`.
    pub fn period_end_from(&self, start: NaiveDate) -> NaiveDate {
        match self {
            BudgetType::Daily => start + Duration::days(1),
            BudgetType::Weekly => start + Duration::days(7),
            BudgetType::Monthly => start
                .checked_add_months(Months::new(1))
                .unwrap_or(start + Duration::days(30)),
            BudgetType::Project => start + Duration::days(30),
        }
    }
}

impl fmt::Display for BudgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BudgetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(BudgetType::Daily),
            "weekly" => Ok(BudgetType::Weekly),
            "monthly" => Ok(BudgetType::Monthly),
            "project" => Ok(BudgetType::Project),
            other => Err(format!("unknown budget type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BudgetCategory {
    Total,
    Ingredients,
    Operations,
    Marketing,
    Labor,
    Utilities,
    Other,
}

impl BudgetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetCategory::Total => "total",
            BudgetCategory::Ingredients => "ingredients",
            BudgetCategory::Operations => "operations",
            BudgetCategory::Marketing => "marketing",
            BudgetCategory::Labor => "labor",
            BudgetCategory::Utilities => "utilities",
            BudgetCategory::Other => "other",
        }
    }

    /// Maps a bookkeeping expense category onto the budget it counts against.
    pub fn for_expense(category: &str) -> Self {
        let normalized = category.trim().to_lowercase();
        match normalized.as_str() {
            "bahan_baku" => BudgetCategory::Ingredients,
            "operasional" | "sewa" => BudgetCategory::Operations,
            "marketing" => BudgetCategory::Marketing,
            "gaji" => BudgetCategory::Labor,
            "listrik" | "air" => BudgetCategory::Utilities,
            "lainnya" => BudgetCategory::Other,
            other => other.parse().unwrap_or(BudgetCategory::Other),
        }
    }
}

impl fmt::Display for BudgetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BudgetCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total" => Ok(BudgetCategory::Total),
            "ingredients" => Ok(BudgetCategory::Ingredients),
            "operations" => Ok(BudgetCategory::Operations),
            "marketing" => Ok(BudgetCategory::Marketing),
            "labor" => Ok(BudgetCategory::Labor),
            "utilities" => Ok(BudgetCategory::Utilities),
            "other" => Ok(BudgetCategory::Other),
            other => Err(format!("unknown budget category: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub budget_type: BudgetType,
    pub category: BudgetCategory,
    pub target_amount: f64,
    pub current_spent: f64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Fraction of the target, 0.8 = warn at 80 %.
    pub alert_threshold: f64,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Budget {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            budget_type: row
                .get::<_, String>("budget_type")?
                .parse()
                .unwrap_or(BudgetType::Monthly),
            category: row
                .get::<_, String>("category")?
                .parse()
                .unwrap_or(BudgetCategory::Other),
            target_amount: row.get("target_amount")?,
            current_spent: row.get("current_spent")?,
            period_start: row.get("period_start")?,
            period_end: row.get("period_end")?,
            alert_threshold: row.get("alert_threshold")?,
            is_active: row.get::<_, i64>("is_active")? != 0,
            created_at: to_utc(row.get("created_at")?),
            updated_at: to_utc(row.get("updated_at")?),
        })
    }

    /// Raw spend ratio in percent; 0 when the target is not positive.
    pub fn spent_percentage(&self) -> f64 {
        percentage_of(self.current_spent, self.target_amount)
    }
}

pub(crate) fn percentage_of(spent: f64, target: f64) -> f64 {
    if target > 0.0 {
        spent / target * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewBudget {
    pub name: String,
    pub description: Option<String>,
    pub budget_type: BudgetType,
    pub category: BudgetCategory,
    pub target_amount: f64,
    pub period_start: NaiveDate,
    /// Derived from the budget type when absent.
    pub period_end: Option<NaiveDate>,
    /// Falls back to the configured default when absent.
    pub alert_threshold: Option<f64>,
}

impl NewBudget {
    pub fn new(
        name: impl Into<String>,
        budget_type: BudgetType,
        category: BudgetCategory,
        target_amount: f64,
        period_start: NaiveDate,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            budget_type,
            category,
            target_amount,
            period_start,
            period_end: None,
            alert_threshold: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::require_text("name", &self.name, MAX_NAME_LEN)?;
        validation::optional_text("description", self.description.as_deref(), MAX_NOTE_LEN)?;
        validation::positive("target_amount", self.target_amount)?;
        if let Some(threshold) = self.alert_threshold {
            validation::fraction("alert_threshold", threshold)?;
        }
        if let Some(end) = self.period_end {
            if end < self.period_start {
                return Err(ValidationError::new(
                    "period_end",
                    "must not be before period_start",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BudgetUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub target_amount: Option<f64>,
    pub alert_threshold: Option<f64>,
    pub period_end: Option<NaiveDate>,
}

impl BudgetUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validation::require_text("name", name, MAX_NAME_LEN)?;
        }
        validation::optional_text("description", self.description.as_deref(), MAX_NOTE_LEN)?;
        if let Some(target) = self.target_amount {
            validation::positive("target_amount", target)?;
        }
        if let Some(threshold) = self.alert_threshold {
            validation::fraction("alert_threshold", threshold)?;
        }
        Ok(())
    }
}

/// A spend booked against every matching budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Expense {
    pub amount: f64,
    pub category: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub reference: Option<String>,
}

impl Expense {
    pub fn new(amount: f64, category: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            amount,
            category: category.into(),
            date,
            description: None,
            reference: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::positive("amount", self.amount)?;
        validation::require_text("category", &self.category, 100)?;
        validation::optional_text("description", self.description.as_deref(), MAX_NOTE_LEN)?;
        validation::optional_text("reference", self.reference.as_deref(), 100)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BudgetAlertKind {
    ThresholdExceeded,
    BudgetExceeded,
}

impl BudgetAlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetAlertKind::ThresholdExceeded => "threshold_exceeded",
            BudgetAlertKind::BudgetExceeded => "budget_exceeded",
        }
    }

    pub fn severity(&self) -> AlertSeverity {
        match self {
            BudgetAlertKind::ThresholdExceeded => AlertSeverity::Warning,
            BudgetAlertKind::BudgetExceeded => AlertSeverity::Critical,
        }
    }
}

impl fmt::Display for BudgetAlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BudgetAlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "threshold_exceeded" => Ok(BudgetAlertKind::ThresholdExceeded),
            "budget_exceeded" => Ok(BudgetAlertKind::BudgetExceeded),
            other => Err(format!("unknown budget alert kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warning" => Ok(AlertSeverity::Warning),
            "critical" => Ok(AlertSeverity::Critical),
            other => Err(format!("unknown alert severity: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetAlert {
    pub id: i64,
    pub budget_id: String,
    pub period_start: NaiveDate,
    pub kind: BudgetAlertKind,
    pub severity: AlertSeverity,
    pub spent_percentage: f64,
    pub message: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl BudgetAlert {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind: BudgetAlertKind = row
            .get::<_, String>("kind")?
            .parse()
            .unwrap_or(BudgetAlertKind::ThresholdExceeded);
        Ok(Self {
            id: row.get("id")?,
            budget_id: row.get("budget_id")?,
            period_start: row.get("period_start")?,
            kind,
            severity: row
                .get::<_, String>("severity")?
                .parse()
                .unwrap_or_else(|_| kind.severity()),
            spent_percentage: row.get("spent_percentage")?,
            message: row.get("message")?,
            created_at: to_utc(row.get("created_at")?),
        })
    }
}

/// Alert kinds crossed by moving from `previous` to `current` percent.
///
/// A kind fires only on the step that carries spend strictly past its line,
/// so a budget sitting exactly on the line has not crossed it yet.
pub fn crossed_alerts(previous: f64, current: f64, threshold: f64) -> Vec<BudgetAlertKind> {
    let mut kinds = Vec::new();
    let threshold_percent = threshold * 100.0;
    if previous <= threshold_percent && current > threshold_percent {
        kinds.push(BudgetAlertKind::ThresholdExceeded);
    }
    if previous <= 100.0 && current > 100.0 {
        kinds.push(BudgetAlertKind::BudgetExceeded);
    }
    kinds
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetStatus {
    pub budget: Budget,
    pub spent_percentage: f64,
    pub remaining_amount: f64,
    pub days_remaining: i64,
    pub daily_average: f64,
    pub is_over_threshold: bool,
    pub is_over_budget: bool,
    pub projected_overspend: f64,
}

impl BudgetStatus {
    pub fn evaluate(budget: Budget, today: NaiveDate) -> Self {
        let raw_percentage = budget.spent_percentage();
        let remaining_amount = (budget.target_amount - budget.current_spent).max(0.0);
        let days_remaining = (budget.period_end - today).num_days().max(0);
        let days_elapsed = (today - budget.period_start).num_days().max(1);
        let daily_average = if days_remaining > 0 {
            budget.current_spent / days_elapsed as f64
        } else {
            0.0
        };
        let projected_overspend = if daily_average > 0.0 && days_remaining > 0 {
            (budget.current_spent + daily_average * days_remaining as f64 - budget.target_amount)
                .max(0.0)
        } else {
            0.0
        };
        Self {
            spent_percentage: (raw_percentage * 100.0).round() / 100.0,
            remaining_amount: remaining_amount.round(),
            days_remaining,
            daily_average: daily_average.round(),
            is_over_threshold: raw_percentage > budget.alert_threshold * 100.0,
            is_over_budget: raw_percentage > 100.0,
            projected_overspend: projected_overspend.round(),
            budget,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategorySpend {
    pub budgeted: f64,
    pub spent: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BudgetAnalytics {
    pub total_budgets: usize,
    pub total_budget: f64,
    pub total_spent: f64,
    pub average_utilization: f64,
    pub over_budget_count: usize,
    pub near_threshold_count: usize,
    pub category_breakdown: BTreeMap<String, CategorySpend>,
    pub budgets: Vec<BudgetStatus>,
}

impl BudgetAnalytics {
    pub fn from_statuses(statuses: Vec<BudgetStatus>) -> Self {
        let mut analytics = BudgetAnalytics {
            total_budgets: statuses.len(),
            ..Default::default()
        };
        for status in &statuses {
            analytics.total_budget += status.budget.target_amount;
            analytics.total_spent += status.budget.current_spent;
            if status.is_over_budget {
                analytics.over_budget_count += 1;
            } else if status.is_over_threshold {
                analytics.near_threshold_count += 1;
            }
            let entry = analytics
                .category_breakdown
                .entry(status.budget.category.as_str().to_string())
                .or_default();
            entry.budgeted += status.budget.target_amount;
            entry.spent += status.budget.current_spent;
            entry.count += 1;
        }
        analytics.average_utilization =
            (percentage_of(analytics.total_spent, analytics.total_budget) * 100.0).round() / 100.0;
        analytics.total_budget = analytics.total_budget.round();
        analytics.total_spent = analytics.total_spent.round();
        analytics.budgets = statuses;
        analytics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn budget(target: f64, spent: f64) -> Budget {
        Budget {
            id: "bgt-1".into(),
            name: "Bahan baku Oktober".into(),
            description: None,
            budget_type: BudgetType::Monthly,
            category: BudgetCategory::Ingredients,
            target_amount: target,
            current_spent: spent,
            period_start: date(2026, 10, 1),
            period_end: date(2026, 10, 31),
            alert_threshold: 0.8,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn period_end_follows_type() {
        let start = date(2026, 1, 31);
        assert_eq!(BudgetType::Daily.period_end_from(start), date(2026, 2, 1));
        assert_eq!(BudgetType::Weekly.period_end_from(start), date(2026, 2, 7));
        assert_eq!(BudgetType::Monthly.period_end_from(start), date(2026, 2, 28));
        assert_eq!(BudgetType::Project.period_end_from(start), date(2026, 3, 2));
    }

    #[test]
    fn expense_categories_map_onto_budgets() {
        assert_eq!(BudgetCategory::for_expense("bahan_baku"), BudgetCategory::Ingredients);
        assert_eq!(BudgetCategory::for_expense("Operasional"), BudgetCategory::Operations);
        assert_eq!(BudgetCategory::for_expense("sewa"), BudgetCategory::Operations);
        assert_eq!(BudgetCategory::for_expense("gaji"), BudgetCategory::Labor);
        assert_eq!(BudgetCategory::for_expense("listrik"), BudgetCategory::Utilities);
        assert_eq!(BudgetCategory::for_expense("air"), BudgetCategory::Utilities);
        assert_eq!(BudgetCategory::for_expense("marketing"), BudgetCategory::Marketing);
        assert_eq!(BudgetCategory::for_expense("labor"), BudgetCategory::Labor);
        assert_eq!(BudgetCategory::for_expense("parkir"), BudgetCategory::Other);
    }

    #[test]
    fn crossing_requires_moving_past_the_line() {
        assert_eq!(
            crossed_alerts(70.0, 85.0, 0.8),
            vec![BudgetAlertKind::ThresholdExceeded]
        );
        assert!(crossed_alerts(70.0, 80.0, 0.8).is_empty());
        assert_eq!(
            crossed_alerts(80.0, 80.5, 0.8),
            vec![BudgetAlertKind::ThresholdExceeded]
        );
        assert!(crossed_alerts(85.0, 95.0, 0.8).is_empty());
        assert_eq!(
            crossed_alerts(50.0, 120.0, 0.8),
            vec![
                BudgetAlertKind::ThresholdExceeded,
                BudgetAlertKind::BudgetExceeded
            ]
        );
        assert!(crossed_alerts(110.0, 130.0, 0.8).is_empty());
    }

    #[test]
    fn status_projects_spending_rate() {
        // Nine days elapsed, 400,000 of 1,000,000 spent, 21 days left.
        let status = BudgetStatus::evaluate(budget(1_000_000.0, 400_000.0), date(2026, 10, 10));
        assert_eq!(status.spent_percentage, 40.0);
        assert_eq!(status.remaining_amount, 600_000.0);
        assert_eq!(status.days_remaining, 21);
        assert_eq!(status.daily_average, 44_444.0);
        assert!(!status.is_over_threshold);
        assert!(!status.is_over_budget);
        assert_eq!(status.projected_overspend, 333_333.0);
    }

    #[test]
    fn status_after_period_end_stops_projecting() {
        let status = BudgetStatus::evaluate(budget(1_000.0, 1_250.0), date(2026, 11, 5));
        assert_eq!(status.days_remaining, 0);
        assert_eq!(status.daily_average, 0.0);
        assert_eq!(status.projected_overspend, 0.0);
        assert_eq!(status.remaining_amount, 0.0);
        assert!(status.is_over_threshold);
        assert!(status.is_over_budget);
    }

    #[test]
    fn zero_target_never_divides() {
        let mut zero = budget(1.0, 50.0);
        zero.target_amount = 0.0;
        assert_eq!(zero.spent_percentage(), 0.0);
    }

    #[test]
    fn analytics_groups_by_category() {
        let today = date(2026, 10, 15);
        let mut marketing = budget(500.0, 450.0);
        marketing.category = BudgetCategory::Marketing;
        let statuses = vec![
            BudgetStatus::evaluate(budget(1_000.0, 1_100.0), today),
            BudgetStatus::evaluate(budget(1_000.0, 100.0), today),
            BudgetStatus::evaluate(marketing, today),
        ];
        let analytics = BudgetAnalytics::from_statuses(statuses);
        assert_eq!(analytics.total_budgets, 3);
        assert_eq!(analytics.total_budget, 2_500.0);
        assert_eq!(analytics.total_spent, 1_650.0);
        assert_eq!(analytics.average_utilization, 66.0);
        assert_eq!(analytics.over_budget_count, 1);
        assert_eq!(analytics.near_threshold_count, 1);
        assert_eq!(analytics.category_breakdown["ingredients"].count, 2);
        assert_eq!(analytics.category_breakdown["marketing"].spent, 450.0);
    }
}
