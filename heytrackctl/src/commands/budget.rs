use chrono::NaiveDate;
use clap::{Args, Subcommand};
use heytrack_core::budget::BudgetImpact;
use heytrack_core::{
    Budget, BudgetAlert, BudgetAnalytics, BudgetCategory, BudgetStatus, BudgetType, Expense,
    NewBudget,
};
use serde::Serialize;

use crate::{render, rupiah, today, AppContext, DisplayFallback, OutputFormat, Result};

use super::catalog::IdArgs;

#[derive(Subcommand, Debug)]
pub enum BudgetCommands {
    /// Creates a budget; the period end follows the budget type unless given
    Create(BudgetCreateArgs),
    /// Lists budgets
    List(BudgetListArgs),
    /// Spend status of one budget or of every active budget
    Status(BudgetStatusArgs),
    /// Books an expense against every matching budget
    Expense(ExpenseArgs),
    /// Totals, utilization and per-category breakdown
    Analytics(DateArgs),
    /// Rolls expired monthly budgets into their next period
    Renew(DateArgs),
    /// Alerts raised so far
    Alerts(BudgetAlertsArgs),
    /// Stops a budget from receiving expenses
    Deactivate(IdArgs),
}

#[derive(Args, Debug)]
pub struct BudgetCreateArgs {
    pub name: String,
    /// daily | weekly | monthly | project
    #[arg(long = "type", default_value = "monthly")]
    pub budget_type: BudgetType,
    /// total | ingredients | operations | marketing | labor | utilities | other
    #[arg(long, default_value = "total")]
    pub category: BudgetCategory,
    /// Target amount for the period
    #[arg(long)]
    pub target: f64,
    /// Period start (defaults to today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: Option<NaiveDate>,
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end: Option<NaiveDate>,
    /// Alert threshold as a fraction, 0.8 = 80 %
    #[arg(long)]
    pub threshold: Option<f64>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args, Debug)]
pub struct BudgetListArgs {
    /// Include deactivated budgets
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct BudgetStatusArgs {
    /// Single budget; all active budgets when omitted
    #[arg(value_name = "ID")]
    pub id: Option<String>,
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct ExpenseArgs {
    #[arg(long)]
    pub amount: f64,
    /// Expense category (bahan_baku, operasional, gaji, listrik, ... or a budget category)
    #[arg(long, default_value = "lainnya")]
    pub category: String,
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub reference: Option<String>,
}

#[derive(Args, Debug)]
pub struct DateArgs {
    /// Business date (defaults to today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct BudgetAlertsArgs {
    /// Only alerts of this budget
    #[arg(long)]
    pub budget: Option<String>,
}

pub fn run(context: &AppContext, command: &BudgetCommands, format: OutputFormat) -> Result<()> {
    let tracker = context.budgets();
    match command {
        BudgetCommands::Create(args) => render(&context.budget_create(args)?, format),
        BudgetCommands::List(args) => {
            let budgets = BudgetList {
                rows: tracker.list(args.all)?,
            };
            render(&budgets, format)
        }
        BudgetCommands::Status(args) => {
            let date = args.date.unwrap_or_else(today);
            let rows = match &args.id {
                Some(id) => vec![tracker.status(id, date)?],
                None => tracker.statuses(date)?,
            };
            render(&StatusList { rows }, format)
        }
        BudgetCommands::Expense(args) => render(&context.budget_expense(args)?, format),
        BudgetCommands::Analytics(args) => {
            render(&tracker.analytics(args.date.unwrap_or_else(today))?, format)
        }
        BudgetCommands::Renew(args) => {
            let renewed = BudgetList {
                rows: tracker.auto_renew(args.date.unwrap_or_else(today))?,
            };
            render(&renewed, format)
        }
        BudgetCommands::Alerts(args) => {
            let alerts = AlertList {
                rows: tracker.alerts(args.budget.as_deref())?,
            };
            render(&alerts, format)
        }
        BudgetCommands::Deactivate(args) => {
            tracker.deactivate(&args.id)?;
            render(&tracker.get(&args.id)?, format)
        }
    }
}

impl AppContext {
    pub fn budget_create(&self, args: &BudgetCreateArgs) -> Result<Budget> {
        let mut input = NewBudget::new(
            &args.name,
            args.budget_type,
            args.category,
            args.target,
            args.start.unwrap_or_else(today),
        );
        input.period_end = args.end;
        input.alert_threshold = args.threshold;
        input.description = args.description.clone();
        Ok(self.budgets().create(&input)?)
    }

    pub fn budget_expense(&self, args: &ExpenseArgs) -> Result<ExpenseReport> {
        let mut expense = Expense::new(
            args.amount,
            &args.category,
            args.date.unwrap_or_else(today),
        );
        expense.description = args.description.clone();
        expense.reference = args.reference.clone();
        let impacts = self.budgets().record_expense(&expense)?;
        Ok(ExpenseReport { expense, impacts })
    }
}

#[derive(Debug, Serialize)]
pub struct BudgetList {
    pub rows: Vec<Budget>,
}

#[derive(Debug, Serialize)]
pub struct StatusList {
    pub rows: Vec<BudgetStatus>,
}

#[derive(Debug, Serialize)]
pub struct ExpenseReport {
    pub expense: Expense,
    pub impacts: Vec<BudgetImpact>,
}

#[derive(Debug, Serialize)]
pub struct AlertList {
    pub rows: Vec<BudgetAlert>,
}

fn budget_line(budget: &Budget) -> String {
    format!(
        "{} | {} | {} {} | {} of {} ({:.1}%) | {}..{}{}",
        budget.id,
        budget.name,
        budget.budget_type,
        budget.category,
        rupiah(budget.current_spent),
        rupiah(budget.target_amount),
        budget.spent_percentage(),
        budget.period_start,
        budget.period_end,
        if budget.is_active { "" } else { " [inactive]" }
    )
}

impl DisplayFallback for Budget {
    fn display(&self) -> String {
        budget_line(self)
    }
}

impl DisplayFallback for BudgetList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No budgets".to_string();
        }
        self.rows.iter().map(budget_line).collect::<Vec<_>>().join("\n")
    }
}

impl DisplayFallback for StatusList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No active budgets".to_string();
        }
        let mut lines = Vec::new();
        for status in &self.rows {
            let flag = if status.is_over_budget {
                " [OVER BUDGET]"
            } else if status.is_over_threshold {
                " [THRESHOLD]"
            } else {
                ""
            };
            lines.push(format!(
                "{} {}: {:.1}% used, {} left, {} day(s) to go, {}/day{}",
                status.budget.id,
                status.budget.name,
                status.spent_percentage,
                rupiah(status.remaining_amount),
                status.days_remaining,
                rupiah(status.daily_average),
                flag
            ));
            if status.projected_overspend > 0.0 {
                lines.push(format!(
                    "  projected overspend: {}",
                    rupiah(status.projected_overspend)
                ));
            }
        }
        lines.join("\n")
    }
}

impl DisplayFallback for ExpenseReport {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Expense {} ({}) on {}",
            rupiah(self.expense.amount),
            self.expense.category,
            self.expense.date
        )];
        if self.impacts.is_empty() {
            lines.push("  no active budget covers this expense".to_string());
        }
        for impact in &self.impacts {
            lines.push(format!(
                "  - {}: {:.1}% -> {:.1}%",
                impact.budget_name, impact.previous_percentage, impact.spent_percentage
            ));
            for alert in &impact.alerts {
                lines.push(format!("    ! {} [{}]", alert, alert.severity()));
            }
        }
        lines.join("\n")
    }
}

impl DisplayFallback for BudgetAnalytics {
    fn display(&self) -> String {
        let mut lines = vec![
            format!("Budgets: {}", self.total_budgets),
            format!(
                "Spent {} of {} (average utilization {:.1}%)",
                rupiah(self.total_spent),
                rupiah(self.total_budget),
                self.average_utilization
            ),
            format!(
                "Over budget: {} | near threshold: {}",
                self.over_budget_count, self.near_threshold_count
            ),
        ];
        for (category, spend) in &self.category_breakdown {
            lines.push(format!(
                "  - {category}: {} of {} ({} budget(s))",
                rupiah(spend.spent),
                rupiah(spend.budgeted),
                spend.count
            ));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for AlertList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No budget alerts".to_string();
        }
        self.rows
            .iter()
            .map(|alert| {
                format!(
                    "[{}] {} {} ({}): {}",
                    alert.severity, alert.budget_id, alert.kind, alert.period_start, alert.message
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
