use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::budget::BudgetTracker;
use crate::config::AutomationSection;
use crate::hpp::HppService;
use crate::reorder::AutoReorder;

/// What one pass of the scheduled jobs did. `None` means the job is disabled or failed.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TickReport {
    pub today: Option<NaiveDate>,
    pub reorder_alerts: Option<usize>,
    pub auto_orders: Option<usize>,
    pub budgets_renewed: Option<usize>,
    pub hpp_calculated: Option<usize>,
    pub hpp_alerts: Option<usize>,
    pub errors: Vec<String>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Periodic back-office jobs: reorder check, budget renewal and HPP refresh.
pub struct Automation {
    config: AutomationSection,
    reorder: AutoReorder,
    budgets: BudgetTracker,
    hpp: HppService,
}

impl Automation {
    pub fn new(
        config: AutomationSection,
        reorder: AutoReorder,
        budgets: BudgetTracker,
        hpp: HppService,
    ) -> Self {
        Self {
            config,
            reorder,
            budgets,
            hpp,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.config.interval_minutes.max(1) * 60)
    }

    /// Runs every enabled job once. A failing job is logged and the rest still run.
    pub fn run_tick(&self, today: NaiveDate) -> TickReport {
        let mut report = TickReport {
            today: Some(today),
            ..Default::default()
        };

        if self.config.reorder_enabled {
            match self.reorder.check(today) {
                Ok(summary) => {
                    report.reorder_alerts = Some(summary.total_alerts);
                    report.auto_orders = Some(summary.auto_orders_generated);
                }
                Err(err) => {
                    warn!(job = "reorder", error = %err, "automation job failed");
                    report.errors.push(format!("reorder: {err}"));
                }
            }
        }

        if self.config.budget_renewal_enabled {
            match self.budgets.auto_renew(today) {
                Ok(renewed) => report.budgets_renewed = Some(renewed.len()),
                Err(err) => {
                    warn!(job = "budget_renewal", error = %err, "automation job failed");
                    report.errors.push(format!("budget_renewal: {err}"));
                }
            }
        }

        if self.config.hpp_refresh_enabled {
            match self.hpp.calculate_all() {
                Ok(batch) => {
                    report.hpp_calculated = Some(batch.calculated);
                    report.hpp_alerts = Some(batch.alerts);
                }
                Err(err) => {
                    warn!(job = "hpp_refresh", error = %err, "automation job failed");
                    report.errors.push(format!("hpp_refresh: {err}"));
                }
            }
        }

        info!(
            %today,
            reorder_alerts = ?report.reorder_alerts,
            auto_orders = ?report.auto_orders,
            budgets_renewed = ?report.budgets_renewed,
            hpp_calculated = ?report.hpp_calculated,
            errors = report.errors.len(),
            "automation tick finished"
        );
        report
    }

    /// Ticks on the configured interval until `shutdown` flips to true or its sender drops.
    /// Returns the number of ticks run.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut ticker = interval(self.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0;
        info!(interval_minutes = self.config.interval_minutes, "automation loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_tick(Local::now().date_naive());
                    ticks += 1;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(ticks, "automation loop stopped");
        ticks
    }
}
