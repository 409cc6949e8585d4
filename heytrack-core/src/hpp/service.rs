use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{CatalogError, CatalogResult, SqliteCatalogStore};
use crate::config::HppSection;

use super::calculator::{round_money, HppCalculator};
use super::models::{
    ChangeSeverity, HppAlert, HppBreakdown, HppRecord, MarginAnalysis, PriceSuggestion,
};
use super::pricing::{analyze_margin, suggest_prices};

/// Outcome of one recipe costing run.
#[derive(Debug, Clone, Serialize)]
pub struct HppRun {
    pub breakdown: HppBreakdown,
    pub record: HppRecord,
    pub alert: Option<HppAlert>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HppBatchReport {
    pub calculated: usize,
    pub failed: usize,
    pub alerts: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricingReport {
    pub recipe_id: String,
    pub cost_per_unit: f64,
    pub suggestions: Vec<PriceSuggestion>,
    pub margin: Option<MarginAnalysis>,
}

pub struct HppService {
    store: SqliteCatalogStore,
    calculator: HppCalculator,
}

impl HppService {
    pub fn new(store: SqliteCatalogStore, config: HppSection) -> Self {
        Self {
            store,
            calculator: HppCalculator::new(config),
        }
    }

    pub fn store(&self) -> &SqliteCatalogStore {
        &self.store
    }

    /// Costs a recipe, snapshots the result and flags large per-unit changes.
    pub fn calculate_recipe(&self, recipe_id: &str) -> CatalogResult<HppRun> {
        let recipe = self
            .store
            .fetch_recipe(recipe_id)?
            .ok_or_else(|| CatalogError::RecipeNotFound {
                recipe_id: recipe_id.to_string(),
            })?;
        let materials = self.store.recipe_materials(recipe_id)?;
        let breakdown = self.calculator.calculate(&recipe, &materials);

        let previous = self.store.latest_hpp(recipe_id)?;
        let record = self.store.save_hpp(&breakdown)?;

        let mut alert = None;
        if let Some(previous) = previous.filter(|prev| prev.cost_per_unit > 0.0) {
            let change = (record.cost_per_unit - previous.cost_per_unit) / previous.cost_per_unit
                * 100.0;
            let threshold = self.calculator.config().change_alert_percent;
            if change.abs() > threshold {
                let severity = ChangeSeverity::for_change(change, threshold);
                warn!(
                    recipe_id,
                    previous = previous.cost_per_unit,
                    current = record.cost_per_unit,
                    change_percent = change,
                    severity = %severity,
                    "hpp per-unit cost moved beyond alert threshold"
                );
                alert = Some(self.store.record_hpp_alert(
                    recipe_id,
                    previous.cost_per_unit,
                    record.cost_per_unit,
                    round_money(change),
                    severity,
                )?);
            }
        }

        info!(
            recipe_id,
            total_hpp = breakdown.total_hpp,
            cost_per_unit = breakdown.cost_per_unit,
            skipped = breakdown.skipped_ingredients.len(),
            "hpp calculated"
        );
        Ok(HppRun {
            breakdown,
            record,
            alert,
        })
    }

    /// Recalculates every active recipe; one failing recipe does not stop the batch.
    pub fn calculate_all(&self) -> CatalogResult<HppBatchReport> {
        let mut report = HppBatchReport::default();
        for recipe in self.store.list_recipes(false)? {
            match self.calculate_recipe(&recipe.id) {
                Ok(run) => {
                    report.calculated += 1;
                    if run.alert.is_some() {
                        report.alerts += 1;
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(recipe_id = %recipe.id, error = %err, "hpp calculation failed");
                }
            }
        }
        Ok(report)
    }

    pub fn latest(&self, recipe_id: &str) -> CatalogResult<Option<HppRecord>> {
        self.store.latest_hpp(recipe_id)
    }

    pub fn history(&self, recipe_id: &str, limit: usize) -> CatalogResult<Vec<HppRecord>> {
        self.store.hpp_history(recipe_id, limit)
    }

    pub fn alerts(&self, limit: usize) -> CatalogResult<Vec<HppAlert>> {
        self.store.hpp_alerts(limit)
    }

    /// Tiered price suggestions from the latest snapshot, calculating one if none exists.
    pub fn pricing(&self, recipe_id: &str) -> CatalogResult<PricingReport> {
        let cost_per_unit = match self.store.latest_hpp(recipe_id)? {
            Some(record) => record.cost_per_unit,
            None => self.calculate_recipe(recipe_id)?.record.cost_per_unit,
        };
        let recipe = self
            .store
            .fetch_recipe(recipe_id)?
            .ok_or_else(|| CatalogError::RecipeNotFound {
                recipe_id: recipe_id.to_string(),
            })?;
        Ok(PricingReport {
            recipe_id: recipe_id.to_string(),
            cost_per_unit,
            suggestions: suggest_prices(cost_per_unit, &self.calculator.config().pricing_tiers),
            margin: recipe
                .selling_price
                .map(|price| analyze_margin(cost_per_unit, price)),
        })
    }
}
