use clap::{Args, Subcommand};
use heytrack_core::hpp::{HppAlert, HppBatchReport, HppRecord, HppRun, PricingReport};
use serde::Serialize;

use crate::{render, rupiah, AppContext, DisplayFallback, OutputFormat, Result};

use super::catalog::IdArgs;

#[derive(Subcommand, Debug)]
pub enum HppCommands {
    /// Calculates and snapshots the HPP of one recipe
    Calc(IdArgs),
    /// Recalculates every active recipe
    CalcAll,
    /// Latest HPP snapshot of a recipe
    Latest(IdArgs),
    /// Snapshot history of a recipe, newest first
    History(HistoryArgs),
    /// Recent cost change alerts
    Alerts(LimitArgs),
    /// Tiered price suggestions and margin of the current selling price
    Price(IdArgs),
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[arg(value_name = "ID")]
    pub id: String,
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct LimitArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

pub fn run(context: &AppContext, command: &HppCommands, format: OutputFormat) -> Result<()> {
    let service = context.hpp();
    match command {
        HppCommands::Calc(args) => render(&service.calculate_recipe(&args.id)?, format),
        HppCommands::CalcAll => render(&service.calculate_all()?, format),
        HppCommands::Latest(args) => {
            let latest = LatestHpp {
                recipe_id: args.id.clone(),
                record: service.latest(&args.id)?,
            };
            render(&latest, format)
        }
        HppCommands::History(args) => {
            let history = HppHistory {
                recipe_id: args.id.clone(),
                rows: service.history(&args.id, args.limit)?,
            };
            render(&history, format)
        }
        HppCommands::Alerts(args) => {
            let alerts = HppAlertList {
                rows: service.alerts(args.limit)?,
            };
            render(&alerts, format)
        }
        HppCommands::Price(args) => render(&service.pricing(&args.id)?, format),
    }
}

#[derive(Debug, Serialize)]
pub struct LatestHpp {
    pub recipe_id: String,
    pub record: Option<HppRecord>,
}

#[derive(Debug, Serialize)]
pub struct HppHistory {
    pub recipe_id: String,
    pub rows: Vec<HppRecord>,
}

#[derive(Debug, Serialize)]
pub struct HppAlertList {
    pub rows: Vec<HppAlert>,
}

fn record_line(record: &HppRecord) -> String {
    let when = record
        .calculated_at
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "#{} {} | material={} labor={} overhead={} | total={} | per unit={}",
        record.id,
        when,
        rupiah(record.material_cost),
        rupiah(record.labor_cost),
        rupiah(record.overhead_cost),
        rupiah(record.total_hpp),
        rupiah(record.cost_per_unit)
    )
}

impl DisplayFallback for HppRun {
    fn display(&self) -> String {
        let breakdown = &self.breakdown;
        let mut lines = vec![format!(
            "HPP {} ({}), {} servings",
            breakdown.recipe_name, breakdown.recipe_id, breakdown.servings
        )];
        for material in &breakdown.materials {
            lines.push(format!(
                "  - {} {} {} x {} = {}",
                material.ingredient_name,
                material.quantity,
                material.unit,
                rupiah(material.unit_price),
                rupiah(material.total_cost)
            ));
        }
        for skipped in &breakdown.skipped_ingredients {
            lines.push(format!("  ! {skipped} skipped (ingredient missing)"));
        }
        lines.push(format!("Material: {}", rupiah(breakdown.material_cost)));
        lines.push(format!("Labor: {}", rupiah(breakdown.labor_cost)));
        lines.push(format!("Overhead: {}", rupiah(breakdown.overhead_cost)));
        lines.push(format!("Total HPP: {}", rupiah(breakdown.total_hpp)));
        lines.push(format!("Per unit: {}", rupiah(breakdown.cost_per_unit)));
        if let Some(alert) = &self.alert {
            lines.push(format!(
                "Alert [{}]: per-unit cost {} -> {} ({:+.1}%)",
                alert.severity,
                rupiah(alert.previous_cost),
                rupiah(alert.new_cost),
                alert.change_percent
            ));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for HppBatchReport {
    fn display(&self) -> String {
        format!(
            "Recalculated {} recipe(s), {} failed, {} alert(s)",
            self.calculated, self.failed, self.alerts
        )
    }
}

impl DisplayFallback for LatestHpp {
    fn display(&self) -> String {
        match &self.record {
            Some(record) => record_line(record),
            None => format!("No HPP snapshot for {} yet", self.recipe_id),
        }
    }
}

impl DisplayFallback for HppHistory {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return format!("No HPP snapshot for {} yet", self.recipe_id);
        }
        self.rows.iter().map(record_line).collect::<Vec<_>>().join("\n")
    }
}

impl DisplayFallback for HppAlertList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No HPP alerts".to_string();
        }
        self.rows
            .iter()
            .map(|alert| {
                format!(
                    "[{}] {} {} -> {} ({:+.1}%)",
                    alert.severity,
                    alert.recipe_id,
                    rupiah(alert.previous_cost),
                    rupiah(alert.new_cost),
                    alert.change_percent
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DisplayFallback for PricingReport {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "{}: HPP per unit {}",
            self.recipe_id,
            rupiah(self.cost_per_unit)
        )];
        for suggestion in &self.suggestions {
            lines.push(format!(
                "  - {} (+{:.0}%): {}",
                suggestion.tier,
                suggestion.margin * 100.0,
                rupiah(suggestion.price)
            ));
        }
        if let Some(margin) = &self.margin {
            lines.push(format!(
                "Current price {}: profit {} | margin {:.1}% | markup {:.1}%",
                rupiah(margin.selling_price),
                rupiah(margin.gross_profit),
                margin.margin_percent,
                margin.markup_percent
            ));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::prepare_test_context;
    use heytrack_core::{NewIngredient, NewRecipe};

    #[test]
    fn pricing_report_uses_configured_tiers() {
        let (_temp, context) = prepare_test_context();
        let catalog = context.catalog();
        let flour = catalog
            .add_ingredient(&NewIngredient::new("Tepung Terigu", "kg", 10_000.0))
            .unwrap();
        let sugar = catalog
            .add_ingredient(&NewIngredient::new("Gula Pasir", "kg", 10_000.0))
            .unwrap();
        let mut input = NewRecipe::new("Roti Manis", 1)
            .with_line(&flour.id, 5.0, "kg")
            .with_line(&sugar.id, 5.0, "kg");
        input.selling_price = Some(150_000.0);
        let recipe = catalog.add_recipe(&input).unwrap();

        let run = context.hpp().calculate_recipe(&recipe.id).unwrap();
        assert_eq!(run.breakdown.total_hpp, 115_000.0);
        assert!(run.display().contains("Total HPP: Rp 115.000"));

        let report = context.hpp().pricing(&recipe.id).unwrap();
        let prices: Vec<f64> = report.suggestions.iter().map(|s| s.price).collect();
        assert_eq!(prices, vec![149_500.0, 184_000.0, 230_000.0]);
        let margin = report.margin.as_ref().unwrap();
        assert_eq!(margin.gross_profit, 35_000.0);
        assert!(report.display().contains("economy (+30%): Rp 149.500"));
    }

    #[test]
    fn latest_without_snapshot_says_so() {
        let latest = LatestHpp {
            recipe_id: "rcp-1".into(),
            record: None,
        };
        assert_eq!(latest.display(), "No HPP snapshot for rcp-1 yet");
    }
}
