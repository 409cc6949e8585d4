use tracing::warn;

use crate::catalog::{Recipe, RecipeMaterial};
use crate::config::{HppSection, PriceBasis};

use super::models::{HppBreakdown, MaterialLine};

/// Pure cost-of-goods aggregation over a recipe and its joined ingredients.
#[derive(Debug, Clone)]
pub struct HppCalculator {
    config: HppSection,
}

impl Default for HppCalculator {
    fn default() -> Self {
        Self::new(HppSection::default())
    }
}

impl HppCalculator {
    pub fn new(config: HppSection) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HppSection {
        &self.config
    }

    pub fn calculate(&self, recipe: &Recipe, materials: &[RecipeMaterial]) -> HppBreakdown {
        let mut lines = Vec::with_capacity(materials.len());
        let mut skipped = Vec::new();
        let mut material_cost = 0.0;

        for material in materials {
            let Some(ingredient) = &material.ingredient else {
                warn!(
                    recipe_id = %recipe.id,
                    ingredient_id = %material.line.ingredient_id,
                    "ingredient missing from catalog, line skipped"
                );
                skipped.push(material.line.ingredient_id.clone());
                continue;
            };
            let unit_price = match self.config.price_basis {
                PriceBasis::WeightedAverage => ingredient
                    .weighted_average_cost
                    .unwrap_or(ingredient.price_per_unit),
                PriceBasis::List => ingredient.price_per_unit,
            };
            let line_cost = material.line.quantity * unit_price;
            material_cost += line_cost;
            lines.push(MaterialLine {
                ingredient_id: ingredient.id.clone(),
                ingredient_name: ingredient.name.clone(),
                quantity: material.line.quantity,
                unit: material.line.unit.clone(),
                unit_price,
                total_cost: round_money(line_cost),
            });
        }

        // Line totals are rounded for display only; costs accumulate unrounded.
        let labor_cost = material_cost * self.config.labor_rate
            + recipe.total_minutes() as f64 / 60.0 * self.config.labor_hourly_rate;
        let overhead_cost = material_cost * self.config.overhead_rate;
        let total_hpp = material_cost + labor_cost + overhead_cost;
        let servings = recipe.servings.max(1);

        HppBreakdown {
            recipe_id: recipe.id.clone(),
            recipe_name: recipe.name.clone(),
            servings,
            material_cost: round_money(material_cost),
            labor_cost: round_money(labor_cost),
            overhead_cost: round_money(overhead_cost),
            total_hpp: round_money(total_hpp),
            cost_per_unit: round_money(total_hpp / servings as f64),
            materials: lines,
            skipped_ingredients: skipped,
        }
    }
}

pub(crate) fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Ingredient, RecipeLine};

    fn ingredient(id: &str, price: f64, wac: Option<f64>) -> Ingredient {
        Ingredient {
            id: id.into(),
            name: format!("bahan {id}"),
            category: "lainnya".into(),
            unit: "kg".into(),
            price_per_unit: price,
            weighted_average_cost: wac,
            current_stock: 10.0,
            min_stock: 1.0,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    fn recipe(servings: i64) -> Recipe {
        Recipe {
            id: "rcp-1".into(),
            name: "Roti Tawar".into(),
            category: "roti".into(),
            servings,
            prep_time_minutes: 30,
            cook_time_minutes: 30,
            cost_per_unit: None,
            selling_price: None,
            is_active: true,
            lines: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    fn material(id: &str, qty: f64, ingredient: Option<Ingredient>) -> RecipeMaterial {
        RecipeMaterial {
            line: RecipeLine::new(id, qty, "kg"),
            ingredient,
        }
    }

    #[test]
    fn two_lines_with_fifteen_percent_overhead() {
        let calculator = HppCalculator::default();
        let materials = vec![
            material("a", 5.0, Some(ingredient("a", 10_000.0, None))),
            material("b", 5.0, Some(ingredient("b", 10_000.0, None))),
        ];
        let breakdown = calculator.calculate(&recipe(1), &materials);
        assert_eq!(breakdown.materials.len(), 2);
        assert!((breakdown.materials[0].total_cost - 50_000.0).abs() < 1e-6);
        assert!((breakdown.material_cost - 100_000.0).abs() < 1e-6);
        assert!((breakdown.overhead_cost - 15_000.0).abs() < 1e-6);
        assert!((breakdown.total_hpp - 115_000.0).abs() < 1e-6);
        assert!((breakdown.cost_per_unit - 115_000.0).abs() < 1e-6);
    }

    #[test]
    fn missing_ingredient_is_skipped() {
        let calculator = HppCalculator::default();
        let materials = vec![
            material("a", 2.0, Some(ingredient("a", 1_000.0, None))),
            material("ghost", 3.0, None),
        ];
        let breakdown = calculator.calculate(&recipe(4), &materials);
        assert_eq!(breakdown.skipped_ingredients, vec!["ghost".to_string()]);
        assert!((breakdown.material_cost - 2_000.0).abs() < 1e-6);
        assert!((breakdown.cost_per_unit - 2_300.0 / 4.0).abs() < 1e-6);
    }

    #[test]
    fn non_positive_servings_count_as_one() {
        let calculator = HppCalculator::default();
        let materials = vec![material("a", 1.0, Some(ingredient("a", 1_000.0, None)))];
        for servings in [0, -3] {
            let breakdown = calculator.calculate(&recipe(servings), &materials);
            assert_eq!(breakdown.servings, 1);
            assert!((breakdown.cost_per_unit - breakdown.total_hpp).abs() < 1e-9);
        }
    }

    #[test]
    fn labor_combines_rate_and_hourly_cost() {
        let calculator = HppCalculator::new(HppSection {
            overhead_rate: 0.0,
            labor_rate: 0.1,
            labor_hourly_rate: 20_000.0,
            ..HppSection::default()
        });
        let materials = vec![material("a", 1.0, Some(ingredient("a", 10_000.0, None)))];
        let breakdown = calculator.calculate(&recipe(2), &materials);
        // 10% of 10,000 plus one hour at 20,000.
        assert!((breakdown.labor_cost - 21_000.0).abs() < 1e-6);
        assert!((breakdown.total_hpp - 31_000.0).abs() < 1e-6);
        assert!((breakdown.cost_per_unit - 15_500.0).abs() < 1e-6);
    }

    #[test]
    fn weighted_average_basis_prefers_wac() {
        let calculator = HppCalculator::new(HppSection {
            price_basis: PriceBasis::WeightedAverage,
            overhead_rate: 0.0,
            ..HppSection::default()
        });
        let materials = vec![
            material("a", 1.0, Some(ingredient("a", 12_000.0, Some(11_000.0)))),
            material("b", 1.0, Some(ingredient("b", 5_000.0, None))),
        ];
        let breakdown = calculator.calculate(&recipe(1), &materials);
        assert!((breakdown.material_cost - 16_000.0).abs() < 1e-6);
    }

    #[test]
    fn material_cost_sums_unrounded_lines() {
        let calculator = HppCalculator::default();
        // Each line costs 0.004, which would round to zero on its own.
        let materials: Vec<RecipeMaterial> = (0..10)
            .map(|i| {
                let id = format!("spice-{i}");
                material(&id, 0.001, Some(ingredient(&id, 4.0, None)))
            })
            .collect();
        let breakdown = calculator.calculate(&recipe(1), &materials);
        assert!(breakdown.materials.iter().all(|line| line.total_cost == 0.0));
        assert!((breakdown.material_cost - 0.04).abs() < 1e-9);
        assert!((breakdown.total_hpp - 0.05).abs() < 1e-9);
    }

    #[test]
    fn empty_recipe_costs_nothing() {
        let breakdown = HppCalculator::default().calculate(&recipe(1), &[]);
        assert_eq!(breakdown.total_hpp, 0.0);
        assert_eq!(breakdown.cost_per_unit, 0.0);
    }
}
