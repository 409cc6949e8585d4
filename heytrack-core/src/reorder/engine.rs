use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDate;

use crate::catalog::Ingredient;
use crate::config::ReorderSection;

use super::models::{ReorderRule, ReorderSuggestion, ReorderUrgency};

/// Stateless restock evaluation over catalog ingredients and their rules.
#[derive(Debug, Clone)]
pub struct ReorderEngine {
    config: ReorderSection,
}

impl Default for ReorderEngine {
    fn default() -> Self {
        Self::new(ReorderSection::default())
    }
}

impl ReorderEngine {
    pub fn new(config: ReorderSection) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReorderSection {
        &self.config
    }

    /// A rule can raise the ingredient's own `min_stock` but never lower it.
    pub fn threshold(&self, ingredient: &Ingredient, rule: Option<&ReorderRule>) -> f64 {
        match rule {
            Some(rule) if rule.is_active && rule.min_stock_threshold > 0.0 => {
                rule.min_stock_threshold.max(ingredient.min_stock)
            }
            _ => ingredient.min_stock,
        }
    }

    pub fn urgency(&self, current_stock: f64, threshold: f64) -> ReorderUrgency {
        if current_stock <= 0.0 {
            return ReorderUrgency::Critical;
        }
        let ratio = current_stock / threshold;
        if ratio <= self.config.high_ratio {
            ReorderUrgency::High
        } else if ratio <= self.config.medium_ratio {
            ReorderUrgency::Medium
        } else {
            ReorderUrgency::Low
        }
    }

    /// Restock quantity, never below the threshold it is meant to restore
    /// nor below the ingredient's `min_stock`.
    pub fn suggested_quantity(
        &self,
        ingredient: &Ingredient,
        rule: Option<&ReorderRule>,
        threshold: f64,
    ) -> f64 {
        let base = match rule {
            Some(rule) if rule.is_active && rule.reorder_quantity > 0.0 => rule.reorder_quantity,
            _ => (ingredient.min_stock * self.config.default_multiplier).ceil(),
        };
        base.max(threshold).max(ingredient.min_stock)
    }

    /// `None` when the ingredient is untracked or still above its threshold.
    pub fn evaluate(
        &self,
        ingredient: &Ingredient,
        rule: Option<&ReorderRule>,
    ) -> Option<ReorderSuggestion> {
        let rule = rule.filter(|rule| rule.is_active);
        let threshold = self.threshold(ingredient, rule);
        if threshold <= 0.0 || ingredient.current_stock > threshold {
            return None;
        }
        let suggested_quantity = self.suggested_quantity(ingredient, rule, threshold);
        Some(ReorderSuggestion {
            ingredient_id: ingredient.id.clone(),
            ingredient_name: ingredient.name.clone(),
            unit: ingredient.unit.clone(),
            current_stock: ingredient.current_stock,
            min_stock: threshold,
            stock_ratio: ingredient.current_stock.max(0.0) / threshold,
            suggested_quantity,
            unit_price: ingredient.price_per_unit,
            estimated_cost: suggested_quantity * ingredient.price_per_unit,
            urgency: self.urgency(ingredient.current_stock, threshold),
            auto_reorder_enabled: rule.map(|rule| rule.auto_approve).unwrap_or(false),
            preferred_supplier_id: rule.and_then(|rule| rule.preferred_supplier_id.clone()),
        })
    }

    /// Suggestions for every ingredient needing stock, most urgent first.
    pub fn evaluate_all(
        &self,
        ingredients: &[Ingredient],
        rules: &HashMap<String, ReorderRule>,
    ) -> Vec<ReorderSuggestion> {
        let mut suggestions: Vec<ReorderSuggestion> = ingredients
            .iter()
            .filter(|ingredient| ingredient.is_active)
            .filter_map(|ingredient| self.evaluate(ingredient, rules.get(&ingredient.id)))
            .collect();
        suggestions.sort_by(compare_suggestions);
        suggestions
    }

    /// Whether a suggestion may be turned into a draft order without review.
    /// Supplier availability is checked by the caller.
    pub fn auto_order_allowed(
        &self,
        suggestion: &ReorderSuggestion,
        rule: &ReorderRule,
        today: NaiveDate,
    ) -> bool {
        if !rule.is_active || !rule.auto_approve {
            return false;
        }
        if suggestion.urgency < ReorderUrgency::High {
            return false;
        }
        if !rule.window_elapsed(today) {
            return false;
        }
        match rule.max_price_per_unit {
            Some(max_price) => suggestion.unit_price <= max_price,
            None => true,
        }
    }
}

fn compare_suggestions(a: &ReorderSuggestion, b: &ReorderSuggestion) -> Ordering {
    b.urgency
        .cmp(&a.urgency)
        .then_with(|| a.stock_ratio.total_cmp(&b.stock_ratio))
        .then_with(|| {
            a.ingredient_name
                .to_lowercase()
                .cmp(&b.ingredient_name.to_lowercase())
        })
}
