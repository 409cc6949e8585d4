use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::catalog::models::to_utc;

/// One costed recipe line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialLine {
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HppBreakdown {
    pub recipe_id: String,
    pub recipe_name: String,
    /// Servings used for the per-unit split, never below 1.
    pub servings: i64,
    pub material_cost: f64,
    pub labor_cost: f64,
    pub overhead_cost: f64,
    pub total_hpp: f64,
    pub cost_per_unit: f64,
    pub materials: Vec<MaterialLine>,
    /// Ingredient ids referenced by the recipe but absent from the catalog.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_ingredients: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HppRecord {
    pub id: i64,
    pub recipe_id: String,
    pub material_cost: f64,
    pub labor_cost: f64,
    pub overhead_cost: f64,
    pub total_hpp: f64,
    pub cost_per_unit: f64,
    pub servings: i64,
    pub materials: Vec<MaterialLine>,
    pub calculated_at: Option<DateTime<Utc>>,
}

impl HppRecord {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let breakdown: String = row.get("breakdown")?;
        let materials = serde_json::from_str(&breakdown).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                row.as_ref().column_index("breakdown").unwrap_or_default(),
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })?;
        Ok(Self {
            id: row.get("id")?,
            recipe_id: row.get("recipe_id")?,
            material_cost: row.get("material_cost")?,
            labor_cost: row.get("labor_cost")?,
            overhead_cost: row.get("overhead_cost")?,
            total_hpp: row.get("total_hpp")?,
            cost_per_unit: row.get("cost_per_unit")?,
            servings: row.get("servings")?,
            materials,
            calculated_at: to_utc(row.get("calculated_at")?),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSeverity {
    Medium,
    High,
}

impl ChangeSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeSeverity::Medium => "medium",
            ChangeSeverity::High => "high",
        }
    }

    /// Grades a change that already exceeded the alert threshold.
    pub fn for_change(change_percent: f64, threshold_percent: f64) -> Self {
        if change_percent.abs() >= threshold_percent * 2.0 {
            ChangeSeverity::High
        } else {
            ChangeSeverity::Medium
        }
    }
}

impl fmt::Display for ChangeSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "medium" => Ok(ChangeSeverity::Medium),
            "high" => Ok(ChangeSeverity::High),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HppAlert {
    pub id: i64,
    pub recipe_id: String,
    pub previous_cost: f64,
    pub new_cost: f64,
    pub change_percent: f64,
    pub severity: ChangeSeverity,
    pub created_at: Option<DateTime<Utc>>,
}

impl HppAlert {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            recipe_id: row.get("recipe_id")?,
            previous_cost: row.get("previous_cost")?,
            new_cost: row.get("new_cost")?,
            change_percent: row.get("change_percent")?,
            severity: row
                .get::<_, String>("severity")?
                .parse()
                .unwrap_or(ChangeSeverity::Medium),
            created_at: to_utc(row.get("created_at")?),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceSuggestion {
    pub tier: String,
    /// Markup over cost as a fraction, 0.3 = 30 %.
    pub margin: f64,
    pub increment: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarginAnalysis {
    pub cost_per_unit: f64,
    pub selling_price: f64,
    pub gross_profit: f64,
    /// Profit over selling price, in percent.
    pub margin_percent: f64,
    /// Profit over cost, in percent.
    pub markup_percent: f64,
}
