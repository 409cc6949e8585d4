use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validation::{self, MAX_NAME_LEN, MAX_NOTE_LEN};

pub(crate) fn to_utc(value: Option<NaiveDateTime>) -> Option<DateTime<Utc>> {
    value.map(|dt| Utc.from_utc_datetime(&dt))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub price_per_unit: f64,
    pub weighted_average_cost: Option<f64>,
    pub current_stock: f64,
    pub min_stock: f64,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Ingredient {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            category: row.get("category")?,
            unit: row.get("unit")?,
            price_per_unit: row.get("price_per_unit")?,
            weighted_average_cost: row.get("weighted_average_cost")?,
            current_stock: row.get("current_stock")?,
            min_stock: row.get("min_stock")?,
            is_active: row.get::<_, i64>("is_active")? != 0,
            created_at: to_utc(row.get("created_at")?),
            updated_at: to_utc(row.get("updated_at")?),
        })
    }

    /// Stock value at the current list price.
    pub fn stock_value(&self) -> f64 {
        self.current_stock.max(0.0) * self.price_per_unit
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewIngredient {
    pub name: String,
    pub category: String,
    pub unit: String,
    pub price_per_unit: f64,
    pub current_stock: f64,
    pub min_stock: f64,
}

impl NewIngredient {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, price_per_unit: f64) -> Self {
        Self {
            name: name.into(),
            category: "lainnya".to_string(),
            unit: unit.into(),
            price_per_unit,
            current_stock: 0.0,
            min_stock: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::require_text("name", &self.name, MAX_NAME_LEN)?;
        validation::require_text("category", &self.category, 100)?;
        validation::require_text("unit", &self.unit, 50)?;
        validation::non_negative("price_per_unit", self.price_per_unit)?;
        validation::non_negative("current_stock", self.current_stock)?;
        validation::non_negative("min_stock", self.min_stock)?;
        Ok(())
    }
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngredientUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub price_per_unit: Option<f64>,
    pub min_stock: Option<f64>,
}

impl IngredientUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validation::require_text("name", name, MAX_NAME_LEN)?;
        }
        if let Some(category) = &self.category {
            validation::require_text("category", category, 100)?;
        }
        if let Some(unit) = &self.unit {
            validation::require_text("unit", unit, 50)?;
        }
        if let Some(price) = self.price_per_unit {
            validation::non_negative("price_per_unit", price)?;
        }
        if let Some(min_stock) = self.min_stock {
            validation::non_negative("min_stock", min_stock)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StockTransactionKind {
    Purchase,
    Usage,
    Adjustment,
}

impl StockTransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockTransactionKind::Purchase => "purchase",
            StockTransactionKind::Usage => "usage",
            StockTransactionKind::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for StockTransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockTransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(StockTransactionKind::Purchase),
            "usage" => Ok(StockTransactionKind::Usage),
            "adjustment" => Ok(StockTransactionKind::Adjustment),
            other => Err(format!("unknown stock transaction kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockTransaction {
    pub id: i64,
    pub ingredient_id: String,
    pub kind: StockTransactionKind,
    /// Signed: purchases are positive, usage negative.
    pub quantity: f64,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl StockTransaction {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            ingredient_id: row.get("ingredient_id")?,
            kind: row
                .get::<_, String>("kind")?
                .parse()
                .unwrap_or(StockTransactionKind::Adjustment),
            quantity: row.get("quantity")?,
            unit_price: row.get("unit_price")?,
            total_price: row.get("total_price")?,
            reference: row.get("reference")?,
            note: row.get("note")?,
            created_at: to_utc(row.get("created_at")?),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Purchase {
    pub ingredient_id: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub reference: Option<String>,
    pub note: Option<String>,
}

impl Purchase {
    pub fn new(ingredient_id: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        Self {
            ingredient_id: ingredient_id.into(),
            quantity,
            unit_price,
            reference: None,
            note: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::positive("quantity", self.quantity)?;
        validation::non_negative("unit_price", self.unit_price)?;
        validation::optional_text("reference", self.reference.as_deref(), 100)?;
        validation::optional_text("note", self.note.as_deref(), MAX_NOTE_LEN)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipeLine {
    pub ingredient_id: String,
    pub quantity: f64,
    pub unit: String,
}

impl RecipeLine {
    pub fn new(ingredient_id: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            ingredient_id: ingredient_id.into(),
            quantity,
            unit: unit.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub category: String,
    pub servings: i64,
    pub prep_time_minutes: i64,
    pub cook_time_minutes: i64,
    pub cost_per_unit: Option<f64>,
    pub selling_price: Option<f64>,
    pub is_active: bool,
    pub lines: Vec<RecipeLine>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Recipe {
    /// Reads the recipe columns; lines are loaded separately.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            category: row.get("category")?,
            servings: row.get("servings")?,
            prep_time_minutes: row.get("prep_time_minutes")?,
            cook_time_minutes: row.get("cook_time_minutes")?,
            cost_per_unit: row.get("cost_per_unit")?,
            selling_price: row.get("selling_price")?,
            is_active: row.get::<_, i64>("is_active")? != 0,
            lines: Vec::new(),
            created_at: to_utc(row.get("created_at")?),
            updated_at: to_utc(row.get("updated_at")?),
        })
    }

    pub fn total_minutes(&self) -> i64 {
        self.prep_time_minutes.max(0) + self.cook_time_minutes.max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewRecipe {
    pub name: String,
    pub category: String,
    pub servings: i64,
    pub prep_time_minutes: i64,
    pub cook_time_minutes: i64,
    pub selling_price: Option<f64>,
    pub lines: Vec<RecipeLine>,
}

impl NewRecipe {
    pub fn new(name: impl Into<String>, servings: i64) -> Self {
        Self {
            name: name.into(),
            category: "umum".to_string(),
            servings,
            prep_time_minutes: 0,
            cook_time_minutes: 0,
            selling_price: None,
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, ingredient_id: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        self.lines.push(RecipeLine::new(ingredient_id, quantity, unit));
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::require_text("name", &self.name, MAX_NAME_LEN)?;
        validation::require_text("category", &self.category, 100)?;
        if self.prep_time_minutes < 0 || self.cook_time_minutes < 0 {
            return Err(ValidationError::new("time", "must be >= 0 minutes"));
        }
        if self.lines.is_empty() {
            return Err(ValidationError::new(
                "lines",
                "recipe must have at least one ingredient",
            ));
        }
        for line in &self.lines {
            validation::non_negative("quantity", line.quantity)?;
            validation::require_text("unit", &line.unit, 50)?;
        }
        if let Some(price) = self.selling_price {
            validation::non_negative("selling_price", price)?;
        }
        Ok(())
    }
}
