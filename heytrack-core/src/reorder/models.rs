use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::catalog::models::to_utc;
use crate::error::ValidationError;
use crate::validation::{self, MAX_NAME_LEN, MAX_NOTE_LEN};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub delivery_days: Option<i64>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Supplier {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            contact_name: row.get("contact_name")?,
            phone: row.get("phone")?,
            delivery_days: row.get("delivery_days")?,
            is_active: row.get::<_, i64>("is_active")? != 0,
            created_at: to_utc(row.get("created_at")?),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSupplier {
    pub name: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub delivery_days: Option<i64>,
}

impl NewSupplier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contact_name: None,
            phone: None,
            delivery_days: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::require_text("name", &self.name, MAX_NAME_LEN)?;
        validation::optional_text("contact_name", self.contact_name.as_deref(), MAX_NAME_LEN)?;
        validation::optional_text("phone", self.phone.as_deref(), 50)?;
        if matches!(self.delivery_days, Some(days) if days < 0) {
            return Err(ValidationError::new("delivery_days", "must be >= 0"));
        }
        Ok(())
    }
}

/// Per-ingredient restock policy. Zero threshold or quantity means "use the catalog default".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReorderRule {
    pub ingredient_id: String,
    pub min_stock_threshold: f64,
    pub reorder_quantity: f64,
    pub preferred_supplier_id: Option<String>,
    pub max_price_per_unit: Option<f64>,
    pub auto_approve: bool,
    pub reorder_frequency_days: Option<i64>,
    pub last_reorder_date: Option<NaiveDate>,
    pub is_active: bool,
}

impl ReorderRule {
    pub fn new(ingredient_id: impl Into<String>) -> Self {
        Self {
            ingredient_id: ingredient_id.into(),
            min_stock_threshold: 0.0,
            reorder_quantity: 0.0,
            preferred_supplier_id: None,
            max_price_per_unit: None,
            auto_approve: false,
            reorder_frequency_days: None,
            last_reorder_date: None,
            is_active: true,
        }
    }

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            ingredient_id: row.get("ingredient_id")?,
            min_stock_threshold: row.get("min_stock_threshold")?,
            reorder_quantity: row.get("reorder_quantity")?,
            preferred_supplier_id: row.get("preferred_supplier_id")?,
            max_price_per_unit: row.get("max_price_per_unit")?,
            auto_approve: row.get::<_, i64>("auto_approve")? != 0,
            reorder_frequency_days: row.get("reorder_frequency_days")?,
            last_reorder_date: row.get("last_reorder_date")?,
            is_active: row.get::<_, i64>("is_active")? != 0,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::non_negative("min_stock_threshold", self.min_stock_threshold)?;
        validation::non_negative("reorder_quantity", self.reorder_quantity)?;
        if let Some(max_price) = self.max_price_per_unit {
            validation::non_negative("max_price_per_unit", max_price)?;
        }
        if matches!(self.reorder_frequency_days, Some(days) if days < 0) {
            return Err(ValidationError::new("reorder_frequency_days", "must be >= 0"));
        }
        Ok(())
    }

    /// Whether the frequency window since the last order has elapsed by `today`.
    pub fn window_elapsed(&self, today: NaiveDate) -> bool {
        match (self.last_reorder_date, self.reorder_frequency_days) {
            (Some(last), Some(days)) if days > 0 => (today - last).num_days() >= days,
            _ => true,
        }
    }
}

/// Ordered from least to most pressing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ReorderUrgency {
    Low,
    Medium,
    High,
    Critical,
}

impl ReorderUrgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReorderUrgency::Low => "low",
            ReorderUrgency::Medium => "medium",
            ReorderUrgency::High => "high",
            ReorderUrgency::Critical => "critical",
        }
    }
}

impl fmt::Display for ReorderUrgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReorderUrgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(ReorderUrgency::Low),
            "medium" => Ok(ReorderUrgency::Medium),
            "high" => Ok(ReorderUrgency::High),
            "critical" => Ok(ReorderUrgency::Critical),
            other => Err(format!("unknown urgency: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReorderSuggestion {
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub unit: String,
    pub current_stock: f64,
    /// Effective reorder threshold.
    pub min_stock: f64,
    pub stock_ratio: f64,
    pub suggested_quantity: f64,
    pub unit_price: f64,
    pub estimated_cost: f64,
    pub urgency: ReorderUrgency,
    pub auto_reorder_enabled: bool,
    pub preferred_supplier_id: Option<String>,
}

/// A suggestion as persisted for the daily dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReorderAlertRecord {
    pub id: i64,
    pub alert_date: NaiveDate,
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub current_stock: f64,
    pub min_stock: f64,
    pub suggested_quantity: f64,
    pub estimated_cost: f64,
    pub urgency: ReorderUrgency,
    pub auto_reorder_enabled: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl ReorderAlertRecord {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            alert_date: row.get("alert_date")?,
            ingredient_id: row.get("ingredient_id")?,
            ingredient_name: row.get("ingredient_name")?,
            current_stock: row.get("current_stock")?,
            min_stock: row.get("min_stock")?,
            suggested_quantity: row.get("suggested_quantity")?,
            estimated_cost: row.get("estimated_cost")?,
            urgency: row
                .get::<_, String>("urgency")?
                .parse()
                .unwrap_or(ReorderUrgency::Low),
            auto_reorder_enabled: row.get::<_, i64>("auto_reorder_enabled")? != 0,
            created_at: to_utc(row.get("created_at")?),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Sent,
    Confirmed,
    Delivered,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Sent => "sent",
            PurchaseOrderStatus::Confirmed => "confirmed",
            PurchaseOrderStatus::Delivered => "delivered",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Delivered | PurchaseOrderStatus::Cancelled
        )
    }

    /// Next step of the forward lifecycle.
    pub fn next(&self) -> Option<PurchaseOrderStatus> {
        match self {
            PurchaseOrderStatus::Draft => Some(PurchaseOrderStatus::Sent),
            PurchaseOrderStatus::Sent => Some(PurchaseOrderStatus::Confirmed),
            PurchaseOrderStatus::Confirmed => Some(PurchaseOrderStatus::Delivered),
            PurchaseOrderStatus::Delivered | PurchaseOrderStatus::Cancelled => None,
        }
    }

    pub fn can_transition_to(&self, target: PurchaseOrderStatus) -> bool {
        if target == PurchaseOrderStatus::Cancelled {
            return !self.is_terminal();
        }
        self.next() == Some(target)
    }
}

impl fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PurchaseOrderStatus::Draft),
            "sent" => Ok(PurchaseOrderStatus::Sent),
            "confirmed" => Ok(PurchaseOrderStatus::Confirmed),
            "delivered" => Ok(PurchaseOrderStatus::Delivered),
            "cancelled" => Ok(PurchaseOrderStatus::Cancelled),
            other => Err(format!("unknown purchase order status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseOrderItem {
    pub id: i64,
    pub purchase_order_id: String,
    pub ingredient_id: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
    pub notes: Option<String>,
}

impl PurchaseOrderItem {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            purchase_order_id: row.get("purchase_order_id")?,
            ingredient_id: row.get("ingredient_id")?,
            quantity: row.get("quantity")?,
            unit_price: row.get("unit_price")?,
            total_price: row.get("total_price")?,
            notes: row.get("notes")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseOrder {
    pub id: String,
    pub po_number: String,
    pub supplier_id: String,
    pub status: PurchaseOrderStatus,
    pub order_date: NaiveDate,
    pub expected_delivery_date: Option<NaiveDate>,
    pub total_amount: f64,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub items: Vec<PurchaseOrderItem>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PurchaseOrder {
    /// Reads the order columns; items are loaded separately.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            po_number: row.get("po_number")?,
            supplier_id: row.get("supplier_id")?,
            status: row
                .get::<_, String>("status")?
                .parse()
                .unwrap_or(PurchaseOrderStatus::Draft),
            order_date: row.get("order_date")?,
            expected_delivery_date: row.get("expected_delivery_date")?,
            total_amount: row.get("total_amount")?,
            notes: row.get("notes")?,
            created_by: row.get("created_by")?,
            items: Vec::new(),
            created_at: to_utc(row.get("created_at")?),
            updated_at: to_utc(row.get("updated_at")?),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPurchaseOrderItem {
    pub ingredient_id: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPurchaseOrder {
    pub supplier_id: String,
    pub order_date: NaiveDate,
    pub expected_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub items: Vec<NewPurchaseOrderItem>,
}

impl NewPurchaseOrder {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::optional_text("notes", self.notes.as_deref(), MAX_NOTE_LEN)?;
        if self.items.is_empty() {
            return Err(ValidationError::new("items", "order must have at least one item"));
        }
        for item in &self.items {
            validation::positive("quantity", item.quantity)?;
            validation::non_negative("unit_price", item.unit_price)?;
            validation::optional_text("notes", item.notes.as_deref(), MAX_NOTE_LEN)?;
        }
        Ok(())
    }

    pub fn total_amount(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.quantity * item.unit_price)
            .sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReorderSummary {
    pub total_alerts: usize,
    pub critical_items: usize,
    pub total_estimated_cost: f64,
    pub auto_orders_generated: usize,
    pub manual_review_required: usize,
    pub alerts: Vec<ReorderSuggestion>,
    pub orders: Vec<PurchaseOrder>,
}
