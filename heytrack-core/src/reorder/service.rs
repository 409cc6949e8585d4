use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use tracing::{info, warn};

use crate::catalog::{CatalogError, SqliteCatalogStore};
use crate::config::ReorderSection;

use super::engine::ReorderEngine;
use super::models::{
    NewPurchaseOrder, NewPurchaseOrderItem, NewSupplier, PurchaseOrder, PurchaseOrderStatus,
    ReorderAlertRecord, ReorderRule, ReorderSuggestion, ReorderSummary, ReorderUrgency, Supplier,
};
use super::store::SqliteReorderStore;
use super::{ReorderError, ReorderResult};

const AUTO_ORDER_AUTHOR: &str = "system";

pub struct AutoReorder {
    catalog: SqliteCatalogStore,
    store: SqliteReorderStore,
    engine: ReorderEngine,
}

impl AutoReorder {
    pub fn new(catalog: SqliteCatalogStore, store: SqliteReorderStore, config: ReorderSection) -> Self {
        Self {
            catalog,
            store,
            engine: ReorderEngine::new(config),
        }
    }

    pub fn store(&self) -> &SqliteReorderStore {
        &self.store
    }

    /// Evaluates the catalog, saves today's alerts and drafts orders for eligible items.
    pub fn check(&self, today: NaiveDate) -> ReorderResult<ReorderSummary> {
        let ingredients = self.catalog.list_ingredients(false)?;
        let rules: HashMap<String, ReorderRule> = self
            .store
            .list_rules(false)?
            .into_iter()
            .map(|rule| (rule.ingredient_id.clone(), rule))
            .collect();
        let suggestions = self.engine.evaluate_all(&ingredients, &rules);
        self.store.replace_alerts(today, &suggestions)?;

        let mut summary = ReorderSummary {
            total_alerts: suggestions.len(),
            critical_items: suggestions
                .iter()
                .filter(|s| s.urgency == ReorderUrgency::Critical)
                .count(),
            total_estimated_cost: suggestions.iter().map(|s| s.estimated_cost).sum(),
            ..Default::default()
        };

        for suggestion in &suggestions {
            let Some(rule) = rules.get(&suggestion.ingredient_id) else {
                summary.manual_review_required += 1;
                continue;
            };
            if !self.engine.auto_order_allowed(suggestion, rule, today) {
                if !suggestion.auto_reorder_enabled {
                    summary.manual_review_required += 1;
                }
                continue;
            }
            match self.draft_auto_order(suggestion, rule, today) {
                Ok(order) => {
                    summary.auto_orders_generated += 1;
                    summary.orders.push(order);
                }
                Err(err) => {
                    warn!(
                        ingredient_id = %suggestion.ingredient_id,
                        error = %err,
                        "auto purchase order failed, left for manual review"
                    );
                    summary.manual_review_required += 1;
                }
            }
        }

        info!(
            alerts = summary.total_alerts,
            critical = summary.critical_items,
            auto_orders = summary.auto_orders_generated,
            manual = summary.manual_review_required,
            estimated_cost = summary.total_estimated_cost,
            "reorder check finished"
        );
        summary.alerts = suggestions;
        Ok(summary)
    }

    fn draft_auto_order(
        &self,
        suggestion: &ReorderSuggestion,
        rule: &ReorderRule,
        today: NaiveDate,
    ) -> ReorderResult<PurchaseOrder> {
        let supplier_id = rule.preferred_supplier_id.clone().ok_or_else(|| {
            ReorderError::NoSupplier {
                ingredient_id: suggestion.ingredient_id.clone(),
            }
        })?;
        let supplier = self
            .store
            .fetch_supplier(&supplier_id)?
            .filter(|supplier| supplier.is_active)
            .ok_or(ReorderError::SupplierNotFound { supplier_id })?;
        let delivery_days = supplier
            .delivery_days
            .unwrap_or(self.engine.config().default_delivery_days);
        let order = self.store.create_order(&NewPurchaseOrder {
            supplier_id: supplier.id.clone(),
            order_date: today,
            expected_delivery_date: Some(today + Duration::days(delivery_days)),
            notes: Some(format!("Reorder otomatis untuk {}", suggestion.ingredient_name)),
            created_by: Some(AUTO_ORDER_AUTHOR.to_string()),
            items: vec![NewPurchaseOrderItem {
                ingredient_id: suggestion.ingredient_id.clone(),
                quantity: suggestion.suggested_quantity,
                unit_price: suggestion.unit_price,
                notes: Some(format!(
                    "stok {} / minimum {}",
                    suggestion.current_stock, suggestion.min_stock
                )),
            }],
        })?;
        self.store.mark_reordered(&suggestion.ingredient_id, today)?;
        Ok(order)
    }

    pub fn alerts(&self, date: NaiveDate) -> ReorderResult<Vec<ReorderAlertRecord>> {
        self.store.alerts_for(date)
    }

    pub fn add_supplier(&self, input: &NewSupplier) -> ReorderResult<Supplier> {
        let supplier = self.store.add_supplier(input)?;
        info!(supplier_id = %supplier.id, name = %supplier.name, "supplier added");
        Ok(supplier)
    }

    pub fn suppliers(&self, include_inactive: bool) -> ReorderResult<Vec<Supplier>> {
        self.store.list_suppliers(include_inactive)
    }

    pub fn supplier(&self, supplier_id: &str) -> ReorderResult<Supplier> {
        self.store
            .fetch_supplier(supplier_id)?
            .ok_or_else(|| ReorderError::SupplierNotFound {
                supplier_id: supplier_id.to_string(),
            })
    }

    pub fn save_rule(&self, rule: &ReorderRule) -> ReorderResult<ReorderRule> {
        if self.catalog.fetch_ingredient(&rule.ingredient_id)?.is_none() {
            return Err(CatalogError::IngredientNotFound {
                ingredient_id: rule.ingredient_id.clone(),
            }
            .into());
        }
        if let Some(supplier_id) = &rule.preferred_supplier_id {
            self.supplier(supplier_id)?;
        }
        self.store.upsert_rule(rule)
    }

    pub fn rule(&self, ingredient_id: &str) -> ReorderResult<Option<ReorderRule>> {
        self.store.fetch_rule(ingredient_id)
    }

    pub fn rules(&self) -> ReorderResult<Vec<ReorderRule>> {
        self.store.list_rules(true)
    }

    pub fn create_order(&self, input: &NewPurchaseOrder) -> ReorderResult<PurchaseOrder> {
        for item in &input.items {
            if self.catalog.fetch_ingredient(&item.ingredient_id)?.is_none() {
                return Err(CatalogError::IngredientNotFound {
                    ingredient_id: item.ingredient_id.clone(),
                }
                .into());
            }
        }
        self.store.create_order(input)
    }

    pub fn order(&self, order_id: &str) -> ReorderResult<PurchaseOrder> {
        self.store
            .fetch_order(order_id)?
            .ok_or_else(|| ReorderError::PurchaseOrderNotFound {
                order_id: order_id.to_string(),
            })
    }

    pub fn orders(&self, status: Option<PurchaseOrderStatus>) -> ReorderResult<Vec<PurchaseOrder>> {
        self.store.list_orders(status)
    }

    /// Advances an order one step; reaching `delivered` books the stock.
    pub fn advance(&self, order_id: &str) -> ReorderResult<PurchaseOrder> {
        let order = self.order(order_id)?;
        match order.status.next() {
            Some(PurchaseOrderStatus::Delivered) => self.receive(order_id),
            Some(next) => self.store.transition(order_id, next),
            None => Err(ReorderError::InvalidTransition {
                order_id: order_id.to_string(),
                from: order.status,
                to: order.status,
            }),
        }
    }

    pub fn cancel(&self, order_id: &str) -> ReorderResult<PurchaseOrder> {
        self.store
            .transition(order_id, PurchaseOrderStatus::Cancelled)
    }

    pub fn receive(&self, order_id: &str) -> ReorderResult<PurchaseOrder> {
        self.store.receive(order_id)
    }
}
