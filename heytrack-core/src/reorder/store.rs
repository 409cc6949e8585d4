use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::models::Purchase;
use crate::catalog::store::apply_purchase;
use crate::hpp::calculator::round_money;
use crate::sqlite::SqliteDatabase;

use super::models::{
    NewPurchaseOrder, NewSupplier, PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus,
    ReorderAlertRecord, ReorderRule, ReorderSuggestion, Supplier,
};
use super::{ReorderError, ReorderResult};

#[derive(Debug, Clone)]
pub struct SqliteReorderStore {
    db: SqliteDatabase,
}

impl SqliteReorderStore {
    pub fn new(db: SqliteDatabase) -> Self {
        Self { db }
    }

    fn open(&self) -> ReorderResult<Connection> {
        Ok(self.db.open()?)
    }

    pub fn add_supplier(&self, input: &NewSupplier) -> ReorderResult<Supplier> {
        input.validate()?;
        let id = format!("sup-{}", Uuid::new_v4().simple());
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO suppliers (id, name, contact_name, phone, delivery_days)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                input.name.trim(),
                input.contact_name,
                input.phone,
                input.delivery_days,
            ],
        )?;
        fetch_supplier(&conn, &id)?.ok_or(ReorderError::SupplierNotFound { supplier_id: id })
    }

    pub fn fetch_supplier(&self, supplier_id: &str) -> ReorderResult<Option<Supplier>> {
        let conn = self.open()?;
        Ok(fetch_supplier(&conn, supplier_id)?)
    }

    pub fn list_suppliers(&self, include_inactive: bool) -> ReorderResult<Vec<Supplier>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM suppliers
             WHERE (?1 OR is_active = 1)
             ORDER BY name COLLATE NOCASE ASC",
        )?;
        let rows = stmt
            .query_map([include_inactive], |row| Supplier::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn deactivate_supplier(&self, supplier_id: &str) -> ReorderResult<()> {
        let conn = self.open()?;
        let affected = conn.execute("UPDATE suppliers SET is_active = 0 WHERE id = ?1", [supplier_id])?;
        if affected == 0 {
            return Err(ReorderError::SupplierNotFound {
                supplier_id: supplier_id.to_string(),
            });
        }
        Ok(())
    }

    /// One rule per ingredient; saving again replaces the policy but keeps the last order date.
    pub fn upsert_rule(&self, rule: &ReorderRule) -> ReorderResult<ReorderRule> {
        rule.validate()?;
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO reorder_rules (
                ingredient_id, min_stock_threshold, reorder_quantity, preferred_supplier_id,
                max_price_per_unit, auto_approve, reorder_frequency_days, last_reorder_date, is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(ingredient_id) DO UPDATE SET
                min_stock_threshold = excluded.min_stock_threshold,
                reorder_quantity = excluded.reorder_quantity,
                preferred_supplier_id = excluded.preferred_supplier_id,
                max_price_per_unit = excluded.max_price_per_unit,
                auto_approve = excluded.auto_approve,
                reorder_frequency_days = excluded.reorder_frequency_days,
                last_reorder_date = COALESCE(excluded.last_reorder_date, reorder_rules.last_reorder_date),
                is_active = excluded.is_active,
                updated_at = CURRENT_TIMESTAMP",
            params![
                rule.ingredient_id,
                rule.min_stock_threshold,
                rule.reorder_quantity,
                rule.preferred_supplier_id,
                rule.max_price_per_unit,
                rule.auto_approve,
                rule.reorder_frequency_days,
                rule.last_reorder_date,
                rule.is_active,
            ],
        )?;
        let saved = conn.query_row(
            "SELECT * FROM reorder_rules WHERE ingredient_id = ?1",
            [&rule.ingredient_id],
            |row| ReorderRule::from_row(row),
        )?;
        Ok(saved)
    }

    pub fn fetch_rule(&self, ingredient_id: &str) -> ReorderResult<Option<ReorderRule>> {
        let conn = self.open()?;
        let rule = conn
            .query_row(
                "SELECT * FROM reorder_rules WHERE ingredient_id = ?1",
                [ingredient_id],
                |row| ReorderRule::from_row(row),
            )
            .optional()?;
        Ok(rule)
    }

    pub fn list_rules(&self, include_inactive: bool) -> ReorderResult<Vec<ReorderRule>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM reorder_rules
             WHERE (?1 OR is_active = 1)
             ORDER BY ingredient_id ASC",
        )?;
        let rows = stmt
            .query_map([include_inactive], |row| ReorderRule::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn mark_reordered(&self, ingredient_id: &str, date: NaiveDate) -> ReorderResult<()> {
        let conn = self.open()?;
        conn.execute(
            "UPDATE reorder_rules
             SET last_reorder_date = ?2, updated_at = CURRENT_TIMESTAMP
             WHERE ingredient_id = ?1",
            params![ingredient_id, date],
        )?;
        Ok(())
    }

    /// Replaces the saved alerts for `date` with `suggestions`.
    pub fn replace_alerts(
        &self,
        date: NaiveDate,
        suggestions: &[ReorderSuggestion],
    ) -> ReorderResult<usize> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM reorder_alerts WHERE alert_date = ?1", [date])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO reorder_alerts (
                    alert_date, ingredient_id, ingredient_name, current_stock, min_stock,
                    suggested_quantity, estimated_cost, urgency, auto_reorder_enabled
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for suggestion in suggestions {
                stmt.execute(params![
                    date,
                    suggestion.ingredient_id,
                    suggestion.ingredient_name,
                    suggestion.current_stock,
                    suggestion.min_stock,
                    suggestion.suggested_quantity,
                    suggestion.estimated_cost,
                    suggestion.urgency.as_str(),
                    suggestion.auto_reorder_enabled,
                ])?;
            }
        }
        tx.commit()?;
        debug!(%date, count = suggestions.len(), "reorder alerts saved");
        Ok(suggestions.len())
    }

    pub fn alerts_for(&self, date: NaiveDate) -> ReorderResult<Vec<ReorderAlertRecord>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM reorder_alerts WHERE alert_date = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([date], |row| ReorderAlertRecord::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Inserts a draft order and its items under the next `PO-YYYYMMDD-NNN` number.
    pub fn create_order(&self, input: &NewPurchaseOrder) -> ReorderResult<PurchaseOrder> {
        input.validate()?;
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        if fetch_supplier(&tx, &input.supplier_id)?.is_none() {
            return Err(ReorderError::SupplierNotFound {
                supplier_id: input.supplier_id.clone(),
            });
        }
        let po_number = next_po_number(&tx, input.order_date)?;
        let id = format!("po-{}", Uuid::new_v4().simple());
        tx.execute(
            "INSERT INTO purchase_orders (
                id, po_number, supplier_id, status, order_date, expected_delivery_date,
                total_amount, notes, created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                po_number,
                input.supplier_id,
                PurchaseOrderStatus::Draft.as_str(),
                input.order_date,
                input.expected_delivery_date,
                round_money(input.total_amount()),
                input.notes,
                input.created_by,
            ],
        )?;
        for item in &input.items {
            tx.execute(
                "INSERT INTO purchase_order_items (
                    purchase_order_id, ingredient_id, quantity, unit_price, total_price, notes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    item.ingredient_id,
                    item.quantity,
                    item.unit_price,
                    round_money(item.quantity * item.unit_price),
                    item.notes,
                ],
            )?;
        }
        let order = load_order(&tx, &id)?;
        tx.commit()?;
        info!(order_id = %order.id, po_number = %order.po_number, total = order.total_amount, "purchase order drafted");
        Ok(order)
    }

    pub fn fetch_order(&self, order_id: &str) -> ReorderResult<Option<PurchaseOrder>> {
        let conn = self.open()?;
        match load_order(&conn, order_id) {
            Ok(order) => Ok(Some(order)),
            Err(ReorderError::PurchaseOrderNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn list_orders(
        &self,
        status: Option<PurchaseOrderStatus>,
    ) -> ReorderResult<Vec<PurchaseOrder>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM purchase_orders
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY order_date DESC, po_number DESC",
        )?;
        let mut orders = stmt
            .query_map([status.map(|s| s.as_str())], |row| PurchaseOrder::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        for order in orders.iter_mut() {
            order.items = load_items(&conn, &order.id)?;
        }
        Ok(orders)
    }

    /// Moves an order to `target` if the lifecycle allows it.
    pub fn transition(
        &self,
        order_id: &str,
        target: PurchaseOrderStatus,
    ) -> ReorderResult<PurchaseOrder> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let order = load_order(&tx, order_id)?;
        check_transition(&order, target)?;
        set_status(&tx, order_id, target)?;
        let updated = load_order(&tx, order_id)?;
        tx.commit()?;
        info!(order_id, from = %order.status, to = %target, "purchase order status changed");
        Ok(updated)
    }

    /// Marks a confirmed order delivered and books every item into stock.
    pub fn receive(&self, order_id: &str) -> ReorderResult<PurchaseOrder> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let order = load_order(&tx, order_id)?;
        check_transition(&order, PurchaseOrderStatus::Delivered)?;
        for item in &order.items {
            let purchase = Purchase {
                ingredient_id: item.ingredient_id.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                reference: Some(order.po_number.clone()),
                note: item.notes.clone(),
            };
            apply_purchase(&tx, &purchase)?;
        }
        set_status(&tx, order_id, PurchaseOrderStatus::Delivered)?;
        let updated = load_order(&tx, order_id)?;
        tx.commit()?;
        info!(order_id, po_number = %order.po_number, items = order.items.len(), "purchase order received");
        Ok(updated)
    }
}

fn fetch_supplier(conn: &Connection, supplier_id: &str) -> rusqlite::Result<Option<Supplier>> {
    conn.query_row(
        "SELECT * FROM suppliers WHERE id = ?1",
        [supplier_id],
        |row| Supplier::from_row(row),
    )
    .optional()
}

fn next_po_number(conn: &Connection, order_date: NaiveDate) -> rusqlite::Result<String> {
    let prefix = format!("PO-{}-", order_date.format("%Y%m%d"));
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM purchase_orders WHERE po_number LIKE ?1 || '%'",
        [&prefix],
        |row| row.get(0),
    )?;
    Ok(format!("{prefix}{:03}", count + 1))
}

fn load_order(conn: &Connection, order_id: &str) -> ReorderResult<PurchaseOrder> {
    let order = conn
        .query_row(
            "SELECT * FROM purchase_orders WHERE id = ?1",
            [order_id],
            |row| PurchaseOrder::from_row(row),
        )
        .optional()?;
    let Some(mut order) = order else {
        return Err(ReorderError::PurchaseOrderNotFound {
            order_id: order_id.to_string(),
        });
    };
    order.items = load_items(conn, order_id)?;
    Ok(order)
}

fn load_items(conn: &Connection, order_id: &str) -> rusqlite::Result<Vec<PurchaseOrderItem>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM purchase_order_items WHERE purchase_order_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map([order_id], |row| PurchaseOrderItem::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn check_transition(order: &PurchaseOrder, target: PurchaseOrderStatus) -> ReorderResult<()> {
    if order.status.can_transition_to(target) {
        Ok(())
    } else {
        Err(ReorderError::InvalidTransition {
            order_id: order.id.clone(),
            from: order.status,
            to: target,
        })
    }
}

fn set_status(conn: &Connection, order_id: &str, status: PurchaseOrderStatus) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE purchase_orders SET status = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
        params![order_id, status.as_str()],
    )?;
    Ok(())
}
