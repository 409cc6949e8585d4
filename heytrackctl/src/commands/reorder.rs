use chrono::NaiveDate;
use clap::{ArgAction, Args, Subcommand};
use heytrack_core::reorder::ReorderAlertRecord;
use heytrack_core::{
    NewPurchaseOrder, NewPurchaseOrderItem, NewSupplier, PurchaseOrder, PurchaseOrderStatus,
    ReorderRule, ReorderSuggestion, ReorderSummary, Supplier,
};
use serde::Serialize;

use crate::{render, rupiah, today, AppContext, DisplayFallback, OutputFormat, Result};

use super::budget::DateArgs;
use super::catalog::IdArgs;

#[derive(Subcommand, Debug)]
pub enum ReorderCommands {
    /// Evaluates stock levels, stores today's alerts and drafts automatic orders
    Check(DateArgs),
    /// Alerts stored by the check of a given day
    Alerts(DateArgs),
    /// Per-ingredient reorder rules
    Rule(RuleArgs),
    /// Suppliers
    Supplier(SupplierArgs),
    /// Lists purchase orders
    Orders(OrderListArgs),
    /// Creates a purchase order by hand
    Order(OrderCreateArgs),
    /// Moves an order to its next status; reaching delivered books the stock
    Advance(IdArgs),
    /// Books a confirmed order into stock
    Receive(IdArgs),
    /// Cancels an order that has not been delivered
    Cancel(IdArgs),
}

#[derive(Args, Debug)]
pub struct RuleArgs {
    #[command(subcommand)]
    pub command: RuleCommands,
}

#[derive(Subcommand, Debug)]
pub enum RuleCommands {
    /// Creates or replaces the rule of an ingredient
    Set(RuleSetArgs),
    /// Shows the rule of an ingredient
    Show(IdArgs),
    /// Lists every rule
    List,
}

#[derive(Args, Debug)]
pub struct RuleSetArgs {
    #[arg(value_name = "INGREDIENT")]
    pub ingredient_id: String,
    /// Threshold overriding the ingredient minimum (0 = use the ingredient's)
    #[arg(long, default_value_t = 0.0)]
    pub min_stock: f64,
    /// Quantity to order (0 = minimum stock times the configured multiplier)
    #[arg(long, default_value_t = 0.0)]
    pub quantity: f64,
    #[arg(long)]
    pub supplier: Option<String>,
    /// Highest unit price an automatic order may pay
    #[arg(long)]
    pub max_price: Option<f64>,
    /// Drafts orders without review when stock is high or critical
    #[arg(long)]
    pub auto_approve: bool,
    /// Minimum days between automatic orders
    #[arg(long)]
    pub frequency_days: Option<i64>,
    /// Stores the rule disabled
    #[arg(long)]
    pub inactive: bool,
}

#[derive(Args, Debug)]
pub struct SupplierArgs {
    #[command(subcommand)]
    pub command: SupplierCommands,
}

#[derive(Subcommand, Debug)]
pub enum SupplierCommands {
    /// Registers a supplier
    Add(SupplierAddArgs),
    /// Lists suppliers
    List(SupplierListArgs),
    /// Stops a supplier from receiving automatic orders
    Deactivate(IdArgs),
}

#[derive(Args, Debug)]
pub struct SupplierAddArgs {
    pub name: String,
    #[arg(long)]
    pub contact: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    /// Lead time in days
    #[arg(long)]
    pub delivery_days: Option<i64>,
}

#[derive(Args, Debug)]
pub struct SupplierListArgs {
    /// Include deactivated suppliers
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct OrderListArgs {
    /// draft | sent | confirmed | delivered | cancelled
    #[arg(long)]
    pub status: Option<PurchaseOrderStatus>,
}

#[derive(Args, Debug)]
pub struct OrderCreateArgs {
    #[arg(long)]
    pub supplier: String,
    /// Order line, repeat for each
    #[arg(
        long = "item",
        action = ArgAction::Append,
        value_parser = parse_item,
        value_name = "INGREDIENT=QTY@PRICE",
        required = true
    )]
    pub items: Vec<NewPurchaseOrderItem>,
    /// Order date (defaults to today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub expected: Option<NaiveDate>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub created_by: Option<String>,
}

fn parse_item(value: &str) -> std::result::Result<NewPurchaseOrderItem, String> {
    let (ingredient_id, rest) = value
        .split_once('=')
        .ok_or_else(|| "use the form <ingredient>=<qty>@<price>".to_string())?;
    let (quantity, unit_price) = rest
        .split_once('@')
        .ok_or_else(|| "missing @<price>".to_string())?;
    let ingredient_id = ingredient_id.trim();
    if ingredient_id.is_empty() {
        return Err("ingredient id must not be empty".to_string());
    }
    let quantity: f64 = quantity
        .trim()
        .parse()
        .map_err(|err| format!("invalid quantity {quantity:?}: {err}"))?;
    let unit_price: f64 = unit_price
        .trim()
        .parse()
        .map_err(|err| format!("invalid price {unit_price:?}: {err}"))?;
    Ok(NewPurchaseOrderItem {
        ingredient_id: ingredient_id.to_string(),
        quantity,
        unit_price,
        notes: None,
    })
}

pub fn run(context: &AppContext, command: &ReorderCommands, format: OutputFormat) -> Result<()> {
    let reorder = context.reorder();
    match command {
        ReorderCommands::Check(args) => {
            render(&reorder.check(args.date.unwrap_or_else(today))?, format)
        }
        ReorderCommands::Alerts(args) => {
            let date = args.date.unwrap_or_else(today);
            let alerts = AlertList {
                date,
                rows: reorder.alerts(date)?,
            };
            render(&alerts, format)
        }
        ReorderCommands::Rule(args) => match &args.command {
            RuleCommands::Set(args) => render(&context.rule_set(args)?, format),
            RuleCommands::Show(args) => {
                let rules = RuleList {
                    rows: reorder.rule(&args.id)?.into_iter().collect(),
                };
                render(&rules, format)
            }
            RuleCommands::List => render(&RuleList { rows: reorder.rules()? }, format),
        },
        ReorderCommands::Supplier(args) => match &args.command {
            SupplierCommands::Add(args) => {
                let mut input = NewSupplier::new(&args.name);
                input.contact_name = args.contact.clone();
                input.phone = args.phone.clone();
                input.delivery_days = args.delivery_days;
                render(&reorder.add_supplier(&input)?, format)
            }
            SupplierCommands::List(args) => {
                let suppliers = SupplierList {
                    rows: reorder.suppliers(args.all)?,
                };
                render(&suppliers, format)
            }
            SupplierCommands::Deactivate(args) => {
                reorder.store().deactivate_supplier(&args.id)?;
                render(&reorder.supplier(&args.id)?, format)
            }
        },
        ReorderCommands::Orders(args) => {
            let orders = OrderList {
                rows: reorder.orders(args.status)?,
            };
            render(&orders, format)
        }
        ReorderCommands::Order(args) => render(&context.order_create(args)?, format),
        ReorderCommands::Advance(args) => render(&reorder.advance(&args.id)?, format),
        ReorderCommands::Receive(args) => render(&reorder.receive(&args.id)?, format),
        ReorderCommands::Cancel(args) => render(&reorder.cancel(&args.id)?, format),
    }
}

impl AppContext {
    pub fn rule_set(&self, args: &RuleSetArgs) -> Result<ReorderRule> {
        let mut rule = ReorderRule::new(&args.ingredient_id);
        rule.min_stock_threshold = args.min_stock;
        rule.reorder_quantity = args.quantity;
        rule.preferred_supplier_id = args.supplier.clone();
        rule.max_price_per_unit = args.max_price;
        rule.auto_approve = args.auto_approve;
        rule.reorder_frequency_days = args.frequency_days;
        rule.is_active = !args.inactive;
        Ok(self.reorder().save_rule(&rule)?)
    }

    pub fn order_create(&self, args: &OrderCreateArgs) -> Result<PurchaseOrder> {
        let input = NewPurchaseOrder {
            supplier_id: args.supplier.clone(),
            order_date: args.date.unwrap_or_else(today),
            expected_delivery_date: args.expected,
            notes: args.notes.clone(),
            created_by: args.created_by.clone(),
            items: args.items.clone(),
        };
        Ok(self.reorder().create_order(&input)?)
    }
}

#[derive(Debug, Serialize)]
pub struct AlertList {
    pub date: NaiveDate,
    pub rows: Vec<ReorderAlertRecord>,
}

#[derive(Debug, Serialize)]
pub struct RuleList {
    pub rows: Vec<ReorderRule>,
}

#[derive(Debug, Serialize)]
pub struct SupplierList {
    pub rows: Vec<Supplier>,
}

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub rows: Vec<PurchaseOrder>,
}

fn suggestion_line(suggestion: &ReorderSuggestion) -> String {
    format!(
        "[{}] {} | stock {} / min {} {} | order {} = {}{}",
        suggestion.urgency,
        suggestion.ingredient_name,
        suggestion.current_stock,
        suggestion.min_stock,
        suggestion.unit,
        suggestion.suggested_quantity,
        rupiah(suggestion.estimated_cost),
        if suggestion.auto_reorder_enabled { " (auto)" } else { "" }
    )
}

fn order_line(order: &PurchaseOrder) -> String {
    let expected = order
        .expected_delivery_date
        .map(|date| format!(" | expected {date}"))
        .unwrap_or_default();
    format!(
        "{} {} | {} | supplier {} | {} | {} item(s){}",
        order.po_number,
        order.id,
        order.status,
        order.supplier_id,
        rupiah(order.total_amount),
        order.items.len(),
        expected
    )
}

fn rule_line(rule: &ReorderRule) -> String {
    let supplier = rule.preferred_supplier_id.as_deref().unwrap_or("-");
    let max_price = rule
        .max_price_per_unit
        .map(rupiah)
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} | min {} | qty {} | supplier {} | max price {} | auto={}{}",
        rule.ingredient_id,
        rule.min_stock_threshold,
        rule.reorder_quantity,
        supplier,
        max_price,
        rule.auto_approve,
        if rule.is_active { "" } else { " [inactive]" }
    )
}

fn supplier_line(supplier: &Supplier) -> String {
    let delivery = supplier
        .delivery_days
        .map(|days| format!("{days} day(s)"))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} | {} | contact {} {} | delivery {}{}",
        supplier.id,
        supplier.name,
        supplier.contact_name.as_deref().unwrap_or("-"),
        supplier.phone.as_deref().unwrap_or(""),
        delivery,
        if supplier.is_active { "" } else { " [inactive]" }
    )
}

impl DisplayFallback for ReorderSummary {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "{} alert(s), {} critical, estimated {} | {} auto order(s), {} for manual review",
            self.total_alerts,
            self.critical_items,
            rupiah(self.total_estimated_cost),
            self.auto_orders_generated,
            self.manual_review_required
        )];
        for suggestion in &self.alerts {
            lines.push(format!("  {}", suggestion_line(suggestion)));
        }
        for order in &self.orders {
            lines.push(format!("  + {}", order_line(order)));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for AlertList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return format!("No reorder alerts for {}", self.date);
        }
        self.rows
            .iter()
            .map(|alert| {
                format!(
                    "[{}] {} | stock {} / min {} | order {} = {}",
                    alert.urgency,
                    alert.ingredient_name,
                    alert.current_stock,
                    alert.min_stock,
                    alert.suggested_quantity,
                    rupiah(alert.estimated_cost)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DisplayFallback for ReorderRule {
    fn display(&self) -> String {
        rule_line(self)
    }
}

impl DisplayFallback for RuleList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No reorder rules".to_string();
        }
        self.rows.iter().map(rule_line).collect::<Vec<_>>().join("\n")
    }
}

impl DisplayFallback for Supplier {
    fn display(&self) -> String {
        supplier_line(self)
    }
}

impl DisplayFallback for SupplierList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No suppliers".to_string();
        }
        self.rows
            .iter()
            .map(supplier_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DisplayFallback for PurchaseOrder {
    fn display(&self) -> String {
        let mut lines = vec![order_line(self)];
        for item in &self.items {
            lines.push(format!(
                "  - {} {} x {} = {}",
                item.ingredient_id,
                item.quantity,
                rupiah(item.unit_price),
                rupiah(item.total_price)
            ));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for OrderList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No purchase orders".to_string();
        }
        self.rows.iter().map(order_line).collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::prepare_test_context;
    use crate::AppError;
    use heytrack_core::{CatalogError, NewIngredient, ReorderError};

    #[test]
    fn parse_item_reads_quantity_and_price() {
        let item = parse_item("ing-1=25@11500").unwrap();
        assert_eq!(item.ingredient_id, "ing-1");
        assert_eq!(item.quantity, 25.0);
        assert_eq!(item.unit_price, 11_500.0);
        assert!(parse_item("ing-1=25").is_err());
        assert!(parse_item("ing-1=x@1").is_err());
        assert!(parse_item("=1@1").is_err());
    }

    #[test]
    fn manual_order_is_received_into_stock() {
        let (_temp, context) = prepare_test_context();
        let mut flour = NewIngredient::new("Tepung Terigu", "kg", 12_000.0);
        flour.min_stock = 5.0;
        let flour = context.catalog().add_ingredient(&flour).unwrap();
        let supplier = context
            .reorder()
            .add_supplier(&NewSupplier::new("CV Sumber Pangan"))
            .unwrap();

        let order = context
            .order_create(&OrderCreateArgs {
                supplier: supplier.id.clone(),
                items: vec![parse_item(&format!("{}=10@11000", flour.id)).unwrap()],
                date: Some("2026-10-19".parse().unwrap()),
                expected: None,
                notes: None,
                created_by: Some("owner".into()),
            })
            .unwrap();
        assert_eq!(order.po_number, "PO-20261019-001");
        assert_eq!(order.status, PurchaseOrderStatus::Draft);
        assert_eq!(order.total_amount, 110_000.0);

        let reorder = context.reorder();
        assert!(matches!(
            reorder.receive(&order.id),
            Err(ReorderError::InvalidTransition { .. })
        ));
        reorder.advance(&order.id).unwrap();
        let confirmed = reorder.advance(&order.id).unwrap();
        assert_eq!(confirmed.status, PurchaseOrderStatus::Confirmed);
        let delivered = reorder.advance(&order.id).unwrap();
        assert_eq!(delivered.status, PurchaseOrderStatus::Delivered);

        let stocked = context.require_ingredient(&flour.id).unwrap();
        assert_eq!(stocked.current_stock, 10.0);
        assert_eq!(stocked.price_per_unit, 11_000.0);
    }

    #[test]
    fn rule_for_unknown_ingredient_is_rejected() {
        let (_temp, context) = prepare_test_context();
        let err = context
            .rule_set(&RuleSetArgs {
                ingredient_id: "ing-missing".into(),
                min_stock: 5.0,
                quantity: 10.0,
                supplier: None,
                max_price: None,
                auto_approve: true,
                frequency_days: None,
                inactive: false,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Reorder(ReorderError::Catalog(CatalogError::IngredientNotFound { .. }))
        ));
    }

    #[test]
    fn check_summary_lists_suggestions() {
        let (_temp, context) = prepare_test_context();
        let mut flour = NewIngredient::new("Tepung Terigu", "kg", 12_000.0);
        flour.current_stock = 0.0;
        flour.min_stock = 5.0;
        context.catalog().add_ingredient(&flour).unwrap();

        let summary = context
            .reorder()
            .check("2026-10-19".parse().unwrap())
            .unwrap();
        assert_eq!(summary.total_alerts, 1);
        assert_eq!(summary.critical_items, 1);
        assert_eq!(summary.manual_review_required, 1);
        let text = summary.display();
        assert!(text.contains("[critical] Tepung Terigu"));
        assert!(text.contains("order 10 = Rp 120.000"));
    }
}
