use chrono::NaiveDate;
use heytrack_core::config::ReorderSection;
use heytrack_core::reorder::ReorderError;
use heytrack_core::{
    AutoReorder, NewIngredient, NewPurchaseOrder, NewPurchaseOrderItem, NewSupplier,
    PurchaseOrderStatus, ReorderRule, ReorderUrgency, SqliteCatalogStore, SqliteDatabase,
    SqliteReorderStore,
};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    catalog: SqliteCatalogStore,
    reorder: AutoReorder,
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn setup() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db = SqliteDatabase::new(dir.path().join("heytrack.sqlite")).unwrap();
    db.initialize().unwrap();
    let catalog = SqliteCatalogStore::new(db.clone());
    let reorder = AutoReorder::new(
        catalog.clone(),
        SqliteReorderStore::new(db),
        ReorderSection::default(),
    );
    Fixture {
        _dir: dir,
        catalog,
        reorder,
    }
}

fn ingredient(fx: &Fixture, name: &str, stock: f64, min_stock: f64) -> String {
    let mut input = NewIngredient::new(name, "kg", 10_000.0);
    input.current_stock = stock;
    input.min_stock = min_stock;
    fx.catalog.add_ingredient(&input).unwrap().id
}

#[test]
fn check_suggests_every_low_ingredient() {
    let fx = setup();
    let empty = ingredient(&fx, "Ragi", 0.0, 2.0);
    let low = ingredient(&fx, "Tepung", 4.0, 10.0);
    ingredient(&fx, "Gula", 20.0, 5.0);
    ingredient(&fx, "Vanili", 0.0, 0.0);

    let summary = fx.reorder.check(today()).unwrap();
    assert_eq!(summary.total_alerts, 2);
    assert_eq!(summary.critical_items, 1);
    assert_eq!(summary.alerts[0].ingredient_id, empty);
    assert_eq!(summary.alerts[0].urgency, ReorderUrgency::Critical);
    assert_eq!(summary.alerts[1].ingredient_id, low);
    assert_eq!(summary.alerts[1].urgency, ReorderUrgency::High);
    assert_eq!(summary.alerts[1].suggested_quantity, 20.0);
    assert_eq!(summary.total_estimated_cost, 240_000.0);
    assert_eq!(summary.manual_review_required, 2);
    assert_eq!(summary.auto_orders_generated, 0);
    for alert in &summary.alerts {
        assert!(alert.suggested_quantity >= alert.min_stock);
    }

    // Re-running the same day replaces the saved alerts.
    fx.reorder.check(today()).unwrap();
    assert_eq!(fx.reorder.alerts(today()).unwrap().len(), 2);
}

#[test]
fn auto_approved_rule_drafts_purchase_order() {
    let fx = setup();
    let yeast = ingredient(&fx, "Ragi", 0.5, 2.0);
    let mut supplier = NewSupplier::new("CV Sumber Rejeki");
    supplier.delivery_days = Some(2);
    let supplier = fx.reorder.add_supplier(&supplier).unwrap();

    let mut rule = ReorderRule::new(&yeast);
    rule.reorder_quantity = 6.0;
    rule.preferred_supplier_id = Some(supplier.id.clone());
    rule.auto_approve = true;
    rule.reorder_frequency_days = Some(7);
    fx.reorder.save_rule(&rule).unwrap();

    let summary = fx.reorder.check(today()).unwrap();
    assert_eq!(summary.auto_orders_generated, 1);
    assert_eq!(summary.manual_review_required, 0);
    let order = &summary.orders[0];
    assert_eq!(order.po_number, "PO-20261019-001");
    assert_eq!(order.status, PurchaseOrderStatus::Draft);
    assert_eq!(order.expected_delivery_date, NaiveDate::from_ymd_opt(2026, 10, 21));
    assert_eq!(order.total_amount, 60_000.0);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.created_by.as_deref(), Some("system"));

    let saved = fx.reorder.rule(&yeast).unwrap().unwrap();
    assert_eq!(saved.last_reorder_date, Some(today()));

    // Inside the frequency window no second order is drafted.
    let again = fx.reorder.check(today()).unwrap();
    assert_eq!(again.auto_orders_generated, 0);
    assert_eq!(fx.reorder.orders(None).unwrap().len(), 1);
}

#[test]
fn price_cap_and_missing_supplier_block_auto_orders() {
    let fx = setup();
    let butter = ingredient(&fx, "Mentega", 0.0, 3.0);
    let mut rule = ReorderRule::new(&butter);
    rule.auto_approve = true;
    rule.max_price_per_unit = Some(9_000.0);
    fx.reorder.save_rule(&rule).unwrap();
    let summary = fx.reorder.check(today()).unwrap();
    assert_eq!(summary.auto_orders_generated, 0);

    rule.max_price_per_unit = None;
    fx.reorder.save_rule(&rule).unwrap();
    let summary = fx.reorder.check(today()).unwrap();
    // No preferred supplier: draft fails and lands in manual review.
    assert_eq!(summary.auto_orders_generated, 0);
    assert_eq!(summary.manual_review_required, 1);
}

#[test]
fn purchase_order_lifecycle_books_stock_on_receipt() {
    let fx = setup();
    let flour = ingredient(&fx, "Tepung", 2.0, 10.0);
    let supplier = fx
        .reorder
        .add_supplier(&NewSupplier::new("Toko Bahan Kue Makmur"))
        .unwrap();
    let order = fx
        .reorder
        .create_order(&NewPurchaseOrder {
            supplier_id: supplier.id.clone(),
            order_date: today(),
            expected_delivery_date: None,
            notes: None,
            created_by: Some("owner".into()),
            items: vec![NewPurchaseOrderItem {
                ingredient_id: flour.clone(),
                quantity: 25.0,
                unit_price: 11_000.0,
                notes: None,
            }],
        })
        .unwrap();
    assert_eq!(order.total_amount, 275_000.0);

    let err = fx.reorder.receive(&order.id).unwrap_err();
    assert!(matches!(err, ReorderError::InvalidTransition { .. }));

    assert_eq!(
        fx.reorder.advance(&order.id).unwrap().status,
        PurchaseOrderStatus::Sent
    );
    assert_eq!(
        fx.reorder.advance(&order.id).unwrap().status,
        PurchaseOrderStatus::Confirmed
    );
    let delivered = fx.reorder.advance(&order.id).unwrap();
    assert_eq!(delivered.status, PurchaseOrderStatus::Delivered);

    let stocked = fx.catalog.fetch_ingredient(&flour).unwrap().unwrap();
    assert_eq!(stocked.current_stock, 27.0);
    assert_eq!(stocked.price_per_unit, 11_000.0);
    let history = fx.catalog.transactions(&flour, 5).unwrap();
    assert_eq!(history[0].reference.as_deref(), Some(order.po_number.as_str()));

    assert!(matches!(
        fx.reorder.cancel(&order.id),
        Err(ReorderError::InvalidTransition { .. })
    ));
    assert!(matches!(
        fx.reorder.advance(&order.id),
        Err(ReorderError::InvalidTransition { .. })
    ));
}

#[test]
fn po_numbers_count_per_day_and_orders_can_be_cancelled() {
    let fx = setup();
    let flour = ingredient(&fx, "Tepung", 2.0, 10.0);
    let supplier = fx.reorder.add_supplier(&NewSupplier::new("UD Jaya")).unwrap();
    let draft = |date: NaiveDate| NewPurchaseOrder {
        supplier_id: supplier.id.clone(),
        order_date: date,
        expected_delivery_date: None,
        notes: None,
        created_by: None,
        items: vec![NewPurchaseOrderItem {
            ingredient_id: flour.clone(),
            quantity: 1.0,
            unit_price: 10_000.0,
            notes: None,
        }],
    };
    let first = fx.reorder.create_order(&draft(today())).unwrap();
    let second = fx.reorder.create_order(&draft(today())).unwrap();
    let tomorrow = fx
        .reorder
        .create_order(&draft(today().succ_opt().unwrap()))
        .unwrap();
    assert_eq!(first.po_number, "PO-20261019-001");
    assert_eq!(second.po_number, "PO-20261019-002");
    assert_eq!(tomorrow.po_number, "PO-20261020-001");

    let cancelled = fx.reorder.cancel(&second.id).unwrap();
    assert_eq!(cancelled.status, PurchaseOrderStatus::Cancelled);
    assert_eq!(
        fx.reorder
            .orders(Some(PurchaseOrderStatus::Draft))
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn rules_require_known_ingredient_and_supplier() {
    let fx = setup();
    assert!(matches!(
        fx.reorder.save_rule(&ReorderRule::new("ing-missing")),
        Err(ReorderError::Catalog(_))
    ));
    let flour = ingredient(&fx, "Tepung", 2.0, 10.0);
    let mut rule = ReorderRule::new(&flour);
    rule.preferred_supplier_id = Some("sup-missing".into());
    assert!(matches!(
        fx.reorder.save_rule(&rule),
        Err(ReorderError::SupplierNotFound { .. })
    ));
}

#[test]
fn rule_threshold_below_min_stock_still_restocks_to_min_stock() {
    let fx = setup();
    let flour = ingredient(&fx, "Tepung", 2.0, 10.0);
    let sugar = ingredient(&fx, "Gula", 5.0, 10.0);
    for id in [&flour, &sugar] {
        let mut rule = ReorderRule::new(id);
        rule.min_stock_threshold = 3.0;
        rule.reorder_quantity = 2.0;
        fx.reorder.save_rule(&rule).unwrap();
    }

    let summary = fx.reorder.check(today()).unwrap();
    assert_eq!(summary.total_alerts, 2);
    for alert in &summary.alerts {
        assert!(alert.suggested_quantity >= 10.0, "{}", alert.ingredient_name);
    }
}
