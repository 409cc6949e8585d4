use std::time::Duration;

use chrono::NaiveDate;
use heytrack_core::config::{AutomationSection, BudgetSection, HppSection, ReorderSection};
use heytrack_core::{
    AutoReorder, Automation, BudgetCategory, BudgetTracker, BudgetType, HppService, NewBudget,
    NewIngredient, NewRecipe, SqliteBudgetStore, SqliteCatalogStore, SqliteDatabase,
    SqliteReorderStore,
};
use tempfile::TempDir;
use tokio::sync::watch;

fn build(dir: &TempDir, config: AutomationSection) -> Automation {
    let db = SqliteDatabase::new(dir.path().join("heytrack.sqlite")).unwrap();
    db.initialize().unwrap();
    let catalog = SqliteCatalogStore::new(db.clone());
    Automation::new(
        config,
        AutoReorder::new(
            catalog.clone(),
            SqliteReorderStore::new(db.clone()),
            ReorderSection::default(),
        ),
        BudgetTracker::new(SqliteBudgetStore::new(db), BudgetSection::default()),
        HppService::new(catalog, HppSection::default()),
    )
}

fn seed(dir: &TempDir) {
    let db = SqliteDatabase::new(dir.path().join("heytrack.sqlite")).unwrap();
    let catalog = SqliteCatalogStore::new(db.clone());
    let mut flour = NewIngredient::new("Tepung", "kg", 12_000.0);
    flour.current_stock = 1.0;
    flour.min_stock = 5.0;
    let flour = catalog.add_ingredient(&flour).unwrap();
    catalog
        .add_recipe(&NewRecipe::new("Roti", 10).with_line(&flour.id, 1.0, "kg"))
        .unwrap();
    BudgetTracker::new(SqliteBudgetStore::new(db), BudgetSection::default())
        .create(&NewBudget::new(
            "Operasional September",
            BudgetType::Monthly,
            BudgetCategory::Operations,
            500_000.0,
            NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
        ))
        .unwrap();
}

#[test]
fn tick_runs_every_enabled_job() {
    let dir = tempfile::tempdir().unwrap();
    let automation = build(&dir, AutomationSection::default());
    seed(&dir);

    let report = automation.run_tick(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    assert!(report.is_clean(), "{:?}", report.errors);
    assert_eq!(report.reorder_alerts, Some(1));
    assert_eq!(report.auto_orders, Some(0));
    assert_eq!(report.budgets_renewed, Some(1));
    assert_eq!(report.hpp_calculated, Some(1));
}

#[test]
fn disabled_jobs_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let automation = build(
        &dir,
        AutomationSection {
            reorder_enabled: false,
            budget_renewal_enabled: false,
            ..AutomationSection::default()
        },
    );
    seed(&dir);

    let report = automation.run_tick(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    assert_eq!(report.reorder_alerts, None);
    assert_eq!(report.budgets_renewed, None);
    assert_eq!(report.hpp_calculated, Some(1));
}

#[test]
fn failing_job_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let automation = build(&dir, AutomationSection::default());
    seed(&dir);
    let db = SqliteDatabase::new(dir.path().join("heytrack.sqlite")).unwrap();
    db.open()
        .unwrap()
        .execute_batch("DROP TABLE reorder_alerts;")
        .unwrap();

    let report = automation.run_tick(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("reorder"));
    assert_eq!(report.reorder_alerts, None);
    assert_eq!(report.hpp_calculated, Some(1));
}

#[tokio::test(start_paused = true)]
async fn loop_ticks_on_interval_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let automation = build(
        &dir,
        AutomationSection {
            interval_minutes: 60,
            ..AutomationSection::default()
        },
    );
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move { automation.run(rx).await });

    // Immediate first tick, then one per hour.
    tokio::time::sleep(Duration::from_secs(2 * 60 * 60 + 1)).await;
    tx.send(true).unwrap();
    let ticks = handle.await.unwrap();
    assert_eq!(ticks, 3);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_sender_stops_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let automation = build(&dir, AutomationSection::default());
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move { automation.run(rx).await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    drop(tx);
    assert_eq!(handle.await.unwrap(), 1);
}
