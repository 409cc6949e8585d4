use chrono::NaiveDate;
use heytrack_core::budget::BudgetDraft;
use heytrack_core::config::BudgetSection;
use heytrack_core::{
    BudgetAlertKind, BudgetCategory, BudgetError, BudgetTracker, BudgetType, BudgetUpdate,
    Expense, NewBudget, SqliteBudgetStore, SqliteDatabase,
};
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn setup() -> (TempDir, BudgetTracker) {
    let (dir, _db, tracker) = setup_with_db();
    (dir, tracker)
}

fn setup_with_db() -> (TempDir, SqliteDatabase, BudgetTracker) {
    let dir = tempfile::tempdir().unwrap();
    let db = SqliteDatabase::new(dir.path().join("heytrack.sqlite")).unwrap();
    db.initialize().unwrap();
    let tracker = BudgetTracker::new(SqliteBudgetStore::new(db.clone()), BudgetSection::default());
    (dir, db, tracker)
}

fn october_ingredients(tracker: &BudgetTracker) -> String {
    tracker
        .create(&NewBudget::new(
            "Bahan baku Oktober",
            BudgetType::Monthly,
            BudgetCategory::Ingredients,
            1_000_000.0,
            date(2026, 10, 1),
        ))
        .unwrap()
        .id
}

#[test]
fn create_derives_period_and_threshold() {
    let (_dir, tracker) = setup();
    let id = october_ingredients(&tracker);
    let budget = tracker.get(&id).unwrap();
    assert_eq!(budget.period_end, date(2026, 11, 1));
    assert_eq!(budget.alert_threshold, 0.8);
    assert_eq!(budget.current_spent, 0.0);

    let mut weekly = NewBudget::new(
        "Promosi minggu ini",
        BudgetType::Weekly,
        BudgetCategory::Marketing,
        250_000.0,
        date(2026, 10, 19),
    );
    weekly.alert_threshold = Some(0.5);
    let weekly = tracker.create(&weekly).unwrap();
    assert_eq!(weekly.period_end, date(2026, 10, 26));
    assert_eq!(weekly.alert_threshold, 0.5);
}

#[test]
fn create_rejects_bad_input() {
    let (_dir, tracker) = setup();
    let zero = NewBudget::new(
        "Nol",
        BudgetType::Daily,
        BudgetCategory::Total,
        0.0,
        date(2026, 10, 1),
    );
    assert!(matches!(tracker.create(&zero), Err(BudgetError::Invalid(_))));

    let mut backwards = NewBudget::new(
        "Mundur",
        BudgetType::Project,
        BudgetCategory::Total,
        10.0,
        date(2026, 10, 10),
    );
    backwards.period_end = Some(date(2026, 10, 1));
    assert!(matches!(
        tracker.create(&backwards),
        Err(BudgetError::Invalid(_))
    ));

    let mut threshold = NewBudget::new(
        "Batas",
        BudgetType::Daily,
        BudgetCategory::Total,
        10.0,
        date(2026, 10, 1),
    );
    threshold.alert_threshold = Some(1.5);
    assert!(matches!(
        tracker.create(&threshold),
        Err(BudgetError::Invalid(_))
    ));
}

#[test]
fn each_alert_fires_once_per_period() {
    let (_dir, tracker) = setup();
    let id = october_ingredients(&tracker);
    let on = date(2026, 10, 12);

    let first = tracker
        .record_expense(&Expense::new(700_000.0, "bahan_baku", on))
        .unwrap();
    assert_eq!(first.len(), 1);
    assert!(first[0].alerts.is_empty());
    assert_eq!(first[0].spent_percentage, 70.0);

    let second = tracker
        .record_expense(&Expense::new(150_000.0, "bahan_baku", on))
        .unwrap();
    assert_eq!(second[0].alerts, vec![BudgetAlertKind::ThresholdExceeded]);

    let third = tracker
        .record_expense(&Expense::new(50_000.0, "bahan_baku", on))
        .unwrap();
    assert!(third[0].alerts.is_empty());

    let fourth = tracker
        .record_expense(&Expense::new(200_000.0, "bahan_baku", on))
        .unwrap();
    assert_eq!(fourth[0].alerts, vec![BudgetAlertKind::BudgetExceeded]);
    assert_eq!(fourth[0].spent_percentage, 110.0);

    tracker
        .record_expense(&Expense::new(10_000.0, "bahan_baku", on))
        .unwrap();

    let alerts = tracker.alerts(Some(&id)).unwrap();
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().any(|a| a.kind == BudgetAlertKind::BudgetExceeded));
    assert_eq!(tracker.get(&id).unwrap().current_spent, 1_110_000.0);
}

#[test]
fn expenses_only_hit_matching_budgets() {
    let (_dir, tracker) = setup();
    let ingredients = october_ingredients(&tracker);
    let total = tracker
        .create(&NewBudget::new(
            "Total Oktober",
            BudgetType::Monthly,
            BudgetCategory::Total,
            5_000_000.0,
            date(2026, 10, 1),
        ))
        .unwrap()
        .id;
    let utilities = tracker
        .create(&NewBudget::new(
            "Listrik Oktober",
            BudgetType::Monthly,
            BudgetCategory::Utilities,
            300_000.0,
            date(2026, 10, 1),
        ))
        .unwrap()
        .id;

    let impacts = tracker
        .record_expense(&Expense::new(120_000.0, "listrik", date(2026, 10, 5)))
        .unwrap();
    let hit: Vec<&str> = impacts.iter().map(|i| i.budget_id.as_str()).collect();
    assert_eq!(hit.len(), 2);
    assert!(hit.contains(&total.as_str()));
    assert!(hit.contains(&utilities.as_str()));
    assert_eq!(tracker.get(&ingredients).unwrap().current_spent, 0.0);

    // Outside every period.
    let none = tracker
        .record_expense(&Expense::new(1.0, "listrik", date(2026, 12, 5)))
        .unwrap();
    assert!(none.is_empty());

    // Deactivated budgets stop counting.
    tracker.deactivate(&utilities).unwrap();
    let after = tracker
        .record_expense(&Expense::new(1_000.0, "air", date(2026, 10, 6)))
        .unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].budget_id, total);
}

#[test]
fn statuses_are_sorted_and_analytics_aggregate() {
    let (_dir, tracker) = setup();
    october_ingredients(&tracker);
    let marketing = tracker
        .create(&NewBudget::new(
            "Marketing Oktober",
            BudgetType::Monthly,
            BudgetCategory::Marketing,
            200_000.0,
            date(2026, 10, 1),
        ))
        .unwrap()
        .id;
    tracker
        .record_expense(&Expense::new(180_000.0, "marketing", date(2026, 10, 3)))
        .unwrap();
    tracker
        .record_expense(&Expense::new(100_000.0, "bahan_baku", date(2026, 10, 3)))
        .unwrap();

    let today = date(2026, 10, 19);
    let statuses = tracker.statuses(today).unwrap();
    assert_eq!(statuses[0].budget.id, marketing);
    assert_eq!(statuses[0].spent_percentage, 90.0);
    assert!(statuses[0].is_over_threshold);
    assert_eq!(statuses[0].days_remaining, 13);

    let analytics = tracker.analytics(today).unwrap();
    assert_eq!(analytics.total_budgets, 2);
    assert_eq!(analytics.total_spent, 280_000.0);
    assert_eq!(analytics.near_threshold_count, 1);
    assert_eq!(analytics.over_budget_count, 0);
    assert_eq!(analytics.category_breakdown["marketing"].count, 1);
}

#[test]
fn monthly_budgets_renew_once() {
    let (dir, tracker) = setup();
    october_ingredients(&tracker);

    // Still running.
    assert!(tracker.auto_renew(date(2026, 10, 20)).unwrap().is_empty());

    let renewed = tracker.auto_renew(date(2026, 11, 3)).unwrap();
    assert_eq!(renewed.len(), 1);
    assert_eq!(renewed[0].period_start, date(2026, 11, 1));
    assert_eq!(renewed[0].period_end, date(2026, 12, 1));
    assert_eq!(renewed[0].current_spent, 0.0);

    // Running again the same week does not duplicate.
    let again = tracker.auto_renew(date(2026, 11, 4)).unwrap();
    assert!(again.is_empty());

    // Beyond the grace window nothing is renewed.
    let store = SqliteBudgetStore::new(
        SqliteDatabase::new(dir.path().join("heytrack.sqlite")).unwrap(),
    );
    store
        .insert(&BudgetDraft {
            name: "Gaji Agustus".into(),
            description: None,
            budget_type: BudgetType::Monthly,
            category: BudgetCategory::Labor,
            target_amount: 3_000_000.0,
            period_start: date(2026, 8, 1),
            period_end: date(2026, 9, 1),
            alert_threshold: 0.9,
        })
        .unwrap();
    assert!(tracker.auto_renew(date(2026, 11, 5)).unwrap().is_empty());
}

#[test]
fn update_and_delete() {
    let (_dir, tracker) = setup();
    let id = october_ingredients(&tracker);
    let updated = tracker
        .update(
            &id,
            &BudgetUpdate {
                target_amount: Some(2_000_000.0),
                alert_threshold: Some(0.9),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.target_amount, 2_000_000.0);
    assert_eq!(updated.alert_threshold, 0.9);

    let err = tracker
        .update(
            &id,
            &BudgetUpdate {
                period_end: Some(date(2026, 9, 1)),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, BudgetError::Invalid(_)));

    tracker.delete(&id).unwrap();
    assert!(matches!(tracker.get(&id), Err(BudgetError::NotFound { .. })));
    assert!(tracker.list(true).unwrap().is_empty());
}

#[test]
fn failing_budget_does_not_undo_the_others() {
    let (_dir, db, tracker) = setup_with_db();
    let ingredients = october_ingredients(&tracker);
    let total = tracker
        .create(&NewBudget::new(
            "Total Oktober",
            BudgetType::Monthly,
            BudgetCategory::Total,
            5_000_000.0,
            date(2026, 10, 1),
        ))
        .unwrap()
        .id;
    db.open()
        .unwrap()
        .execute_batch(&format!(
            "CREATE TRIGGER freeze_budget BEFORE UPDATE ON budgets
             WHEN OLD.id = '{ingredients}'
             BEGIN SELECT RAISE(ABORT, 'frozen'); END;"
        ))
        .unwrap();

    let impacts = tracker
        .record_expense(&Expense::new(400_000.0, "bahan_baku", date(2026, 10, 12)))
        .unwrap();
    assert_eq!(impacts.len(), 1);
    assert_eq!(impacts[0].budget_id, total);
    assert_eq!(tracker.get(&total).unwrap().current_spent, 400_000.0);
    assert_eq!(tracker.get(&ingredients).unwrap().current_spent, 0.0);
}

#[test]
fn expense_survives_a_failed_alert_write() {
    let (_dir, db, tracker) = setup_with_db();
    let id = october_ingredients(&tracker);
    db.open()
        .unwrap()
        .execute_batch("DROP TABLE budget_alerts;")
        .unwrap();

    let impacts = tracker
        .record_expense(&Expense::new(900_000.0, "bahan_baku", date(2026, 10, 12)))
        .unwrap();
    assert_eq!(impacts.len(), 1);
    assert!(impacts[0].alerts.is_empty());
    assert_eq!(tracker.get(&id).unwrap().current_spent, 900_000.0);
}
