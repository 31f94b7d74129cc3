mod common;

use chrono::Utc;
use common::{new_item, new_task, TestApp};
use pantry_api::{
    entities::{Category, ConsumptionReason, TaskStatus},
    services::{
        consumption::ConsumeCommand,
        statistics::{ConsumptionGroupBy, StatsWindow, TaskGroupBy},
        tasks::NewTask,
    },
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

async fn consume(app: &TestApp, item_id: i32, quantity: Decimal, reason: ConsumptionReason) {
    app.services()
        .consumption
        .consume(
            ConsumeCommand {
                item_id,
                quantity,
                reason,
                note: None,
                force: false,
            },
            "tester",
        )
        .await
        .expect("consume for stats");
}

fn today_window() -> StatsWindow {
    let today = Utc::now().date_naive();
    StatsWindow::new(today, today).unwrap()
}

#[tokio::test]
async fn single_day_window_totals_events() {
    let app = TestApp::new().await;
    let item_id = app.seed_item("Milk", dec!(10), None).await;
    consume(&app, item_id, dec!(2), ConsumptionReason::Consumed).await;
    consume(&app, item_id, dec!(3), ConsumptionReason::Consumed).await;

    let stats = app
        .services()
        .statistics
        .consumption_stats(today_window(), ConsumptionGroupBy::Total)
        .await
        .unwrap();

    assert_eq!(stats.days, 1);
    assert_eq!(stats.rows.len(), 1);
    let row = &stats.rows[0];
    assert_eq!(row.group_label, "TOTAL");
    assert_eq!(row.total_quantity, dec!(5));
    assert_eq!(row.event_count, 2);
    assert_eq!(row.daily_average, dec!(5));
}

#[tokio::test]
async fn consumption_groups_by_category_and_reason() {
    let app = TestApp::new().await;
    let milk = app.seed_item("Milk", dec!(10), None).await;
    let mut apples = new_item("Apples", dec!(10));
    apples.category = Category::Fruit;
    let apples = app.services().inventory.add_item(apples, "tester").await.unwrap().id;

    consume(&app, milk, dec!(1), ConsumptionReason::Consumed).await;
    consume(&app, apples, dec!(4), ConsumptionReason::Expired).await;
    consume(&app, apples, dec!(2), ConsumptionReason::Consumed).await;

    let by_category = app
        .services()
        .statistics
        .consumption_stats(today_window(), ConsumptionGroupBy::Category)
        .await
        .unwrap();
    let labels: Vec<(&str, Decimal, i64)> = by_category
        .rows
        .iter()
        .map(|r| (r.group_label.as_str(), r.total_quantity, r.event_count))
        .collect();
    assert_eq!(labels, vec![("FRUIT", dec!(6), 2), ("DAIRY", dec!(1), 1)]);
    assert_eq!(by_category.total_quantity, dec!(7));

    let by_reason = app
        .services()
        .statistics
        .consumption_stats(today_window(), ConsumptionGroupBy::Reason)
        .await
        .unwrap();
    let labels: Vec<&str> = by_reason.rows.iter().map(|r| r.group_label.as_str()).collect();
    assert_eq!(labels, vec!["EXPIRED", "CONSUMED"]);
    assert_eq!(by_reason.total_quantity, dec!(7));
}

#[tokio::test]
async fn window_without_events_is_empty() {
    let app = TestApp::new().await;
    let item_id = app.seed_item("Milk", dec!(10), None).await;
    consume(&app, item_id, dec!(1), ConsumptionReason::Consumed).await;

    let today = Utc::now().date_naive();
    let past = StatsWindow::ending_on(today - chrono::Duration::days(30), 6).unwrap();

    let stats = app
        .services()
        .statistics
        .consumption_stats(past, ConsumptionGroupBy::Category)
        .await
        .unwrap();
    assert!(stats.rows.is_empty());
    assert_eq!(stats.total_quantity, Decimal::ZERO);
    assert_eq!(stats.days, 7);
}

#[tokio::test]
async fn daily_average_divides_by_window_length() {
    let app = TestApp::new().await;
    let item_id = app.seed_item("Rice", dec!(10), None).await;
    consume(&app, item_id, dec!(4), ConsumptionReason::Consumed).await;

    let window = StatsWindow::ending_on(Utc::now().date_naive(), 3).unwrap();
    let stats = app
        .services()
        .statistics
        .consumption_stats(window, ConsumptionGroupBy::Total)
        .await
        .unwrap();
    assert_eq!(stats.days, 4);
    assert_eq!(stats.rows[0].daily_average, dec!(1));
}

#[tokio::test]
async fn task_stats_group_by_status_and_assignee() {
    let app = TestApp::new().await;
    let tasks = &app.services().tasks;
    let first = tasks
        .create(
            NewTask {
                assignee: Some("sam".into()),
                ..new_task("Wipe shelves")
            },
            "alex",
        )
        .await
        .unwrap();
    tasks
        .create(
            NewTask {
                assignee: Some("sam".into()),
                ..new_task("Sort cans")
            },
            "alex",
        )
        .await
        .unwrap();
    tasks.create(new_task("Buy bread"), "alex").await.unwrap();
    tasks.complete(first.id, "sam").await.unwrap();

    let by_status = app
        .services()
        .statistics
        .task_stats(today_window(), TaskGroupBy::Status)
        .await
        .unwrap();
    let counts: Vec<(String, i64)> = by_status
        .rows
        .iter()
        .map(|r| (r.group_label.clone(), r.count))
        .collect();
    assert_eq!(
        counts,
        vec![
            (TaskStatus::Todo.to_string(), 2),
            (TaskStatus::Done.to_string(), 1)
        ]
    );
    assert_eq!(by_status.total_tasks, 3);

    let by_assignee = app
        .services()
        .statistics
        .task_stats(today_window(), TaskGroupBy::Assignee)
        .await
        .unwrap();
    let counts: Vec<(&str, i64)> = by_assignee
        .rows
        .iter()
        .map(|r| (r.group_label.as_str(), r.count))
        .collect();
    assert_eq!(counts, vec![("sam", 2), ("UNASSIGNED", 1)]);
    assert_eq!(by_assignee.total_tasks, 3);
}
