//! End-to-end ledger flow on one channel: inventory, bookings, prices, fees.

use roomstock::datasource::SqliteBookingSource;
use roomstock::db::init_db;
use roomstock::domain::{
    CancelPolicy, CancelWindow, ChildRate, ChildRateCategory, ChildRateTable, ChildTier,
    NewBooking, NewPlanGroup, NewRoomType, PropertyId, StockWindow, TaxCategory, TaxedAmount,
    UseDate, Wholesaler,
};
use roomstock::engine::child_price::{build_price_rows, AdultPriceInput};
use roomstock::orchestration::{reconcile_booking_counts, CancellationService};
use roomstock::{BatchWriter, Repository};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tempfile::TempDir;

const CHANNEL: Wholesaler = Wholesaler::Neppan;

fn d(s: &str) -> UseDate {
    s.parse().unwrap()
}

async fn setup() -> (Arc<Repository>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    // A tight parameter budget forces multi-statement batches.
    let repo = Arc::new(Repository::with_batch_writer(pool, BatchWriter::new(40)));
    (repo, temp_dir)
}

#[tokio::test]
async fn test_inventory_bookings_and_capacity_change() {
    let (repo, _temp) = setup().await;
    let room = repo
        .create_room_type(
            CHANNEL,
            NewRoomType {
                property_id: PropertyId::new(3),
                code: "TWN".to_string(),
                name: "Twin".to_string(),
                room_count: 5,
                min_occupancy: 1,
                max_occupancy: 2,
                stock_window: StockWindow::YearRound,
            },
        )
        .await
        .unwrap();
    let window = StockWindow::Range {
        start: d("2024-06-01"),
        end: d("2024-06-30"),
    };
    let saved = repo
        .save_room_inventory(CHANNEL, room.id, 5, window, d("2024-06-01"), 365)
        .await
        .unwrap();
    assert_eq!(saved.inserted, 30);
    assert!(saved.statements > 1);

    for _ in 0..2 {
        repo.insert_booking(
            CHANNEL,
            NewBooking {
                property_id: PropertyId::new(3),
                plan_id: roomstock::PlanId::new(1),
                room_type_id: room.id,
                check_in: d("2024-06-01"),
                check_out: d("2024-06-02"),
                total_price_in_tax: 11000,
                is_non_refundable: false,
            },
        )
        .await
        .unwrap();
    }
    let source = SqliteBookingSource::new(repo.clone());
    reconcile_booking_counts(&repo, &source, CHANNEL, PropertyId::new(3), d("2024-06-01"), d("2024-06-30"))
        .await
        .unwrap();

    let stock = repo.get_stock(CHANNEL, room.id, d("2024-06-01")).await.unwrap().unwrap();
    assert_eq!((stock.room_count, stock.booking_count, stock.stock), (5, 2, 3));

    repo.save_room_inventory(CHANNEL, room.id, 8, window, d("2024-06-01"), 365)
        .await
        .unwrap();
    let stock = repo.get_stock(CHANNEL, room.id, d("2024-06-01")).await.unwrap().unwrap();
    assert_eq!((stock.room_count, stock.booking_count, stock.stock), (8, 2, 6));

    let all = repo
        .query_stocks_in_range(CHANNEL, &[room.id], d("2024-06-01"), d("2024-06-30"))
        .await
        .unwrap();
    assert_eq!(all.len(), 30);
    assert!(all.iter().all(|s| s.is_consistent()));
}

#[tokio::test]
async fn test_prices_child_rates_and_cancellation_fee() {
    let (repo, _temp) = setup().await;
    let room = repo
        .create_room_type(
            CHANNEL,
            NewRoomType {
                property_id: PropertyId::new(3),
                code: "DBL".to_string(),
                name: "Double".to_string(),
                room_count: 3,
                min_occupancy: 1,
                max_occupancy: 2,
                stock_window: StockWindow::YearRound,
            },
        )
        .await
        .unwrap();

    let check_in = Utc.with_ymd_and_hms(2024, 6, 20, 6, 0, 0).unwrap();
    let policy_id = repo
        .insert_cancel_policy(
            PropertyId::new(3),
            "Week before",
            &CancelPolicy::new(vec![CancelWindow {
                start: check_in - chrono::Duration::days(7),
                end: Some(check_in),
                percent: Decimal::from(50),
            }]),
        )
        .await
        .unwrap();

    let rates = ChildRateTable::default().with(
        ChildTier::Upper,
        ChildRate::new(ChildRateCategory::Percentage, Decimal::from(50)),
    );
    let plan = repo
        .create_plan_group(
            CHANNEL,
            NewPlanGroup {
                property_id: PropertyId::new(3),
                room_type_ids: vec![room.id],
                code: "BB".to_string(),
                name: "Breakfast".to_string(),
                tax_category: TaxCategory::Excluded,
                child_rates: rates,
                cancel_policy_id: Some(policy_id),
            },
        )
        .await
        .unwrap()
        .remove(0);

    let inputs: Vec<AdultPriceInput> = d("2024-06-18")
        .iter_through(d("2024-06-22"))
        .map(|use_date| AdultPriceInput {
            use_date,
            occupancy: 2,
            per_person_price: 10000,
            regular_price: 24000,
        })
        .collect();
    let outcome = repo
        .upsert_prices(CHANNEL, &build_price_rows(&plan, &inputs))
        .await
        .unwrap();
    assert_eq!(outcome.inserted, 5);

    let stored = repo
        .query_prices_in_period(CHANNEL, &[plan.id], d("2024-06-20"), d("2024-06-20"))
        .await
        .unwrap();
    assert_eq!(stored[0].price, 20000);
    assert_eq!(stored[0].price_in_tax, 22000);
    assert_eq!(stored[0].child_prices[ChildTier::Upper.index()], TaxedAmount::new(10000, 11000));

    // Drop the upper-tier rate from the 21st onward.
    let rewritten = repo
        .update_plan_child_rates(CHANNEL, plan.id, ChildRateTable::default(), d("2024-06-21"))
        .await
        .unwrap();
    assert_eq!(rewritten, 2);
    let after = repo
        .query_prices_from(CHANNEL, &[plan.id], d("2024-06-20"))
        .await
        .unwrap();
    assert_eq!(after[0].child_prices[0], TaxedAmount::new(10000, 11000));
    assert_eq!(after[1].child_prices[0], TaxedAmount::default());
    assert_eq!(after[1].price_in_tax, 22000);

    let booking = repo
        .insert_booking(
            CHANNEL,
            NewBooking {
                property_id: PropertyId::new(3),
                plan_id: plan.id,
                room_type_id: room.id,
                check_in: d("2024-06-20"),
                check_out: d("2024-06-21"),
                total_price_in_tax: 22000,
                is_non_refundable: false,
            },
        )
        .await
        .unwrap();
    let service = CancellationService::new(repo.clone());
    let quote = service
        .suggest(CHANNEL, booking.id, check_in - chrono::Duration::days(3))
        .await
        .unwrap();
    assert_eq!(quote.cancellation_fee, 11000);
    let early = service
        .suggest(CHANNEL, booking.id, check_in - chrono::Duration::days(30))
        .await
        .unwrap();
    assert_eq!(early.cancellation_fee, 0);
}
