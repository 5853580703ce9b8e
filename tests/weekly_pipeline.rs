use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use turnip::{
    drop_incomplete, label_observations, load_transform_combine,
    load_transform_combine_concurrent, load_week, pivot_combined, sample_trends, DataSourceError,
    DateWindower, Observation, PipelineError, SellDataSource, SqliteSellStore, WeekdaySlot,
};
use tempfile::NamedTempFile;

fn ts(month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, month, day)
        .expect("valid date")
        .and_hms_opt(hour, 0, 0)
        .expect("valid time")
}

fn obs(user_id: i64, island_id: i64, at: NaiveDateTime, price: Option<f64>) -> Observation {
    Observation {
        user_id,
        island_id,
        datetime_observed: at,
        price,
    }
}

fn seed_store(rows: &[Observation]) -> (NamedTempFile, SqliteSellStore) {
    let file = NamedTempFile::new().expect("temp sqlite file");
    let store = SqliteSellStore::new(file.path(), Duration::from_secs(5));
    store.create_schema().expect("create schema");
    store.insert_observations(rows).expect("insert rows");
    (file, store)
}

fn slot(label: &str) -> WeekdaySlot {
    label.parse().expect("valid slot label")
}

/// One full Monday..Saturday week for a pair, price = base + slot index.
fn full_week(user_id: i64, island_id: i64, monday: u32, base: f64) -> Vec<Observation> {
    (0..6)
        .flat_map(|day| {
            [(9, 0.0), (15, 1.0)].map(move |(hour, half)| {
                obs(
                    user_id,
                    island_id,
                    ts(4, monday, hour) + chrono::Duration::days(day),
                    Some(base + day as f64 * 2.0 + half),
                )
            })
        })
        .collect()
}

#[test]
fn scenario_single_complete_pair_becomes_trend_zero() {
    let (_file, store) = seed_store(&[
        obs(1, 1, ts(4, 13, 9), Some(90.0)),
        obs(1, 1, ts(4, 13, 21), Some(95.0)),
        obs(2, 2, ts(4, 13, 9), Some(88.0)),
    ]);
    let windower = DateWindower::default();

    let raw = load_week(&store, &windower, 1).expect("week 1 loads");
    let filtered = drop_incomplete(&raw);
    assert_eq!(filtered.len(), 2);
    assert!(filtered.iter().all(|o| o.pair() == (1, 1)));

    let table = load_transform_combine(&store, &windower, 1).expect("pipeline runs");
    let rows: Vec<(usize, String, Option<f64>)> = table
        .rows
        .iter()
        .map(|r| (r.trend_id, r.weekday_slot.to_string(), r.price))
        .collect();
    assert_eq!(
        rows,
        vec![
            (0, "Monday AM".to_string(), Some(90.0)),
            (0, "Monday PM".to_string(), Some(95.0)),
        ]
    );
}

#[test]
fn full_weeks_produce_twelve_chronological_slots() {
    let mut rows = full_week(5, 50, 13, 100.0);
    rows.extend(full_week(6, 60, 20, 200.0));
    rows.extend(full_week(7, 70, 20, 300.0));
    // incomplete pair in week 2 is discarded
    rows.extend(full_week(8, 80, 20, 400.0).into_iter().skip(1));
    let (_file, store) = seed_store(&rows);

    let table = load_transform_combine(&store, &DateWindower::default(), 2).expect("pipeline");
    assert_eq!(table.slots.len(), 12);
    assert_eq!(table.slots[0], slot("Monday AM"));
    assert_eq!(table.slots[1], slot("Monday PM"));
    assert_eq!(table.slots[8], slot("Friday AM"));
    assert_eq!(table.slots[11], slot("Saturday PM"));
    assert_eq!(table.trend_ids(), (0..3).collect::<BTreeSet<_>>());

    let wide = pivot_combined(&table);
    assert_eq!(wide.keys, vec![0, 1, 2]);
    assert_eq!(wide.rows[0][0], Some(100.0));
    assert_eq!(wide.rows[1][11], Some(211.0));
    assert_eq!(wide.rows[2][3], Some(303.0));
}

#[test]
fn boundary_timestamps_belong_to_exactly_one_week() {
    let (_file, store) = seed_store(&[
        obs(1, 1, ts(4, 18, 23), Some(1.0)),
        obs(1, 1, ts(4, 19, 0), Some(2.0)),
    ]);
    let windower = DateWindower::default();

    let week_1 = load_week(&store, &windower, 1).expect("week 1");
    let week_2 = load_week(&store, &windower, 2).expect("week 2");
    assert_eq!(week_1.len(), 1);
    assert_eq!(week_1[0].price, Some(1.0));
    assert_eq!(week_2.len(), 1);
    assert_eq!(week_2[0].price, Some(2.0));
}

#[test]
fn custom_epoch_shifts_windows() {
    let (_file, store) = seed_store(&full_week(1, 1, 13, 10.0));
    let shifted = DateWindower::new(NaiveDate::from_ymd_opt(2020, 4, 5).expect("date"));

    assert!(load_week(&store, &shifted, 1).expect("week 1").is_empty());
    assert_eq!(load_week(&store, &shifted, 2).expect("week 2").len(), 12);
}

#[test]
fn slow_query_surfaces_retryable_timeout() {
    let rows: Vec<Observation> = (0..5_000)
        .map(|idx| obs(idx, idx, ts(4, 13 + (idx % 6) as u32, 9), Some(idx as f64)))
        .collect();
    let (file, seeded) = seed_store(&rows);
    drop(seeded);
    let store = SqliteSellStore::new(file.path(), Duration::ZERO);
    let window = DateWindower::default()
        .window_for_week(1)
        .expect("week 1 window");

    let err = store.fetch_window(&window).expect_err("query should time out");
    assert!(matches!(err, DataSourceError::Timeout { .. }));
    assert!(err.is_retryable());

    let err = load_week(&store, &DateWindower::default(), 1).expect_err("timeout propagates");
    assert!(matches!(
        err,
        PipelineError::DataSource {
            week_index: 1,
            source: DataSourceError::Timeout { .. }
        }
    ));
}

#[test]
fn concurrent_pipeline_over_sqlite_matches_sequential() {
    let mut rows = full_week(1, 1, 13, 100.0);
    rows.extend(full_week(2, 2, 20, 200.0));
    rows.extend(full_week(3, 3, 27, 300.0));
    let (_file, store) = seed_store(&rows);
    let windower = DateWindower::default();

    let sequential = load_transform_combine(&store, &windower, 3).expect("sequential");
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("runtime should build");
    let concurrent = rt
        .block_on(load_transform_combine_concurrent(
            Arc::new(store),
            windower,
            3,
        ))
        .expect("concurrent");

    assert_eq!(concurrent, sequential);
    assert_eq!(concurrent.trend_count(), 3);
}

#[test]
fn sampled_trends_are_drawn_from_combined_output() {
    let mut rows = Vec::new();
    for user in 0..8 {
        rows.extend(full_week(user, user, 13, 50.0 + user as f64));
    }
    let (_file, store) = seed_store(&rows);
    let table = load_transform_combine(&store, &DateWindower::default(), 1).expect("pipeline");

    let mut rng = StdRng::seed_from_u64(2020);
    let sample = sample_trends(&table, &table.trend_ids(), 3, &mut rng);
    assert_eq!(sample.trend_count(), 3);
    assert_eq!(sample.rows.len(), 3 * 12);
    assert!(sample.trend_ids().is_subset(&table.trend_ids()));
}

#[test]
fn labeled_rows_keep_original_observation() {
    let labeled = label_observations(vec![obs(1, 2, ts(4, 16, 13), Some(77.0))]);
    assert_eq!(labeled[0].weekday_slot, slot("Thursday PM"));
    assert_eq!(labeled[0].observation.island_id, 2);
}
