//! End-to-end scenarios driven only through the crate's public surface
//! (`init`/`summary`/`write_data`/`read_range`), the way
//! `giga-segy-out/src/integration_tests` exercises its two crates
//! against each other rather than their internals.

use tempfile::tempdir;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

use crate::{read_range, write_data};

mod multi_trend_lifecycle;

fn dt(y: i32, m: Month, d: u8, h: u8, min: u8) -> OffsetDateTime {
    PrimitiveDateTime::new(Date::from_calendar_date(y, m, d).unwrap(), Time::from_hms(h, min, 0).unwrap())
        .assume_utc()
}

#[test]
fn fresh_database_round_trips_a_single_trend() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plant.db");
    crate::init(&path).unwrap();

    let observations = vec![
        (dt(2024, Month::April, 3, 6, 0), "12.5".to_string()),
        (dt(2024, Month::April, 3, 18, 0), "13.1".to_string()),
    ];
    write_data(&path, "Boiler.Temp", &observations).unwrap();

    let summary = crate::summary(&path).unwrap();
    assert_eq!(summary.num_trend_pages, 1);
    assert_eq!(summary.num_data_pages, 1);

    let result = read_range(
        &path,
        "Boiler.Temp",
        Date::from_calendar_date(2024, Month::April, 3).unwrap(),
        Date::from_calendar_date(2024, Month::April, 3).unwrap(),
    )
    .unwrap();
    assert_eq!(result, observations);
}

#[test]
fn range_query_excludes_days_outside_the_window() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plant.db");
    crate::init(&path).unwrap();

    let observations = vec![
        (dt(2024, Month::January, 1, 0, 0), "a".to_string()),
        (dt(2024, Month::January, 2, 0, 0), "b".to_string()),
        (dt(2024, Month::January, 3, 0, 0), "c".to_string()),
    ];
    write_data(&path, "Valve", &observations).unwrap();

    let result = read_range(
        &path,
        "Valve",
        Date::from_calendar_date(2024, Month::January, 2).unwrap(),
        Date::from_calendar_date(2024, Month::January, 2).unwrap(),
    )
    .unwrap();
    assert_eq!(result, vec![observations[1].clone()]);
}

#[test]
fn unknown_trend_name_is_rejected_on_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plant.db");
    crate::init(&path).unwrap();

    let err = read_range(
        &path,
        "NoSuchTrend",
        Date::from_calendar_date(2024, Month::January, 1).unwrap(),
        Date::from_calendar_date(2024, Month::January, 1).unwrap(),
    )
    .unwrap_err();
    assert!(matches!(err, crate::Error::UnknownTrend(_)));
}
