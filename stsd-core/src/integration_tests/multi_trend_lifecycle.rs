//! A database accumulating several trends over several days, the shape
//! a real deployment actually produces: writes interleaved across
//! trends, followed by range queries that must only ever see their own
//! trend's data.

use tempfile::tempdir;
use time::{Date, Month};

use crate::{read_range, write_data};

use super::dt;

#[test]
fn interleaved_writes_keep_trends_independent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("site.db");
    crate::init(&path).unwrap();

    write_data(
        &path,
        "Pump.Flow",
        &[(dt(2024, Month::May, 1, 8, 0), "41.0".to_string())],
    )
    .unwrap();
    write_data(
        &path,
        "Pump.Pressure",
        &[(dt(2024, Month::May, 1, 8, 0), "2.3".to_string())],
    )
    .unwrap();
    write_data(
        &path,
        "Pump.Flow",
        &[(dt(2024, Month::May, 2, 8, 0), "42.5".to_string())],
    )
    .unwrap();

    let flow = read_range(
        &path,
        "Pump.Flow",
        Date::from_calendar_date(2024, Month::May, 1).unwrap(),
        Date::from_calendar_date(2024, Month::May, 2).unwrap(),
    )
    .unwrap();
    assert_eq!(flow.len(), 2);

    let pressure = read_range(
        &path,
        "Pump.Pressure",
        Date::from_calendar_date(2024, Month::May, 1).unwrap(),
        Date::from_calendar_date(2024, Month::May, 2).unwrap(),
    )
    .unwrap();
    assert_eq!(pressure.len(), 1);
    assert_eq!(pressure[0].1, "2.3");
}

#[test]
fn trend_region_grows_transparently_across_many_distinct_trends() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("site.db");
    crate::init(&path).unwrap();

    // A trend record is 128 bytes; one page holds exactly 32. Writing more
    // than that must splice a second Trend page without disturbing reads
    // of trends committed before the splice.
    for i in 0..40 {
        let name = format!("Sensor{i:03}");
        write_data(&path, &name, &[(dt(2024, Month::June, 1, 0, 0), format!("{i}"))]).unwrap();
    }

    let summary = crate::summary(&path).unwrap();
    assert_eq!(summary.num_trend_pages, 2);

    for i in 0..40 {
        let name = format!("Sensor{i:03}");
        let result = read_range(
            &path,
            &name,
            Date::from_calendar_date(2024, Month::June, 1).unwrap(),
            Date::from_calendar_date(2024, Month::June, 1).unwrap(),
        )
        .unwrap();
        assert_eq!(result[0].1, format!("{i}"));
    }
}
