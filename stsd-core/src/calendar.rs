//! Calendar adapter: Gregorian dates <-> a proleptic day ordinal.
//!
//! Day ids (spec §3) are always relative to a configurable initial year,
//! so only differences between ordinals are meaningful here — no epoch
//! assumptions leak into the rest of the crate.

use time::{Date, Month, OffsetDateTime};

use crate::error::{Error, Result};

/// Converts a Gregorian date to a proleptic day ordinal (Julian day number).
pub fn ordinal_of(date: Date) -> i64 {
    date.to_julian_day() as i64
}

/// Inverse of [`ordinal_of`].
pub fn date_of(ordinal: i64) -> Result<Date> {
    Date::from_julian_day(ordinal as i32)
        .map_err(|e| Error::Corruption(format!("invalid day ordinal {ordinal}: {e}")))
}

/// `day_id = ordinal(date) - ordinal(Y0-01-01) + 1`, per spec §3's Index record row.
pub fn day_id(date: Date, initial_year: u16) -> Result<u16> {
    let jan1 = Date::from_calendar_date(initial_year as i32, Month::January, 1)
        .map_err(|e| Error::Corruption(format!("bad initial year {initial_year}: {e}")))?;

    let delta = ordinal_of(date) - ordinal_of(jan1) + 1;
    u16::try_from(delta)
        .map_err(|_| Error::Corruption(format!("day_id {delta} out of range for u16")))
}

/// Inverse of [`day_id`]: the calendar date `day_id` days past Y0-01-01 (1-based).
pub fn date_of_day_id(day_id: u16, initial_year: u16) -> Result<Date> {
    let jan1 = Date::from_calendar_date(initial_year as i32, Month::January, 1)
        .map_err(|e| Error::Corruption(format!("bad initial year {initial_year}: {e}")))?;

    date_of(ordinal_of(jan1) + day_id as i64 - 1)
}

/// Minute-of-day index (0..1440) used by the day-template builder.
pub fn minute_of_day(dt: OffsetDateTime) -> u16 {
    dt.hour() as u16 * 60 + dt.minute() as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    #[test]
    fn day_id_round_trips() {
        let d = Date::from_calendar_date(2024, Month::March, 21).unwrap();
        let id = day_id(d, 2000).unwrap();
        assert_eq!(date_of_day_id(id, 2000).unwrap(), d);
    }

    #[test]
    fn day_id_is_one_based() {
        let jan1_2000 = Date::from_calendar_date(2000, Month::January, 1).unwrap();
        assert_eq!(day_id(jan1_2000, 2000).unwrap(), 1);
    }

    #[test]
    fn minute_of_day_examples() {
        let dt = time::PrimitiveDateTime::new(
            Date::from_calendar_date(2024, Month::March, 21).unwrap(),
            time::Time::from_hms(14, 30, 0).unwrap(),
        )
        .assume_utc();
        assert_eq!(minute_of_day(dt), 14 * 60 + 30);
    }
}
