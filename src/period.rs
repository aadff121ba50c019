//! Period keying
//!
//! Pure helpers mapping dates to calendar-day and ISO-week periods. All
//! functions are total over any valid date and have no failure mode.

use chrono::{Datelike, Duration, NaiveDate};

use crate::types::PeriodKey;

/// Calendar-day key for a date
pub fn day_key(date: NaiveDate) -> PeriodKey {
    PeriodKey::Day(date)
}

/// ISO year-week key for a date
pub fn week_key(date: NaiveDate) -> PeriodKey {
    let iso = date.iso_week();
    PeriodKey::Week {
        iso_year: iso.year(),
        iso_week: iso.week(),
    }
}

/// Monday-start, 7-day inclusive bounds of the ISO week containing `date`
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date - Duration::days(date.weekday().num_days_from_monday() as i64);
    (start, start + Duration::days(6))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_key() {
        assert_eq!(day_key(date(2025, 4, 7)).to_string(), "2025-04-07");
    }

    #[test]
    fn test_week_key_pads_week_number() {
        assert_eq!(week_key(date(2025, 1, 8)).to_string(), "2025-W02");
        assert_eq!(week_key(date(2025, 4, 9)).to_string(), "2025-W15");
    }

    #[test]
    fn test_week_key_iso_year_boundary() {
        // 2024-12-30 is a Monday belonging to ISO week 1 of 2025
        assert_eq!(week_key(date(2024, 12, 30)).to_string(), "2025-W01");
        // 2027-01-01 is a Friday belonging to ISO week 53 of 2026
        assert_eq!(week_key(date(2027, 1, 1)).to_string(), "2026-W53");
    }

    #[test]
    fn test_week_bounds_monday_start_inclusive() {
        // 2025-04-09 is a Wednesday
        let (start, end) = week_bounds(date(2025, 4, 9));
        assert_eq!(start, date(2025, 4, 7));
        assert_eq!(end, date(2025, 4, 13));
        assert_eq!((end - start).num_days(), 6);
    }

    #[test]
    fn test_week_bounds_fixed_point_on_monday_and_sunday() {
        let (start, end) = week_bounds(date(2025, 4, 7));
        assert_eq!(start, date(2025, 4, 7));
        let (start2, end2) = week_bounds(date(2025, 4, 13));
        assert_eq!((start2, end2), (start, end));
    }

    #[test]
    fn test_every_date_in_week_shares_key_and_bounds() {
        let monday = date(2025, 4, 7);
        let key = week_key(monday);
        let bounds = week_bounds(monday);
        for offset in 0..7 {
            let day = monday + Duration::days(offset);
            assert_eq!(week_key(day), key);
            assert_eq!(week_bounds(day), bounds);
        }
    }
}
