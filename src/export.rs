//! Flat tabular export
//!
//! Writes per-(user, period) metric rows in the fixed column layout
//! consumed by downstream joins. Column labels must match the canonical
//! activity-kind labels exactly or those joins silently lose columns.

use std::io::Write;

use crate::error::AnalysisError;
use crate::types::{Granularity, MobilityMetricRow};

const DAILY_HEADER: [&str; 11] = [
    "user_id",
    "date",
    "walking",
    "in bus",
    "in train",
    "in passenger vehicle",
    "running",
    "cycling",
    "total",
    "sustainable",
    "percent_sustainable",
];

const WEEKLY_HEADER: [&str; 13] = [
    "user_id",
    "week_start",
    "week_end",
    "week_number",
    "walking",
    "in bus",
    "in train",
    "in passenger vehicle",
    "running",
    "cycling",
    "total",
    "sustainable",
    "percent_sustainable",
];

/// Write rows as CSV in the given order; callers are expected to supply
/// rows with periods ascending within each user. Numbers use `.` as the
/// decimal separator and percentages carry no suffix.
pub fn write_csv<W: Write>(
    writer: W,
    granularity: Granularity,
    rows: &[MobilityMetricRow],
) -> Result<(), AnalysisError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    match granularity {
        Granularity::Daily => csv_writer.write_record(DAILY_HEADER)?,
        Granularity::Weekly => csv_writer.write_record(WEEKLY_HEADER)?,
    }

    for row in rows {
        let mut record: Vec<String> = vec![row.user_id.clone()];
        match granularity {
            Granularity::Daily => record.push(row.period_start.to_string()),
            Granularity::Weekly => {
                record.push(row.period_start.to_string());
                record.push(
                    row.period_end
                        .map(|date| date.to_string())
                        .unwrap_or_default(),
                );
                record.push(row.period.to_string());
            }
        }
        for (_, km) in row.distances.iter() {
            record.push(format_number(km));
        }
        record.push(format_number(row.total_km));
        record.push(format_number(row.sustainable_km));
        record.push(format_number(row.percent_sustainable));
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Convenience wrapper rendering the export in memory
pub fn to_csv_string(
    granularity: Granularity,
    rows: &[MobilityMetricRow],
) -> Result<String, AnalysisError> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, granularity, rows)?;
    String::from_utf8(buffer)
        .map_err(|e| AnalysisError::UnrecognizedFormat(format!("non-UTF8 export: {}", e)))
}

fn format_number(value: f64) -> String {
    format!("{}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score;
    use crate::types::{ActivityKind, KindDistances, MobilityBucket, PeriodKey};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn daily_row(user_id: &str, day: u32, walking: f64, bus: f64) -> MobilityMetricRow {
        let date = NaiveDate::from_ymd_opt(2025, 4, day).unwrap();
        let mut distances = KindDistances::default();
        distances.add(ActivityKind::Walking, walking);
        distances.add(ActivityKind::Bus, bus);
        score::score(&MobilityBucket {
            user_id: user_id.to_string(),
            period: PeriodKey::Day(date),
            period_start: date,
            period_end: None,
            distances,
        })
    }

    fn weekly_row(user_id: &str, week: u32, vehicle: f64) -> MobilityMetricRow {
        let monday =
            NaiveDate::from_ymd_opt(2025, 4, 7).unwrap() + chrono::Duration::weeks(week as i64 - 15);
        let mut distances = KindDistances::default();
        distances.add(ActivityKind::PassengerVehicle, vehicle);
        score::score(&MobilityBucket {
            user_id: user_id.to_string(),
            period: PeriodKey::Week {
                iso_year: 2025,
                iso_week: week,
            },
            period_start: monday,
            period_end: Some(monday + chrono::Duration::days(6)),
            distances,
        })
    }

    #[test]
    fn test_daily_header_layout() {
        let csv = to_csv_string(Granularity::Daily, &[]).unwrap();
        assert_eq!(
            csv.lines().next().unwrap(),
            "user_id,date,walking,in bus,in train,in passenger vehicle,\
             running,cycling,total,sustainable,percent_sustainable"
        );
    }

    #[test]
    fn test_weekly_header_layout() {
        let csv = to_csv_string(Granularity::Weekly, &[]).unwrap();
        assert_eq!(
            csv.lines().next().unwrap(),
            "user_id,week_start,week_end,week_number,walking,in bus,in train,\
             in passenger vehicle,running,cycling,total,sustainable,percent_sustainable"
        );
    }

    #[test]
    fn test_daily_row_values() {
        let csv = to_csv_string(Granularity::Daily, &[daily_row("u1", 7, 2.0, 3.0)]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "u1,2025-04-07,2,3,0,0,0,0,5,5,100");
    }

    #[test]
    fn test_weekly_row_values() {
        let csv = to_csv_string(Granularity::Weekly, &[weekly_row("u1", 15, 10.0)]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[1],
            "u1,2025-04-07,2025-04-13,2025-W15,0,0,0,10,0,0,10,0,0"
        );
    }

    #[test]
    fn test_decimal_point_separator() {
        let csv = to_csv_string(Granularity::Daily, &[daily_row("u1", 7, 1.5, 2.25)]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[1], "u1,2025-04-07,1.5,2.25,0,0,0,0,3.75,3.75,100");
    }

    #[test]
    fn test_rows_written_in_given_order() {
        let rows = vec![daily_row("u1", 7, 1.0, 0.0), daily_row("u1", 8, 2.0, 0.0)];
        let csv = to_csv_string(Granularity::Daily, &rows).unwrap();
        let dates: Vec<&str> = csv
            .lines()
            .skip(1)
            .map(|line| line.split(',').nth(1).unwrap())
            .collect();
        assert_eq!(dates, vec!["2025-04-07", "2025-04-08"]);
    }
}
