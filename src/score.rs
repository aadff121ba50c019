//! Sustainability scoring
//!
//! Derives total distance, sustainable distance and the sustainability
//! percentage from a completed mobility bucket.

use crate::types::{MobilityBucket, MobilityMetricRow};

/// Round to `decimals` decimal places, half away from zero
fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Derive the metric row for a completed bucket.
///
/// Sustainable distance covers the five kinds excluding passenger vehicle.
/// Totals are rounded to 3 decimals, the percentage to 2; a zero total
/// yields a zero percentage rather than dividing.
pub fn score(bucket: &MobilityBucket) -> MobilityMetricRow {
    let total: f64 = bucket.distances.iter().map(|(_, km)| km).sum();
    let sustainable: f64 = bucket
        .distances
        .iter()
        .filter(|(kind, _)| kind.is_sustainable())
        .map(|(_, km)| km)
        .sum();
    let percent = if total > 0.0 {
        sustainable / total * 100.0
    } else {
        0.0
    };

    MobilityMetricRow {
        user_id: bucket.user_id.clone(),
        period: bucket.period,
        period_start: bucket.period_start,
        period_end: bucket.period_end,
        distances: bucket.distances,
        total_km: round_to(total, 3),
        sustainable_km: round_to(sustainable, 3),
        percent_sustainable: round_to(percent, 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityKind, KindDistances, PeriodKey};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn bucket(distances: KindDistances) -> MobilityBucket {
        let date = NaiveDate::from_ymd_opt(2025, 4, 7).unwrap();
        MobilityBucket {
            user_id: "u1".to_string(),
            period: PeriodKey::Day(date),
            period_start: date,
            period_end: None,
            distances,
        }
    }

    #[test]
    fn test_walking_and_bus_day_is_fully_sustainable() {
        let mut distances = KindDistances::default();
        distances.add(ActivityKind::Walking, 2.0);
        distances.add(ActivityKind::Bus, 3.0);

        let row = score(&bucket(distances));
        assert_eq!(row.total_km, 5.0);
        assert_eq!(row.sustainable_km, 5.0);
        assert_eq!(row.percent_sustainable, 100.0);
    }

    #[test]
    fn test_passenger_vehicle_only_is_zero_sustainable() {
        let mut distances = KindDistances::default();
        distances.add(ActivityKind::PassengerVehicle, 10.0);

        let row = score(&bucket(distances));
        assert_eq!(row.total_km, 10.0);
        assert_eq!(row.sustainable_km, 0.0);
        assert_eq!(row.percent_sustainable, 0.0);
    }

    #[test]
    fn test_zero_total_guards_division() {
        let row = score(&bucket(KindDistances::default()));
        assert_eq!(row.total_km, 0.0);
        assert_eq!(row.percent_sustainable, 0.0);
    }

    #[test]
    fn test_mixed_kinds_percentage() {
        let mut distances = KindDistances::default();
        distances.add(ActivityKind::Cycling, 3.0);
        distances.add(ActivityKind::PassengerVehicle, 9.0);

        let row = score(&bucket(distances));
        assert_eq!(row.total_km, 12.0);
        assert_eq!(row.sustainable_km, 3.0);
        assert_eq!(row.percent_sustainable, 25.0);
    }

    #[test]
    fn test_rounding_precision() {
        let mut distances = KindDistances::default();
        distances.add(ActivityKind::Walking, 1.0 / 3.0);
        distances.add(ActivityKind::PassengerVehicle, 2.0 / 3.0);

        let row = score(&bucket(distances));
        assert_eq!(row.total_km, 1.0);
        assert_eq!(row.sustainable_km, 0.333);
        assert_eq!(row.percent_sustainable, 33.33);
    }

    #[test]
    fn test_totals_stay_consistent_with_kind_sums() {
        let mut distances = KindDistances::default();
        distances.add(ActivityKind::Walking, 1.25);
        distances.add(ActivityKind::Train, 10.5);
        distances.add(ActivityKind::PassengerVehicle, 4.75);

        let row = score(&bucket(distances));
        let kind_sum: f64 = row.distances.iter().map(|(_, km)| km).sum();
        assert_eq!(row.total_km, round_to(kind_sum, 3));
        assert_eq!(
            row.sustainable_km,
            round_to(kind_sum - row.distances.passenger_vehicle, 3)
        );
        assert!(row.percent_sustainable >= 0.0 && row.percent_sustainable <= 100.0);
    }
}
