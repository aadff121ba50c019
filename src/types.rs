//! Core types for the mobilita aggregation pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: activity segments, period keys, mobility buckets, metric rows,
//! and the auxiliary records they are fused with.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};

/// Transport kind of one classified movement event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Walking,
    Bus,
    Train,
    PassengerVehicle,
    Running,
    Cycling,
    /// Classified but not one of the six tracked kinds
    Unknown,
}

impl ActivityKind {
    /// The six tracked kinds, in canonical column order
    pub const TRACKED: [ActivityKind; 6] = [
        ActivityKind::Walking,
        ActivityKind::Bus,
        ActivityKind::Train,
        ActivityKind::PassengerVehicle,
        ActivityKind::Running,
        ActivityKind::Cycling,
    ];

    /// Canonical lower-case, space-separated label; these are also the
    /// export column names and must match them exactly.
    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::Walking => "walking",
            ActivityKind::Bus => "in bus",
            ActivityKind::Train => "in train",
            ActivityKind::PassengerVehicle => "in passenger vehicle",
            ActivityKind::Running => "running",
            ActivityKind::Cycling => "cycling",
            ActivityKind::Unknown => "unknown",
        }
    }

    /// Map a raw label onto the fixed enumeration.
    ///
    /// The label is lower-cased and underscores become spaces before
    /// matching, so `IN_BUS` and `in bus` both map to [`ActivityKind::Bus`].
    /// Anything unrecognized becomes [`ActivityKind::Unknown`].
    pub fn from_raw(raw: &str) -> Self {
        match raw.to_lowercase().replace('_', " ").as_str() {
            "walking" => ActivityKind::Walking,
            "in bus" => ActivityKind::Bus,
            "in train" => ActivityKind::Train,
            "in passenger vehicle" => ActivityKind::PassengerVehicle,
            "running" => ActivityKind::Running,
            "cycling" => ActivityKind::Cycling,
            _ => ActivityKind::Unknown,
        }
    }

    /// Whether the kind counts toward the sustainable distance
    pub fn is_sustainable(&self) -> bool {
        !matches!(self, ActivityKind::PassengerVehicle | ActivityKind::Unknown)
    }
}

/// Accumulated kilometers per tracked kind for one (user, period)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KindDistances {
    pub walking: f64,
    pub bus: f64,
    pub train: f64,
    pub passenger_vehicle: f64,
    pub running: f64,
    pub cycling: f64,
}

impl KindDistances {
    /// Distance accumulated for a tracked kind; zero for `Unknown`
    pub fn get(&self, kind: ActivityKind) -> f64 {
        match kind {
            ActivityKind::Walking => self.walking,
            ActivityKind::Bus => self.bus,
            ActivityKind::Train => self.train,
            ActivityKind::PassengerVehicle => self.passenger_vehicle,
            ActivityKind::Running => self.running,
            ActivityKind::Cycling => self.cycling,
            ActivityKind::Unknown => 0.0,
        }
    }

    /// Add distance for a kind. `Unknown` has no accumulator and is dropped.
    pub fn add(&mut self, kind: ActivityKind, km: f64) {
        match kind {
            ActivityKind::Walking => self.walking += km,
            ActivityKind::Bus => self.bus += km,
            ActivityKind::Train => self.train += km,
            ActivityKind::PassengerVehicle => self.passenger_vehicle += km,
            ActivityKind::Running => self.running += km,
            ActivityKind::Cycling => self.cycling += km,
            ActivityKind::Unknown => {}
        }
    }

    /// Iterate the tracked kinds in canonical column order
    pub fn iter(&self) -> impl Iterator<Item = (ActivityKind, f64)> + '_ {
        ActivityKind::TRACKED.iter().map(move |&kind| (kind, self.get(kind)))
    }

    pub fn is_all_zero(&self) -> bool {
        self.iter().all(|(_, km)| km == 0.0)
    }
}

/// One classified movement event for a single user.
///
/// Immutable once created; the owning user is implied by the stream the
/// segment came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySegment {
    /// Segment start, original UTC offset preserved
    pub start_time: DateTime<FixedOffset>,
    pub kind: ActivityKind,
    /// Distance covered in kilometers, never negative
    pub distance_km: f64,
}

/// Aggregation granularity for period keying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Weekly,
}

/// Identifier of one contiguous aggregation period.
///
/// Orders chronologically within a granularity; display forms are
/// `2025-04-07` for days and `2025-W15` for ISO weeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodKey {
    Day(NaiveDate),
    Week { iso_year: i32, iso_week: u32 },
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            PeriodKey::Week { iso_year, iso_week } => {
                write!(f, "{}-W{:02}", iso_year, iso_week)
            }
        }
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// In-progress accumulator of distances-by-kind for one (user, period).
///
/// Owned exclusively by the aggregator while folding; read-only once
/// aggregation for the period completes.
#[derive(Debug, Clone, PartialEq)]
pub struct MobilityBucket {
    pub user_id: String,
    pub period: PeriodKey,
    /// First day of the period
    pub period_start: NaiveDate,
    /// Inclusive last day of the period; present for week buckets only
    pub period_end: Option<NaiveDate>,
    pub distances: KindDistances,
}

/// Finalized per-(user, period) mobility metrics
#[derive(Debug, Clone, PartialEq)]
pub struct MobilityMetricRow {
    pub user_id: String,
    pub period: PeriodKey,
    pub period_start: NaiveDate,
    pub period_end: Option<NaiveDate>,
    pub distances: KindDistances,
    /// Sum over all six kinds, km, rounded to 3 decimals
    pub total_km: f64,
    /// Sum over the five kinds excluding passenger vehicle, km, 3 decimals
    pub sustainable_km: f64,
    /// `100 * sustainable_km / total_km`, 2 decimals; 0 when total is 0
    pub percent_sustainable: f64,
}

/// Identity and cohort metadata for one user.
///
/// Physical column layout of the users table is
/// `user_id, telegram_user_id, language, state, group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    /// External messaging identifier shown in place of the raw user id
    #[serde(rename = "telegram_user_id")]
    pub display_code: String,
    pub language: String,
    pub state: String,
    /// Primary cohort dimension for all aggregate comparisons
    pub group: String,
}

/// One raw survey batch row; answers are categorical or numeric free text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyResponse {
    pub user_id: String,
    pub response_date: NaiveDate,
    pub answers: Vec<String>,
}

/// One raw weekly feedback row; at least one answer is percentage-like
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackResponse {
    pub user_id: String,
    /// Week spelling as ingested, e.g. `2025-W15`
    pub week: String,
    pub answers: Vec<String>,
}

/// One (user, period) record after fusing mobility metrics with metadata
/// and the survey/feedback numeric projections
#[derive(Debug, Clone, PartialEq)]
pub struct FusedRow {
    pub metrics: MobilityMetricRow,
    pub group: String,
    pub language: String,
    pub state: String,
    /// Mean of the coercible survey answers for the period, when surveyed
    pub wellbeing: Option<f64>,
    /// Number of survey answers that coerced to a number
    pub habits_reported: Option<u32>,
    /// First coercible feedback answer for the period
    pub feedback_pct: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_raw_normalizes_case_and_underscores() {
        assert_eq!(ActivityKind::from_raw("IN_BUS"), ActivityKind::Bus);
        assert_eq!(
            ActivityKind::from_raw("IN_PASSENGER_VEHICLE"),
            ActivityKind::PassengerVehicle
        );
        assert_eq!(ActivityKind::from_raw("walking"), ActivityKind::Walking);
        assert_eq!(ActivityKind::from_raw("Cycling"), ActivityKind::Cycling);
    }

    #[test]
    fn test_kind_from_raw_unrecognized_is_unknown() {
        assert_eq!(ActivityKind::from_raw("FLYING"), ActivityKind::Unknown);
        assert_eq!(ActivityKind::from_raw(""), ActivityKind::Unknown);
    }

    #[test]
    fn test_kind_labels_match_export_columns() {
        let labels: Vec<&str> = ActivityKind::TRACKED.iter().map(|k| k.label()).collect();
        assert_eq!(
            labels,
            vec![
                "walking",
                "in bus",
                "in train",
                "in passenger vehicle",
                "running",
                "cycling"
            ]
        );
    }

    #[test]
    fn test_sustainable_excludes_passenger_vehicle_and_unknown() {
        assert!(ActivityKind::Walking.is_sustainable());
        assert!(ActivityKind::Bus.is_sustainable());
        assert!(!ActivityKind::PassengerVehicle.is_sustainable());
        assert!(!ActivityKind::Unknown.is_sustainable());
    }

    #[test]
    fn test_kind_distances_accumulate() {
        let mut distances = KindDistances::default();
        distances.add(ActivityKind::Walking, 2.0);
        distances.add(ActivityKind::Walking, 1.5);
        distances.add(ActivityKind::Unknown, 10.0);

        assert_eq!(distances.get(ActivityKind::Walking), 3.5);
        assert_eq!(distances.get(ActivityKind::Unknown), 0.0);
        assert!(!distances.is_all_zero());
        assert!(KindDistances::default().is_all_zero());
    }

    #[test]
    fn test_period_key_display() {
        let day = PeriodKey::Day(NaiveDate::from_ymd_opt(2025, 4, 7).unwrap());
        assert_eq!(day.to_string(), "2025-04-07");

        let week = PeriodKey::Week { iso_year: 2025, iso_week: 3 };
        assert_eq!(week.to_string(), "2025-W03");
    }

    #[test]
    fn test_period_key_orders_chronologically() {
        let w14 = PeriodKey::Week { iso_year: 2025, iso_week: 14 };
        let w15 = PeriodKey::Week { iso_year: 2025, iso_week: 15 };
        let w01_next = PeriodKey::Week { iso_year: 2026, iso_week: 1 };
        assert!(w14 < w15);
        assert!(w15 < w01_next);

        let d1 = PeriodKey::Day(NaiveDate::from_ymd_opt(2025, 4, 7).unwrap());
        let d2 = PeriodKey::Day(NaiveDate::from_ymd_opt(2025, 4, 8).unwrap());
        assert!(d1 < d2);
    }
}
