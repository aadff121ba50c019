//! Raw timeline parsing
//!
//! This module normalizes one user's decoded timeline into typed activity
//! segments. Individual malformed records are skipped and counted, never
//! fatal; the only hard failure is an unrecognized top-level container
//! shape, which aborts parsing for that user's timeline.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::AnalysisError;
use crate::types::{ActivityKind, ActivitySegment};

/// Field under which wrapped timeline exports carry their records
const WRAPPER_FIELD: &str = "semanticSegments";

/// Closed time interval filter applied to segment start instants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether the instant falls inside the closed `[start, end]` interval
    pub fn contains(&self, time: &DateTime<FixedOffset>) -> bool {
        let instant = time.with_timezone(&Utc);
        self.start <= instant && instant <= self.end
    }
}

/// Counters for records dropped while parsing one timeline.
///
/// Skips are expected and never surface as failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Records seen in the container
    pub records: usize,
    /// Records without a parsable start timestamp
    pub missing_timestamp: usize,
    /// Records whose start instant falls outside the window
    pub out_of_window: usize,
    /// Records without an activity classification
    pub unclassified: usize,
    /// Segments produced
    pub segments: usize,
}

/// One user's decoded timeline, validated to a recognized container shape
#[derive(Debug, Clone)]
pub struct TimelineDocument {
    entries: Vec<Value>,
}

impl TimelineDocument {
    /// Accept either a bare array of records or an object wrapping the
    /// records under `semanticSegments`. Any other shape is a format error.
    pub fn from_value(data: &Value) -> Result<Self, AnalysisError> {
        let entries = match data {
            Value::Array(items) => items.clone(),
            Value::Object(map) => match map.get(WRAPPER_FIELD) {
                Some(Value::Array(items)) => items.clone(),
                _ => {
                    return Err(AnalysisError::UnrecognizedFormat(format!(
                        "expected an array or an object with a {} array",
                        WRAPPER_FIELD
                    )))
                }
            },
            _ => {
                return Err(AnalysisError::UnrecognizedFormat(
                    "top-level value is neither array nor object".to_string(),
                ))
            }
        };
        Ok(Self { entries })
    }

    pub fn from_json(raw: &str) -> Result<Self, AnalysisError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value)
    }

    /// Restartable pass over the records inside `window`.
    ///
    /// Re-invocation yields the same segments; the document is never
    /// mutated.
    pub fn segments<'a>(
        &'a self,
        window: &'a TimeWindow,
    ) -> impl Iterator<Item = ActivitySegment> + 'a {
        self.entries.iter().filter_map(move |entry| {
            match classify_record(entry, window) {
                Classified::Segment(segment) => Some(segment),
                _ => None,
            }
        })
    }

    /// Like [`TimelineDocument::segments`], additionally tallying skipped
    /// records per reason.
    pub fn segments_counted(&self, window: &TimeWindow) -> (Vec<ActivitySegment>, ParseStats) {
        let mut stats = ParseStats::default();
        let mut segments = Vec::new();
        for entry in &self.entries {
            stats.records += 1;
            match classify_record(entry, window) {
                Classified::Segment(segment) => {
                    stats.segments += 1;
                    segments.push(segment);
                }
                Classified::MissingTimestamp => stats.missing_timestamp += 1,
                Classified::OutOfWindow => stats.out_of_window += 1,
                Classified::Unclassified => stats.unclassified += 1,
            }
        }
        (segments, stats)
    }
}

enum Classified {
    Segment(ActivitySegment),
    MissingTimestamp,
    OutOfWindow,
    Unclassified,
}

// Tolerant record shapes; unknown or extra fields are ignored, not propagated.

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "startTime")]
    start_time: Option<String>,
    activity: Option<RawActivity>,
}

#[derive(Debug, Deserialize)]
struct RawActivity {
    #[serde(rename = "topCandidate")]
    top_candidate: Option<RawCandidate>,
    #[serde(rename = "distanceMeters")]
    distance_meters: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawCandidate {
    #[serde(rename = "type")]
    kind: Option<String>,
}

fn classify_record(entry: &Value, window: &TimeWindow) -> Classified {
    let record: RawRecord = match serde_json::from_value(entry.clone()) {
        Ok(record) => record,
        Err(_) => return Classified::Unclassified,
    };

    let start_time = match record
        .start_time
        .as_deref()
        .map(DateTime::parse_from_rfc3339)
    {
        Some(Ok(time)) => time,
        _ => return Classified::MissingTimestamp,
    };

    if !window.contains(&start_time) {
        return Classified::OutOfWindow;
    }

    let activity = match record.activity {
        Some(activity) => activity,
        None => return Classified::Unclassified,
    };
    let raw_kind = match activity
        .top_candidate
        .as_ref()
        .and_then(|candidate| candidate.kind.as_deref())
    {
        Some(kind) => kind,
        None => return Classified::Unclassified,
    };

    let meters = activity
        .distance_meters
        .as_ref()
        .and_then(numeric_value)
        .unwrap_or(0.0);

    Classified::Segment(ActivitySegment {
        start_time,
        kind: ActivityKind::from_raw(raw_kind),
        distance_km: (meters / 1000.0).max(0.0),
    })
}

/// Distance fields arrive as JSON numbers or numeric strings
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
