//! Pipeline orchestration
//!
//! Public entry points tying the parser, aggregator and scorer together,
//! plus a batch processor that runs many users while isolating per-user
//! failures: one structurally invalid timeline never aborts the batch.

use tracing::{debug, warn};

use crate::aggregate;
use crate::error::AnalysisError;
use crate::score;
use crate::segments::{TimeWindow, TimelineDocument};
use crate::types::{Granularity, MobilityMetricRow};

/// Run parse -> aggregate -> score for one user's raw timeline JSON.
///
/// Returns one metric row per period inside the window, periods
/// ascending. An empty timeline yields zero rows, not an error.
pub fn user_metric_rows(
    user_id: &str,
    raw_json: &str,
    window: &TimeWindow,
    granularity: Granularity,
) -> Result<Vec<MobilityMetricRow>, AnalysisError> {
    let document = TimelineDocument::from_json(raw_json)?;
    let (segments, stats) = document.segments_counted(window);
    let buckets = aggregate::aggregate(user_id, segments, granularity);
    let rows: Vec<MobilityMetricRow> = buckets.values().map(score::score).collect();

    debug!(
        user_id,
        records = stats.records,
        segments = stats.segments,
        periods = rows.len(),
        "user timeline processed"
    );
    Ok(rows)
}

/// Batch accumulator over many users' timelines.
///
/// Rows come out in user ingestion order with periods ascending within
/// each user, which is the export layout contract.
#[derive(Debug)]
pub struct BatchProcessor {
    window: TimeWindow,
    granularity: Granularity,
    rows: Vec<MobilityMetricRow>,
    processed_users: usize,
    failed_users: usize,
}

impl BatchProcessor {
    pub fn new(window: TimeWindow, granularity: Granularity) -> Self {
        Self {
            window,
            granularity,
            rows: Vec::new(),
            processed_users: 0,
            failed_users: 0,
        }
    }

    /// Process one user's timeline, returning whether it was accepted.
    ///
    /// A format or JSON failure is logged and counted against that user
    /// only; the batch continues.
    pub fn ingest_user(&mut self, user_id: &str, raw_json: &str) -> bool {
        match user_metric_rows(user_id, raw_json, &self.window, self.granularity) {
            Ok(rows) => {
                self.processed_users += 1;
                self.rows.extend(rows);
                true
            }
            Err(error) => {
                self.failed_users += 1;
                warn!(user_id, %error, "skipping user timeline");
                false
            }
        }
    }

    pub fn processed_users(&self) -> usize {
        self.processed_users
    }

    pub fn failed_users(&self) -> usize {
        self.failed_users
    }

    /// Consume the processor and return the accumulated rows
    pub fn finish(self) -> Vec<MobilityMetricRow> {
        self.rows
    }
}
