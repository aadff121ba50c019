//! Multi-source fusion
//!
//! Joins per-(user, period) mobility metric rows with the user table and
//! optional survey and feedback batches, producing the immutable fused
//! dataset every query runs against. All identifier and period spellings
//! are canonicalized before matching; the inputs are never mutated.

use std::collections::HashMap;

use tracing::debug;

use crate::coerce::{self, OrdinalScale};
use crate::period;
use crate::types::{
    FeedbackResponse, FusedRow, Granularity, MobilityMetricRow, PeriodKey, SurveyResponse,
    UserRecord,
};

/// Immutable, query-ready join of all sources.
///
/// Built once, then shared read-only; a refresh rebuilds the whole
/// dataset and swaps it, never mutates in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FusedDataset {
    rows: Vec<FusedRow>,
    periods: Vec<PeriodKey>,
}

impl FusedDataset {
    pub fn rows(&self) -> &[FusedRow] {
        &self.rows
    }

    /// Sorted distinct period domain of the fused rows
    pub fn periods(&self) -> &[PeriodKey] {
        &self.periods
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Joins mobility metric rows with the auxiliary per-user tables.
///
/// Mobility x metadata is always an inner join: rows whose user has no
/// metadata record are dropped. Survey and feedback project onto optional
/// numeric fields; rows missing them stay in the dataset and are excluded
/// pairwise from the aggregates that need them.
#[derive(Debug, Clone)]
pub struct MultiSourceJoiner {
    granularity: Granularity,
    scale: OrdinalScale,
    users: HashMap<String, UserRecord>,
    survey_values: HashMap<(String, PeriodKey), Vec<f64>>,
    feedback_values: HashMap<(String, PeriodKey), f64>,
}

impl MultiSourceJoiner {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            scale: OrdinalScale::default(),
            users: HashMap::new(),
            survey_values: HashMap::new(),
            feedback_values: HashMap::new(),
        }
    }

    /// Replace the ordinal scale used for answer coercion
    pub fn with_scale(mut self, scale: OrdinalScale) -> Self {
        self.scale = scale;
        self
    }

    /// Register the user metadata table
    pub fn users(mut self, records: &[UserRecord]) -> Self {
        for record in records {
            let key = coerce::canonical_user_id(&record.user_id);
            self.users.insert(key, record.clone());
        }
        self
    }

    /// Register a survey batch. Responses key by their response date's
    /// period; multiple responses in one period pool their answers.
    pub fn survey(mut self, responses: &[SurveyResponse]) -> Self {
        for response in responses {
            let user = coerce::canonical_user_id(&response.user_id);
            let key = match self.granularity {
                Granularity::Daily => period::day_key(response.response_date),
                Granularity::Weekly => period::week_key(response.response_date),
            };
            let values = response
                .answers
                .iter()
                .filter_map(|answer| coerce::coerce_numeric(answer, &self.scale));
            self.survey_values.entry((user, key)).or_default().extend(values);
        }
        self
    }

    /// Register a feedback batch. The projection takes the first answer
    /// that coerces to a number; rows with an unparsable week spelling or
    /// no coercible answer are dropped.
    pub fn feedback(mut self, responses: &[FeedbackResponse]) -> Self {
        for response in responses {
            let user = coerce::canonical_user_id(&response.user_id);
            let Some(key) = coerce::canonical_period(&response.week, self.granularity) else {
                continue;
            };
            let Some(value) = response
                .answers
                .iter()
                .find_map(|answer| coerce::coerce_numeric(answer, &self.scale))
            else {
                continue;
            };
            self.feedback_values.entry((user, key)).or_insert(value);
        }
        self
    }

    /// Produce the fused dataset.
    ///
    /// Rows whose six kind distances are all zero carry no movement and
    /// are dropped before joining.
    pub fn build(&self, rows: &[MobilityMetricRow]) -> FusedDataset {
        let mut fused = Vec::new();
        let mut dropped_no_user = 0usize;
        let mut dropped_all_zero = 0usize;

        for row in rows {
            if row.distances.is_all_zero() {
                dropped_all_zero += 1;
                continue;
            }
            let user_key = coerce::canonical_user_id(&row.user_id);
            let Some(user) = self.users.get(&user_key) else {
                dropped_no_user += 1;
                continue;
            };

            let join_key = (user_key, row.period);
            let survey = self.survey_values.get(&join_key);
            fused.push(FusedRow {
                metrics: row.clone(),
                group: user.group.clone(),
                language: user.language.clone(),
                state: user.state.clone(),
                wellbeing: survey.and_then(|values| mean(values)),
                habits_reported: survey.map(|values| values.len() as u32),
                feedback_pct: self.feedback_values.get(&join_key).copied(),
            });
        }

        let mut periods: Vec<PeriodKey> = fused.iter().map(|row| row.metrics.period).collect();
        periods.sort();
        periods.dedup();

        debug!(
            rows = fused.len(),
            dropped_no_user, dropped_all_zero, "fused dataset built"
        );

        FusedDataset { rows: fused, periods }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
