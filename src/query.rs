//! Range-filtered aggregate queries
//!
//! Every query is a pure function of (dataset, window, selection) and
//! produces a fresh result. Empty windows degrade to zeros or explicit
//! missing values; nothing here divides by zero or panics on no data.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::fuse::FusedDataset;
use crate::types::{ActivityKind, FusedRow, KindDistances, PeriodKey};

/// Metric selectable for the time-series query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    PercentSustainable,
    TotalKm,
    SustainableKm,
    Kind(ActivityKind),
}

impl Metric {
    fn value(&self, row: &FusedRow) -> f64 {
        match self {
            Metric::PercentSustainable => row.metrics.percent_sustainable,
            Metric::TotalKm => row.metrics.total_km,
            Metric::SustainableKm => row.metrics.sustainable_km,
            Metric::Kind(kind) => row.metrics.distances.get(*kind),
        }
    }
}

/// Resolved closed window over the period domain
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodWindow {
    pub start: PeriodKey,
    pub end: PeriodKey,
}

/// Headline aggregates over the filtered window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    /// Fused rows inside the window
    pub rows: usize,
    /// Mean sustainability percentage; 0 when the window is empty
    pub mean_percent_sustainable: f64,
    pub total_km: f64,
    pub sustainable_km: f64,
    pub non_sustainable_km: f64,
    /// Best-performing group by mean percentage; `None` when no data
    pub best_group: Option<GroupScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupScore {
    pub group: String,
    pub mean_percent_sustainable: f64,
}

/// One (period, group) mean of the selected metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub period: PeriodKey,
    pub group: String,
    pub mean: f64,
}

/// Per-group mean distance for one movement kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionRow {
    pub group: String,
    pub kind: ActivityKind,
    pub mean_km: f64,
}

/// Numeric columns included in the correlation matrix, in order
pub const CORRELATION_COLUMNS: [&str; 6] = [
    "percent_sustainable",
    "total_km",
    "sustainable_km",
    "wellbeing",
    "habits_reported",
    "feedback_pct",
];

/// Pairwise-complete Pearson matrix; `None` marks insufficient data
/// (fewer than two complete pairs, or a constant operand)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<&'static str>,
    /// Row-major coefficients, `values[i][j]` for `columns[i]` vs `columns[j]`
    pub values: Vec<Vec<Option<f64>>>,
}

/// Query engine over one immutable fused dataset
pub struct RangeQueryEngine<'a> {
    dataset: &'a FusedDataset,
}

impl<'a> RangeQueryEngine<'a> {
    pub fn new(dataset: &'a FusedDataset) -> Self {
        Self { dataset }
    }

    /// Resolve two indices into the sorted period domain to a closed
    /// window. Indices are clamped to the domain and order-normalized;
    /// `None` only when the dataset has no periods at all.
    pub fn resolve_window(&self, from: usize, to: usize) -> Option<PeriodWindow> {
        let periods = self.dataset.periods();
        if periods.is_empty() {
            return None;
        }
        let last = periods.len() - 1;
        let (mut lo, mut hi) = (from.min(last), to.min(last));
        if lo > hi {
            std::mem::swap(&mut lo, &mut hi);
        }
        Some(PeriodWindow {
            start: periods[lo],
            end: periods[hi],
        })
    }

    /// Window covering the whole period domain
    pub fn full_window(&self) -> Option<PeriodWindow> {
        self.resolve_window(0, usize::MAX)
    }

    fn filtered(&self, window: &PeriodWindow) -> impl Iterator<Item = &'a FusedRow> + '_ {
        let (start, end) = (window.start, window.end);
        self.dataset
            .rows()
            .iter()
            .filter(move |row| start <= row.metrics.period && row.metrics.period <= end)
    }

    pub fn kpis(&self, window: &PeriodWindow) -> Kpis {
        let mut count = 0usize;
        let mut percent_sum = 0.0;
        let mut total_km = 0.0;
        let mut sustainable_km = 0.0;
        let mut groups: BTreeMap<String, (f64, usize)> = BTreeMap::new();

        for row in self.filtered(window) {
            count += 1;
            percent_sum += row.metrics.percent_sustainable;
            total_km += row.metrics.total_km;
            sustainable_km += row.metrics.sustainable_km;
            let entry = groups.entry(row.group.clone()).or_insert((0.0, 0));
            entry.0 += row.metrics.percent_sustainable;
            entry.1 += 1;
        }

        // Stable sort order of the BTreeMap breaks ties: the first group
        // reaching the maximum mean wins.
        let mut best_group: Option<GroupScore> = None;
        for (group, (sum, n)) in &groups {
            let group_mean = sum / *n as f64;
            let better = match &best_group {
                Some(best) => group_mean > best.mean_percent_sustainable,
                None => true,
            };
            if better {
                best_group = Some(GroupScore {
                    group: group.clone(),
                    mean_percent_sustainable: group_mean,
                });
            }
        }

        Kpis {
            rows: count,
            mean_percent_sustainable: if count == 0 {
                0.0
            } else {
                percent_sum / count as f64
            },
            total_km,
            sustainable_km,
            non_sustainable_km: total_km - sustainable_km,
            best_group,
        }
    }

    /// Per-(period, group) mean of the selected metric, ordered by period
    /// ascending then group label
    pub fn time_series(&self, window: &PeriodWindow, metric: Metric) -> Vec<SeriesPoint> {
        let mut acc: BTreeMap<(PeriodKey, String), (f64, usize)> = BTreeMap::new();
        for row in self.filtered(window) {
            let entry = acc
                .entry((row.metrics.period, row.group.clone()))
                .or_insert((0.0, 0));
            entry.0 += metric.value(row);
            entry.1 += 1;
        }
        acc.into_iter()
            .map(|((period, group), (sum, n))| SeriesPoint {
                period,
                group,
                mean: sum / n as f64,
            })
            .collect()
    }

    /// Per-group mean distance across all movement kinds
    pub fn composition(&self, window: &PeriodWindow) -> Vec<CompositionRow> {
        let mut acc: BTreeMap<String, (KindDistances, usize)> = BTreeMap::new();
        for row in self.filtered(window) {
            let entry = acc
                .entry(row.group.clone())
                .or_insert((KindDistances::default(), 0));
            for (kind, km) in row.metrics.distances.iter() {
                entry.0.add(kind, km);
            }
            entry.1 += 1;
        }

        let mut composition = Vec::new();
        for (group, (sums, n)) in &acc {
            for (kind, sum) in sums.iter() {
                composition.push(CompositionRow {
                    group: group.clone(),
                    kind,
                    mean_km: sum / *n as f64,
                });
            }
        }
        composition
    }

    /// Pearson matrix over [`CORRELATION_COLUMNS`], restricted to rows
    /// inside the window. Each cell uses the rows where both operands are
    /// present.
    pub fn correlation(&self, window: &PeriodWindow) -> CorrelationMatrix {
        let rows: Vec<&FusedRow> = self.filtered(window).collect();
        let width = CORRELATION_COLUMNS.len();

        let mut values = vec![vec![None; width]; width];
        for i in 0..width {
            for j in 0..width {
                let pairs: Vec<(f64, f64)> = rows
                    .iter()
                    .filter_map(|row| Some((column_value(row, i)?, column_value(row, j)?)))
                    .collect();
                values[i][j] = pearson(&pairs);
            }
        }

        CorrelationMatrix {
            columns: CORRELATION_COLUMNS.to_vec(),
            values,
        }
    }
}

fn column_value(row: &FusedRow, index: usize) -> Option<f64> {
    match index {
        0 => Some(row.metrics.percent_sustainable),
        1 => Some(row.metrics.total_km),
        2 => Some(row.metrics.sustainable_km),
        3 => row.wellbeing,
        4 => row.habits_reported.map(f64::from),
        5 => row.feedback_pct,
        _ => None,
    }
}

/// Pearson coefficient over complete pairs; `None` below two pairs or
/// when either operand has zero variance
fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    let n = pairs.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / nf;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}
