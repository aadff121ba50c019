//! Mobilita - Batch compute engine for sustainable-mobility analytics
//!
//! Mobilita turns raw per-user location timelines into normalized daily and
//! weekly mobility metrics through a deterministic pipeline: segment parsing
//! → period keying → temporal aggregation → sustainability scoring. The
//! resulting rows are fused with user metadata and optional survey/feedback
//! streams into a single immutable dataset that answers range-filtered
//! aggregate queries (KPIs, time series, kind composition, correlation).
//!
//! ## Modules
//!
//! - **segments**: tolerant parsing of one user's raw timeline
//! - **period / aggregate / score**: per-period bucketing and scoring
//! - **fuse / coerce**: multi-source join with canonicalized keys
//! - **query**: range-bounded aggregates over the fused dataset
//! - **export / pipeline**: tabular export and batch orchestration

pub mod aggregate;
pub mod coerce;
pub mod error;
pub mod export;
pub mod fuse;
pub mod period;
pub mod pipeline;
pub mod query;
pub mod score;
pub mod segments;
pub mod types;

pub use error::AnalysisError;
pub use fuse::{FusedDataset, MultiSourceJoiner};
pub use pipeline::{user_metric_rows, BatchProcessor};
pub use query::{Metric, RangeQueryEngine};
pub use segments::{TimeWindow, TimelineDocument};
pub use types::{ActivityKind, Granularity, MobilityMetricRow, PeriodKey};

/// Engine version embedded in reports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
