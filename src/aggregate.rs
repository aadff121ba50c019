//! Temporal aggregation
//!
//! Folds one user's ordered activity segments into per-period mobility
//! buckets. The fold is a strict left-fold: accumulated sums are
//! order-independent, but the bucket for a period is created from the
//! first segment seen for that key, which fixes the week bounds once.

use std::collections::BTreeMap;

use crate::period;
use crate::types::{ActivitySegment, Granularity, KindDistances, MobilityBucket, PeriodKey};

/// Fold segments into per-period buckets for one user.
///
/// Every in-window record creates its period bucket, including segments of
/// unrecognized kind, so a period with only unknown movement still yields
/// an all-zero bucket. Distance accumulates only for the six tracked
/// kinds. All segments mapping to one key share identical bounds by
/// construction, so bounds are derived once and never recomputed.
pub fn aggregate<I>(
    user_id: &str,
    segments: I,
    granularity: Granularity,
) -> BTreeMap<PeriodKey, MobilityBucket>
where
    I: IntoIterator<Item = ActivitySegment>,
{
    let mut buckets = BTreeMap::new();

    for segment in segments {
        let local_date = segment.start_time.date_naive();
        let key = match granularity {
            Granularity::Daily => period::day_key(local_date),
            Granularity::Weekly => period::week_key(local_date),
        };

        let bucket = buckets.entry(key).or_insert_with(|| {
            let (period_start, period_end) = match granularity {
                Granularity::Daily => (local_date, None),
                Granularity::Weekly => {
                    let (start, end) = period::week_bounds(local_date);
                    (start, Some(end))
                }
            };
            MobilityBucket {
                user_id: user_id.to_string(),
                period: key,
                period_start,
                period_end,
                distances: KindDistances::default(),
            }
        });

        bucket.distances.add(segment.kind, segment.distance_km);
    }

    buckets
}
