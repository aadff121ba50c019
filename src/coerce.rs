//! Cross-source canonicalization and numeric coercion
//!
//! Identifiers, period keys and free-text answers arrive in different
//! primitive shapes per source. Each gets one declared normalization
//! function here, applied before any key comparison or aggregate, so
//! joins are equality-based rather than accidental.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::period;
use crate::types::{Granularity, PeriodKey};

/// Canonical form of a user identifier.
///
/// Integral numerics normalize to their plain decimal spelling: `42`,
/// `"42"` and `"42.0"` all map to `"42"`. Everything else passes through
/// trimmed.
pub fn canonical_user_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<f64>() {
        if n.fract() == 0.0 && n.abs() < 1e15 {
            return format!("{}", n as i64);
        }
    }
    trimmed.to_string()
}

/// Parse a period key from any cross-source spelling: an explicit week
/// string (`2025-W15`) or an ISO date, mapped to its day or containing
/// ISO week per `granularity`. Unparsable spellings are a miss, not an
/// error.
pub fn canonical_period(raw: &str, granularity: Granularity) -> Option<PeriodKey> {
    let trimmed = raw.trim();
    if let Some((iso_year, iso_week)) = parse_week_string(trimmed) {
        return match granularity {
            Granularity::Weekly => Some(PeriodKey::Week { iso_year, iso_week }),
            // A bare week cannot name a single day
            Granularity::Daily => None,
        };
    }
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()?;
    Some(match granularity {
        Granularity::Daily => period::day_key(date),
        Granularity::Weekly => period::week_key(date),
    })
}

fn parse_week_string(raw: &str) -> Option<(i32, u32)> {
    let (year, week) = raw.split_once("-W")?;
    let year = year.parse().ok()?;
    let week: u32 = week.parse().ok()?;
    (1..=53).contains(&week).then_some((year, week))
}

/// Categorical label to ordinal value lookup, consulted before numeric
/// cleanup when coercing free-text answers
#[derive(Debug, Clone)]
pub struct OrdinalScale {
    levels: HashMap<String, f64>,
}

impl OrdinalScale {
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self {
            levels: pairs
                .iter()
                .map(|(label, value)| (label.to_lowercase(), *value))
                .collect(),
        }
    }

    /// Five-point frequency scale used by the survey instrument
    pub fn frequency() -> Self {
        Self::from_pairs(&[
            ("never", 1.0),
            ("rarely", 2.0),
            ("sometimes", 3.0),
            ("often", 4.0),
            ("always", 5.0),
        ])
    }

    pub fn lookup(&self, label: &str) -> Option<f64> {
        self.levels.get(&label.trim().to_lowercase()).copied()
    }
}

impl Default for OrdinalScale {
    fn default() -> Self {
        Self::frequency()
    }
}

/// Coerce a free-text answer to a number.
///
/// The ordinal scale is tried first (case-insensitive), then numeric
/// cleanup: trim, strip a trailing percent sign, normalize a comma
/// decimal separator. Values surviving neither are missing, never zero.
pub fn coerce_numeric(raw: &str, scale: &OrdinalScale) -> Option<f64> {
    if let Some(value) = scale.lookup(raw) {
        return Some(value);
    }
    let cleaned = raw.trim().trim_end_matches('%').trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_user_id_numeric_spellings_collapse() {
        assert_eq!(canonical_user_id("42"), "42");
        assert_eq!(canonical_user_id("42.0"), "42");
        assert_eq!(canonical_user_id(" 42 "), "42");
        assert_eq!(canonical_user_id("007"), "7");
    }

    #[test]
    fn test_user_id_text_passes_through_trimmed() {
        assert_eq!(canonical_user_id(" alice "), "alice");
        assert_eq!(canonical_user_id("42.5x"), "42.5x");
        // A fractional numeric id is not integral, keep the spelling
        assert_eq!(canonical_user_id("42.5"), "42.5");
    }

    #[test]
    fn test_canonical_period_week_string() {
        let key = canonical_period("2025-W15", Granularity::Weekly).unwrap();
        assert_eq!(key.to_string(), "2025-W15");
        assert_eq!(canonical_period("2025-W15", Granularity::Daily), None);
        assert_eq!(canonical_period("2025-W99", Granularity::Weekly), None);
    }

    #[test]
    fn test_canonical_period_date_spellings() {
        let day = canonical_period("2025-04-09", Granularity::Daily).unwrap();
        assert_eq!(day.to_string(), "2025-04-09");

        // A date names its containing ISO week at weekly granularity
        let week = canonical_period("2025-04-09", Granularity::Weekly).unwrap();
        assert_eq!(week.to_string(), "2025-W15");
    }

    #[test]
    fn test_canonical_period_miss() {
        assert_eq!(canonical_period("week fifteen", Granularity::Weekly), None);
        assert_eq!(canonical_period("", Granularity::Daily), None);
    }

    #[test]
    fn test_coerce_percentage_string() {
        let scale = OrdinalScale::frequency();
        assert_eq!(coerce_numeric("45%", &scale), Some(45.0));
        assert_eq!(coerce_numeric(" 45 % ", &scale), Some(45.0));
    }

    #[test]
    fn test_coerce_comma_decimal_separator() {
        let scale = OrdinalScale::frequency();
        assert_eq!(coerce_numeric("3,5", &scale), Some(3.5));
    }

    #[test]
    fn test_coerce_ordinal_labels() {
        let scale = OrdinalScale::frequency();
        assert_eq!(coerce_numeric("often", &scale), Some(4.0));
        assert_eq!(coerce_numeric("  NEVER ", &scale), Some(1.0));
    }

    #[test]
    fn test_coerce_failure_is_missing() {
        let scale = OrdinalScale::frequency();
        assert_eq!(coerce_numeric("N/A", &scale), None);
        assert_eq!(coerce_numeric("", &scale), None);
        assert_eq!(coerce_numeric("  ", &scale), None);
    }

    #[test]
    fn test_custom_scale() {
        let scale = OrdinalScale::from_pairs(&[("low", 0.0), ("high", 1.0)]);
        assert_eq!(coerce_numeric("High", &scale), Some(1.0));
        assert_eq!(coerce_numeric("often", &scale), None);
    }
}
