//! Aggregation Mapper
//!
//! Translates the canonical aggregation kind into the primitive each backend
//! can actually execute:
//!
//! ```text
//! requested | akumuli  | seriesly | victoriametrics
//! ----------+----------+----------+-----------------
//! none      | max-paa  | any      | min_over_time
//! avg       | paa      | avg      | avg_over_time
//! count     | max-paa  | count    | count_over_time
//! sum       | max-paa  | sum      | sum_over_time
//! ```
//!
//! Akumuli has no count or sum sampler, so both degrade to the same
//! max-approximation used for the default. That substitution mirrors a real
//! capability gap and must not be "fixed" here.

use crate::model::{AggregationKind, Backend};
use crate::time::TimeUnit;

/// Name of the backend primitive for `kind`
pub fn primitive(backend: Backend, kind: AggregationKind) -> &'static str {
    match backend {
        Backend::Akumuli => match kind {
            AggregationKind::Avg => "paa",
            AggregationKind::None | AggregationKind::Count | AggregationKind::Sum => "max-paa",
        },
        Backend::Seriesly => match kind {
            AggregationKind::None => "any",
            AggregationKind::Avg => "avg",
            AggregationKind::Count => "count",
            AggregationKind::Sum => "sum",
        },
        Backend::VictoriaMetrics => match kind {
            AggregationKind::None => "min_over_time",
            AggregationKind::Avg => "avg_over_time",
            AggregationKind::Count => "count_over_time",
            AggregationKind::Sum => "sum_over_time",
        },
    }
}

/// Whether `kind` runs natively or is substituted on `backend`
pub fn is_substituted(backend: Backend, kind: AggregationKind) -> bool {
    matches!(
        (backend, kind),
        (Backend::Akumuli, AggregationKind::Count | AggregationKind::Sum)
    )
}

/// Bucket units each backend accepts in its grouping parameter
pub fn bucket_units(backend: Backend) -> &'static [TimeUnit] {
    match backend {
        Backend::Akumuli => &TimeUnit::ALL,
        Backend::Seriesly => &[
            TimeUnit::Milliseconds,
            TimeUnit::Seconds,
            TimeUnit::Minutes,
            TimeUnit::Hours,
            TimeUnit::Days,
        ],
        // Range functions span the whole window, granularity is not used
        Backend::VictoriaMetrics => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [AggregationKind; 4] = [
        AggregationKind::None,
        AggregationKind::Avg,
        AggregationKind::Count,
        AggregationKind::Sum,
    ];

    #[test]
    fn test_akumuli_table() {
        let names: Vec<&str> = KINDS.iter().map(|k| primitive(Backend::Akumuli, *k)).collect();
        assert_eq!(names, vec!["max-paa", "paa", "max-paa", "max-paa"]);
    }

    #[test]
    fn test_seriesly_table() {
        let names: Vec<&str> = KINDS.iter().map(|k| primitive(Backend::Seriesly, *k)).collect();
        assert_eq!(names, vec!["any", "avg", "count", "sum"]);
    }

    #[test]
    fn test_victoria_table() {
        let names: Vec<&str> = KINDS
            .iter()
            .map(|k| primitive(Backend::VictoriaMetrics, *k))
            .collect();
        assert_eq!(
            names,
            vec!["min_over_time", "avg_over_time", "count_over_time", "sum_over_time"]
        );
    }

    #[test]
    fn test_substitution_only_on_akumuli() {
        assert!(is_substituted(Backend::Akumuli, AggregationKind::Count));
        assert!(is_substituted(Backend::Akumuli, AggregationKind::Sum));
        assert!(!is_substituted(Backend::Akumuli, AggregationKind::Avg));
        for kind in KINDS {
            assert!(!is_substituted(Backend::Seriesly, kind));
            assert!(!is_substituted(Backend::VictoriaMetrics, kind));
        }
    }
}
