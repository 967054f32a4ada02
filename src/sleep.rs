//! Sleep stage reduction
//!
//! Turns the night's raw interval records into a chronological timeline and
//! per-stage totals. Provider order is not trusted.

use crate::gateway::{GatewayResult, ProviderResponse, SleepRecord};
use crate::types::{MetricKind, SleepAggregate, SleepInterval, SleepState};
use tracing::warn;

/// Reducer for sleep-analysis records
pub struct SleepReducer;

impl SleepReducer {
    /// Reduce a provider outcome, containing any failure
    pub fn normalize(result: GatewayResult) -> SleepAggregate {
        match result {
            Ok(ProviderResponse::Sleep(records)) => Self::reduce(&records),
            Ok(other) => {
                warn!(kind = %MetricKind::Sleep, got = other.shape(), "unexpected provider payload");
                SleepAggregate::error()
            }
            Err(err) => {
                warn!(kind = %MetricKind::Sleep, error = %err, "provider query failed");
                SleepAggregate::error()
            }
        }
    }

    /// Reduce raw records into totals and a sorted timeline
    pub fn reduce(records: &[SleepRecord]) -> SleepAggregate {
        if records.is_empty() {
            return SleepAggregate::no_data();
        }

        let mut timeline: Vec<SleepInterval> = records.iter().map(to_interval).collect();
        timeline.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then(a.end_time.cmp(&b.end_time))
                .then(a.state.cmp(&b.state))
        });

        let mut aggregate = SleepAggregate::default();
        for interval in &timeline {
            match interval.state {
                SleepState::InBed => aggregate.total_time_in_bed += interval.duration,
                state => {
                    aggregate.total_time_asleep += interval.duration;
                    match state {
                        SleepState::Core => aggregate.stages.core += interval.duration,
                        SleepState::Deep => aggregate.stages.deep += interval.duration,
                        SleepState::Rem => aggregate.stages.rem += interval.duration,
                        SleepState::Light => aggregate.stages.light += interval.duration,
                        SleepState::Asleep | SleepState::InBed => {}
                    }
                }
            }
        }
        aggregate.timeline = timeline;
        aggregate
    }
}

fn to_interval(record: &SleepRecord) -> SleepInterval {
    let minutes = (record.end_date - record.start_date).num_milliseconds() as f64 / 60_000.0;
    SleepInterval {
        state: SleepState::classify(&record.value),
        start_time: record.start_date,
        end_time: record.end_date,
        // Inverted intervals count for nothing
        duration: minutes.max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;

    fn record(value: &str, start: &str, end: &str) -> SleepRecord {
        let parse = |raw: &str| {
            DateTime::parse_from_rfc3339(&format!("2024-01-15T{raw}:00Z"))
                .unwrap()
                .with_timezone(&Utc)
        };
        SleepRecord {
            start_date: parse(start),
            end_date: parse(end),
            value: value.to_string(),
        }
    }

    fn night() -> Vec<SleepRecord> {
        vec![
            record("INBED", "00:00", "01:00"),
            record("CORE", "01:00", "03:00"),
            record("DEEP", "03:00", "04:00"),
        ]
    }

    #[test]
    fn test_reduce_stage_totals() {
        let sleep = SleepReducer::reduce(&night());

        assert_eq!(sleep.total_time_in_bed, 60.0);
        assert_eq!(sleep.stages.core, 120.0);
        assert_eq!(sleep.stages.deep, 60.0);
        assert_eq!(sleep.stages.rem, 0.0);
        assert_eq!(sleep.total_time_asleep, 180.0);
        assert_eq!(sleep.timeline.len(), 3);
        assert!(sleep
            .timeline
            .windows(2)
            .all(|w| w[0].start_time <= w[1].start_time));
        assert_eq!(sleep.message, "");
    }

    #[test]
    fn test_reduce_is_order_insensitive() {
        let expected = SleepReducer::reduce(&night());

        let mut records = night();
        records.reverse();
        assert_eq!(SleepReducer::reduce(&records), expected);

        records.swap(0, 1);
        assert_eq!(SleepReducer::reduce(&records), expected);
    }

    #[test]
    fn test_generic_asleep_counts_without_stage() {
        let sleep = SleepReducer::reduce(&[
            record("ASLEEP", "01:00", "02:30"),
            record("REM", "02:30", "03:00"),
            record("LIGHT", "03:00", "03:15"),
        ]);
        assert_eq!(sleep.total_time_asleep, 135.0);
        assert_eq!(sleep.stages.rem, 30.0);
        assert_eq!(sleep.stages.light, 15.0);
        assert_eq!(sleep.stages.core + sleep.stages.deep, 0.0);
    }

    #[test]
    fn test_inverted_interval_clamped() {
        let sleep = SleepReducer::reduce(&[record("CORE", "03:00", "01:00")]);
        assert_eq!(sleep.timeline[0].duration, 0.0);
        assert_eq!(sleep.total_time_asleep, 0.0);
        assert_eq!(sleep.message, "");
    }

    #[test]
    fn test_all_in_bed_night_has_no_message() {
        let sleep = SleepReducer::reduce(&[record("INBED", "00:00", "08:00")]);
        assert_eq!(sleep.total_time_in_bed, 480.0);
        assert_eq!(sleep.total_time_asleep, 0.0);
        assert!(sleep.message.is_empty());
    }

    #[test]
    fn test_empty_and_failed() {
        let empty = SleepReducer::normalize(Ok(ProviderResponse::Sleep(vec![])));
        assert_eq!(empty, SleepAggregate::no_data());
        assert_eq!(empty.message, "No sleep data available");

        let failed = SleepReducer::normalize(Err(GatewayError::Transport("x".into())));
        assert_eq!(failed.message, "Error fetching sleep data");
        assert!(failed.timeline.is_empty());
    }
}
