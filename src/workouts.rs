//! Workout aggregation
//!
//! Enriches each workout session with heart-rate statistics from a nested
//! query scoped to the session's own window. The per-session lookups run
//! concurrently and are joined; a session whose lookup fails or comes back
//! empty is kept with zeroed statistics.

use crate::calendar::ClockFormatter;
use crate::gateway::{
    GatewayResult, HealthGateway, HealthUnit, ProviderResponse, QuantitySample, QueryWindow,
    WorkoutRecord,
};
use crate::types::{HeartRateStats, MetricKind, Workout};
use futures_util::future::join_all;
use tracing::{debug, warn};

/// Aggregator for workout sessions
#[derive(Debug, Clone)]
pub struct WorkoutAggregator {
    clock: ClockFormatter,
    include_manually_added: bool,
}

impl WorkoutAggregator {
    pub fn new(clock: ClockFormatter, include_manually_added: bool) -> Self {
        Self {
            clock,
            include_manually_added,
        }
    }

    /// Resolve the session listing and enrich every session.
    ///
    /// A failed listing yields an empty list.
    pub async fn normalize<G>(&self, gateway: &G, result: GatewayResult) -> Vec<Workout>
    where
        G: HealthGateway + ?Sized,
    {
        match result {
            Ok(ProviderResponse::Workouts(sessions)) => self.aggregate(gateway, sessions).await,
            Ok(other) => {
                warn!(kind = %MetricKind::Workouts, got = other.shape(), "unexpected provider payload");
                Vec::new()
            }
            Err(err) => {
                warn!(kind = %MetricKind::Workouts, error = %err, "provider query failed");
                Vec::new()
            }
        }
    }

    /// Enrich sessions, preserving their order
    pub async fn aggregate<G>(&self, gateway: &G, sessions: Vec<WorkoutRecord>) -> Vec<Workout>
    where
        G: HealthGateway + ?Sized,
    {
        let lookups = sessions
            .iter()
            .map(|session| self.session_heart_rate(gateway, session));
        let stats = join_all(lookups).await;

        sessions
            .into_iter()
            .zip(stats)
            .map(|(session, heart_rate)| self.to_workout(session, heart_rate))
            .collect()
    }

    async fn session_heart_rate<G>(&self, gateway: &G, session: &WorkoutRecord) -> HeartRateStats
    where
        G: HealthGateway + ?Sized,
    {
        // Raw instants for the query; formatted strings are only for output
        let window = QueryWindow::between(
            session.start_date,
            session.end_date,
            self.include_manually_added,
        )
        .with_unit(HealthUnit::Bpm);

        match gateway.query(MetricKind::HeartRate, &window).await {
            Ok(ProviderResponse::Samples(samples)) => heart_rate_stats(&samples),
            Ok(other) => {
                warn!(kind = %MetricKind::HeartRate, got = other.shape(), "unexpected provider payload");
                HeartRateStats::default()
            }
            Err(err) => {
                debug!(
                    activity = %session.activity_name,
                    error = %err,
                    "heart rate unavailable for workout"
                );
                HeartRateStats::default()
            }
        }
    }

    fn to_workout(&self, session: WorkoutRecord, heart_rate: HeartRateStats) -> Workout {
        let seconds = session.duration.filter(|d| d.is_finite()).unwrap_or_else(|| {
            (session.end_date - session.start_date).num_milliseconds() as f64 / 1000.0
        });

        Workout {
            start_date: self.clock.format(session.start_date),
            end_date: self.clock.format(session.end_date),
            duration: duration_minutes(seconds),
            workout_event_type: session.workout_event_type.unwrap_or_default(),
            activity_name: session.activity_name,
            calories: session.calories,
            source_name: session.source_name,
            heart_rate,
        }
    }
}

/// Mean, min and max of the samples; all zero when there are none
pub fn heart_rate_stats(samples: &[QuantitySample]) -> HeartRateStats {
    let values: Vec<f64> = samples
        .iter()
        .map(|s| s.value)
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return HeartRateStats::default();
    }

    let sum: f64 = values.iter().sum();
    HeartRateStats {
        average: sum / values.len() as f64,
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

/// Seconds to whole minutes, never negative
pub fn duration_minutes(seconds: f64) -> i64 {
    (seconds.max(0.0) / 60.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::permissions::Permissions;
    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset, Utc};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::time::Duration;

    fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn bpm(values: &[f64], at: &str) -> Vec<QuantitySample> {
        values
            .iter()
            .map(|v| QuantitySample {
                value: *v,
                unit: Some("bpm".to_string()),
                start_date: ts(at),
                end_date: None,
            })
            .collect()
    }

    fn session(name: &str, start: &str, end: &str, seconds: Option<f64>) -> WorkoutRecord {
        WorkoutRecord {
            activity_name: name.to_string(),
            calories: 250.0,
            source_name: "Watch".to_string(),
            workout_event_type: Some("Workout".to_string()),
            start_date: ts(start),
            end_date: ts(end),
            duration: seconds,
        }
    }

    fn aggregator() -> WorkoutAggregator {
        let utc = FixedOffset::east_opt(0).unwrap();
        WorkoutAggregator::new(ClockFormatter::new(utc, "%H:%M"), false)
    }

    /// Heart-rate answers keyed by window start, each with its own latency
    struct ScriptedGateway {
        answers: HashMap<DateTime<Utc>, (u64, GatewayResult)>,
    }

    #[async_trait]
    impl HealthGateway for ScriptedGateway {
        async fn is_available(&self) -> Result<bool, GatewayError> {
            Ok(true)
        }

        async fn request_authorization(&self, _: &Permissions) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn query(&self, kind: MetricKind, window: &QueryWindow) -> GatewayResult {
            assert_eq!(kind, MetricKind::HeartRate);
            assert_eq!(window.unit, Some(HealthUnit::Bpm));
            match self.answers.get(&window.start_date) {
                Some((delay, answer)) => {
                    tokio::time::sleep(Duration::from_millis(*delay)).await;
                    answer.clone()
                }
                None => Ok(ProviderResponse::Samples(vec![])),
            }
        }
    }

    #[test]
    fn test_heart_rate_stats() {
        let stats = heart_rate_stats(&bpm(&[60.0, 70.0, 80.0], "2024-01-15T07:00:00Z"));
        assert_eq!(
            stats,
            HeartRateStats {
                average: 70.0,
                min: 60.0,
                max: 80.0
            }
        );
        assert_eq!(heart_rate_stats(&[]), HeartRateStats::default());
    }

    #[test]
    fn test_duration_rounding() {
        assert_eq!(duration_minutes(1799.0), 30);
        assert_eq!(duration_minutes(1769.0), 29);
        assert_eq!(duration_minutes(29.0), 0);
        assert_eq!(duration_minutes(-60.0), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_keeps_sessions_aligned() {
        let morning = session("Running", "2024-01-15T07:00:00Z", "2024-01-15T07:30:00Z", Some(1800.0));
        let evening = session("Cycling", "2024-01-15T18:00:00Z", "2024-01-15T19:00:00Z", None);

        // The first session's lookup resolves last
        let gateway = ScriptedGateway {
            answers: HashMap::from([
                (
                    morning.start_date,
                    (50, Ok(ProviderResponse::Samples(bpm(&[140.0, 160.0], "2024-01-15T07:10:00Z")))),
                ),
                (
                    evening.start_date,
                    (5, Ok(ProviderResponse::Samples(bpm(&[100.0, 110.0, 120.0], "2024-01-15T18:10:00Z")))),
                ),
            ]),
        };

        let workouts = aggregator().aggregate(&gateway, vec![morning, evening]).await;

        assert_eq!(workouts.len(), 2);
        assert_eq!(workouts[0].activity_name, "Running");
        assert_eq!(workouts[0].heart_rate.average, 150.0);
        assert_eq!(workouts[0].heart_rate.max, 160.0);
        assert_eq!(workouts[0].duration, 30);
        assert_eq!(workouts[0].start_date, "07:00");
        assert_eq!(workouts[0].end_date, "07:30");
        assert_eq!(workouts[1].activity_name, "Cycling");
        assert_eq!(workouts[1].heart_rate.average, 110.0);
        assert_eq!(workouts[1].heart_rate.min, 100.0);
        assert_eq!(workouts[1].duration, 60);
    }

    #[tokio::test]
    async fn test_missing_heart_rate_keeps_workout() {
        let yoga = session("Yoga", "2024-01-15T09:00:00Z", "2024-01-15T09:45:00Z", Some(2700.0));
        let swim = session("Swimming", "2024-01-15T12:00:00Z", "2024-01-15T12:30:00Z", Some(1800.0));
        let gateway = ScriptedGateway {
            answers: HashMap::from([(
                swim.start_date,
                (0, Err(GatewayError::Transport("sensor off".to_string()))),
            )]),
        };

        let workouts = aggregator().aggregate(&gateway, vec![yoga, swim]).await;

        assert_eq!(workouts.len(), 2);
        assert_eq!(workouts[0].heart_rate, HeartRateStats::default());
        assert_eq!(workouts[1].heart_rate, HeartRateStats::default());
        assert_eq!(workouts[1].activity_name, "Swimming");
    }

    #[tokio::test]
    async fn test_empty_and_failed_listing() {
        let gateway = ScriptedGateway {
            answers: HashMap::new(),
        };
        let agg = aggregator();

        assert!(agg
            .normalize(&gateway, Ok(ProviderResponse::Workouts(vec![])))
            .await
            .is_empty());
        assert!(agg
            .normalize(&gateway, Err(GatewayError::Transport("x".to_string())))
            .await
            .is_empty());
    }
}
