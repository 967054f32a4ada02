//! Metric normalization
//!
//! This module turns one provider outcome into one UI-ready aggregate.
//! - Transport errors become an "Error fetching" diagnostic
//! - Successful but empty responses become a "No ... data" diagnostic
//! - Latest readings keep their unit and timestamp
//!
//! Every function here is pure; a failure never escapes as `Err`.

use crate::error::GatewayError;
use crate::gateway::{GatewayResult, HealthUnit, ProviderResponse, QuantitySample};
use crate::types::{MetricAggregate, MetricKind, ReadingAggregate};
use tracing::warn;

/// Normalizer for scalar, summed and latest-reading metrics
pub struct Normalizer;

impl Normalizer {
    /// Single cumulative value (steps, flights, distance)
    pub fn quantity(kind: MetricKind, result: GatewayResult) -> MetricAggregate<f64> {
        match result {
            Ok(ProviderResponse::Quantity(quantity)) => match quantity.value {
                Some(value) if value.is_finite() => MetricAggregate::ok(value),
                _ => MetricAggregate::no_data(kind),
            },
            Ok(other) => unexpected(kind, "quantity", &other),
            Err(err) => failed(kind, &err),
        }
    }

    /// Sum of every sample in the window (active energy)
    pub fn summed(kind: MetricKind, result: GatewayResult) -> MetricAggregate<f64> {
        match result {
            Ok(ProviderResponse::Samples(samples)) => {
                let values: Vec<f64> = finite_values(&samples).collect();
                if values.is_empty() {
                    MetricAggregate::no_data(kind)
                } else {
                    MetricAggregate::ok(values.iter().sum())
                }
            }
            Ok(other) => unexpected(kind, "samples", &other),
            Err(err) => failed(kind, &err),
        }
    }

    /// Value of the latest sample (weight, BMI)
    pub fn latest_value(kind: MetricKind, result: GatewayResult) -> MetricAggregate<f64> {
        match result {
            Ok(ProviderResponse::Samples(samples)) => match latest_sample(&samples) {
                Some(sample) => MetricAggregate::ok(sample.value),
                None => MetricAggregate::no_data(kind),
            },
            Ok(other) => unexpected(kind, "samples", &other),
            Err(err) => failed(kind, &err),
        }
    }

    /// Latest sample with unit and timestamp (blood glucose, body fat, muscle mass)
    pub fn latest_reading(
        kind: MetricKind,
        result: GatewayResult,
        requested_unit: HealthUnit,
    ) -> ReadingAggregate {
        match result {
            Ok(ProviderResponse::Samples(samples)) => match latest_sample(&samples) {
                Some(sample) => ReadingAggregate {
                    value: sample.value,
                    unit: sample
                        .unit
                        .clone()
                        .unwrap_or_else(|| requested_unit.as_str().to_string()),
                    date: sample.start_date.to_rfc3339(),
                    message: String::new(),
                },
                None => ReadingAggregate::no_data(kind),
            },
            Ok(other) => {
                warn!(kind = %kind, expected = "samples", got = other.shape(), "unexpected provider payload");
                ReadingAggregate::error(kind)
            }
            Err(err) => {
                warn!(kind = %kind, error = %err, "provider query failed");
                ReadingAggregate::error(kind)
            }
        }
    }
}

/// Most recent finite sample by start time.
///
/// Ties keep the earliest position, so a provider that already returns
/// newest-first gets its first element back.
pub fn latest_sample(samples: &[QuantitySample]) -> Option<&QuantitySample> {
    samples
        .iter()
        .filter(|s| s.value.is_finite())
        .reduce(|best, s| if s.start_date > best.start_date { s } else { best })
}

fn finite_values(samples: &[QuantitySample]) -> impl Iterator<Item = f64> + '_ {
    samples.iter().map(|s| s.value).filter(|v| v.is_finite())
}

fn failed(kind: MetricKind, err: &GatewayError) -> MetricAggregate<f64> {
    warn!(kind = %kind, error = %err, "provider query failed");
    MetricAggregate::error(kind)
}

fn unexpected(
    kind: MetricKind,
    expected: &'static str,
    got: &ProviderResponse,
) -> MetricAggregate<f64> {
    let err = GatewayError::UnexpectedPayload { kind, expected };
    warn!(kind = %kind, got = got.shape(), error = %err, "unexpected provider payload");
    MetricAggregate::error(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::QuantityResult;
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;

    fn sample(value: f64, at: &str) -> QuantitySample {
        QuantitySample {
            value,
            unit: None,
            start_date: DateTime::parse_from_rfc3339(at).unwrap().with_timezone(&Utc),
            end_date: None,
        }
    }

    fn quantity(value: Option<f64>) -> GatewayResult {
        Ok(ProviderResponse::Quantity(QuantityResult { value }))
    }

    fn transport() -> GatewayResult {
        Err(GatewayError::Transport("device disabled".to_string()))
    }

    #[test]
    fn test_quantity_three_outcomes() {
        assert_eq!(
            Normalizer::quantity(MetricKind::Steps, quantity(Some(8500.0))),
            MetricAggregate::ok(8500.0)
        );

        let missing = Normalizer::quantity(MetricKind::Steps, quantity(None));
        assert_eq!(missing.value, 0.0);
        assert_eq!(missing.message, "No steps data available");

        let failed = Normalizer::quantity(MetricKind::Steps, transport());
        assert_eq!(failed.value, 0.0);
        assert_eq!(failed.message, "Error fetching steps data");
    }

    #[test]
    fn test_never_value_and_message_together() {
        let outcomes = vec![
            quantity(Some(12.0)),
            quantity(Some(0.0)),
            quantity(None),
            quantity(Some(f64::NAN)),
            transport(),
            Ok(ProviderResponse::Samples(vec![])),
        ];
        for outcome in outcomes {
            let agg = Normalizer::quantity(MetricKind::Flights, outcome);
            assert!(agg.message.is_empty() || agg.value == 0.0, "{agg:?}");
        }
    }

    #[test]
    fn test_summed_empty_is_no_data_not_error() {
        let agg = Normalizer::summed(MetricKind::ActiveEnergy, Ok(ProviderResponse::Samples(vec![])));
        assert_eq!(agg.value, 0.0);
        assert_eq!(agg.message, "No calories data available");
    }

    #[test]
    fn test_summed_adds_every_sample() {
        let samples = vec![
            sample(120.5, "2024-01-15T08:00:00Z"),
            sample(80.0, "2024-01-15T12:00:00Z"),
            sample(49.5, "2024-01-15T19:00:00Z"),
        ];
        let agg = Normalizer::summed(MetricKind::ActiveEnergy, Ok(ProviderResponse::Samples(samples)));
        assert_eq!(agg, MetricAggregate::ok(250.0));
    }

    #[test]
    fn test_wrong_payload_shape_is_error() {
        let agg = Normalizer::summed(MetricKind::ActiveEnergy, quantity(Some(1.0)));
        assert_eq!(agg.message, "Error fetching calories data");
        assert_eq!(agg.value, 0.0);
    }

    #[test]
    fn test_latest_value_picks_newest_regardless_of_order() {
        let samples = vec![
            sample(181.0, "2024-01-15T07:00:00Z"),
            sample(179.5, "2024-01-15T21:00:00Z"),
            sample(180.0, "2024-01-15T12:00:00Z"),
        ];
        let agg = Normalizer::latest_value(MetricKind::Weight, Ok(ProviderResponse::Samples(samples)));
        assert_eq!(agg, MetricAggregate::ok(179.5));
    }

    #[test]
    fn test_latest_reading_keeps_unit_and_date() {
        let mut newest = sample(5.4, "2024-01-15T09:30:00Z");
        newest.unit = Some("mmol/L".to_string());
        let samples = vec![newest, sample(5.1, "2024-01-15T06:00:00Z")];

        let reading = Normalizer::latest_reading(
            MetricKind::BloodGlucose,
            Ok(ProviderResponse::Samples(samples)),
            HealthUnit::MgPerDl,
        );
        assert_eq!(reading.value, 5.4);
        assert_eq!(reading.unit, "mmol/L");
        assert_eq!(reading.date, "2024-01-15T09:30:00+00:00");
        assert!(reading.is_ok());
    }

    #[test]
    fn test_latest_reading_empty_and_error() {
        let empty = Normalizer::latest_reading(
            MetricKind::BodyFat,
            Ok(ProviderResponse::Samples(vec![])),
            HealthUnit::Percent,
        );
        assert_eq!(empty, ReadingAggregate::no_data(MetricKind::BodyFat));
        assert_eq!(empty.date, "");
        assert_eq!(empty.message, "No body fat data available");

        let failed =
            Normalizer::latest_reading(MetricKind::MuscleMass, transport(), HealthUnit::Pound);
        assert_eq!(failed.message, "Error fetching muscle mass data");
        assert_eq!(failed.unit, "");
    }

    #[test]
    fn test_latest_reading_falls_back_to_requested_unit() {
        let reading = Normalizer::latest_reading(
            MetricKind::BodyFat,
            Ok(ProviderResponse::Samples(vec![sample(0.21, "2024-01-15T07:00:00Z")])),
            HealthUnit::Percent,
        );
        assert_eq!(reading.unit, "percent");
    }

    #[test]
    fn test_normalizers_are_idempotent() {
        let samples = vec![
            sample(181.0, "2024-01-15T07:00:00Z"),
            sample(181.0, "2024-01-15T07:00:00Z"),
        ];
        let first = Normalizer::latest_value(MetricKind::Bmi, Ok(ProviderResponse::Samples(samples.clone())));
        let second = Normalizer::latest_value(MetricKind::Bmi, Ok(ProviderResponse::Samples(samples)));
        assert_eq!(first, second);
        assert_eq!(first.value.to_bits(), second.value.to_bits());
    }
}
