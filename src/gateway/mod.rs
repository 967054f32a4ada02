//! Provider gateway
//!
//! The contract between the aggregation layer and the external health-record
//! source. Every per-metric query returns a tagged `ProviderResponse` so the
//! normalizers can pattern-match on the payload shape instead of probing an
//! untyped record.

mod fixture;

pub use fixture::{FixtureDocument, FixtureGateway};

use crate::calendar::day_bounds;
use crate::error::{ComputeError, GatewayError};
use crate::permissions::Permissions;
use crate::types::MetricKind;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Units a query can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthUnit {
    #[serde(rename = "count")]
    Count,
    #[serde(rename = "meter")]
    Meter,
    #[serde(rename = "mile")]
    Mile,
    #[serde(rename = "pound")]
    Pound,
    #[serde(rename = "gram")]
    Gram,
    #[serde(rename = "kg")]
    Kilogram,
    #[serde(rename = "percent")]
    Percent,
    #[serde(rename = "mg/dL")]
    MgPerDl,
    #[serde(rename = "mmol/L")]
    MmolPerL,
    #[serde(rename = "kcal")]
    Kilocalorie,
    #[serde(rename = "bpm")]
    Bpm,
}

impl HealthUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthUnit::Count => "count",
            HealthUnit::Meter => "meter",
            HealthUnit::Mile => "mile",
            HealthUnit::Pound => "pound",
            HealthUnit::Gram => "gram",
            HealthUnit::Kilogram => "kg",
            HealthUnit::Percent => "percent",
            HealthUnit::MgPerDl => "mg/dL",
            HealthUnit::MmolPerL => "mmol/L",
            HealthUnit::Kilocalorie => "kcal",
            HealthUnit::Bpm => "bpm",
        }
    }
}

/// Window descriptor accepted by every per-metric query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryWindow {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub unit: Option<HealthUnit>,
    pub include_manually_added: bool,
}

impl QueryWindow {
    /// Local calendar day at the given offset
    pub fn for_day(
        date: NaiveDate,
        offset: FixedOffset,
        include_manually_added: bool,
    ) -> Result<Self, ComputeError> {
        let (start_date, end_date) = day_bounds(date, offset)?;
        Ok(Self {
            start_date,
            end_date,
            unit: None,
            include_manually_added,
        })
    }

    /// Exact window of a session
    pub fn between(
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        include_manually_added: bool,
    ) -> Self {
        Self {
            start_date,
            end_date,
            unit: None,
            include_manually_added,
        }
    }

    pub fn with_unit(&self, unit: HealthUnit) -> Self {
        Self {
            unit: Some(unit),
            ..self.clone()
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start_date && instant < self.end_date
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end_date && end > self.start_date
    }
}

/// Single cumulative value for the window (steps, flights, distance)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantityResult {
    pub value: Option<f64>,
}

/// One timestamped observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitySample {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

/// Raw sleep-analysis interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepRecord {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub value: String,
}

/// Raw workout session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub activity_name: String,
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub workout_event_type: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Seconds; derived from the window when the provider omits it
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Tagged payload returned by a per-metric query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ProviderResponse {
    Quantity(QuantityResult),
    Samples(Vec<QuantitySample>),
    Sleep(Vec<SleepRecord>),
    Workouts(Vec<WorkoutRecord>),
}

impl ProviderResponse {
    pub fn shape(&self) -> &'static str {
        match self {
            ProviderResponse::Quantity(_) => "quantity",
            ProviderResponse::Samples(_) => "samples",
            ProviderResponse::Sleep(_) => "sleep",
            ProviderResponse::Workouts(_) => "workouts",
        }
    }
}

/// Outcome of one provider call
pub type GatewayResult = Result<ProviderResponse, GatewayError>;

/// Asynchronous access to the health-record provider.
///
/// Implementations must be `Send + Sync`; the orchestrator issues many queries
/// concurrently against one shared instance. No retries or timeouts are
/// expected from callers.
#[async_trait]
pub trait HealthGateway: Send + Sync {
    /// Whether the provider can be used on this device at all
    async fn is_available(&self) -> Result<bool, GatewayError>;

    /// Request the declared scopes
    async fn request_authorization(&self, permissions: &Permissions) -> Result<(), GatewayError>;

    /// Query one metric kind over a window
    async fn query(&self, kind: MetricKind, window: &QueryWindow) -> GatewayResult;
}
