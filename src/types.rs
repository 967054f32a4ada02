//! Core types for health-snapshot
//!
//! This module defines the aggregates that flow out of the normalizers, the
//! sleep reducer and the workout aggregator, and the snapshot that collects
//! them for one selected day.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metric kinds the provider can be queried for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Steps,
    Flights,
    Distance,
    Weight,
    Bmi,
    ActiveEnergy,
    Sleep,
    Workouts,
    HeartRate,
    BloodGlucose,
    BodyFat,
    MuscleMass,
}

impl MetricKind {
    /// Every kind, in snapshot field order
    pub const ALL: [MetricKind; 12] = [
        MetricKind::Steps,
        MetricKind::Flights,
        MetricKind::Distance,
        MetricKind::Weight,
        MetricKind::Bmi,
        MetricKind::ActiveEnergy,
        MetricKind::Sleep,
        MetricKind::Workouts,
        MetricKind::HeartRate,
        MetricKind::BloodGlucose,
        MetricKind::BodyFat,
        MetricKind::MuscleMass,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Steps => "steps",
            MetricKind::Flights => "flights",
            MetricKind::Distance => "distance",
            MetricKind::Weight => "weight",
            MetricKind::Bmi => "bmi",
            MetricKind::ActiveEnergy => "active_energy",
            MetricKind::Sleep => "sleep",
            MetricKind::Workouts => "workouts",
            MetricKind::HeartRate => "heart_rate",
            MetricKind::BloodGlucose => "blood_glucose",
            MetricKind::BodyFat => "body_fat",
            MetricKind::MuscleMass => "muscle_mass",
        }
    }

    /// Human-readable name used in diagnostic messages
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Steps => "steps",
            MetricKind::Flights => "flights climbed",
            MetricKind::Distance => "distance",
            MetricKind::Weight => "weight",
            MetricKind::Bmi => "BMI",
            MetricKind::ActiveEnergy => "calories",
            MetricKind::Sleep => "sleep",
            MetricKind::Workouts => "workout",
            MetricKind::HeartRate => "heart rate",
            MetricKind::BloodGlucose => "blood glucose",
            MetricKind::BodyFat => "body fat",
            MetricKind::MuscleMass => "muscle mass",
        }
    }

    /// Position in [`MetricKind::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn error_message(&self) -> String {
        format!("Error fetching {} data", self.label())
    }

    pub fn no_data_message(&self) -> String {
        format!("No {} data available", self.label())
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized value for one metric plus its diagnostic message.
///
/// `message` is empty iff the value was retrieved successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAggregate<T> {
    pub value: T,
    pub message: String,
}

impl<T: Default> Default for MetricAggregate<T> {
    fn default() -> Self {
        Self {
            value: T::default(),
            message: String::new(),
        }
    }
}

impl<T: Default> MetricAggregate<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            message: String::new(),
        }
    }

    pub fn error(kind: MetricKind) -> Self {
        Self {
            value: T::default(),
            message: kind.error_message(),
        }
    }

    pub fn no_data(kind: MetricKind) -> Self {
        Self {
            value: T::default(),
            message: kind.no_data_message(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.message.is_empty()
    }
}

/// Latest point-in-time reading (blood glucose, body fat, muscle mass)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingAggregate {
    pub value: f64,
    pub unit: String,
    /// Timestamp of the selected sample, empty when there is none
    pub date: String,
    pub message: String,
}

impl ReadingAggregate {
    pub fn error(kind: MetricKind) -> Self {
        Self {
            message: kind.error_message(),
            ..Default::default()
        }
    }

    pub fn no_data(kind: MetricKind) -> Self {
        Self {
            message: kind.no_data_message(),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.message.is_empty()
    }
}

/// Sleep interval classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SleepState {
    #[serde(alias = "AWAKE")]
    InBed,
    Asleep,
    Core,
    Deep,
    Rem,
    Light,
}

impl SleepState {
    /// Classify a raw provider value.
    ///
    /// Awake periods are time spent in bed. Unrecognized values fall back to
    /// `InBed` so they never inflate time asleep.
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ASLEEP" | "ASLEEPUNSPECIFIED" => SleepState::Asleep,
            "CORE" | "ASLEEPCORE" => SleepState::Core,
            "DEEP" | "ASLEEPDEEP" => SleepState::Deep,
            "REM" | "ASLEEPREM" => SleepState::Rem,
            "LIGHT" => SleepState::Light,
            _ => SleepState::InBed,
        }
    }

    pub fn is_asleep(&self) -> bool {
        !matches!(self, SleepState::InBed)
    }
}

/// Per-stage sleep totals in minutes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SleepStages {
    pub deep: f64,
    pub core: f64,
    pub rem: f64,
    pub light: f64,
}

/// One interval on the sleep timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepInterval {
    pub state: SleepState,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Minutes, never negative
    pub duration: f64,
}

/// Reduced sleep architecture for one night
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepAggregate {
    pub total_time_in_bed: f64,
    pub total_time_asleep: f64,
    pub stages: SleepStages,
    pub timeline: Vec<SleepInterval>,
    pub message: String,
}

impl SleepAggregate {
    pub fn error() -> Self {
        Self {
            message: MetricKind::Sleep.error_message(),
            ..Default::default()
        }
    }

    pub fn no_data() -> Self {
        Self {
            message: MetricKind::Sleep.no_data_message(),
            ..Default::default()
        }
    }
}

/// Heart-rate statistics over one workout window.
///
/// All three fields are 0 when the session had no samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartRateStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

/// Workout session enriched with heart-rate statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    pub activity_name: String,
    pub calories: f64,
    pub source_name: String,
    pub workout_event_type: String,
    /// Formatted local clock time
    pub start_date: String,
    /// Formatted local clock time
    pub end_date: String,
    /// Whole minutes
    pub duration: i64,
    pub heart_rate: HeartRateStats,
}

/// All aggregates for one selected day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub date: NaiveDate,
    pub steps: MetricAggregate<f64>,
    pub flights: MetricAggregate<f64>,
    pub distance: MetricAggregate<f64>,
    pub weight: MetricAggregate<f64>,
    #[serde(rename = "BMI")]
    pub bmi: MetricAggregate<f64>,
    pub calories_burned: MetricAggregate<f64>,
    pub sleep: SleepAggregate,
    pub workouts: Vec<Workout>,
    pub blood_glucose: ReadingAggregate,
    pub body_fat: ReadingAggregate,
    pub muscle_mass: ReadingAggregate,
}

impl HealthSnapshot {
    /// Zeroed initial state for a date
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            steps: MetricAggregate::default(),
            flights: MetricAggregate::default(),
            distance: MetricAggregate::default(),
            weight: MetricAggregate::default(),
            bmi: MetricAggregate::default(),
            calories_burned: MetricAggregate::default(),
            sleep: SleepAggregate::default(),
            workouts: Vec::new(),
            blood_glucose: ReadingAggregate::default(),
            body_fat: ReadingAggregate::default(),
            muscle_mass: ReadingAggregate::default(),
        }
    }

    /// Placeholder text for an empty workout list
    pub fn workouts_message(&self) -> Option<&'static str> {
        if self.workouts.is_empty() {
            Some("No workouts for this day")
        } else {
            None
        }
    }
}
