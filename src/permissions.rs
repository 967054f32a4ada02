//! Capability set requested from the provider
//!
//! The scope list is fixed at compile time. Only read scopes are requested;
//! writing back to the provider is not part of this crate.

use crate::types::MetricKind;
use serde::Serialize;

/// A single provider data type that can be granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HealthPermission {
    Steps,
    FlightsClimbed,
    DistanceWalkingRunning,
    Weight,
    BodyMassIndex,
    ActiveEnergyBurned,
    SleepAnalysis,
    Workout,
    HeartRate,
    BloodGlucose,
    BodyFatPercentage,
    LeanBodyMass,
}

impl HealthPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthPermission::Steps => "Steps",
            HealthPermission::FlightsClimbed => "FlightsClimbed",
            HealthPermission::DistanceWalkingRunning => "DistanceWalkingRunning",
            HealthPermission::Weight => "Weight",
            HealthPermission::BodyMassIndex => "BodyMassIndex",
            HealthPermission::ActiveEnergyBurned => "ActiveEnergyBurned",
            HealthPermission::SleepAnalysis => "SleepAnalysis",
            HealthPermission::Workout => "Workout",
            HealthPermission::HeartRate => "HeartRate",
            HealthPermission::BloodGlucose => "BloodGlucose",
            HealthPermission::BodyFatPercentage => "BodyFatPercentage",
            HealthPermission::LeanBodyMass => "LeanBodyMass",
        }
    }

    /// Read scope needed to query a metric kind
    pub fn for_kind(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Steps => HealthPermission::Steps,
            MetricKind::Flights => HealthPermission::FlightsClimbed,
            MetricKind::Distance => HealthPermission::DistanceWalkingRunning,
            MetricKind::Weight => HealthPermission::Weight,
            MetricKind::Bmi => HealthPermission::BodyMassIndex,
            MetricKind::ActiveEnergy => HealthPermission::ActiveEnergyBurned,
            MetricKind::Sleep => HealthPermission::SleepAnalysis,
            MetricKind::Workouts => HealthPermission::Workout,
            MetricKind::HeartRate => HealthPermission::HeartRate,
            MetricKind::BloodGlucose => HealthPermission::BloodGlucose,
            MetricKind::BodyFat => HealthPermission::BodyFatPercentage,
            MetricKind::MuscleMass => HealthPermission::LeanBodyMass,
        }
    }
}

/// Declared read and write scopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Permissions {
    pub read: &'static [HealthPermission],
    pub write: &'static [HealthPermission],
}

impl Permissions {
    pub fn can_read(&self, kind: MetricKind) -> bool {
        self.read.contains(&HealthPermission::for_kind(kind))
    }
}

/// Every scope the aggregation layer consumes
pub const HEALTH_PERMISSIONS: Permissions = Permissions {
    read: &[
        HealthPermission::Steps,
        HealthPermission::FlightsClimbed,
        HealthPermission::DistanceWalkingRunning,
        HealthPermission::Weight,
        HealthPermission::BodyMassIndex,
        HealthPermission::ActiveEnergyBurned,
        HealthPermission::SleepAnalysis,
        HealthPermission::Workout,
        HealthPermission::HeartRate,
        HealthPermission::BloodGlucose,
        HealthPermission::BodyFatPercentage,
        HealthPermission::LeanBodyMass,
    ],
    write: &[],
};
