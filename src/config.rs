//! Aggregator configuration
//!
//! Loaded from TOML. Every field has a default so an empty file is valid.
//! The permission scope list is deliberately absent; see `permissions`.

use crate::calendar::{parse_utc_offset, ClockFormatter};
use crate::error::ComputeError;
use crate::gateway::HealthUnit;
use chrono::format::{Item, StrftimeItems};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default clock-time format for workout start/end
pub const DEFAULT_CLOCK_FORMAT: &str = "%-I:%M %p";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Offset defining the local day, e.g. "+02:00"
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,

    #[serde(default = "default_clock_format")]
    pub clock_format: String,

    #[serde(default)]
    pub include_manually_added: bool,

    #[serde(default)]
    pub units: UnitConfig,
}

/// Units requested from the provider per metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConfig {
    #[serde(default = "default_weight_unit")]
    pub weight: HealthUnit,

    #[serde(default = "default_distance_unit")]
    pub distance: HealthUnit,

    #[serde(default = "default_blood_glucose_unit")]
    pub blood_glucose: HealthUnit,

    #[serde(default = "default_weight_unit")]
    pub muscle_mass: HealthUnit,
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

fn default_clock_format() -> String {
    DEFAULT_CLOCK_FORMAT.to_string()
}

fn default_weight_unit() -> HealthUnit {
    HealthUnit::Pound
}

fn default_distance_unit() -> HealthUnit {
    HealthUnit::Meter
}

fn default_blood_glucose_unit() -> HealthUnit {
    HealthUnit::MgPerDl
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            weight: default_weight_unit(),
            distance: default_distance_unit(),
            blood_glucose: default_blood_glucose_unit(),
            muscle_mass: default_weight_unit(),
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
            clock_format: default_clock_format(),
            include_manually_added: false,
            units: UnitConfig::default(),
        }
    }
}

impl AggregatorConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self, ComputeError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ComputeError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Builder-style override of the UTC offset
    pub fn with_utc_offset(mut self, offset: impl Into<String>) -> Self {
        self.utc_offset = offset.into();
        self
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, ComputeError> {
        parse_utc_offset(&self.utc_offset)
    }

    pub fn clock_formatter(&self) -> Result<ClockFormatter, ComputeError> {
        Ok(ClockFormatter::new(self.utc_offset()?, self.clock_format.clone()))
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        self.utc_offset()?;
        if StrftimeItems::new(&self.clock_format).any(|item| matches!(item, Item::Error)) {
            return Err(ComputeError::InvalidClockFormat(self.clock_format.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = AggregatorConfig::from_toml_str("").unwrap();
        assert_eq!(config, AggregatorConfig::default());
        assert_eq!(config.units.weight, HealthUnit::Pound);
        assert_eq!(config.utc_offset().unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn test_overrides() {
        let config = AggregatorConfig::from_toml_str(
            r#"
            utc_offset = "-07:00"
            clock_format = "%H:%M"
            include_manually_added = true

            [units]
            weight = "kg"
            distance = "mile"
            blood_glucose = "mmol/L"
            "#,
        )
        .unwrap();

        assert_eq!(config.utc_offset().unwrap().local_minus_utc(), -7 * 3600);
        assert!(config.include_manually_added);
        assert_eq!(config.units.weight, HealthUnit::Kilogram);
        assert_eq!(config.units.distance, HealthUnit::Mile);
        assert_eq!(config.units.blood_glucose, HealthUnit::MmolPerL);
        assert_eq!(config.units.muscle_mass, HealthUnit::Pound);
    }

    #[test]
    fn test_invalid_offset_rejected() {
        let err = AggregatorConfig::from_toml_str(r#"utc_offset = "later""#).unwrap_err();
        assert!(matches!(err, ComputeError::InvalidUtcOffset(_)));
    }

    #[test]
    fn test_invalid_clock_format_rejected() {
        let err = AggregatorConfig::from_toml_str(r#"clock_format = "%Q""#).unwrap_err();
        assert!(matches!(err, ComputeError::InvalidClockFormat(_)));
    }

    #[test]
    fn test_unknown_unit_is_config_error() {
        let err = AggregatorConfig::from_toml_str("[units]\nweight = \"stone\"").unwrap_err();
        assert!(matches!(err, ComputeError::ConfigError(_)));
    }
}
