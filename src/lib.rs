//! Health Snapshot - Daily health-record aggregation for a single calendar day
//!
//! The crate pulls raw records from an external health-data provider and
//! reduces them into one `HealthSnapshot` per selected day: vendor query →
//! normalization → stage reduction and workout enrichment → snapshot
//! publication.
//!
//! ## Modules
//!
//! - **Gateway**: The provider contract plus a deterministic fixture provider
//! - **Normalizers**: Scalar, summed and latest-reading metric reduction
//! - **Sleep / Workouts**: Stage timelines and heart-rate enriched sessions
//! - **Orchestrator**: Permission handshake and generation-tagged fetch cycles

pub mod calendar;
pub mod config;
pub mod error;
pub mod gateway;
pub mod normalizer;
pub mod orchestrator;
pub mod permissions;
pub mod sleep;
pub mod types;
pub mod workouts;

pub use calendar::DaySelection;
pub use config::AggregatorConfig;
pub use error::{ComputeError, GatewayError};
pub use gateway::{FixtureGateway, HealthGateway, QueryWindow};
pub use orchestrator::{
    AuthorizationState, FetchOutcome, FetchReport, HealthDataOrchestrator, SnapshotWatcher,
};
pub use permissions::HEALTH_PERMISSIONS;
pub use types::{HealthSnapshot, MetricKind};

/// Crate version reported by the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "health-snapshot";
