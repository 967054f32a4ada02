//! In-memory fixture gateway
//!
//! Serves provider responses from a JSON document. Records carry their own
//! timestamps and are filtered by the query window, so moving the selected
//! day changes what comes back. Failures and latency can be injected per
//! metric kind, and every call is counted.

use crate::error::{ComputeError, GatewayError};
use crate::gateway::{
    GatewayResult, HealthGateway, ProviderResponse, QuantityResult, QuantitySample, QueryWindow,
    SleepRecord, WorkoutRecord,
};
use crate::permissions::Permissions;
use crate::types::MetricKind;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Fixture file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureDocument {
    #[serde(default = "default_true")]
    pub available: bool,

    #[serde(default = "default_true")]
    pub authorized: bool,

    /// Timestamped samples per metric kind
    #[serde(default)]
    pub samples: HashMap<MetricKind, Vec<QuantitySample>>,

    #[serde(default)]
    pub sleep: Vec<SleepRecord>,

    #[serde(default)]
    pub workouts: Vec<WorkoutRecord>,

    /// Kinds whose queries fail with a transport error
    #[serde(default)]
    pub failures: HashMap<MetricKind, String>,

    #[serde(default)]
    pub delays_ms: HashMap<MetricKind, u64>,

    /// Extra latency for every query whose window starts on this UTC date
    #[serde(default)]
    pub day_delays_ms: HashMap<NaiveDate, u64>,
}

fn default_true() -> bool {
    true
}

impl Default for FixtureDocument {
    fn default() -> Self {
        Self {
            available: true,
            authorized: true,
            samples: HashMap::new(),
            sleep: Vec::new(),
            workouts: Vec::new(),
            failures: HashMap::new(),
            delays_ms: HashMap::new(),
            day_delays_ms: HashMap::new(),
        }
    }
}

impl FixtureDocument {
    /// Number of records held per kind
    pub fn record_counts(&self) -> BTreeMap<MetricKind, usize> {
        let mut counts: BTreeMap<MetricKind, usize> = MetricKind::ALL
            .iter()
            .map(|kind| (*kind, 0))
            .collect();
        for (kind, samples) in &self.samples {
            counts.insert(*kind, samples.len());
        }
        counts.insert(MetricKind::Sleep, self.sleep.len());
        counts.insert(MetricKind::Workouts, self.workouts.len());
        counts
    }
}

/// Deterministic gateway backed by a [`FixtureDocument`]
#[derive(Debug)]
pub struct FixtureGateway {
    document: FixtureDocument,
    granted: AtomicBool,
    calls: [AtomicUsize; MetricKind::ALL.len()],
    availability_probes: AtomicUsize,
    authorization_requests: AtomicUsize,
}

impl Default for FixtureGateway {
    fn default() -> Self {
        Self::new(FixtureDocument::default())
    }
}

impl FixtureGateway {
    pub fn new(document: FixtureDocument) -> Self {
        Self {
            document,
            granted: AtomicBool::new(false),
            calls: Default::default(),
            availability_probes: AtomicUsize::new(0),
            authorization_requests: AtomicUsize::new(0),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let document: FixtureDocument = serde_json::from_str(json)?;
        Ok(Self::new(document))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ComputeError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn document(&self) -> &FixtureDocument {
        &self.document
    }

    pub fn with_samples(mut self, kind: MetricKind, samples: Vec<QuantitySample>) -> Self {
        self.document.samples.entry(kind).or_default().extend(samples);
        self
    }

    pub fn with_sleep(mut self, records: Vec<SleepRecord>) -> Self {
        self.document.sleep.extend(records);
        self
    }

    pub fn with_workouts(mut self, records: Vec<WorkoutRecord>) -> Self {
        self.document.workouts.extend(records);
        self
    }

    pub fn with_failure(mut self, kind: MetricKind, message: impl Into<String>) -> Self {
        self.document.failures.insert(kind, message.into());
        self
    }

    pub fn with_delay(mut self, kind: MetricKind, millis: u64) -> Self {
        self.document.delays_ms.insert(kind, millis);
        self
    }

    pub fn with_day_delay(mut self, date: NaiveDate, millis: u64) -> Self {
        self.document.day_delays_ms.insert(date, millis);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.document.available = false;
        self
    }

    pub fn denying_authorization(mut self) -> Self {
        self.document.authorized = false;
        self
    }

    /// Queries issued for one kind
    pub fn calls(&self, kind: MetricKind) -> usize {
        self.calls[kind.index()].load(Ordering::SeqCst)
    }

    /// Queries issued across every kind
    pub fn total_metric_calls(&self) -> usize {
        self.calls.iter().map(|c| c.load(Ordering::SeqCst)).sum()
    }

    pub fn availability_probes(&self) -> usize {
        self.availability_probes.load(Ordering::SeqCst)
    }

    pub fn authorization_requests(&self) -> usize {
        self.authorization_requests.load(Ordering::SeqCst)
    }

    fn delay_for(&self, kind: MetricKind, window: &QueryWindow) -> u64 {
        let by_kind = self.document.delays_ms.get(&kind).copied().unwrap_or(0);
        let by_day = self
            .document
            .day_delays_ms
            .get(&window.start_date.date_naive())
            .copied()
            .unwrap_or(0);
        by_kind.saturating_add(by_day)
    }

    fn samples_in(&self, kind: MetricKind, window: &QueryWindow) -> Vec<QuantitySample> {
        let fallback_unit = window.unit.map(|u| u.as_str().to_string());
        self.document
            .samples
            .get(&kind)
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| window.contains(s.start_date))
                    .map(|s| QuantitySample {
                        unit: s.unit.clone().or_else(|| fallback_unit.clone()),
                        ..s.clone()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn respond(&self, kind: MetricKind, window: &QueryWindow) -> ProviderResponse {
        match kind {
            MetricKind::Steps | MetricKind::Flights | MetricKind::Distance => {
                let samples = self.samples_in(kind, window);
                let value = if samples.is_empty() {
                    None
                } else {
                    Some(samples.iter().map(|s| s.value).sum())
                };
                ProviderResponse::Quantity(QuantityResult { value })
            }
            MetricKind::Sleep => ProviderResponse::Sleep(
                self.document
                    .sleep
                    .iter()
                    .filter(|r| window.overlaps(r.start_date, r.end_date))
                    .cloned()
                    .collect(),
            ),
            MetricKind::Workouts => ProviderResponse::Workouts(
                self.document
                    .workouts
                    .iter()
                    .filter(|w| window.contains(w.start_date))
                    .cloned()
                    .collect(),
            ),
            _ => {
                // Newest first, the provider's default sort
                let mut samples = self.samples_in(kind, window);
                samples.sort_by(|a, b| b.start_date.cmp(&a.start_date));
                ProviderResponse::Samples(samples)
            }
        }
    }
}

#[async_trait]
impl HealthGateway for FixtureGateway {
    async fn is_available(&self) -> Result<bool, GatewayError> {
        self.availability_probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.document.available)
    }

    async fn request_authorization(&self, permissions: &Permissions) -> Result<(), GatewayError> {
        self.authorization_requests.fetch_add(1, Ordering::SeqCst);
        if !self.document.authorized {
            return Err(GatewayError::NotAuthorized(
                "user declined health data access".to_string(),
            ));
        }
        if !permissions.write.is_empty() {
            return Err(GatewayError::MissingEntitlement(
                "write access is not available".to_string(),
            ));
        }
        self.granted.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn query(&self, kind: MetricKind, window: &QueryWindow) -> GatewayResult {
        self.calls[kind.index()].fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_for(kind, window);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if !self.granted.load(Ordering::SeqCst) {
            return Err(GatewayError::NotAuthorized(format!(
                "no read access for {kind}"
            )));
        }
        if window.end_date < window.start_date {
            return Err(GatewayError::MalformedQuery(format!(
                "window ends before it starts for {kind}"
            )));
        }
        if let Some(message) = self.document.failures.get(&kind) {
            return Err(GatewayError::Transport(message.clone()));
        }

        let response = self.respond(kind, window);
        debug!(kind = %kind, shape = response.shape(), "fixture query served");
        Ok(response)
    }
}
