//! Fetch orchestration
//!
//! This module owns the permission handshake and the per-date fetch cycle.
//! Each cycle fires every per-metric query concurrently; each result is
//! normalized and written into its own snapshot field as soon as it settles.
//!
//! Every cycle is tagged with a generation. Selecting a new date bumps the
//! generation and replaces the snapshot wholesale, so results that settle for
//! an older generation are dropped instead of written.

use crate::calendar::DaySelection;
use crate::config::AggregatorConfig;
use crate::error::ComputeError;
use crate::gateway::{GatewayResult, HealthGateway, HealthUnit, QueryWindow};
use crate::normalizer::Normalizer;
use crate::permissions::HEALTH_PERMISSIONS;
use crate::sleep::SleepReducer;
use crate::types::{
    HealthSnapshot, MetricAggregate, MetricKind, ReadingAggregate, SleepAggregate,
};
use crate::workouts::WorkoutAggregator;
use chrono::{FixedOffset, NaiveDate};
use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Permission handshake state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationState {
    Uninitialized,
    Authorizing,
    Authorized,
    /// Terminal for the lifetime of the orchestrator
    Unauthorized,
}

/// Identity of one fetch cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub request_id: Uuid,
    pub generation: u64,
    pub date: NaiveDate,
}

/// Summary of a completed fetch cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    pub request_id: Uuid,
    pub generation: u64,
    pub date: NaiveDate,
    /// Slices written into the snapshot
    pub applied: usize,
    /// Slices dropped because a newer cycle had started
    pub discarded: usize,
}

impl FetchReport {
    pub fn superseded(&self) -> bool {
        self.discarded > 0
    }
}

/// Result of a date selection or refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// The date was already selected
    Unchanged,
    /// The date was recorded but permissions are not granted
    NotAuthorized,
    Completed(FetchReport),
}

#[derive(Debug, Clone)]
struct Published {
    generation: u64,
    snapshot: Arc<HealthSnapshot>,
}

/// Holder of the current snapshot.
///
/// Readers always get a complete `HealthSnapshot` value; writers replace or
/// patch it under the channel lock and only when their generation is current.
#[derive(Debug)]
pub struct SnapshotStore {
    tx: watch::Sender<Published>,
}

impl SnapshotStore {
    pub fn new(date: NaiveDate) -> Self {
        let (tx, _rx) = watch::channel(Published {
            generation: 0,
            snapshot: Arc::new(HealthSnapshot::empty(date)),
        });
        Self { tx }
    }

    pub fn current(&self) -> Arc<HealthSnapshot> {
        Arc::clone(&self.tx.borrow().snapshot)
    }

    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    pub fn subscribe(&self) -> SnapshotWatcher {
        SnapshotWatcher {
            rx: self.tx.subscribe(),
        }
    }

    /// Start a new cycle; a fresh cycle (or a different date) zeroes the snapshot
    pub fn begin(&self, date: NaiveDate, fresh: bool) -> FetchTicket {
        let mut generation = 0;
        self.tx.send_modify(|published| {
            published.generation += 1;
            generation = published.generation;
            if fresh || published.snapshot.date != date {
                published.snapshot = Arc::new(HealthSnapshot::empty(date));
            }
        });
        FetchTicket {
            request_id: Uuid::new_v4(),
            generation,
            date,
        }
    }

    /// Write one slice if the ticket is still current
    pub fn apply<F>(&self, ticket: &FetchTicket, kind: MetricKind, write: F) -> bool
    where
        F: FnOnce(&mut HealthSnapshot),
    {
        let applied = self.tx.send_if_modified(|published| {
            if published.generation != ticket.generation {
                return false;
            }
            write(Arc::make_mut(&mut published.snapshot));
            true
        });
        if applied {
            debug!(kind = %kind, generation = ticket.generation, "slice applied");
        } else {
            debug!(
                kind = %kind,
                generation = ticket.generation,
                current = self.generation(),
                "discarding superseded result"
            );
        }
        applied
    }
}

/// Receiver notified after every snapshot change
#[derive(Debug, Clone)]
pub struct SnapshotWatcher {
    rx: watch::Receiver<Published>,
}

impl SnapshotWatcher {
    pub fn current(&self) -> Arc<HealthSnapshot> {
        Arc::clone(&self.rx.borrow().snapshot)
    }

    /// Wait for the next change; `false` once the orchestrator is gone
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Independently written snapshot slices per cycle
const SLICE_COUNT: usize = 11;

type SlotFn<T> = fn(&mut HealthSnapshot) -> &mut T;
type ScalarNormalizer = fn(MetricKind, GatewayResult) -> MetricAggregate<f64>;

/// Coordinates authorization and fetch cycles against one gateway
pub struct HealthDataOrchestrator<G: HealthGateway> {
    gateway: Arc<G>,
    config: AggregatorConfig,
    offset: FixedOffset,
    workouts: WorkoutAggregator,
    state: watch::Sender<AuthorizationState>,
    store: SnapshotStore,
}

impl<G: HealthGateway> HealthDataOrchestrator<G> {
    pub fn new(
        gateway: Arc<G>,
        config: AggregatorConfig,
        date: NaiveDate,
    ) -> Result<Self, ComputeError> {
        config.validate()?;
        let offset = config.utc_offset()?;
        let workouts = WorkoutAggregator::new(config.clock_formatter()?, config.include_manually_added);
        Ok(Self {
            gateway,
            config,
            offset,
            workouts,
            state: watch::channel(AuthorizationState::Uninitialized).0,
            store: SnapshotStore::new(date),
        })
    }

    /// Start on today's date at the configured offset
    pub fn for_today(gateway: Arc<G>, config: AggregatorConfig) -> Result<Self, ComputeError> {
        let today = DaySelection::today(config.utc_offset()?);
        Self::new(gateway, config, today.date())
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn authorization_state(&self) -> AuthorizationState {
        *self.state.borrow()
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.store.current().date
    }

    pub fn snapshot(&self) -> Arc<HealthSnapshot> {
        self.store.current()
    }

    pub fn subscribe(&self) -> SnapshotWatcher {
        self.store.subscribe()
    }

    /// Run the permission handshake once, then fetch the selected date.
    ///
    /// Later calls wait for the first one's handshake and return its state.
    pub async fn activate(&self) -> AuthorizationState {
        let claimed = self.state.send_if_modified(|state| {
            if *state != AuthorizationState::Uninitialized {
                return false;
            }
            *state = AuthorizationState::Authorizing;
            true
        });
        if !claimed {
            return self.settled_state().await;
        }

        let next = if self.handshake().await {
            AuthorizationState::Authorized
        } else {
            AuthorizationState::Unauthorized
        };
        self.state.send_replace(next);

        if next == AuthorizationState::Authorized {
            let ticket = self.store.begin(self.selected_date(), true);
            self.run(ticket).await;
        }
        next
    }

    async fn settled_state(&self) -> AuthorizationState {
        let mut rx = self.state.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            if state != AuthorizationState::Authorizing {
                return state;
            }
            if rx.changed().await.is_err() {
                return self.authorization_state();
            }
        }
    }

    async fn handshake(&self) -> bool {
        match self.gateway.is_available().await {
            Ok(true) => {}
            Ok(false) => {
                warn!("health data provider is not available on this device");
                return false;
            }
            Err(err) => {
                warn!(error = %err, "availability check failed");
                return false;
            }
        }

        match self.gateway.request_authorization(&HEALTH_PERMISSIONS).await {
            Ok(()) => {
                info!(scopes = HEALTH_PERMISSIONS.read.len(), "health data access granted");
                true
            }
            Err(err) => {
                warn!(error = %err, "error getting permissions");
                false
            }
        }
    }

    /// Select a date; a new date starts a fresh cycle
    pub async fn select_date(&self, date: NaiveDate) -> FetchOutcome {
        if date == self.selected_date() {
            return FetchOutcome::Unchanged;
        }
        let ticket = self.store.begin(date, true);
        if self.authorization_state() != AuthorizationState::Authorized {
            debug!(%date, "date selected before authorization, nothing fetched");
            return FetchOutcome::NotAuthorized;
        }
        self.run(ticket).await
    }

    /// Move the selection forward or backward by whole days
    pub async fn shift_days(&self, days: i64) -> Result<FetchOutcome, ComputeError> {
        let target = DaySelection::new(self.selected_date()).shift(days)?;
        Ok(self.select_date(target.date()).await)
    }

    /// Re-fetch the selected date; current values stay visible until replaced
    pub async fn refresh(&self) -> FetchOutcome {
        if self.authorization_state() != AuthorizationState::Authorized {
            return FetchOutcome::NotAuthorized;
        }
        let ticket = self.store.begin(self.selected_date(), false);
        self.run(ticket).await
    }

    async fn run(&self, ticket: FetchTicket) -> FetchOutcome {
        let span = info_span!(
            "fetch_cycle",
            request_id = %ticket.request_id,
            generation = ticket.generation,
            date = %ticket.date
        );
        self.run_cycle(ticket).instrument(span).await
    }

    async fn run_cycle(&self, ticket: FetchTicket) -> FetchOutcome {
        let mut report = FetchReport {
            request_id: ticket.request_id,
            generation: ticket.generation,
            date: ticket.date,
            applied: 0,
            discarded: 0,
        };

        let window = match QueryWindow::for_day(
            ticket.date,
            self.offset,
            self.config.include_manually_added,
        ) {
            Ok(window) => window,
            Err(err) => {
                warn!(error = %err, "cannot build query window");
                if self.store.apply(&ticket, MetricKind::Steps, mark_failed) {
                    report.applied = SLICE_COUNT;
                } else {
                    report.discarded = SLICE_COUNT;
                }
                return FetchOutcome::Completed(report);
            }
        };

        info!("fetch cycle started");
        let units = &self.config.units;
        let t = &ticket;
        let w = &window;
        let tasks: Vec<BoxFuture<'_, bool>> = vec![
            self.scalar(t, w, MetricKind::Steps, HealthUnit::Count, Normalizer::quantity, |s| &mut s.steps),
            self.scalar(t, w, MetricKind::Flights, HealthUnit::Count, Normalizer::quantity, |s| &mut s.flights),
            self.scalar(t, w, MetricKind::Distance, units.distance, Normalizer::quantity, |s| &mut s.distance),
            self.scalar(t, w, MetricKind::Weight, units.weight, Normalizer::latest_value, |s| &mut s.weight),
            self.scalar(t, w, MetricKind::Bmi, HealthUnit::Count, Normalizer::latest_value, |s| &mut s.bmi),
            self.scalar(
                t,
                w,
                MetricKind::ActiveEnergy,
                HealthUnit::Kilocalorie,
                Normalizer::summed,
                |s| &mut s.calories_burned,
            ),
            self.reading(t, w, MetricKind::BloodGlucose, units.blood_glucose, |s| &mut s.blood_glucose),
            self.reading(t, w, MetricKind::BodyFat, HealthUnit::Percent, |s| &mut s.body_fat),
            self.reading(t, w, MetricKind::MuscleMass, units.muscle_mass, |s| &mut s.muscle_mass),
            self.sleep(t, w),
            self.workout_list(t, w),
        ];

        for applied in join_all(tasks).await {
            if applied {
                report.applied += 1;
            } else {
                report.discarded += 1;
            }
        }

        info!(
            applied = report.applied,
            discarded = report.discarded,
            "fetch cycle complete"
        );
        FetchOutcome::Completed(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn scalar<'a>(
        &'a self,
        ticket: &'a FetchTicket,
        window: &'a QueryWindow,
        kind: MetricKind,
        unit: HealthUnit,
        normalize: ScalarNormalizer,
        slot: SlotFn<MetricAggregate<f64>>,
    ) -> BoxFuture<'a, bool> {
        async move {
            let result = self.query(kind, &window.with_unit(unit)).await;
            let aggregate = normalize(kind, result);
            self.store
                .apply(ticket, kind, |snapshot| *slot(snapshot) = aggregate)
        }
        .boxed()
    }

    fn reading<'a>(
        &'a self,
        ticket: &'a FetchTicket,
        window: &'a QueryWindow,
        kind: MetricKind,
        unit: HealthUnit,
        slot: SlotFn<ReadingAggregate>,
    ) -> BoxFuture<'a, bool> {
        async move {
            let result = self.query(kind, &window.with_unit(unit)).await;
            let aggregate = Normalizer::latest_reading(kind, result, unit);
            self.store
                .apply(ticket, kind, |snapshot| *slot(snapshot) = aggregate)
        }
        .boxed()
    }

    fn sleep<'a>(&'a self, ticket: &'a FetchTicket, window: &'a QueryWindow) -> BoxFuture<'a, bool> {
        async move {
            let result = self.query(MetricKind::Sleep, window).await;
            let aggregate = SleepReducer::normalize(result);
            self.store
                .apply(ticket, MetricKind::Sleep, |snapshot| snapshot.sleep = aggregate)
        }
        .boxed()
    }

    fn workout_list<'a>(
        &'a self,
        ticket: &'a FetchTicket,
        window: &'a QueryWindow,
    ) -> BoxFuture<'a, bool> {
        async move {
            let result = self.query(MetricKind::Workouts, window).await;
            let workouts = self.workouts.normalize(self.gateway.as_ref(), result).await;
            self.store
                .apply(ticket, MetricKind::Workouts, |snapshot| snapshot.workouts = workouts)
        }
        .boxed()
    }

    async fn query(&self, kind: MetricKind, window: &QueryWindow) -> GatewayResult {
        debug!(kind = %kind, "query dispatched");
        let result = self.gateway.query(kind, window).await;
        debug!(kind = %kind, ok = result.is_ok(), "query settled");
        result
    }
}

/// Every slice carries its fetch error; nothing could be queried
fn mark_failed(snapshot: &mut HealthSnapshot) {
    snapshot.steps = MetricAggregate::error(MetricKind::Steps);
    snapshot.flights = MetricAggregate::error(MetricKind::Flights);
    snapshot.distance = MetricAggregate::error(MetricKind::Distance);
    snapshot.weight = MetricAggregate::error(MetricKind::Weight);
    snapshot.bmi = MetricAggregate::error(MetricKind::Bmi);
    snapshot.calories_burned = MetricAggregate::error(MetricKind::ActiveEnergy);
    snapshot.sleep = SleepAggregate::error();
    snapshot.workouts = Vec::new();
    snapshot.blood_glucose = ReadingAggregate::error(MetricKind::BloodGlucose);
    snapshot.body_fat = ReadingAggregate::error(MetricKind::BodyFat);
    snapshot.muscle_mass = ReadingAggregate::error(MetricKind::MuscleMass);
}
