//! Poll cycle driver: sample → resolve → aggregate → broadcast.

use std::{sync::Arc, time::Duration};

use futures::{stream, StreamExt};
use meter_client::domain::Device;
use serde::Serialize;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    aggregation::{AggregationEngine, AggregationError, Site},
    broadcast::{Broadcaster, DEVICE_DATA_UPDATE, UPDATE_CONSUMPTION_TODAY},
    parameters::{resolve_parameters, ParameterResolver},
    snapshot::DeviceSnapshot,
    store::{DeviceDirectory, ReadingStore, RollupStore, StoreError},
};

/// Shortest base cadence accepted from device scan settings.
const MIN_BASE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub base_interval: Duration,
    pub consumption_interval: Duration,
    pub error_backoff: Duration,
    pub max_concurrency: usize,
    pub channel_group: String,
    pub use_device_scan_interval: bool,
    pub descriptor_ttl: Duration,
    pub utc_offset: UtcOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Sampling,
    Aggregating,
    Broadcasting,
}

/// Elapsed-time gate for the consumption payload. Delayed or skipped cycles
/// do not shift it: the push happens on the first cycle at or after the
/// threshold.
#[derive(Debug, Clone)]
pub struct ConsumptionCadence {
    threshold: Duration,
    last_push: Option<Instant>,
}

impl ConsumptionCadence {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            last_push: None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_push {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.threshold,
        }
    }

    pub fn mark_pushed(&mut self, now: Instant) {
        self.last_push = Some(now);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub devices_total: usize,
    pub devices_published: usize,
    pub devices_failed: usize,
    pub consumption_pushed: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum CycleError {
    #[error("listing devices failed: {0}")]
    Directory(#[source] StoreError),
    #[error("sampling device {device_id} failed: {source}")]
    Sampling {
        device_id: i64,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error("encoding {event} payload failed: {source}")]
    Encode {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub struct Scheduler<S, B> {
    store: Arc<S>,
    broadcaster: Arc<B>,
    resolver: ParameterResolver,
    aggregation: AggregationEngine<S>,
    sites: Vec<Site>,
    settings: SchedulerSettings,
    consumption: ConsumptionCadence,
    phase: CyclePhase,
}

impl<S, B> Scheduler<S, B>
where
    S: DeviceDirectory + ReadingStore + RollupStore + 'static,
    B: Broadcaster + 'static,
{
    pub fn new(store: Arc<S>, broadcaster: Arc<B>, sites: Vec<Site>, settings: SchedulerSettings) -> Self {
        Self {
            aggregation: AggregationEngine::new(Arc::clone(&store), settings.max_concurrency),
            resolver: ParameterResolver::new(settings.descriptor_ttl),
            consumption: ConsumptionCadence::new(settings.consumption_interval),
            store,
            broadcaster,
            sites,
            settings,
            phase: CyclePhase::Idle,
        }
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Runs cycles until `shutdown` is cancelled. Cycle failures are logged
    /// and retried after the error backoff.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(
            base_interval = ?self.settings.base_interval,
            consumption_interval_secs = self.settings.consumption_interval.as_secs(),
            sites = self.sites.len(),
            "telemetry scheduler started"
        );

        while !shutdown.is_cancelled() {
            let delay = match self.run_cycle().await {
                Ok(report) => {
                    tracing::debug!(
                        devices = report.devices_total,
                        published = report.devices_published,
                        failed = report.devices_failed,
                        consumption_pushed = report.consumption_pushed,
                        "telemetry cycle completed"
                    );
                    self.next_delay().await
                }
                Err(e) => {
                    metrics::counter!("telemetry_cycle_failures_total").increment(1);
                    tracing::error!(
                        error = %e,
                        backoff_secs = self.settings.error_backoff.as_secs(),
                        "telemetry cycle failed, backing off"
                    );
                    self.settings.error_backoff
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("telemetry scheduler stopped");
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let local_now = local_now(self.settings.utc_offset);
        self.run_cycle_at(Instant::now(), local_now).await
    }

    /// One full cycle against explicit monotonic and local wall-clock times.
    pub async fn run_cycle_at(
        &mut self,
        now: Instant,
        local_now: PrimitiveDateTime,
    ) -> Result<CycleReport, CycleError> {
        let started = std::time::Instant::now();
        let result = self.cycle(now, local_now).await;
        self.phase = CyclePhase::Idle;

        metrics::counter!("telemetry_cycles_total").increment(1);
        metrics::histogram!("telemetry_cycle_duration_seconds").record(started.elapsed().as_secs_f64());
        result
    }

    async fn cycle(
        &mut self,
        now: Instant,
        local_now: PrimitiveDateTime,
    ) -> Result<CycleReport, CycleError> {
        self.phase = CyclePhase::Sampling;
        let (snapshots, mut report) = self.sample_devices().await?;

        // A site that fails with a query error skips this push; it stays due
        // and is retried on the next cycle.
        let consumption = if self.consumption.is_due(now) {
            self.phase = CyclePhase::Aggregating;
            match self.aggregation.consumption_today(&self.sites, local_now).await {
                Ok(payload) => Some(payload),
                Err(e) if e.is_unavailable() => return Err(e.into()),
                Err(e) => {
                    metrics::counter!("consumption_today_failures_total").increment(1);
                    tracing::warn!(
                        site = %e.site,
                        window = %e.window,
                        error = %e.source,
                        "site consumption failed, skipping consumption push this cycle"
                    );
                    None
                }
            }
        } else {
            None
        };

        self.phase = CyclePhase::Broadcasting;
        self.publish(DEVICE_DATA_UPDATE, &snapshots).await?;
        metrics::gauge!("telemetry_devices_published").set(snapshots.len() as f64);

        if let Some(payload) = consumption {
            self.publish(UPDATE_CONSUMPTION_TODAY, &payload).await?;
            self.consumption.mark_pushed(now);
            metrics::counter!("consumption_today_pushes_total").increment(1);
            report.consumption_pushed = true;
        }

        Ok(report)
    }

    async fn sample_devices(&self) -> Result<(Vec<DeviceSnapshot>, CycleReport), CycleError> {
        let devices = self
            .store
            .list_devices()
            .await
            .map_err(CycleError::Directory)?;

        let mut report = CycleReport {
            devices_total: devices.len(),
            ..CycleReport::default()
        };
        let mut snapshots = Vec::with_capacity(devices.len());

        let mut sampled = stream::iter(devices)
            .map(|device| async move {
                let device_id = device.id;
                (device_id, self.sample_device(device).await)
            })
            .buffered(self.settings.max_concurrency.max(1));

        while let Some((device_id, result)) = sampled.next().await {
            match result {
                Ok(Some(snapshot)) => snapshots.push(snapshot),
                Ok(None) => {}
                Err(source) if source.is_unavailable() => {
                    return Err(CycleError::Sampling { device_id, source });
                }
                Err(e) => {
                    report.devices_failed += 1;
                    metrics::counter!("telemetry_device_failures_total").increment(1);
                    tracing::warn!(device_id, error = %e, "sampling device failed, omitting it from this cycle");
                }
            }
        }

        report.devices_published = snapshots.len();
        Ok((snapshots, report))
    }

    /// Snapshot entry of one device, or `None` when it has nothing to show.
    async fn sample_device(&self, device: Device) -> Result<Option<DeviceSnapshot>, StoreError> {
        let Some(reading) = self.store.latest_reading(device.id, device.class).await? else {
            return Ok(None);
        };

        let plate = self
            .resolver
            .descriptor(self.store.as_ref(), device.vendor_id)
            .await?;
        let parameters = resolve_parameters(&reading, plate.as_deref());
        if parameters.is_empty() {
            return Ok(None);
        }

        Ok(Some(DeviceSnapshot::new(&device, parameters)))
    }

    /// Fire-and-forget: transport failures are logged and not retried.
    async fn publish<T: Serialize>(&self, event: &'static str, payload: &T) -> Result<(), CycleError> {
        let payload = serde_json::to_value(payload).map_err(|source| CycleError::Encode { event, source })?;

        match self
            .broadcaster
            .push(&self.settings.channel_group, event, payload)
            .await
        {
            Ok(members) => {
                tracing::debug!(event, members, group = %self.settings.channel_group, "payload pushed");
            }
            Err(e) => {
                metrics::counter!("broadcast_failures_total").increment(1);
                tracing::warn!(event, error = %e, group = %self.settings.channel_group, "push failed");
            }
        }
        Ok(())
    }

    async fn next_delay(&self) -> Duration {
        if !self.settings.use_device_scan_interval {
            return self.settings.base_interval;
        }

        match self.store.average_scan_interval().await {
            Ok(Some(interval)) => interval.max(MIN_BASE_INTERVAL),
            Ok(None) => self.settings.base_interval,
            Err(e) => {
                tracing::warn!(error = %e, "reading device scan intervals failed, using configured cadence");
                self.settings.base_interval
            }
        }
    }
}

/// Current wall-clock time at the configured offset, as stored in the rollup tables.
pub fn local_now(offset: UtcOffset) -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc().to_offset(offset);
    PrimitiveDateTime::new(now.date(), now.time())
}
