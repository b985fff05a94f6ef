//! Site-level consumption over the dashboard's three time windows.
//!
//! Month-to-date and previous-day figures sum day buckets; the today figure
//! takes only the newest cumulative snapshot per device. The two rollup
//! tables have different semantics and must not be unified.

use std::{fmt, sync::Arc};

use futures::{stream, StreamExt, TryStreamExt};
use meter_client::domain::DateRange;
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::{
    snapshot::{round_to, SiteConsumptionToday},
    store::{RollupStore, StoreError},
};

/// Decimal places of consumption figures sent to clients.
const CONSUMPTION_DIGITS: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumptionWindow {
    MonthToDate,
    Today,
    PreviousCalendarDay,
}

impl ConsumptionWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MonthToDate => "month_to_date",
            Self::Today => "today",
            Self::PreviousCalendarDay => "previous_day",
        }
    }

    /// Bucket dates covered by the window for a local reference time.
    pub fn date_range(&self, reference: PrimitiveDateTime) -> Option<DateRange> {
        let today = reference.date();
        match self {
            Self::MonthToDate => Some(DateRange::month_to_date(today)),
            Self::Today => Some(DateRange::single(today)),
            Self::PreviousCalendarDay => today.previous_day().map(DateRange::single),
        }
    }
}

impl fmt::Display for ConsumptionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named group of meters. Gas consumption is only computed for sites
/// listing gas meters explicitly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Site {
    pub name: String,
    #[serde(default)]
    pub electricity_meters: Vec<i64>,
    #[serde(default)]
    pub gas_meters: Vec<i64>,
}

#[derive(thiserror::Error, Debug)]
#[error("consumption of site '{site}' over {window} failed: {source}")]
pub struct AggregationError {
    pub site: String,
    pub window: ConsumptionWindow,
    #[source]
    pub source: StoreError,
}

impl AggregationError {
    pub fn is_unavailable(&self) -> bool {
        self.source.is_unavailable()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowConsumption {
    pub window: &'static str,
    pub from: String,
    pub to: String,
    pub electricity_consumption: f64,
    pub gas_consumption: f64,
}

/// All three windows for one site.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConsumptionReport {
    pub site_name: String,
    pub month_to_date: WindowConsumption,
    pub today: WindowConsumption,
    pub previous_day: WindowConsumption,
}

pub struct AggregationEngine<R> {
    store: Arc<R>,
    max_concurrency: usize,
}

impl<R> Clone for AggregationEngine<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            max_concurrency: self.max_concurrency,
        }
    }
}

impl<R: RollupStore> AggregationEngine<R> {
    pub fn new(store: Arc<R>, max_concurrency: usize) -> Self {
        Self {
            store,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Consumption of a set of meters over `window`, never negative.
    pub async fn compute_site_consumption(
        &self,
        device_ids: &[i64],
        window: ConsumptionWindow,
        reference: PrimitiveDateTime,
    ) -> Result<f64, StoreError> {
        stream::iter(device_ids.iter().copied())
            .map(|device_id| self.device_consumption(device_id, window, reference))
            .buffered(self.max_concurrency)
            .try_fold(0.0, |total, value| async move { Ok(total + value) })
            .await
    }

    async fn device_consumption(
        &self,
        device_id: i64,
        window: ConsumptionWindow,
        reference: PrimitiveDateTime,
    ) -> Result<f64, StoreError> {
        let raw = match window {
            ConsumptionWindow::Today => self
                .store
                .latest_today_value(device_id, reference)
                .await?
                .unwrap_or(0.0),
            ConsumptionWindow::MonthToDate | ConsumptionWindow::PreviousCalendarDay => {
                match window.date_range(reference) {
                    Some(range) => self
                        .store
                        .daily_values(device_id, range)
                        .await?
                        .into_iter()
                        .map(|(_, value)| value)
                        .sum(),
                    None => 0.0,
                }
            }
        };

        if raw < 0.0 {
            tracing::debug!(device_id, window = %window, value = raw, "negative consumption clamped to zero");
        }
        Ok(clamp_consumption(raw))
    }

    /// Electricity and gas figures of one site over one window.
    pub async fn site_totals(
        &self,
        site: &Site,
        window: ConsumptionWindow,
        reference: PrimitiveDateTime,
    ) -> Result<(f64, f64), AggregationError> {
        let wrap = |source| AggregationError {
            site: site.name.clone(),
            window,
            source,
        };

        let electricity = self
            .compute_site_consumption(&site.electricity_meters, window, reference)
            .await
            .map_err(wrap)?;

        let gas = if site.gas_meters.is_empty() {
            0.0
        } else {
            self.compute_site_consumption(&site.gas_meters, window, reference)
                .await
                .map_err(wrap)?
        };

        Ok((
            round_to(electricity, CONSUMPTION_DIGITS),
            round_to(gas, CONSUMPTION_DIGITS),
        ))
    }

    /// Payload of the `UpdateConsumptionToday` event.
    pub async fn consumption_today(
        &self,
        sites: &[Site],
        reference: PrimitiveDateTime,
    ) -> Result<Vec<SiteConsumptionToday>, AggregationError> {
        let mut out = Vec::with_capacity(sites.len());
        for site in sites {
            let (electricity, gas) = self
                .site_totals(site, ConsumptionWindow::Today, reference)
                .await?;
            out.push(SiteConsumptionToday {
                site_name: site.name.clone(),
                electricity_consumption: electricity,
                gas_consumption: gas,
            });
        }
        Ok(out)
    }

    pub async fn consumption_report(
        &self,
        sites: &[Site],
        reference: PrimitiveDateTime,
    ) -> Result<Vec<SiteConsumptionReport>, AggregationError> {
        let mut out = Vec::with_capacity(sites.len());
        for site in sites {
            out.push(SiteConsumptionReport {
                site_name: site.name.clone(),
                month_to_date: self
                    .window_consumption(site, ConsumptionWindow::MonthToDate, reference)
                    .await?,
                today: self
                    .window_consumption(site, ConsumptionWindow::Today, reference)
                    .await?,
                previous_day: self
                    .window_consumption(site, ConsumptionWindow::PreviousCalendarDay, reference)
                    .await?,
            });
        }
        Ok(out)
    }

    async fn window_consumption(
        &self,
        site: &Site,
        window: ConsumptionWindow,
        reference: PrimitiveDateTime,
    ) -> Result<WindowConsumption, AggregationError> {
        let (electricity, gas) = self.site_totals(site, window, reference).await?;
        let (from, to) = match window.date_range(reference) {
            Some(range) => (range.start.to_string(), range.end.to_string()),
            None => (String::new(), String::new()),
        };
        Ok(WindowConsumption {
            window: window.as_str(),
            from,
            to,
            electricity_consumption: electricity,
            gas_consumption: gas,
        })
    }
}

fn clamp_consumption(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;
    use crate::store::memory::InMemoryStore;

    fn engine(store: InMemoryStore) -> AggregationEngine<InMemoryStore> {
        AggregationEngine::new(Arc::new(store), 4)
    }

    fn site(name: &str, electricity: &[i64], gas: &[i64]) -> Site {
        Site {
            name: name.to_string(),
            electricity_meters: electricity.to_vec(),
            gas_meters: gas.to_vec(),
        }
    }

    #[tokio::test]
    async fn month_to_date_sums_day_buckets_across_devices() {
        let store = InMemoryStore::new()
            .with_daily(1, date!(2024 - 03 - 01), 10.0)
            .with_daily(1, date!(2024 - 03 - 02), 15.0)
            .with_daily(2, date!(2024 - 03 - 01), 5.0)
            // previous month, outside the window
            .with_daily(1, date!(2024 - 02 - 29), 100.0);

        let total = engine(store)
            .compute_site_consumption(&[1, 2], ConsumptionWindow::MonthToDate, datetime!(2024-03-02 13:00))
            .await
            .expect("store is up");

        assert_eq!(total, 30.0);
    }

    #[tokio::test]
    async fn device_totals_are_added_in_meter_order() {
        let store = Arc::new(
            InMemoryStore::new()
                .with_today(1, datetime!(2024-03-02 12:00), 0.1)
                .with_today(2, datetime!(2024-03-02 12:00), 0.2)
                .with_today(3, datetime!(2024-03-02 12:00), 0.3),
        );

        for concurrency in [1, 2, 3] {
            let total = AggregationEngine::new(Arc::clone(&store), concurrency)
                .compute_site_consumption(&[1, 2, 3], ConsumptionWindow::Today, datetime!(2024-03-02 13:00))
                .await
                .expect("store is up");
            assert_eq!(total.to_bits(), (0.0 + 0.1 + 0.2 + 0.3f64).to_bits());
        }
    }

    #[tokio::test]
    async fn today_takes_latest_snapshot_not_the_sum() {
        let store = InMemoryStore::new()
            .with_today(1, datetime!(2024-03-02 08:00), 3.0)
            .with_today(1, datetime!(2024-03-02 12:00), 7.0)
            // after the reference time
            .with_today(1, datetime!(2024-03-02 14:00), 9.0);

        let total = engine(store)
            .compute_site_consumption(&[1], ConsumptionWindow::Today, datetime!(2024-03-02 13:00))
            .await
            .expect("store is up");

        assert_eq!(total, 7.0);
    }

    #[tokio::test]
    async fn today_sums_latest_values_across_devices() {
        let store = InMemoryStore::new()
            .with_today(1, datetime!(2024-03-02 08:00), 3.0)
            .with_today(1, datetime!(2024-03-02 12:00), 7.0)
            .with_today(2, datetime!(2024-03-02 11:30), 4.5)
            // yesterday's final snapshot does not carry over
            .with_today(3, datetime!(2024-03-01 23:50), 40.0);

        let total = engine(store)
            .compute_site_consumption(&[1, 2, 3], ConsumptionWindow::Today, datetime!(2024-03-02 13:00))
            .await
            .expect("store is up");

        assert_eq!(total, 11.5);
    }

    #[tokio::test]
    async fn previous_day_sums_only_yesterday() {
        let store = InMemoryStore::new()
            .with_daily(1, date!(2024 - 03 - 01), 10.0)
            .with_daily(1, date!(2024 - 03 - 02), 15.0)
            .with_daily(2, date!(2024 - 03 - 01), 5.0);

        let total = engine(store)
            .compute_site_consumption(&[1, 2], ConsumptionWindow::PreviousCalendarDay, datetime!(2024-03-02 13:00))
            .await
            .expect("store is up");

        assert_eq!(total, 15.0);
    }

    #[tokio::test]
    async fn absent_devices_contribute_zero() {
        let engine = engine(InMemoryStore::new().with_daily(1, date!(2024 - 03 - 01), 10.0));
        let at = datetime!(2024-03-02 13:00);

        for window in [ConsumptionWindow::MonthToDate, ConsumptionWindow::Today] {
            let total = engine
                .compute_site_consumption(&[42], window, at)
                .await
                .expect("store is up");
            assert_eq!(total, 0.0, "{window}");
        }

        let with_absent = engine
            .compute_site_consumption(&[1, 42], ConsumptionWindow::MonthToDate, at)
            .await
            .expect("store is up");
        assert_eq!(with_absent, 10.0);
    }

    #[tokio::test]
    async fn negative_contributions_are_clamped() {
        let store = InMemoryStore::new()
            .with_daily(1, date!(2024 - 03 - 01), 10.0)
            .with_daily(2, date!(2024 - 03 - 01), -4.0)
            .with_today(3, datetime!(2024-03-02 09:00), -1.0);
        let engine = engine(store);
        let at = datetime!(2024-03-02 13:00);

        let month = engine
            .compute_site_consumption(&[1, 2], ConsumptionWindow::MonthToDate, at)
            .await
            .expect("store is up");
        assert_eq!(month, 10.0);

        let today = engine
            .compute_site_consumption(&[3], ConsumptionWindow::Today, at)
            .await
            .expect("store is up");
        assert_eq!(today, 0.0);
    }

    #[tokio::test]
    async fn gas_is_zero_for_sites_without_gas_meters() {
        let store = InMemoryStore::new()
            .with_today(1, datetime!(2024-03-02 12:00), 7.0)
            .with_today(5, datetime!(2024-03-02 12:00), 2.25);

        let payload = engine(store)
            .consumption_today(
                &[site("North", &[1], &[5]), site("South", &[1], &[])],
                datetime!(2024-03-02 13:00),
            )
            .await
            .expect("store is up");

        assert_eq!(
            payload,
            vec![
                SiteConsumptionToday {
                    site_name: "North".to_string(),
                    electricity_consumption: 7.0,
                    gas_consumption: 2.25,
                },
                SiteConsumptionToday {
                    site_name: "South".to_string(),
                    electricity_consumption: 7.0,
                    gas_consumption: 0.0,
                },
            ]
        );
    }

    #[tokio::test]
    async fn report_covers_all_three_windows() {
        let store = InMemoryStore::new()
            .with_daily(1, date!(2024 - 03 - 01), 10.0)
            .with_daily(1, date!(2024 - 03 - 02), 15.0)
            .with_today(1, datetime!(2024-03-02 12:00), 7.0);

        let report = engine(store)
            .consumption_report(&[site("North", &[1], &[])], datetime!(2024-03-02 13:00))
            .await
            .expect("store is up");

        let north = &report[0];
        assert_eq!(north.month_to_date.electricity_consumption, 25.0);
        assert_eq!(north.month_to_date.from, "2024-03-01");
        assert_eq!(north.month_to_date.to, "2024-03-02");
        assert_eq!(north.today.electricity_consumption, 7.0);
        assert_eq!(north.previous_day.electricity_consumption, 10.0);
        assert_eq!(north.previous_day.from, "2024-03-01");
    }

    #[tokio::test]
    async fn store_failures_name_the_site_and_window() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);

        let err = engine(store)
            .consumption_today(&[site("North", &[1], &[])], datetime!(2024-03-02 13:00))
            .await
            .expect_err("store is down");

        assert_eq!(err.site, "North");
        assert_eq!(err.window, ConsumptionWindow::Today);
        assert!(err.is_unavailable());
    }
}
