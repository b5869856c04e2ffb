//! Driver and fleet dashboards on top of the polling service

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::{
    api::ApiClient,
    config::{ApiConfig, PollingConfig},
    errors::DashboardError,
    histogram::{self, BarScale, CountBar, SeverityBar},
    models::{
        AdminDriverSummary, AdminRecentAlert, AlertLevelSummary, AlertSlots, DeviceReading,
        DriverOverview,
    },
    polling::{Cadence, Clock, PollSource, PollingService, Subscription},
    reducer::{self, DangerCooldown, HistorySummary},
};

/// State of the driver dashboard after one history poll
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverSnapshot {
    pub device_id: String,
    pub summary: HistorySummary,
    /// Debounced stamp of the last danger event seen by this poller
    pub last_critical_at: Option<DateTime<Utc>>,
    pub histogram: Vec<SeverityBar>,
}

pub fn history_key(device_id: &str) -> String {
    format!("device/{}/history", device_id)
}

pub fn latest_key(device_id: &str) -> String {
    format!("device/{}/latest", device_id)
}

/// Polls `/devices/{id}/history` and folds it into a [`DriverSnapshot`]
pub struct DeviceHistorySource {
    client: ApiClient,
    device_id: String,
    limit: u32,
    cooldown: Mutex<DangerCooldown>,
    clock: Arc<dyn Clock>,
}

impl DeviceHistorySource {
    pub fn new(client: ApiClient, device_id: &str, limit: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            device_id: device_id.to_string(),
            limit,
            cooldown: Mutex::new(DangerCooldown::new()),
            clock,
        }
    }
}

#[async_trait]
impl PollSource for DeviceHistorySource {
    type Output = DriverSnapshot;

    async fn fetch(&self) -> Result<DriverSnapshot, DashboardError> {
        let history = self
            .client
            .device_history(&self.device_id, self.limit)
            .await?;
        let summary = reducer::reduce_history(&history.data);

        let last_critical_at = {
            let mut cooldown = self
                .cooldown
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if cooldown.observe(&summary, self.clock.now()) {
                debug!(device = %self.device_id, "Danger event observed");
            }
            cooldown.last_critical_at()
        };

        let histogram = histogram::severity_histogram(
            &summary.events,
            &histogram::driver_buckets(),
            BarScale::DRIVER,
        );

        Ok(DriverSnapshot {
            device_id: self.device_id.clone(),
            summary,
            last_critical_at,
            histogram,
        })
    }

    fn boost_anchor(&self, value: &DriverSnapshot) -> Option<DateTime<Utc>> {
        value.last_critical_at
    }
}

/// Polls `/devices/{id}/data`
pub struct DeviceLatestSource {
    client: ApiClient,
    device_id: String,
}

impl DeviceLatestSource {
    pub fn new(client: ApiClient, device_id: &str) -> Self {
        Self {
            client,
            device_id: device_id.to_string(),
        }
    }
}

#[async_trait]
impl PollSource for DeviceLatestSource {
    type Output = DeviceReading;

    async fn fetch(&self) -> Result<DeviceReading, DashboardError> {
        self.client.device_latest(&self.device_id).await
    }
}

/// Subscribe to a driver's history with the adaptive cadence
pub fn watch_driver(
    service: &PollingService,
    client: &ApiClient,
    device_id: &str,
    api: &ApiConfig,
    polling: &PollingConfig,
) -> Result<Subscription<DriverSnapshot>, DashboardError> {
    let source = DeviceHistorySource::new(
        client.clone(),
        device_id,
        api.history_limit,
        service.clock(),
    );
    service.subscribe(&history_key(device_id), source, Cadence::boosted(polling))
}

pub fn watch_latest(
    service: &PollingService,
    client: &ApiClient,
    device_id: &str,
    polling: &PollingConfig,
) -> Result<Subscription<DeviceReading>, DashboardError> {
    service.subscribe(
        &latest_key(device_id),
        DeviceLatestSource::new(client.clone(), device_id),
        Cadence::Fixed(polling.fast_interval),
    )
}

pub struct OverviewSource(pub ApiClient);

#[async_trait]
impl PollSource for OverviewSource {
    type Output = DriverOverview;

    async fn fetch(&self) -> Result<DriverOverview, DashboardError> {
        self.0.admin_overview().await
    }
}

pub struct DriversSource(pub ApiClient);

#[async_trait]
impl PollSource for DriversSource {
    type Output = Vec<AdminDriverSummary>;

    async fn fetch(&self) -> Result<Vec<AdminDriverSummary>, DashboardError> {
        Ok(self.0.admin_drivers().await?.drivers)
    }
}

pub struct RecentAlertsSource {
    pub client: ApiClient,
    pub limit: u32,
}

#[async_trait]
impl PollSource for RecentAlertsSource {
    type Output = Vec<AdminRecentAlert>;

    /// A response without an alert list keeps the previous one
    async fn fetch(&self) -> Result<Vec<AdminRecentAlert>, DashboardError> {
        self.client
            .admin_recent_alerts(self.limit)
            .await?
            .alerts
            .ok_or_else(|| DashboardError::EmptyPoll("recent alerts".to_string()))
    }
}

/// Fleet alert histogram with its busiest slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotHistogram {
    pub bars: Vec<CountBar>,
    pub peak_slot: String,
    pub peak_count: u32,
}

impl SlotHistogram {
    /// Merge slots onto the fleet buckets.
    ///
    /// The server's peak is used when it reports a non-empty label with a
    /// positive count, otherwise the first bucket with the highest count
    /// (`-` and 0 when every bucket is empty).
    pub fn from_slots(slots: &AlertSlots) -> Option<Self> {
        let merged = histogram::merge_slots(slots.slots.as_deref()?, &histogram::fleet_buckets());
        let computed = merged
            .iter()
            .filter(|slot| slot.count > 0)
            .fold(None::<(&str, u32)>, |best, slot| match best {
                Some((_, count)) if count >= slot.count => best,
                _ => Some((slot.label.as_str(), slot.count)),
            });

        let (peak_slot, peak_count) = match (&slots.peak_slot, slots.peak_count) {
            (Some(label), Some(count)) if !label.trim().is_empty() && count > 0 => {
                (label.clone(), count)
            }
            _ => computed
                .map(|(label, count)| (label.to_string(), count))
                .unwrap_or_else(|| ("-".to_string(), 0)),
        };

        Some(Self {
            bars: histogram::count_histogram(&merged, BarScale::FLEET),
            peak_slot,
            peak_count,
        })
    }
}

pub struct AlertSlotsSource(pub ApiClient);

#[async_trait]
impl PollSource for AlertSlotsSource {
    type Output = SlotHistogram;

    async fn fetch(&self) -> Result<SlotHistogram, DashboardError> {
        let slots = self.0.admin_alert_slots().await?;
        SlotHistogram::from_slots(&slots)
            .ok_or_else(|| DashboardError::EmptyPoll("alert slots".to_string()))
    }
}

pub struct AlertLevelsSource(pub ApiClient);

#[async_trait]
impl PollSource for AlertLevelsSource {
    type Output = AlertLevelSummary;

    async fn fetch(&self) -> Result<AlertLevelSummary, DashboardError> {
        self.0.admin_alert_levels().await
    }
}

/// One page of a filtered list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based
    pub page: usize,
    pub pages: usize,
    pub total: usize,
}

/// Slice `items` into pages of `size` and return page `page` (1-based,
/// clamped to the last page)
pub fn paginate<T: Clone>(items: &[T], page: usize, size: usize) -> Page<T> {
    let size = size.max(1);
    let pages = items.len().div_ceil(size).max(1);
    let page = page.clamp(1, pages);
    let start = (page - 1) * size;
    Page {
        items: items.iter().skip(start).take(size).cloned().collect(),
        page,
        pages,
        total: items.len(),
    }
}

/// What the fleet dashboard shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetView {
    pub overview: Option<DriverOverview>,
    pub drivers: Page<AdminDriverSummary>,
    pub alerts: Page<AdminRecentAlert>,
    pub slots: Option<SlotHistogram>,
    pub levels: Option<AlertLevelSummary>,
}

/// Driver search and pagination on the fleet dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetQuery {
    pub search: String,
    pub driver_page: usize,
    pub driver_page_size: usize,
    pub alert_page: usize,
    pub alert_page_size: usize,
}

impl Default for FleetQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            driver_page: 1,
            driver_page_size: 5,
            alert_page: 1,
            alert_page_size: 5,
        }
    }
}

/// Subscriptions behind the master dashboard, all on the admin cadence
pub struct FleetDashboard {
    overview: Subscription<DriverOverview>,
    drivers: Subscription<Vec<AdminDriverSummary>>,
    alerts: Subscription<Vec<AdminRecentAlert>>,
    slots: Subscription<SlotHistogram>,
    levels: Subscription<AlertLevelSummary>,
}

impl FleetDashboard {
    pub fn watch(
        service: &PollingService,
        client: &ApiClient,
        api: &ApiConfig,
        polling: &PollingConfig,
    ) -> Result<Self, DashboardError> {
        let cadence = Cadence::Fixed(polling.admin_interval);
        Ok(Self {
            overview: service.subscribe(
                "admin/overview",
                OverviewSource(client.clone()),
                cadence,
            )?,
            drivers: service.subscribe("admin/drivers", DriversSource(client.clone()), cadence)?,
            alerts: service.subscribe(
                &format!("admin/recent-alerts?limit={}", api.recent_alerts_limit),
                RecentAlertsSource {
                    client: client.clone(),
                    limit: api.recent_alerts_limit,
                },
                cadence,
            )?,
            slots: service.subscribe(
                "admin/alert-slots",
                AlertSlotsSource(client.clone()),
                cadence,
            )?,
            levels: service.subscribe(
                "admin/alert-levels",
                AlertLevelsSource(client.clone()),
                cadence,
            )?,
        })
    }

    /// Wait until the driver list has been fetched once
    pub async fn ready(&mut self) -> bool {
        if self.drivers.latest().is_some() {
            return true;
        }
        self.drivers.next().await.is_some()
    }

    pub async fn changed(&mut self) -> bool {
        tokio::select! {
            v = self.overview.next() => v.is_some(),
            v = self.drivers.next() => v.is_some(),
            v = self.alerts.next() => v.is_some(),
            v = self.slots.next() => v.is_some(),
            v = self.levels.next() => v.is_some(),
        }
    }

    pub fn view(&self, query: &FleetQuery) -> FleetView {
        let drivers: Vec<AdminDriverSummary> = self
            .drivers
            .latest()
            .unwrap_or_default()
            .into_iter()
            .filter(|d| d.matches(&query.search))
            .collect();
        let alerts = self.alerts.latest().unwrap_or_default();

        FleetView {
            overview: self.overview.latest(),
            drivers: paginate(&drivers, query.driver_page, query.driver_page_size),
            alerts: paginate(&alerts, query.alert_page, query.alert_page_size),
            slots: self.slots.latest(),
            levels: self.levels.latest(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertSlot;

    fn slot(label: &str, count: u32) -> AlertSlot {
        AlertSlot {
            label: label.to_string(),
            count,
        }
    }

    #[test]
    fn paginate_clamps_page() {
        let items: Vec<u32> = (1..=12).collect();

        let first = paginate(&items, 1, 5);
        assert_eq!(first.items, vec![1, 2, 3, 4, 5]);
        assert_eq!(first.pages, 3);

        let last = paginate(&items, 9, 5);
        assert_eq!(last.page, 3);
        assert_eq!(last.items, vec![11, 12]);

        let empty = paginate::<u32>(&[], 1, 5);
        assert_eq!(empty.pages, 1);
        assert!(empty.items.is_empty());
    }

    #[test]
    fn slot_histogram_computes_peak_when_missing() {
        let slots = AlertSlots {
            slots: Some(vec![slot("08-10", 3), slot("16-18", 5), slot("03-05", 9)]),
            peak_slot: None,
            peak_count: None,
        };

        let hist = SlotHistogram::from_slots(&slots).unwrap();
        assert_eq!(hist.bars.len(), 9);
        assert_eq!(hist.peak_slot, "16-18");
        assert_eq!(hist.peak_count, 5);
        assert_eq!(hist.bars[0].height, 4.0);
        assert_eq!(hist.bars[5].height, 64.0);
    }

    #[test]
    fn slot_histogram_prefers_server_peak() {
        let slots = AlertSlots {
            slots: Some(vec![]),
            peak_slot: Some("22-24".to_string()),
            peak_count: Some(2),
        };
        let hist = SlotHistogram::from_slots(&slots).unwrap();
        assert_eq!(hist.peak_slot, "22-24");

        let missing = AlertSlots::default();
        assert!(SlotHistogram::from_slots(&missing).is_none());
    }

    #[test]
    fn blank_server_peak_falls_back() {
        let blank = AlertSlots {
            slots: Some(vec![slot("10-12", 4)]),
            peak_slot: Some("".to_string()),
            peak_count: Some(0),
        };
        let hist = SlotHistogram::from_slots(&blank).unwrap();
        assert_eq!(hist.peak_slot, "10-12");
        assert_eq!(hist.peak_count, 4);

        let zero = AlertSlots {
            slots: Some(vec![]),
            peak_slot: Some("18-20".to_string()),
            peak_count: Some(0),
        };
        let hist = SlotHistogram::from_slots(&zero).unwrap();
        assert_eq!(hist.peak_slot, "-");
        assert_eq!(hist.peak_count, 0);
    }

    #[test]
    fn empty_slots_have_no_peak() {
        let slots = AlertSlots {
            slots: Some(vec![slot("06-08", 0)]),
            ..AlertSlots::default()
        };
        let hist = SlotHistogram::from_slots(&slots).unwrap();
        assert_eq!(hist.peak_slot, "-");
        assert_eq!(hist.peak_count, 0);
    }
}
