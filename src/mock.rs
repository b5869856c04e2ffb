//! Demo fleet data for the safety score report.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    errors::DashboardError,
    models::{Driver, Trip},
    scoring::{self, DriverMetrics, DriverStatus, FleetStats, RecentAlertView},
};

const BUILTIN_FLEET: &str = include_str!("../data/mock_fleet.json");

/// Drivers and their trip log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockFleet {
    /// Instant the data set was recorded around; reports default to it
    pub reference_time: Option<DateTime<Utc>>,
    pub drivers: Vec<Driver>,
    pub trips: Vec<Trip>,
}

impl MockFleet {
    /// The demo fleet shipped with the crate
    pub fn builtin() -> Result<Self, DashboardError> {
        Ok(serde_json::from_str(BUILTIN_FLEET)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, DashboardError> {
        debug!("Loading fleet data from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn report(&self, now: DateTime<Utc>) -> FleetReport {
        let drivers = self
            .drivers
            .iter()
            .map(|d| DriverReport {
                id: d.id.clone(),
                name: d.name.clone(),
                vehicle_id: d.vehicle_id.clone(),
                status: scoring::driver_status(&d.id, &self.trips, now),
                metrics: scoring::driver_metrics(&d.id, &self.trips, now),
            })
            .collect();

        FleetReport {
            generated_at: now,
            fleet: scoring::fleet_stats(&self.drivers, &self.trips, now),
            drivers,
            recent_alerts: scoring::recent_alerts(&self.trips, 5, now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverReport {
    pub id: String,
    pub name: String,
    pub vehicle_id: String,
    pub status: DriverStatus,
    pub metrics: DriverMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetReport {
    pub generated_at: DateTime<Utc>,
    pub fleet: FleetStats,
    pub drivers: Vec<DriverReport>,
    pub recent_alerts: Vec<RecentAlertView>,
}
