//! Folding device history into driver dashboard state.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Serialize;

use crate::models::{AlertEvent, DeviceReading, DrowsinessLevel, Severity};

/// Minimum spacing between two danger cooldown stamps, in seconds
pub const DANGER_COOLDOWN_SECS: i64 = 120;

/// Verdict shown next to the latest reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrivingStatus {
    ReadyToDrive,
    StayAlert,
    RestImmediately,
}

impl DrivingStatus {
    pub fn from_level(level: DrowsinessLevel) -> Self {
        match level {
            DrowsinessLevel::High => DrivingStatus::RestImmediately,
            DrowsinessLevel::Medium => DrivingStatus::StayAlert,
            DrowsinessLevel::Low | DrowsinessLevel::Unknown => DrivingStatus::ReadyToDrive,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            DrivingStatus::ReadyToDrive => "Ready to drive",
            DrivingStatus::StayAlert => "Stay alert",
            DrivingStatus::RestImmediately => "Rest immediately",
        }
    }
}

/// Status of the newest reading, whatever its level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestStatus {
    pub drowsiness_level: DrowsinessLevel,
    pub status: String,
    pub driving_status: DrivingStatus,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct HistorySummary {
    pub latest: Option<LatestStatus>,
    /// Medium and high readings, newest first
    pub events: Vec<AlertEvent>,
}

impl HistorySummary {
    pub fn events_today(&self) -> usize {
        self.events.len()
    }

    /// Time of the newest event, `-` when there is none
    pub fn last_event(&self) -> &str {
        self.events.first().map(|e| e.time.as_str()).unwrap_or("-")
    }

    pub fn display_events(&self, limit: usize) -> &[AlertEvent] {
        &self.events[..self.events.len().min(limit)]
    }

    pub fn newest_is_danger(&self) -> bool {
        matches!(
            self.events.first(),
            Some(AlertEvent {
                severity: Severity::Danger,
                ..
            })
        )
    }
}

/// `HH:MM:SS` of a timestamp in UTC
pub fn format_utc_time(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%H:%M:%S").to_string()
}

/// Map a reading to an alert event, `None` for low or unknown levels
pub fn to_event(reading: &DeviceReading) -> Option<AlertEvent> {
    let severity = reading.drowsiness_level.severity()?;
    Some(AlertEvent {
        time: format_utc_time(&reading.timestamp),
        label: severity.label().to_string(),
        severity,
        hour: reading.timestamp.hour(),
    })
}

/// Reduce readings (newest first) into the latest status and event list
pub fn reduce_history(readings: &[DeviceReading]) -> HistorySummary {
    let latest = readings.first().map(|top| LatestStatus {
        drowsiness_level: top.drowsiness_level,
        status: top.status.clone(),
        driving_status: DrivingStatus::from_level(top.drowsiness_level),
    });

    let events = readings.iter().filter_map(to_event).collect();

    HistorySummary { latest, events }
}

/// Debounced stamp of the last observed danger event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DangerCooldown {
    last_critical_at: Option<DateTime<Utc>>,
}

impl DangerCooldown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_critical_at(&self) -> Option<DateTime<Utc>> {
        self.last_critical_at
    }

    /// Record the summary observed at `now`.
    ///
    /// The stamp moves only when the newest event is danger and the previous
    /// stamp is absent or more than two minutes old. Returns whether it
    /// moved.
    pub fn observe(&mut self, summary: &HistorySummary, now: DateTime<Utc>) -> bool {
        if !summary.newest_is_danger() {
            return false;
        }
        match self.last_critical_at {
            Some(last) if now - last <= Duration::seconds(DANGER_COOLDOWN_SECS) => false,
            _ => {
                self.last_critical_at = Some(now);
                true
            }
        }
    }
}
