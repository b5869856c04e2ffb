//! Safety score and fleet statistics over recorded trips.
//!
//! Everything here is a pure function of its inputs; "now" is always passed
//! in so results do not depend on the wall clock.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{AlertSeverity, AlertType, Driver, Trip, TripAlert};

const PERFECT_SCORE: i32 = 100;

fn severity_penalty(severity: AlertSeverity) -> i32 {
    match severity {
        AlertSeverity::Critical => 15,
        AlertSeverity::Warning => 8,
        AlertSeverity::Info => 3,
    }
}

fn type_penalty(alert_type: AlertType) -> i32 {
    match alert_type {
        AlertType::DrowsinessHigh => 10,
        AlertType::DrowsinessMedium => 5,
        AlertType::HeadNod => 8,
        AlertType::EyeClosure => 6,
        AlertType::DrowsinessLow | AlertType::Yawn | AlertType::Normal => 0,
    }
}

/// Score of a single trip: 100 minus alert penalties, floored at 0
pub fn trip_score(trip: &Trip) -> u32 {
    let deducted: i32 = trip
        .alerts
        .iter()
        .map(|a| severity_penalty(a.severity) + type_penalty(a.alert_type))
        .sum();
    (PERFECT_SCORE - deducted).max(0) as u32
}

/// Distance-weighted average of completed trip scores.
///
/// No trips, or no distance driven on completed trips, scores 100.
pub fn safety_score(trips: &[Trip]) -> u32 {
    let (weighted, distance) = trips
        .iter()
        .filter(|t| t.completed)
        .fold((0.0, 0.0), |(weighted, distance), trip| {
            (
                weighted + trip_score(trip) as f64 * trip.distance,
                distance + trip.distance,
            )
        });

    if distance > 0.0 {
        (weighted / distance).round() as u32
    } else {
        PERFECT_SCORE as u32
    }
}

/// Alerts with `start <= timestamp <= end`, newest first
pub fn alerts_in_range(trips: &[Trip], start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&TripAlert> {
    let mut alerts: Vec<&TripAlert> = trips
        .iter()
        .flat_map(|t| t.alerts.iter())
        .filter(|a| a.timestamp >= start && a.timestamp <= end)
        .collect();
    alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    alerts
}

pub fn total_driving_minutes(trips: &[Trip]) -> f64 {
    trips
        .iter()
        .filter(|t| t.completed)
        .map(|t| (t.end_time - t.start_time).num_milliseconds() as f64 / 60_000.0)
        .sum()
}

pub fn total_distance(trips: &[Trip]) -> f64 {
    trips.iter().filter(|t| t.completed).map(|t| t.distance).sum()
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

/// Derived driver status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Alert,
    Driving,
    Resting,
    Available,
}

impl DriverStatus {
    pub fn describe(&self) -> &'static str {
        match self {
            DriverStatus::Alert => "Alert",
            DriverStatus::Driving => "Driving",
            DriverStatus::Resting => "Resting",
            DriverStatus::Available => "Available",
        }
    }
}

/// Status from the last hour of alerts and the trip log.
///
/// One critical or two warning alerts within the hour put the driver on
/// alert. Otherwise an open trip means driving, and a trip finished less than
/// two hours ago means resting.
pub fn driver_status(driver_id: &str, trips: &[Trip], now: DateTime<Utc>) -> DriverStatus {
    let driver_trips: Vec<Trip> = trips
        .iter()
        .filter(|t| t.driver_id == driver_id)
        .cloned()
        .collect();

    let recent = alerts_in_range(&driver_trips, now - Duration::hours(1), now);
    let critical = recent
        .iter()
        .filter(|a| a.severity == AlertSeverity::Critical)
        .count();
    let warning = recent
        .iter()
        .filter(|a| a.severity == AlertSeverity::Warning)
        .count();

    if critical > 0 || warning >= 2 {
        return DriverStatus::Alert;
    }

    if driver_trips.iter().any(|t| !t.completed) {
        return DriverStatus::Driving;
    }

    let last_end = driver_trips
        .iter()
        .filter(|t| t.completed)
        .map(|t| t.end_time)
        .max();

    match last_end {
        Some(end) if now - end < Duration::hours(2) => DriverStatus::Resting,
        _ => DriverStatus::Available,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FleetStats {
    pub total_drivers: usize,
    pub active_drivers: usize,
    pub alerts_today: usize,
    pub critical_alerts: usize,
    pub safety_score: u32,
    /// One vehicle per driver
    pub total_fleet: usize,
}

pub fn fleet_stats(drivers: &[Driver], trips: &[Trip], now: DateTime<Utc>) -> FleetStats {
    let today = start_of_day(now);
    let today_alerts = alerts_in_range(trips, today, now);
    let critical_alerts = today_alerts
        .iter()
        .filter(|a| a.severity == AlertSeverity::Critical)
        .count();

    let week_ago = now - Duration::days(7);
    let weekly: Vec<Trip> = trips
        .iter()
        .filter(|t| t.start_time >= week_ago)
        .cloned()
        .collect();

    FleetStats {
        total_drivers: drivers.len(),
        active_drivers: drivers.iter().filter(|d| d.is_active).count(),
        alerts_today: today_alerts.len(),
        critical_alerts,
        safety_score: safety_score(&weekly),
        total_fleet: drivers.len(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverMetrics {
    pub total_trips: usize,
    pub safe_trips: usize,
    pub alerts_today: usize,
    /// Average hours driven per day over the last week
    pub avg_drive_hours: f64,
    pub last_alert: String,
    pub safety_score: u32,
    pub weekly_distance: u64,
    pub weekly_driving_hours: u64,
    pub weekly_alerts: usize,
}

pub fn driver_metrics(driver_id: &str, trips: &[Trip], now: DateTime<Utc>) -> DriverMetrics {
    let driver_trips: Vec<Trip> = trips
        .iter()
        .filter(|t| t.driver_id == driver_id)
        .cloned()
        .collect();

    let today = start_of_day(now);
    let tomorrow = today + Duration::days(1);
    let today_trips: Vec<&Trip> = driver_trips
        .iter()
        .filter(|t| t.start_time >= today && t.start_time < tomorrow)
        .collect();
    let today_alerts = alerts_in_range(&driver_trips, today, now);

    let week_ago = now - Duration::days(7);
    let weekly: Vec<Trip> = driver_trips
        .iter()
        .filter(|t| t.start_time >= week_ago)
        .cloned()
        .collect();
    let weekly_alerts = alerts_in_range(&driver_trips, week_ago, now);

    let driving_minutes = total_driving_minutes(&weekly);
    let last_alert = weekly_alerts
        .first()
        .map(|a| format_time_ago(a.timestamp, now))
        .unwrap_or_else(|| "No alerts".to_string());

    DriverMetrics {
        total_trips: today_trips.len(),
        safe_trips: today_trips.iter().filter(|t| t.completed).count(),
        alerts_today: today_alerts.len(),
        avg_drive_hours: driving_minutes / 60.0 / 7.0,
        last_alert,
        safety_score: safety_score(&weekly),
        weekly_distance: total_distance(&weekly).round() as u64,
        weekly_driving_hours: (driving_minutes / 60.0).round() as u64,
        weekly_alerts: weekly_alerts.len(),
    }
}

/// Relative age in minutes, hours or days
pub fn format_time_ago(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - timestamp).num_minutes();
    if minutes < 60 {
        format!("{} minutes ago", minutes)
    } else if minutes < 1440 {
        format!("{} hours ago", minutes / 60)
    } else {
        format!("{} days ago", minutes / 1440)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentAlertView {
    /// `HH:MM` UTC
    pub time: String,
    pub kind: String,
    pub severity: AlertSeverity,
    pub location: String,
}

/// Today's newest `limit` alerts, formatted for display
pub fn recent_alerts(trips: &[Trip], limit: usize, now: DateTime<Utc>) -> Vec<RecentAlertView> {
    alerts_in_range(trips, start_of_day(now), now)
        .into_iter()
        .take(limit)
        .map(|a| RecentAlertView {
            time: a.timestamp.format("%H:%M").to_string(),
            kind: a.alert_type.describe().to_string(),
            severity: a.severity,
            location: a.location.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn alert(ts: &str, alert_type: AlertType, severity: AlertSeverity) -> TripAlert {
        TripAlert {
            id: format!("alert_{}", ts),
            timestamp: at(ts),
            alert_type,
            severity,
            location: "Ring road".to_string(),
            resolved: true,
            confidence: 90,
        }
    }

    fn trip(id: &str, start: &str, end: &str, distance: f64, alerts: Vec<TripAlert>) -> Trip {
        Trip {
            id: id.to_string(),
            driver_id: "driver_001".to_string(),
            start_time: at(start),
            end_time: at(end),
            distance,
            route: "Office -> Warehouse".to_string(),
            alerts,
            completed: true,
        }
    }

    #[test]
    fn empty_and_zero_distance_score_perfect() {
        assert_eq!(safety_score(&[]), 100);

        let parked = trip(
            "t1",
            "2024-12-16T06:00:00Z",
            "2024-12-16T06:10:00Z",
            0.0,
            vec![alert(
                "2024-12-16T06:05:00Z",
                AlertType::HeadNod,
                AlertSeverity::Critical,
            )],
        );
        assert_eq!(safety_score(&[parked]), 100);
    }

    #[test]
    fn weighted_by_distance() {
        let clean = trip("t1", "2024-12-16T06:00:00Z", "2024-12-16T08:00:00Z", 30.0, vec![]);
        let rough = trip(
            "t2",
            "2024-12-16T09:00:00Z",
            "2024-12-16T11:00:00Z",
            10.0,
            vec![alert(
                "2024-12-16T10:00:00Z",
                AlertType::DrowsinessHigh,
                AlertSeverity::Critical,
            )],
        );

        assert_eq!(trip_score(&rough), 75);
        // (100 * 30 + 75 * 10) / 40 = 93.75
        assert_eq!(safety_score(&[clean, rough]), 94);
    }

    #[test]
    fn incomplete_trips_are_ignored() {
        let mut open = trip("t1", "2024-12-16T06:00:00Z", "2024-12-16T08:00:00Z", 50.0, vec![]);
        open.completed = false;
        open.alerts.push(alert(
            "2024-12-16T07:00:00Z",
            AlertType::EyeClosure,
            AlertSeverity::Warning,
        ));
        assert_eq!(safety_score(&[open]), 100);
    }

    #[test]
    fn score_never_increases_and_stays_in_range() {
        let mut t = trip("t1", "2024-12-16T06:00:00Z", "2024-12-16T08:00:00Z", 12.5, vec![]);
        let mut previous = trip_score(&t);
        assert_eq!(previous, 100);

        let kinds = [
            (AlertType::Yawn, AlertSeverity::Info),
            (AlertType::DrowsinessMedium, AlertSeverity::Warning),
            (AlertType::HeadNod, AlertSeverity::Critical),
            (AlertType::Normal, AlertSeverity::Info),
            (AlertType::DrowsinessHigh, AlertSeverity::Critical),
        ];
        for i in 0..20 {
            let (kind, severity) = kinds[i % kinds.len()];
            t.alerts.push(alert("2024-12-16T07:00:00Z", kind, severity));
            let score = trip_score(&t);
            assert!(score <= previous);
            assert!(score <= 100);
            assert!(safety_score(std::slice::from_ref(&t)) <= 100);
            previous = score;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn status_rules() {
        let now = at("2024-12-16T15:00:00Z");

        let finished = trip("t1", "2024-12-16T12:00:00Z", "2024-12-16T14:00:00Z", 40.0, vec![]);
        assert_eq!(
            driver_status("driver_001", std::slice::from_ref(&finished), now),
            DriverStatus::Resting
        );
        assert_eq!(
            driver_status("driver_001", &[], now),
            DriverStatus::Available
        );

        let mut open = finished.clone();
        open.completed = false;
        assert_eq!(
            driver_status("driver_001", &[open.clone()], now),
            DriverStatus::Driving
        );

        open.alerts.push(alert(
            "2024-12-16T14:30:00Z",
            AlertType::EyeClosure,
            AlertSeverity::Warning,
        ));
        assert_eq!(
            driver_status("driver_001", &[open.clone()], now),
            DriverStatus::Driving
        );
        open.alerts.push(alert(
            "2024-12-16T14:40:00Z",
            AlertType::Yawn,
            AlertSeverity::Warning,
        ));
        assert_eq!(
            driver_status("driver_001", &[open], now),
            DriverStatus::Alert
        );
    }

    #[test]
    fn driver_metrics_for_today_and_week() {
        let now = at("2024-12-16T16:00:00Z");
        let trips = vec![
            trip(
                "t1",
                "2024-12-16T06:00:00Z",
                "2024-12-16T08:30:00Z",
                45.2,
                vec![alert(
                    "2024-12-16T07:15:00Z",
                    AlertType::Yawn,
                    AlertSeverity::Info,
                )],
            ),
            trip("t2", "2024-12-15T08:00:00Z", "2024-12-15T16:00:00Z", 156.7, vec![]),
        ];

        let metrics = driver_metrics("driver_001", &trips, now);
        assert_eq!(metrics.total_trips, 1);
        assert_eq!(metrics.safe_trips, 1);
        assert_eq!(metrics.alerts_today, 1);
        assert_eq!(metrics.weekly_alerts, 1);
        assert_eq!(metrics.weekly_distance, 202);
        assert_eq!(metrics.weekly_driving_hours, 11);
        assert_eq!(metrics.last_alert, "8 hours ago");
    }

    #[test]
    fn time_ago_units() {
        let now = at("2024-12-16T16:00:00Z");
        assert_eq!(format_time_ago(at("2024-12-16T15:35:00Z"), now), "25 minutes ago");
        assert_eq!(format_time_ago(at("2024-12-16T13:00:00Z"), now), "3 hours ago");
        assert_eq!(format_time_ago(at("2024-12-13T16:00:00Z"), now), "3 days ago");
    }
}
