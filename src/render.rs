//! Plain-text rendering of the dashboards

use crate::{
    dashboard::{DriverSnapshot, FleetView},
    histogram::{CountBar, SeverityBar},
    mock::FleetReport,
    models::{AlertSeverity, AuthUser, DeviceReading, Severity},
    output::{field, table_header, table_row},
    reducer::format_utc_time,
};

/// Display units per character cell of a bar
const UNITS_PER_CELL: f64 = 4.0;

fn cells(units: f64) -> usize {
    (units / UNITS_PER_CELL).round().max(0.0) as usize
}

/// `=` for warning and `#` for danger; `.` marks an empty bucket
fn severity_bar(bar: &SeverityBar) -> String {
    if bar.total() == 0 {
        return ".".repeat(cells(bar.height));
    }
    format!(
        "{}{}",
        "=".repeat(cells(bar.warning_height)),
        "#".repeat(cells(bar.danger_height))
    )
}

fn count_bar(bar: &CountBar) -> String {
    if bar.count == 0 {
        return ".".repeat(cells(bar.height));
    }
    "#".repeat(cells(bar.height))
}

/// Text panel assembled line by line
#[derive(Default)]
struct Panel {
    out: String,
}

impl Panel {
    fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.out.push_str(text.as_ref());
        self.out.push('\n');
        self
    }

    fn field(&mut self, label: &str, value: &str) -> &mut Self {
        self.line(field(label, value))
    }

    fn blank(&mut self) -> &mut Self {
        self.out.push('\n');
        self
    }

    fn finish(self) -> String {
        self.out
    }
}

fn severity_name(severity: Severity) -> &'static str {
    match severity {
        Severity::Warning => "warning",
        Severity::Danger => "danger",
    }
}

pub fn driver_panel(snapshot: &DriverSnapshot, event_limit: usize) -> String {
    let mut panel = Panel::default();
    let summary = &snapshot.summary;

    panel.field("Device", &snapshot.device_id);
    match &summary.latest {
        Some(latest) => {
            panel
                .field("Status", &latest.status)
                .field("Driving", latest.driving_status.describe());
        }
        None => {
            panel.field("Status", "no readings");
        }
    }
    panel
        .field("Events today", &summary.events_today().to_string())
        .field("Last event", summary.last_event());
    if let Some(at) = snapshot.last_critical_at {
        panel.field("Last danger", &format_utc_time(&at));
    }

    panel.blank().line("Alerts by hour (= warning, # danger)");
    for bar in &snapshot.histogram {
        panel.line(format!(
            "  {}  {:<20} {}",
            bar.label,
            severity_bar(bar),
            bar.total()
        ));
    }

    let events = summary.display_events(event_limit);
    if !events.is_empty() {
        panel
            .blank()
            .line(table_header(&[("TIME", 10), ("ALERT", 10), ("LEVEL", 14)]));
        for event in events {
            panel.line(table_row(&[
                (&event.time, 10),
                (&event.label, 10),
                (event.severity.describe(), 14),
            ]));
        }
    }

    panel.finish()
}

pub fn latest_reading(reading: &DeviceReading) -> String {
    let mut panel = Panel::default();
    if let Some(device) = &reading.device_id {
        panel.field("Device", device);
    }
    let level = reading
        .drowsiness_level
        .severity()
        .map(severity_name)
        .unwrap_or("normal");
    panel.field("Status", &reading.status).field("Level", level);
    if let Some(ratio) = reading.eye_closure {
        panel.field("Eye closure", &format!("{:.2}", ratio));
    }
    panel.field("Recorded", &reading.timestamp.to_rfc3339());
    panel.finish()
}

pub fn fleet_panel(view: &FleetView) -> String {
    let mut panel = Panel::default();

    if let Some(overview) = &view.overview {
        panel
            .field(
                "Drivers",
                &format!(
                    "{} ({} active)",
                    overview.total_drivers, overview.active_drivers
                ),
            )
            .field("Devices", &overview.total_devices.to_string())
            .field(
                "Alerts today",
                &format!(
                    "{} ({} critical)",
                    overview.alerts_today, overview.critical_alerts_today
                ),
            )
            .blank();
    }

    panel
        .line(format!(
            "Drivers (page {}/{}, {} total)",
            view.drivers.page, view.drivers.pages, view.drivers.total
        ))
        .line(table_header(&[
            ("NAME", 20),
            ("DEVICE", 12),
            ("STATE", 8),
            ("CRITICAL", 8),
        ]));
    for driver in &view.drivers.items {
        let state = if driver.is_online { "online" } else { "offline" };
        panel.line(table_row(&[
            (&driver.name, 20),
            (&driver.device_id, 12),
            (state, 8),
            (&driver.critical_alerts_today.to_string(), 8),
        ]));
    }

    panel.blank().line(format!(
        "Recent alerts (page {}/{})",
        view.alerts.page, view.alerts.pages
    ));
    for alert in &view.alerts.items {
        panel.line(table_row(&[
            (&alert.time, 10),
            (&alert.driver, 18),
            (&alert.alert_type, 16),
            (&alert.severity, 10),
            (&alert.vehicle_id, 10),
        ]));
    }

    if let Some(slots) = &view.slots {
        panel.blank().line(format!(
            "Alerts by time slot (peak {} with {})",
            slots.peak_slot, slots.peak_count
        ));
        for bar in &slots.bars {
            panel.line(format!(
                "  {}  {:<16} {}",
                bar.label,
                count_bar(bar),
                bar.count
            ));
        }
    }

    if let Some(levels) = &view.levels {
        panel
            .blank()
            .field(
                "High",
                &format!("{} ({:.1}%)", levels.high_count, levels.high_pct),
            )
            .field(
                "Medium",
                &format!("{} ({:.1}%)", levels.medium_count, levels.medium_pct),
            )
            .field("Safe", &format!("{:.1}%", levels.safe_pct));
    }

    panel.finish()
}

fn alert_severity_name(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Info => "info",
        AlertSeverity::Warning => "warning",
        AlertSeverity::Critical => "critical",
    }
}

pub fn score_report(report: &FleetReport) -> String {
    let mut panel = Panel::default();
    let fleet = &report.fleet;

    panel
        .field("Generated", &report.generated_at.to_rfc3339())
        .field("Safety score", &fleet.safety_score.to_string())
        .field(
            "Drivers",
            &format!(
                "{} of {} active",
                fleet.active_drivers, fleet.total_drivers
            ),
        )
        .field(
            "Alerts today",
            &format!("{} ({} critical)", fleet.alerts_today, fleet.critical_alerts),
        )
        .blank()
        .line(table_header(&[
            ("DRIVER", 16),
            ("VEHICLE", 8),
            ("STATUS", 9),
            ("SCORE", 5),
            ("TRIPS", 5),
            ("LAST ALERT", 16),
        ]));
    for driver in &report.drivers {
        panel.line(table_row(&[
            (&driver.name, 16),
            (&driver.vehicle_id, 8),
            (driver.status.describe(), 9),
            (&driver.metrics.safety_score.to_string(), 5),
            (
                &format!(
                    "{}/{}",
                    driver.metrics.safe_trips, driver.metrics.total_trips
                ),
                5,
            ),
            (&driver.metrics.last_alert, 16),
        ]));
    }

    if !report.recent_alerts.is_empty() {
        panel.blank().line("Recent alerts");
        for alert in &report.recent_alerts {
            panel.line(table_row(&[
                (&alert.time, 6),
                (&alert.kind, 16),
                (alert_severity_name(alert.severity), 9),
                (&alert.location, 24),
            ]));
        }
    }

    panel.finish()
}

pub fn profile(user: &AuthUser) -> String {
    let mut panel = Panel::default();
    panel
        .field("Name", &user.name)
        .field("Email", &user.email)
        .field("Role", &user.role.to_string());
    if let Some(phone) = &user.phone {
        panel.field("Phone", phone);
    }
    if let Some(device) = &user.device_id {
        panel.field("Device", device);
    }
    panel.finish()
}
