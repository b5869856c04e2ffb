//! Data models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError, DefaultOnNull};

use serde_helpers::*;

/// Drowsiness classification produced by the detection device.
///
/// The device reports levels as free text; anything other than
/// `low`, `medium` or `high` (case-insensitive) is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DrowsinessLevel {
    Low,
    Medium,
    High,
    #[default]
    Unknown,
}

impl DrowsinessLevel {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => DrowsinessLevel::Low,
            "medium" => DrowsinessLevel::Medium,
            "high" => DrowsinessLevel::High,
            _ => DrowsinessLevel::Unknown,
        }
    }

    /// Display severity, only medium and high readings have one.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            DrowsinessLevel::Medium => Some(Severity::Warning),
            DrowsinessLevel::High => Some(Severity::Danger),
            DrowsinessLevel::Low | DrowsinessLevel::Unknown => None,
        }
    }
}

/// Display severity of an alert event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Danger,
}

impl Severity {
    /// Short label attached to each event
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Warning => "Caution",
            Severity::Danger => "Danger",
        }
    }

    /// Longer description used in event lists
    pub fn describe(&self) -> &'static str {
        match self {
            Severity::Warning => "Warning level",
            Severity::Danger => "Danger level",
        }
    }
}

/// A single reading from a detection device
///
/// See `GET /devices/{id}/data` and `GET /devices/{id}/history`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReading {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub device_id: Option<String>,
    /// Eye closure ratio computed on the device
    #[serde(default)]
    pub eye_closure: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_level")]
    pub drowsiness_level: DrowsinessLevel,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub status: String,
    /// Reading time, always interpreted in UTC
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Response of `GET /devices/{id}/history`, most recent reading first
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HistoryResponse {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub count: usize,
    /// The backend sends `null` instead of an empty list
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub data: Vec<DeviceReading>,
}

/// Alert event derived from a medium or high reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertEvent {
    /// `HH:MM:SS` in UTC
    pub time: String,
    pub label: String,
    pub severity: Severity,
    /// UTC hour, 0-23
    pub hour: u32,
}

/// User role as assigned by the API
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Driver,
    Admin,
    Other(String),
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "driver" => Role::Driver,
            "admin" => Role::Admin,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        match value {
            Role::Driver => "driver".to_string(),
            Role::Admin => "admin".to_string(),
            Role::Other(other) => other,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Driver => write!(f, "driver"),
            Role::Admin => write!(f, "admin"),
            Role::Other(other) => write!(f, "{}", other),
        }
    }
}

/// Authenticated user, as returned by the auth endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    #[serde(default, deserialize_with = "deserialize_trimmed_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "deserialize_trimmed_string")]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_trimmed_string")]
    pub user_type: Option<String>,
}

/// Token and user returned by login and register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResult {
    pub token: String,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForgotPasswordRequest<'a> {
    pub email: &'a str,
}

/// Verification code issued by `POST /forgot-password`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForgotPasswordResponse {
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetPasswordRequest<'a> {
    pub email: &'a str,
    pub code: &'a str,
    pub new_password: &'a str,
}

/// Fleet-wide counts from `GET /admin/overview`
///
/// Missing or mistyped fields fall back to zero.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DriverOverview {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub total_drivers: u32,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub active_drivers: u32,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub total_devices: u32,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub alerts_today: u32,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub critical_alerts_today: u32,
}

/// Row of the admin driver list
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AdminDriverSummary {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub id: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub name: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub device_id: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub is_online: bool,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub critical_alerts_today: u32,
    /// "real" or "mock"
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub source: String,
}

impl AdminDriverSummary {
    /// Case-insensitive match on name or device id
    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        q.is_empty()
            || self.name.to_lowercase().contains(&q)
            || self.device_id.to_lowercase().contains(&q)
    }
}

/// `GET /admin/drivers`; anything but a list is read as an empty list
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct DriversResponse {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub drivers: Vec<AdminDriverSummary>,
}

/// Entry of the fleet "recent alerts" card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRecentAlert")]
pub struct AdminRecentAlert {
    pub time: String,
    pub driver: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub severity: String,
    #[serde(rename = "vehicleId")]
    pub vehicle_id: String,
    pub source: String,
}

#[serde_as]
#[derive(Deserialize)]
struct RawRecentAlert {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    time: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    driver: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, rename = "type")]
    alert_type: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    severity: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, rename = "vehicleId")]
    vehicle_id: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    source: Option<String>,
}

impl From<RawRecentAlert> for AdminRecentAlert {
    fn from(raw: RawRecentAlert) -> Self {
        Self {
            time: raw.time.unwrap_or_else(|| "-".to_string()),
            driver: raw.driver.unwrap_or_else(|| "unknown driver".to_string()),
            alert_type: raw.alert_type.unwrap_or_else(|| "unknown status".to_string()),
            severity: raw.severity.unwrap_or_else(|| "info".to_string()),
            vehicle_id: raw.vehicle_id.unwrap_or_else(|| "-".to_string()),
            source: raw.source.unwrap_or_else(|| "real".to_string()),
        }
    }
}

/// `GET /admin/recent-alerts`; `None` when the payload carried no list
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct RecentAlertsResponse {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub alerts: Option<Vec<AdminRecentAlert>>,
}

/// Alert count for one time slot label, e.g. `"08-10"`
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSlot {
    #[serde(default, deserialize_with = "deserialize_label")]
    pub label: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub count: u32,
}

/// `GET /admin/alert-slots`
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AlertSlots {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub slots: Option<Vec<AlertSlot>>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub peak_slot: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub peak_count: Option<u32>,
}

/// Alert share by level from `GET /admin/alert-levels`
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertLevelSummary {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub high_count: u32,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub medium_count: u32,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub high_pct: f64,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub medium_pct: f64,
    /// Defaults to 100 when absent
    #[serde(default = "full_percentage", deserialize_with = "deserialize_pct_or_full")]
    pub safe_pct: f64,
}

impl Default for AlertLevelSummary {
    fn default() -> Self {
        Self {
            high_count: 0,
            medium_count: 0,
            high_pct: 0.0,
            medium_pct: 0.0,
            safe_pct: full_percentage(),
        }
    }
}

fn full_percentage() -> f64 {
    100.0
}

/// Alert type recorded on a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    DrowsinessLow,
    DrowsinessMedium,
    DrowsinessHigh,
    EyeClosure,
    HeadNod,
    Yawn,
    Normal,
}

impl AlertType {
    /// Human readable name
    pub fn describe(&self) -> &'static str {
        match self {
            AlertType::DrowsinessLow => "Slight fatigue",
            AlertType::DrowsinessMedium => "Moderate fatigue",
            AlertType::DrowsinessHigh => "Severe fatigue",
            AlertType::EyeClosure => "Eyes closed",
            AlertType::HeadNod => "Head nod",
            AlertType::Yawn => "Yawn",
            AlertType::Normal => "Normal",
        }
    }
}

/// Severity recorded on a trip alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripAlert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub location: String,
    pub resolved: bool,
    /// Detector confidence, 0-100
    pub confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub driver_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Kilometres
    pub distance: f64,
    pub route: String,
    #[serde(default)]
    pub alerts: Vec<TripAlert>,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DutyStatus {
    Driving,
    Resting,
    OffDuty,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub vehicle_id: String,
    pub license_number: String,
    pub join_date: NaiveDate,
    pub is_active: bool,
    #[serde(default)]
    pub current_location: Option<String>,
    pub current_status: DutyStatus,
}

/// Custom deserializers
mod serde_helpers {
    use super::DrowsinessLevel;
    use serde::{self, Deserialize, Deserializer};
    use serde_json::Value;

    pub fn deserialize_level<'de, D>(deserializer: D) -> Result<DrowsinessLevel, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Option<String> = Option::deserialize(deserializer)?;
        Ok(value
            .as_deref()
            .map(DrowsinessLevel::parse)
            .unwrap_or(DrowsinessLevel::Unknown))
    }

    pub fn deserialize_trimmed_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        Ok(s.and_then(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }))
    }

    /// Slot labels are stringified whatever their JSON type
    pub fn deserialize_label<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    pub fn deserialize_pct_or_full<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_f64().unwrap_or(100.0))
    }
}
