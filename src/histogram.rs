//! Hour-bucket histograms for the driver and fleet dashboards.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{AlertEvent, AlertSlot, Severity};

/// Half-open hour range `[start, end)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourBucket {
    pub label: String,
    pub start: u32,
    pub end: u32,
}

impl HourBucket {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            label: format!("{:02}-{:02}", start, end),
            start,
            end,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start && hour < self.end
    }
}

/// Contiguous buckets of `width` hours from `start` up to midnight.
///
/// The last bucket is clipped at 24 when the range does not divide evenly.
pub fn contiguous_buckets(start: u32, width: u32) -> Vec<HourBucket> {
    let width = width.max(1);
    (start..24)
        .step_by(width as usize)
        .map(|s| HourBucket::new(s, (s + width).min(24)))
        .collect()
}

/// Driver view: 3-hour buckets from 06 to 24
pub fn driver_buckets() -> Vec<HourBucket> {
    contiguous_buckets(6, 3)
}

/// Fleet view: 2-hour buckets from 06 to 24
pub fn fleet_buckets() -> Vec<HourBucket> {
    contiguous_buckets(6, 2)
}

/// Bar geometry in display units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarScale {
    /// Height drawn for an empty bucket
    pub empty: f64,
    /// Height of a non-empty bucket with the smallest count
    pub base: f64,
    /// Extra height a bucket at the maximum count gets on top of `base`
    pub span: f64,
}

impl BarScale {
    pub const DRIVER: BarScale = BarScale {
        empty: 8.0,
        base: 8.0,
        span: 72.0,
    };

    pub const FLEET: BarScale = BarScale {
        empty: 4.0,
        base: 8.0,
        span: 56.0,
    };

    /// Height for `count` relative to the largest bucket `max`
    pub fn height(&self, count: u32, max: u32) -> f64 {
        if count == 0 {
            return self.empty;
        }
        self.base + (count as f64 / max.max(1) as f64) * self.span
    }
}

/// One bar of the driver histogram, split by severity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityBar {
    pub label: String,
    pub warning: u32,
    pub danger: u32,
    pub height: f64,
    pub warning_height: f64,
    pub danger_height: f64,
}

impl SeverityBar {
    pub fn total(&self) -> u32 {
        self.warning + self.danger
    }
}

/// Count warning and danger events per bucket.
///
/// Segment heights share the bar height minus a 4-unit gap, in proportion
/// to their counts. Events outside every bucket are not counted.
pub fn severity_histogram(
    events: &[AlertEvent],
    buckets: &[HourBucket],
    scale: BarScale,
) -> Vec<SeverityBar> {
    let counts: Vec<(u32, u32)> = buckets
        .iter()
        .map(|bucket| {
            events
                .iter()
                .filter(|e| bucket.contains(e.hour))
                .fold((0, 0), |(w, d), e| match e.severity {
                    Severity::Warning => (w + 1, d),
                    Severity::Danger => (w, d + 1),
                })
        })
        .collect();

    let max = counts.iter().map(|(w, d)| w + d).max().unwrap_or(0).max(1);

    buckets
        .iter()
        .zip(counts)
        .map(|(bucket, (warning, danger))| {
            let total = warning + danger;
            let height = scale.height(total, max);
            let (warning_height, danger_height) = if total == 0 {
                (0.0, 0.0)
            } else {
                let usable = height - 4.0;
                (
                    warning as f64 / total as f64 * usable,
                    danger as f64 / total as f64 * usable,
                )
            };
            SeverityBar {
                label: bucket.label.clone(),
                warning,
                danger,
                height,
                warning_height,
                danger_height,
            }
        })
        .collect()
}

/// One bar of the fleet histogram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountBar {
    pub label: String,
    pub count: u32,
    pub height: f64,
}

/// Merge server-side slot counts onto the fixed fleet buckets.
///
/// Labels the buckets do not know are dropped; buckets the server did not
/// report count zero.
pub fn merge_slots(slots: &[AlertSlot], buckets: &[HourBucket]) -> Vec<AlertSlot> {
    let by_label: HashMap<&str, u32> = slots
        .iter()
        .map(|slot| (slot.label.as_str(), slot.count))
        .collect();

    buckets
        .iter()
        .map(|bucket| AlertSlot {
            label: bucket.label.clone(),
            count: by_label.get(bucket.label.as_str()).copied().unwrap_or(0),
        })
        .collect()
}

pub fn count_histogram(slots: &[AlertSlot], scale: BarScale) -> Vec<CountBar> {
    let max = slots.iter().map(|s| s.count).max().unwrap_or(0).max(1);
    slots
        .iter()
        .map(|slot| CountBar {
            label: slot.label.clone(),
            count: slot.count,
            height: scale.height(slot.count, max),
        })
        .collect()
}
