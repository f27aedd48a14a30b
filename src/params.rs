//! Effect parameters: canonical ranges, UI-space conversion, and partial
//! live updates.
//!
//! `ParameterSet` is the single canonical form consumed by both the realtime
//! and the offline paths. Every constructor clamps; only JSON parsing fails.

use serde::{Deserialize, Serialize};

use crate::error::SpatialResult;

pub const PAN_SPEED_MIN: f64 = 0.01;
pub const PAN_SPEED_MAX: f64 = 2.0;

pub const DEFAULT_PAN_SPEED: f64 = 0.15;
pub const DEFAULT_PAN_DEPTH: f64 = 1.0;
pub const DEFAULT_ROOM_SIZE: f64 = 0.4;
pub const DEFAULT_WET_LEVEL: f64 = 0.3;
pub const DEFAULT_DAMPING: f64 = 0.5;

/// Validated effect parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ParameterUpdate", rename_all = "camelCase")]
pub struct ParameterSet {
    pan_speed: f64,
    pan_depth: f64,
    room_size: f64,
    wet_level: f64,
    damping: f64,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            pan_speed: DEFAULT_PAN_SPEED,
            pan_depth: DEFAULT_PAN_DEPTH,
            room_size: DEFAULT_ROOM_SIZE,
            wet_level: DEFAULT_WET_LEVEL,
            damping: DEFAULT_DAMPING,
        }
    }
}

impl ParameterSet {
    /// Build a set from canonical-range values, clamping each one.
    pub fn new(pan_speed: f64, pan_depth: f64, room_size: f64, wet_level: f64, damping: f64) -> Self {
        Self {
            pan_speed: clamp_or(pan_speed, PAN_SPEED_MIN, PAN_SPEED_MAX, DEFAULT_PAN_SPEED),
            pan_depth: unit_or(pan_depth, DEFAULT_PAN_DEPTH),
            room_size: unit_or(room_size, DEFAULT_ROOM_SIZE),
            wet_level: unit_or(wet_level, DEFAULT_WET_LEVEL),
            damping: unit_or(damping, DEFAULT_DAMPING),
        }
    }

    /// Canonicalize UI-space values (seconds per rotation, 0–100 percentages).
    pub fn from_raw(raw: &RawParameters) -> Self {
        let pan_speed = match raw.speed_seconds {
            Some(s) if s.is_finite() && s > 0.0 => (1.0 / s).clamp(PAN_SPEED_MIN, PAN_SPEED_MAX),
            _ => DEFAULT_PAN_SPEED,
        };
        Self {
            pan_speed,
            pan_depth: percent_or(raw.depth_pct, DEFAULT_PAN_DEPTH),
            room_size: percent_or(raw.room_pct, DEFAULT_ROOM_SIZE),
            wet_level: percent_or(raw.wet_pct, DEFAULT_WET_LEVEL),
            damping: percent_or(raw.damping_pct, DEFAULT_DAMPING),
        }
    }

    /// Produce a fresh set with the fields present in `update` replaced.
    pub fn apply(&self, update: &ParameterUpdate) -> Self {
        Self::new(
            update.pan_speed.unwrap_or(self.pan_speed),
            update.pan_depth.unwrap_or(self.pan_depth),
            update.room_size.unwrap_or(self.room_size),
            update.wet_level.unwrap_or(self.wet_level),
            update.damping.unwrap_or(self.damping),
        )
    }

    /// Linear blend towards `target` (`t` in [0, 1]).
    pub fn lerp(&self, target: &ParameterSet, t: f64) -> Self {
        let mix = |a: f64, b: f64| a + (b - a) * t;
        Self {
            pan_speed: mix(self.pan_speed, target.pan_speed),
            pan_depth: mix(self.pan_depth, target.pan_depth),
            room_size: mix(self.room_size, target.room_size),
            wet_level: mix(self.wet_level, target.wet_level),
            damping: mix(self.damping, target.damping),
        }
    }

    /// LFO rate in Hz.
    pub fn pan_speed(&self) -> f64 {
        self.pan_speed
    }

    pub fn pan_depth(&self) -> f64 {
        self.pan_depth
    }

    pub fn room_size(&self) -> f64 {
        self.room_size
    }

    pub fn wet_level(&self) -> f64 {
        self.wet_level
    }

    pub fn damping(&self) -> f64 {
        self.damping
    }
}

/// Raw values as entered in the UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawParameters {
    /// Seconds per full rotation.
    #[serde(default)]
    pub speed_seconds: Option<f64>,
    #[serde(default)]
    pub depth_pct: Option<f64>,
    #[serde(default)]
    pub room_pct: Option<f64>,
    #[serde(default)]
    pub wet_pct: Option<f64>,
    #[serde(default)]
    pub damping_pct: Option<f64>,
}

/// A partial update sent from a control context to a running processor.
/// Absent fields leave the previous value unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterUpdate {
    #[serde(default, alias = "pan_speed", skip_serializing_if = "Option::is_none")]
    pub pan_speed: Option<f64>,
    #[serde(default, alias = "pan_depth", skip_serializing_if = "Option::is_none")]
    pub pan_depth: Option<f64>,
    #[serde(default, alias = "room_size", skip_serializing_if = "Option::is_none")]
    pub room_size: Option<f64>,
    #[serde(default, alias = "wet_level", skip_serializing_if = "Option::is_none")]
    pub wet_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damping: Option<f64>,
}

impl RawParameters {
    pub fn from_json(json: &str) -> SpatialResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl ParameterUpdate {
    /// Parse an update message such as `{"roomSize": 0.7}`.
    pub fn from_json(json: &str) -> SpatialResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_empty(&self) -> bool {
        *self == ParameterUpdate::default()
    }
}

impl From<ParameterUpdate> for ParameterSet {
    fn from(update: ParameterUpdate) -> Self {
        ParameterSet::default().apply(&update)
    }
}

impl From<ParameterSet> for ParameterUpdate {
    fn from(p: ParameterSet) -> Self {
        Self {
            pan_speed: Some(p.pan_speed),
            pan_depth: Some(p.pan_depth),
            room_size: Some(p.room_size),
            wet_level: Some(p.wet_level),
            damping: Some(p.damping),
        }
    }
}

fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_nan() { fallback } else { value.clamp(min, max) }
}

fn unit_or(value: f64, fallback: f64) -> f64 {
    clamp_or(value, 0.0, 1.0, fallback)
}

fn percent_or(value: Option<f64>, fallback: f64) -> f64 {
    match value {
        Some(v) if !v.is_nan() => (v / 100.0).clamp(0.0, 1.0),
        _ => fallback,
    }
}
