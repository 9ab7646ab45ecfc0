use serde::{Deserialize, Serialize};

/// A raw geographic coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// One stop on a route.
///
/// `distance_to_next_meters`, `cumulative_km_from_start` and `next_stop_name`
/// are derived for the currently active ordering (see `tracker::orientation`)
/// and are never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Stop {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub distance_to_next_meters: Option<f64>,
    pub cumulative_km_from_start: f64,
    pub next_stop_name: Option<String>,
}

impl Stop {
    pub fn new(name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            name: name.into(),
            lat,
            lng,
            distance_to_next_meters: None,
            cumulative_km_from_start: 0.0,
            next_stop_name: None,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// A static route: the canonical (outbound) stop ordering for one bus.
#[derive(Debug, Clone)]
pub struct Route {
    pub bus_id: String,
    pub stops: Vec<Stop>,
}

/// The latest location sample for one vehicle, normalized at the feed
/// boundary. Replace-in-full snapshot; no fix history is retained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub lat: f64,
    pub lng: f64,
    pub speed_kmh: f64,
    pub timestamp_epoch_secs: f64,
    pub online_flag: bool,
}

impl LocationFix {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// Per-session mutable tracking record. Index -1 always means
/// "undetermined" and suppresses ETA/voice/alert derivations.
#[derive(Debug, Clone)]
pub struct TrackerState {
    pub current_stop_index: i32,
    pub last_confirmed_stop_index: i32,
    pub is_online: bool,
    pub eta_seconds: Option<f64>,
    pub notified: bool,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            current_stop_index: -1,
            last_confirmed_stop_index: -1,
            is_online: false,
            eta_seconds: None,
            notified: false,
        }
    }
}

/// Lifecycle phase of a tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No route loaded yet.
    Idle,
    /// Route fetched, first poll not yet completed.
    Loading,
    /// At least one poll completed, success or failure.
    Tracking,
}

impl Default for SessionPhase {
    fn default() -> Self {
        SessionPhase::Idle
    }
}

/// State emitted to consumers (presentation layer, voice trigger,
/// arrival-alert trigger) after every tick.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerSnapshot {
    pub bus_id: String,
    pub phase: SessionPhase,
    pub current_stop_index: i32,
    pub last_confirmed_stop_index: i32,
    pub is_online: bool,
    pub eta_label: String,
    pub countdown_label: String,
    pub upcoming_stop_name: Option<String>,
    /// Set when the current stop changed this tick and the vehicle is moving;
    /// the text-to-speech trigger speaks this name.
    pub announce_stop: Option<String>,
    /// One-shot: true on the single tick the configured user stop comes
    /// within the alert radius.
    pub arrival_alert: bool,
}

/// Lightweight online/offline status emitted by the status watcher.
#[derive(Debug, Clone, Serialize)]
pub struct BusStatus {
    pub bus_id: String,
    pub is_online: bool,
}
