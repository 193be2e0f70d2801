use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Number of remotely switchable house circuits. The array index is the circuit identity on the wire.
pub const RELAY_COUNT: usize = 4;

/// Alert message shown until the first snapshot arrives
pub const AWAITING_DATA: &str = "awaiting data";

/// Readings from the grid pole meter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoleReading {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub voltage: f64,
    pub power: f64,
    pub current: f64,
    /// Cumulative kWh
    pub energy: f64,
    pub frequency: f64,
    #[serde(rename = "pf", alias = "powerFactor", alias = "power_factor")]
    pub power_factor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

/// Readings from the house unit, including its relay bank
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseReading {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub voltage: f64,
    pub power: f64,
    pub current: f64,
    pub energy: f64,
    pub frequency: f64,
    #[serde(rename = "pf", alias = "powerFactor", alias = "power_factor")]
    pub power_factor: f64,
    /// Degrees Celsius
    pub temperature: f64,
    pub relays: [bool; RELAY_COUNT],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

/// Alert flags computed upstream and carried as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alerts {
    #[serde(default, alias = "theftDetected")]
    pub theft_detected: bool,
    #[serde(default, alias = "maintenanceRisk")]
    pub maintenance_risk: bool,
    /// Usually within [0, 1] but not clamped by the producer
    #[serde(default, alias = "riskScore")]
    pub risk_score: f64,
    #[serde(default)]
    pub message: String,
}

impl Default for Alerts {
    fn default() -> Self {
        Self {
            theft_detected: false,
            maintenance_risk: false,
            risk_score: 0.0,
            message: AWAITING_DATA.to_string(),
        }
    }
}

/// Complete system state at one point in time.
///
/// Snapshots are replaced wholesale, never patched. Local changes go through
/// [`SystemSnapshot::with_relay`], which builds a new value and leaves the
/// original untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    #[serde(default)]
    pub pole: PoleReading,
    #[serde(default)]
    pub house: HouseReading,
    #[serde(default)]
    pub alerts: Alerts,
}

impl SystemSnapshot {
    /// Copy of this snapshot with one house relay set to `state`
    pub fn with_relay(&self, index: usize, state: bool) -> Result<Self> {
        if index >= RELAY_COUNT {
            return Err(AppError::InvalidRelay(index));
        }

        let mut next = self.clone();
        next.house.relays[index] = state;
        Ok(next)
    }
}
