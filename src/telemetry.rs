//! Telemetry snapshot types
//!
//! One `TelemetrySnapshot` is produced per acquisition and owned by the
//! tick that requested it; snapshots are superseded, never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Readings for a single PV string
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StringReading {
    /// String voltage in volts
    pub voltage_v: f64,

    /// String current in amperes
    pub current_a: f64,

    /// String power in watts (derived V·I)
    pub power_w: f64,
}

/// PV side of the inverter
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PvReading {
    /// First string
    pub string1: StringReading,

    /// Second string
    pub string2: StringReading,

    /// Total DC power in watts
    pub total_dc_power_w: f64,
}

/// AC side of the inverter
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AcReading {
    /// Total AC output power in watts
    pub power_w: f64,

    /// Grid frequency in hertz
    pub frequency_hz: f64,

    /// Inverter temperature in degrees Celsius
    pub temperature_c: f64,
}

/// Household consumption
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HouseReading {
    /// Total house consumption in watts
    pub consumption_w: f64,

    /// Backup (EPS) output consumption in watts
    pub backup_consumption_w: f64,
}

/// Grid exchange
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GridReading {
    /// Signed active power at the grid connection in watts
    /// (positive = import, negative = export)
    pub active_power_w: f64,

    /// Inverter AC output power in watts
    pub inverter_ac_power_w: f64,

    /// Cumulative imported energy in kWh
    pub energy_imported_kwh: f64,

    /// Cumulative exported energy in kWh
    pub energy_exported_kwh: f64,
}

/// Battery state
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BatteryReading {
    /// Signed battery power in watts
    /// (negative = charging, positive = discharging)
    pub power_w: f64,

    /// State of charge in percent
    pub soc_percent: f64,

    /// Battery voltage in volts
    pub voltage_v: f64,

    /// Battery current in amperes
    pub current_a: f64,
}

/// Composite telemetry snapshot, immutable once constructed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// When the snapshot was captured
    pub captured_at: DateTime<Utc>,

    /// PV side
    pub pv: PvReading,

    /// AC side
    pub ac: AcReading,

    /// Household
    pub house: HouseReading,

    /// Grid exchange
    pub grid: GridReading,

    /// Battery
    pub battery: BatteryReading,
}

impl TelemetrySnapshot {
    /// Current solar production in watts.
    ///
    /// The balance calculation works from the DC side, which also covers
    /// production that is being buffered into the battery.
    pub fn solar_production_w(&self) -> f64 {
        self.pv.total_dc_power_w
    }
}
