//! Charge point collaborator interface
//!
//! The control loop only depends on the small `ChargePoint` trait; the
//! `http` submodule provides a concrete adapter for wallboxes exposing a
//! JSON status/control API.

use serde::{Deserialize, Serialize};

pub mod http;

pub use http::HttpChargePoint;

use crate::error::Result;

/// Charge point status, refreshed once per control tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChargerStatus {
    /// Whether the charge point answered at all
    pub online: bool,

    /// Whether a charging session is currently delivering power
    pub charging: bool,

    /// Whether a vehicle is plugged in
    pub vehicle_connected: bool,

    /// Present power draw in watts
    pub power_w: f64,

    /// Currently configured charging current in amperes
    pub set_current_a: u16,

    /// Operating mode code as reported by the charge point
    pub mode_code: u8,
}

/// Operations the control loop performs against the charge point
#[async_trait::async_trait]
pub trait ChargePoint: Send {
    /// Fetch the current status
    async fn status(&mut self) -> Result<ChargerStatus>;

    /// Set the charging current in amperes
    async fn set_current(&mut self, amps: u16) -> Result<()>;

    /// Enable or disable charging
    async fn set_enabled(&mut self, enabled: bool) -> Result<()>;
}
