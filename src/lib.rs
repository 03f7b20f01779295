//! # Helios - Solar Surplus EV Charging Controller
//!
//! A Rust implementation of a distributed energy resource balancer: it
//! reads real-time telemetry from a solar inverter over a half-duplex
//! serial bus, computes how much power is safely available for vehicle
//! charging, and steers an EV charge point toward that surplus within
//! configured safety bounds.
//!
//! ## Features
//!
//! - **Async-first**: single-task control loop on the Tokio runtime
//! - **Modbus RTU**: hand-validated framing with CRC16 over RS-485
//! - **Surplus tracking**: battery-reserve tiers and priority-load rules
//! - **Hysteresis**: grace window before stopping on noisy readings
//! - **Day/night gating**: sun-position computation, no charger chatter
//!   at night
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation
//! of concerns:
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `frame`: Modbus RTU frame codec (CRC16, completion, parsing)
//! - `serial`: Byte transport and half-duplex request/response exchange
//! - `telemetry`: Immutable telemetry snapshot types
//! - `inverter`: Register map and telemetry acquisition
//! - `balance`: Pure power balance calculation
//! - `charger`: Charge point interface and HTTP adapter
//! - `storage`: Best-effort telemetry persistence
//! - `sun`: Day/night determination from sun position
//! - `controller`: The periodic charge decision loop

pub mod balance;
pub mod charger;
pub mod config;
pub mod controller;
pub mod error;
pub mod frame;
pub mod inverter;
pub mod logging;
pub mod serial;
pub mod storage;
pub mod sun;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use controller::SurplusController;
pub use error::{HeliosError, Result};
