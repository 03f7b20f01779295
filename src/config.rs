//! Configuration management for Helios
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files.

use crate::error::{HeliosError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_true() -> bool {
    true
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Serial bus connection to the inverter
    pub serial: SerialConfig,

    /// Inverter ratings
    pub inverter: InverterConfig,

    /// Charge point connection
    pub charger: ChargerConfig,

    /// Automation behavior (mode, limits, reserves)
    pub automation: AutomationConfig,

    /// Power balance tuning
    pub balance: BalanceConfig,

    /// Site coordinates for the day/night computation
    pub site: SiteConfig,

    /// Storage sink configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Control loop tick interval in milliseconds
    pub poll_interval_ms: u64,
}

/// Serial bus connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial device path (e.g. /dev/ttyUSB0)
    pub device: String,

    /// Baud rate
    pub baud_rate: u32,

    /// Modbus unit id of the inverter
    pub unit_id: u8,

    /// How long to wait for a complete response frame
    pub response_timeout_ms: u64,

    /// Minimum settle time between consecutive requests on the bus
    pub inter_command_delay_ms: u64,
}

/// Inverter ratings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverterConfig {
    /// Rated maximum AC output power in watts
    pub rated_power_w: f64,
}

/// Charge point connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargerConfig {
    /// Base URL of the charge point HTTP API
    pub base_url: String,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

/// Charging mode selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargingMode {
    /// Track the solar surplus
    Surplus,

    /// Charge at the minimum rate while enough surplus exists
    Minimum,

    /// Charge at the minimum rate regardless of surplus
    ForceMinimum,

    /// No charger interaction; the user drives the charger directly
    Manual,
}

/// Automation behavior. Mutated only through the controller command
/// channel; the loop works on an immutable copy each tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Master switch for the control loop
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Active charging mode
    pub mode: ChargingMode,

    /// Upper bound on charging power in watts
    pub max_charging_power_w: f64,

    /// Fixed reserve held back for priority loads in watts
    pub priority_load_reserve_w: f64,

    /// Keep minimum-rate charging going even without surplus
    pub never_stop_charging: bool,

    /// Extra amps on top of the minimum rate in the minimum modes
    pub boost_level: u16,
}

/// Power balance tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceConfig {
    /// Below this state of charge the battery has absolute priority
    pub soc_reserve_floor_percent: f64,

    /// Up to this state of charge part of the surplus is withheld
    /// for battery charging
    pub soc_reserve_ceiling_percent: f64,

    /// Fraction of the surplus withheld for the battery in the
    /// mid-SOC tier
    pub battery_reserve_share: f64,

    /// Cap on the withheld battery reserve in watts
    pub battery_reserve_cap_w: f64,

    /// Derating applied when house consumption exceeds the inverter
    /// rating, in percent of the computed surplus
    pub overload_derating_percent: f64,
}

/// Site coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Latitude in degrees, north positive
    pub latitude: f64,

    /// Longitude in degrees, east positive
    pub longitude: f64,
}

/// Storage sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the append-only telemetry and status files
    pub data_dir: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Directory (or file path whose parent is used) for rotated log files
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            unit_id: 1,
            response_timeout_ms: 1000,
            inter_command_delay_ms: 100,
        }
    }
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            rated_power_w: 10_000.0,
        }
    }
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://192.168.1.60".to_string(),
            request_timeout_ms: 3000,
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: ChargingMode::Surplus,
            max_charging_power_w: 4600.0,
            priority_load_reserve_w: 0.0,
            never_stop_charging: false,
            boost_level: 0,
        }
    }
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            soc_reserve_floor_percent: 30.0,
            soc_reserve_ceiling_percent: 90.0,
            battery_reserve_share: 0.10,
            battery_reserve_cap_w: 300.0,
            overload_derating_percent: 90.0,
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            latitude: 52.37,
            longitude: 4.89,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "/data/helios".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/helios.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            inverter: InverterConfig::default(),
            charger: ChargerConfig::default(),
            automation: AutomationConfig::default(),
            balance: BalanceConfig::default(),
            site: SiteConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            poll_interval_ms: 10_000,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        let default_paths = [
            "helios_config.yaml",
            "/data/helios_config.yaml",
            "/etc/helios/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.serial.device.is_empty() {
            return Err(HeliosError::validation(
                "serial.device",
                "Device path cannot be empty",
            ));
        }

        if self.serial.baud_rate == 0 {
            return Err(HeliosError::validation(
                "serial.baud_rate",
                "Baud rate must be greater than 0",
            ));
        }

        if self.serial.response_timeout_ms == 0 {
            return Err(HeliosError::validation(
                "serial.response_timeout_ms",
                "Must be greater than 0",
            ));
        }

        if self.inverter.rated_power_w <= 0.0 {
            return Err(HeliosError::validation(
                "inverter.rated_power_w",
                "Must be positive",
            ));
        }

        if self.charger.base_url.is_empty() {
            return Err(HeliosError::validation(
                "charger.base_url",
                "Base URL cannot be empty",
            ));
        }

        if self.automation.max_charging_power_w <= 0.0 {
            return Err(HeliosError::validation(
                "automation.max_charging_power_w",
                "Must be positive",
            ));
        }

        if self.automation.priority_load_reserve_w < 0.0 {
            return Err(HeliosError::validation(
                "automation.priority_load_reserve_w",
                "Cannot be negative",
            ));
        }

        if self.balance.soc_reserve_floor_percent > self.balance.soc_reserve_ceiling_percent {
            return Err(HeliosError::validation(
                "balance.soc_reserve_floor_percent",
                "Floor cannot exceed ceiling",
            ));
        }

        if !(0.0..=1.0).contains(&self.balance.battery_reserve_share) {
            return Err(HeliosError::validation(
                "balance.battery_reserve_share",
                "Must be within 0..=1",
            ));
        }

        if !(0.0..=100.0).contains(&self.balance.overload_derating_percent) {
            return Err(HeliosError::validation(
                "balance.overload_derating_percent",
                "Must be within 0..=100",
            ));
        }

        if !(-90.0..=90.0).contains(&self.site.latitude) {
            return Err(HeliosError::validation(
                "site.latitude",
                "Must be within -90..=90",
            ));
        }

        if !(-180.0..=180.0).contains(&self.site.longitude) {
            return Err(HeliosError::validation(
                "site.longitude",
                "Must be within -180..=180",
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(HeliosError::validation(
                "poll_interval_ms",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}
