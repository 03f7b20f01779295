//! Inverter register map and telemetry acquisition
//!
//! `InverterRegister` is the explicit, compile-time map of every logical
//! register the controller reads; `TelemetryReader` turns that map into one
//! `TelemetrySnapshot` per invocation over the half-duplex serial bus.

use crate::error::{HeliosError, Result};
use crate::frame;
use crate::logging::get_logger;
use crate::serial::FrameExchange;
use crate::telemetry::{
    AcReading, BatteryReading, GridReading, HouseReading, PvReading, StringReading,
    TelemetrySnapshot,
};
use chrono::Utc;

/// Logical inverter registers.
///
/// Each variant carries its bus address and word count in the `address`
/// and `words` tables below, so a missing arm is a compile error rather
/// than a silent lookup miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InverterRegister {
    /// PV string 1 voltage, tenths of a volt
    Pv1Voltage,
    /// PV string 1 current, tenths of an ampere
    Pv1Current,
    /// PV string 2 voltage, tenths of a volt
    Pv2Voltage,
    /// PV string 2 current, tenths of an ampere
    Pv2Current,
    /// Total DC power, 32-bit pair, tenths of a watt
    PvTotalPower,
    /// AC output power, hundredths of a kilowatt
    AcPower,
    /// Grid frequency, hundredths of a hertz
    GridFrequency,
    /// Inverter temperature, tenths of a degree Celsius
    Temperature,
    /// House consumption, watts
    HouseConsumption,
    /// Backup (EPS) consumption, watts
    BackupConsumption,
    /// Grid active power, signed 32-bit pair, watts
    GridActivePower,
    /// Inverter AC power, signed 32-bit pair, watts
    InverterAcPower,
    /// Cumulative imported energy, 32-bit pair, watt-hours
    EnergyImported,
    /// Cumulative exported energy, 32-bit pair, watt-hours
    EnergyExported,
    /// Battery power magnitude, 32-bit pair, watts
    BatteryPower,
    /// Battery direction flag: 0 = charging, 1 = discharging
    BatteryDirection,
    /// Battery state of charge, percent
    BatterySoc,
    /// Battery voltage, tenths of a volt
    BatteryVoltage,
    /// Battery current, tenths of an ampere
    BatteryCurrent,
}

impl InverterRegister {
    /// Fixed acquisition order for a full snapshot
    pub const READ_ORDER: [InverterRegister; 19] = [
        InverterRegister::Pv1Voltage,
        InverterRegister::Pv1Current,
        InverterRegister::Pv2Voltage,
        InverterRegister::Pv2Current,
        InverterRegister::PvTotalPower,
        InverterRegister::AcPower,
        InverterRegister::GridFrequency,
        InverterRegister::Temperature,
        InverterRegister::HouseConsumption,
        InverterRegister::BackupConsumption,
        InverterRegister::GridActivePower,
        InverterRegister::InverterAcPower,
        InverterRegister::EnergyImported,
        InverterRegister::EnergyExported,
        InverterRegister::BatteryPower,
        InverterRegister::BatteryDirection,
        InverterRegister::BatterySoc,
        InverterRegister::BatteryVoltage,
        InverterRegister::BatteryCurrent,
    ];

    /// Bus address of the register
    pub const fn address(self) -> u16 {
        match self {
            InverterRegister::Pv1Voltage => 0x0006,
            InverterRegister::Pv1Current => 0x0007,
            InverterRegister::Pv2Voltage => 0x0008,
            InverterRegister::Pv2Current => 0x0009,
            InverterRegister::PvTotalPower => 0x000A,
            InverterRegister::AcPower => 0x0023,
            InverterRegister::GridFrequency => 0x0025,
            InverterRegister::Temperature => 0x0026,
            InverterRegister::HouseConsumption => 0x0214,
            InverterRegister::BackupConsumption => 0x0215,
            InverterRegister::GridActivePower => 0x0216,
            InverterRegister::InverterAcPower => 0x0218,
            InverterRegister::EnergyImported => 0x021A,
            InverterRegister::EnergyExported => 0x021C,
            InverterRegister::BatteryPower => 0x0220,
            InverterRegister::BatteryDirection => 0x0222,
            InverterRegister::BatterySoc => 0x0223,
            InverterRegister::BatteryVoltage => 0x0224,
            InverterRegister::BatteryCurrent => 0x0225,
        }
    }

    /// Number of 16-bit words the register spans
    pub const fn words(self) -> u16 {
        match self {
            InverterRegister::PvTotalPower
            | InverterRegister::GridActivePower
            | InverterRegister::InverterAcPower
            | InverterRegister::EnergyImported
            | InverterRegister::EnergyExported
            | InverterRegister::BatteryPower => 2,
            _ => 1,
        }
    }
}

/// Combine a register pair into an unsigned 32-bit value
pub fn combine_u32(high: u16, low: u16) -> u32 {
    ((high as u32) << 16) | low as u32
}

/// Combine a register pair into a signed 32-bit value (two's complement)
pub fn combine_i32(high: u16, low: u16) -> i32 {
    combine_u32(high, low) as i32
}

/// Acquisition seam for the control loop
#[async_trait::async_trait]
pub trait TelemetrySource: Send {
    /// Produce one self-consistent telemetry snapshot
    async fn read_all(&mut self) -> Result<TelemetrySnapshot>;
}

/// Sequences register reads over the serial bus into snapshots
pub struct TelemetryReader {
    exchange: FrameExchange,
    unit_id: u8,
    logger: crate::logging::StructuredLogger,
}

impl TelemetryReader {
    /// Create a new reader over an exchange
    pub fn new(exchange: FrameExchange, unit_id: u8) -> Self {
        let logger = get_logger("inverter");
        Self {
            exchange,
            unit_id,
            logger,
        }
    }

    /// Read one logical register, returning its words
    async fn read_register(&mut self, register: InverterRegister) -> Result<Vec<u16>> {
        let request = frame::build_read_frame(
            self.unit_id,
            frame::FN_READ_INPUT,
            register.address(),
            register.words(),
        )?;
        let response = self.exchange.exchange(&request).await?;
        let parsed = frame::parse_response(&response)?;
        if parsed.unit_id != self.unit_id {
            return Err(HeliosError::malformed(format!(
                "Response from unit {} while addressing unit {}",
                parsed.unit_id, self.unit_id
            )));
        }
        let registers = frame::decode_registers(&parsed.data);
        if registers.len() < register.words() as usize {
            return Err(HeliosError::malformed(format!(
                "Expected {} words for {:?}, got {}",
                register.words(),
                register,
                registers.len()
            )));
        }
        Ok(registers)
    }

    /// Read a single-word register as f64
    async fn read_word(&mut self, register: InverterRegister) -> Result<f64> {
        let words = self.read_register(register).await?;
        Ok(words[0] as f64)
    }

    /// Read a two-word register as unsigned 32-bit
    async fn read_pair_u32(&mut self, register: InverterRegister) -> Result<f64> {
        let words = self.read_register(register).await?;
        Ok(combine_u32(words[0], words[1]) as f64)
    }

    /// Read a two-word register as signed 32-bit
    async fn read_pair_i32(&mut self, register: InverterRegister) -> Result<f64> {
        let words = self.read_register(register).await?;
        Ok(combine_i32(words[0], words[1]) as f64)
    }

    async fn acquire(&mut self) -> Result<TelemetrySnapshot> {
        // Fixed order, one request per logical reading; the exchange
        // inserts the bus settle delay between them.
        let pv1_voltage = self.read_word(InverterRegister::Pv1Voltage).await? / 10.0;
        let pv1_current = self.read_word(InverterRegister::Pv1Current).await? / 10.0;
        let pv2_voltage = self.read_word(InverterRegister::Pv2Voltage).await? / 10.0;
        let pv2_current = self.read_word(InverterRegister::Pv2Current).await? / 10.0;
        let total_dc_power = self.read_pair_u32(InverterRegister::PvTotalPower).await? / 10.0;

        // Hundredths of a kilowatt on the wire
        let ac_power = self.read_word(InverterRegister::AcPower).await? / 100.0 * 1000.0;
        let frequency = self.read_word(InverterRegister::GridFrequency).await? / 100.0;
        let temperature = self.read_word(InverterRegister::Temperature).await? / 10.0;

        let house_consumption = self.read_word(InverterRegister::HouseConsumption).await?;
        let backup_consumption = self.read_word(InverterRegister::BackupConsumption).await?;

        let grid_active_power = self.read_pair_i32(InverterRegister::GridActivePower).await?;
        let inverter_ac_power = self.read_pair_i32(InverterRegister::InverterAcPower).await?;
        let energy_imported = self.read_pair_u32(InverterRegister::EnergyImported).await? / 1000.0;
        let energy_exported = self.read_pair_u32(InverterRegister::EnergyExported).await? / 1000.0;

        // Battery power arrives as a magnitude plus a direction register;
        // the sign is never two's complement.
        let battery_magnitude = self.read_pair_u32(InverterRegister::BatteryPower).await?;
        let battery_direction = self.read_word(InverterRegister::BatteryDirection).await?;
        let battery_power = if battery_direction as u16 == 0 {
            -battery_magnitude
        } else {
            battery_magnitude
        };
        let battery_soc = self.read_word(InverterRegister::BatterySoc).await?;
        let battery_voltage = self.read_word(InverterRegister::BatteryVoltage).await? / 10.0;
        let battery_current = self.read_word(InverterRegister::BatteryCurrent).await? / 10.0;

        Ok(TelemetrySnapshot {
            captured_at: Utc::now(),
            pv: PvReading {
                string1: StringReading {
                    voltage_v: pv1_voltage,
                    current_a: pv1_current,
                    power_w: pv1_voltage * pv1_current,
                },
                string2: StringReading {
                    voltage_v: pv2_voltage,
                    current_a: pv2_current,
                    power_w: pv2_voltage * pv2_current,
                },
                total_dc_power_w: total_dc_power,
            },
            ac: AcReading {
                power_w: ac_power,
                frequency_hz: frequency,
                temperature_c: temperature,
            },
            house: HouseReading {
                consumption_w: house_consumption,
                backup_consumption_w: backup_consumption,
            },
            grid: GridReading {
                active_power_w: grid_active_power,
                inverter_ac_power_w: inverter_ac_power,
                energy_imported_kwh: energy_imported,
                energy_exported_kwh: energy_exported,
            },
            battery: BatteryReading {
                power_w: battery_power,
                soc_percent: battery_soc,
                voltage_v: battery_voltage,
                current_a: battery_current,
            },
        })
    }
}

#[async_trait::async_trait]
impl TelemetrySource for TelemetryReader {
    /// All-or-nothing: a failure on any register abandons the snapshot,
    /// since downstream balance logic requires self-consistent readings.
    async fn read_all(&mut self) -> Result<TelemetrySnapshot> {
        match self.acquire().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                self.logger
                    .warn(&format!("Telemetry acquisition aborted: {}", e));
                Err(HeliosError::acquisition(e.to_string()))
            }
        }
    }
}
