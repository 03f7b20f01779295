//! Charge decision loop
//!
//! The periodic orchestrator: acquires telemetry, persists it, gates on
//! day/night, computes the available surplus and applies the per-mode
//! charging policy with hysteresis. A single task owns all loop state and
//! the serial exchange; ticks never overlap.

use crate::balance::available_charging_power;
use crate::charger::{ChargePoint, ChargerStatus};
use crate::config::{AutomationConfig, ChargingMode, Config};
use crate::error::Result;
use crate::inverter::TelemetrySource;
use crate::logging::get_logger;
use crate::storage::TelemetryStore;
use crate::sun::DayNightOracle;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};

/// Nominal grid voltage used for watts/amps conversion
pub const GRID_VOLTAGE: f64 = 230.0;

/// Lowest current a charge point will deliver
pub const MIN_CHARGE_CURRENT_A: u16 = 6;

/// Hard ceiling on the commanded current
pub const MAX_CHARGE_CURRENT_A: u16 = 20;

/// Power needed to sustain minimum-rate charging (6 A at 230 V)
pub const MIN_CHARGE_POWER_W: f64 = MIN_CHARGE_CURRENT_A as f64 * GRID_VOLTAGE;

/// Commands accepted by the controller from external components
#[derive(Debug, Clone)]
pub enum ControllerCommand {
    /// Enable or disable the automation entirely
    SetEnabled(bool),
    /// Switch the charging mode
    SetMode(ChargingMode),
    /// Change the maximum charging power in watts
    SetMaxPower(f64),
}

/// State the loop carries across ticks for hysteresis
#[derive(Debug, Default)]
pub struct LoopState {
    /// When the last tick ran
    pub last_run: Option<DateTime<Utc>>,

    /// Number of completed ticks
    pub run_count: u64,

    /// When insufficient power was first detected, if currently pending
    pub insufficient_since: Option<Instant>,

    /// Last current actually commanded, for redundant-call suppression
    pub last_commanded_current: Option<u16>,
}

/// The periodic charge decision loop
pub struct SurplusController {
    config: Config,
    telemetry: Box<dyn TelemetrySource>,
    charger: Box<dyn ChargePoint>,
    storage: Box<dyn TelemetryStore>,
    oracle: Box<dyn DayNightOracle>,

    /// Hysteresis state, owned exclusively by this loop
    state: LoopState,

    /// Charger status cached between ticks
    charger_status: ChargerStatus,

    commands_rx: mpsc::UnboundedReceiver<ControllerCommand>,
    commands_tx: mpsc::UnboundedSender<ControllerCommand>,
    shutdown_rx: mpsc::UnboundedReceiver<()>,
    shutdown_tx: mpsc::UnboundedSender<()>,

    logger: crate::logging::StructuredLogger,
}

impl SurplusController {
    /// Create a new controller over the given collaborators
    pub fn new(
        config: Config,
        telemetry: Box<dyn TelemetrySource>,
        charger: Box<dyn ChargePoint>,
        storage: Box<dyn TelemetryStore>,
        oracle: Box<dyn DayNightOracle>,
    ) -> Self {
        let logger = get_logger("controller");
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        Self {
            config,
            telemetry,
            charger,
            storage,
            oracle,
            state: LoopState::default(),
            charger_status: ChargerStatus::default(),
            commands_rx,
            commands_tx,
            shutdown_rx,
            shutdown_tx,
            logger,
        }
    }

    /// Handle for sending runtime commands to the loop
    pub fn command_handle(&self) -> mpsc::UnboundedSender<ControllerCommand> {
        self.commands_tx.clone()
    }

    /// Handle for requesting shutdown
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<()> {
        self.shutdown_tx.clone()
    }

    /// Loop state accessor (for status reporting)
    pub fn loop_state(&self) -> &LoopState {
        &self.state
    }

    /// Run the control loop until shutdown is requested.
    ///
    /// The interval delays missed ticks instead of bursting them, so a
    /// slow tick is followed by a full quiet period rather than a
    /// concurrent or back-to-back run.
    pub async fn run(&mut self) -> Result<()> {
        self.logger.info(&format!(
            "Starting charge decision loop, tick interval {} ms",
            self.config.poll_interval_ms
        ));

        let mut tick = interval(Duration::from_millis(self.config.poll_interval_ms));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.tick().await {
                        // A single bad cycle never halts the scheduler
                        self.logger.error(&format!("Tick failed: {}", e));
                    }
                }
                Some(cmd) = self.commands_rx.recv() => {
                    self.handle_command(cmd);
                }
                _ = self.shutdown_rx.recv() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
            }
        }

        self.logger.info("Charge decision loop stopped");
        Ok(())
    }

    /// Apply a runtime command
    fn handle_command(&mut self, cmd: ControllerCommand) {
        match cmd {
            ControllerCommand::SetEnabled(enabled) => {
                self.logger.info(&format!("Automation enabled: {}", enabled));
                self.config.automation.enabled = enabled;
            }
            ControllerCommand::SetMode(mode) => {
                self.logger.info(&format!("Charging mode: {:?}", mode));
                self.config.automation.mode = mode;
            }
            ControllerCommand::SetMaxPower(watts) => {
                let clamped = watts.max(0.0);
                self.logger
                    .info(&format!("Max charging power: {:.0} W", clamped));
                self.config.automation.max_charging_power_w = clamped;
            }
        }
    }

    /// One control cycle
    pub(crate) async fn tick(&mut self) -> Result<()> {
        // The loop works on an immutable copy of the automation settings
        let automation = self.config.automation.clone();
        if !automation.enabled {
            return Ok(());
        }

        let snapshot = match self.telemetry.read_all().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Skip this tick; the next one is the retry mechanism
                self.logger
                    .warn(&format!("No telemetry this tick: {}", e));
                return Ok(());
            }
        };

        if let Err(e) = self.storage.save_telemetry(&snapshot).await {
            self.logger.warn(&format!("Telemetry not persisted: {}", e));
        }

        let now = Utc::now();

        // No production is expected at night; leave the charger alone
        if self
            .oracle
            .is_night(now, self.config.site.latitude, self.config.site.longitude)
        {
            self.logger.debug("Sun is down, skipping charger handling");
            self.finish_tick(now);
            return Ok(());
        }

        match self.charger.status().await {
            Ok(status) => self.charger_status = status,
            Err(e) => {
                self.logger
                    .warn(&format!("Charger status unavailable: {}", e));
                self.finish_tick(now);
                return Ok(());
            }
        }

        if let Err(e) = self.storage.save_charger_status(&self.charger_status).await {
            self.logger
                .warn(&format!("Charger status not persisted: {}", e));
        }

        let available = available_charging_power(
            &snapshot,
            &self.charger_status,
            &automation,
            &self.config.inverter,
            &self.config.balance,
        );
        self.logger.debug(&format!(
            "solar={:.0}W house={:.0}W soc={:.0}% ev={:.0}W available={:.0}W mode={:?}",
            snapshot.solar_production_w(),
            snapshot.house.consumption_w,
            snapshot.battery.soc_percent,
            self.charger_status.power_w,
            available,
            automation.mode
        ));

        let status = self.charger_status.clone();
        let result = match automation.mode {
            ChargingMode::Manual => Ok(()),
            ChargingMode::Surplus => self.run_surplus(&status, &automation, available).await,
            ChargingMode::Minimum => {
                self.run_minimum(&status, &automation, available, false).await
            }
            ChargingMode::ForceMinimum => {
                self.run_minimum(&status, &automation, available, true).await
            }
        };
        if let Err(e) = result {
            self.logger.warn(&format!("Charger command failed: {}", e));
        }

        self.finish_tick(now);
        Ok(())
    }

    fn finish_tick(&mut self, now: DateTime<Utc>) {
        self.state.last_run = Some(now);
        self.state.run_count += 1;
    }

    /// Upper bound on the commanded current from the configured capacity
    fn max_current(&self, automation: &AutomationConfig) -> u16 {
        let capacity = (automation.max_charging_power_w / GRID_VOLTAGE) as u16;
        capacity.min(MAX_CHARGE_CURRENT_A).max(MIN_CHARGE_CURRENT_A)
    }

    /// Surplus mode: track the available power while a vehicle is connected
    async fn run_surplus(
        &mut self,
        status: &ChargerStatus,
        automation: &AutomationConfig,
        available: f64,
    ) -> Result<()> {
        if !status.vehicle_connected {
            // The charger stops on its own when the vehicle disconnects
            self.state.insufficient_since = None;
            return Ok(());
        }
        let target = available.min(automation.max_charging_power_w);
        if target < MIN_CHARGE_POWER_W {
            return self.hold_or_stop(status).await;
        }
        self.state.insufficient_since = None;
        let amps = ((target / GRID_VOLTAGE) as u16)
            .clamp(MIN_CHARGE_CURRENT_A, self.max_current(automation));
        self.command_current(status, amps).await
    }

    /// Minimum-rate modes: keep a trickle going while power suffices
    /// (or unconditionally when forced / never_stop_charging is set)
    async fn run_minimum(
        &mut self,
        status: &ChargerStatus,
        automation: &AutomationConfig,
        available: f64,
        forced: bool,
    ) -> Result<()> {
        if !status.vehicle_connected {
            self.state.insufficient_since = None;
            return Ok(());
        }
        let sufficient =
            forced || automation.never_stop_charging || available >= MIN_CHARGE_POWER_W;
        if !sufficient {
            return self.hold_or_stop(status).await;
        }
        self.state.insufficient_since = None;
        let amps = (MIN_CHARGE_CURRENT_A + automation.boost_level)
            .min(self.max_current(automation));
        self.command_current(status, amps).await
    }

    /// Hysteresis on insufficient power: when charging is active, hold
    /// through a grace window of 1.5 tick intervals before stopping, so a
    /// single noisy reading never flaps the charger. Recovery clears the
    /// detection timestamp in the sufficient paths.
    async fn hold_or_stop(&mut self, status: &ChargerStatus) -> Result<()> {
        if !status.charging {
            self.state.insufficient_since = None;
            return Ok(());
        }

        let hold = Duration::from_millis(self.config.poll_interval_ms)
            .mul_f64(1.5);
        match self.state.insufficient_since {
            None => {
                self.logger
                    .debug("Available power insufficient, grace window started");
                self.state.insufficient_since = Some(Instant::now());
                Ok(())
            }
            Some(since) if since.elapsed() >= hold => {
                self.logger
                    .info("Insufficient power persisted beyond grace window, stopping charging");
                self.charger.set_enabled(false).await?;
                self.state.insufficient_since = None;
                self.state.last_commanded_current = None;
                Ok(())
            }
            Some(_) => Ok(()),
        }
    }

    /// Command a charging current, skipping redundant calls and
    /// re-enabling a stopped charger.
    async fn command_current(&mut self, status: &ChargerStatus, amps: u16) -> Result<()> {
        if self.state.last_commanded_current == Some(amps) {
            return Ok(());
        }
        self.charger.set_current(amps).await?;
        self.state.last_commanded_current = Some(amps);
        if !status.charging {
            self.charger.set_enabled(true).await?;
        }
        self.logger
            .info(&format!("Requested {} A from charge point", amps));
        Ok(())
    }
}

#[cfg(test)]
mod tests;
