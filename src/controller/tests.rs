use super::*;
use crate::error::HeliosError;
use crate::telemetry::{
    AcReading, BatteryReading, GridReading, HouseReading, PvReading, StringReading,
    TelemetrySnapshot,
};
use std::sync::{Arc, Mutex};

fn snapshot(solar_w: f64, house_w: f64, soc_percent: f64) -> TelemetrySnapshot {
    TelemetrySnapshot {
        captured_at: Utc::now(),
        pv: PvReading {
            string1: StringReading::default(),
            string2: StringReading::default(),
            total_dc_power_w: solar_w,
        },
        ac: AcReading::default(),
        house: HouseReading {
            consumption_w: house_w,
            backup_consumption_w: 0.0,
        },
        grid: GridReading::default(),
        battery: BatteryReading {
            power_w: 0.0,
            soc_percent,
            voltage_v: 51.0,
            current_a: 0.0,
        },
    }
}

#[derive(Default)]
struct CallLog {
    set_current: Vec<u16>,
    set_enabled: Vec<bool>,
    status_requests: u32,
    telemetry_saved: u32,
    status_saved: u32,
}

struct MockTelemetry {
    snapshot: Arc<Mutex<Option<TelemetrySnapshot>>>,
}

#[async_trait::async_trait]
impl TelemetrySource for MockTelemetry {
    async fn read_all(&mut self) -> Result<TelemetrySnapshot> {
        self.snapshot
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| HeliosError::acquisition("scripted failure"))
    }
}

struct MockChargePoint {
    status: Arc<Mutex<ChargerStatus>>,
    fail_status: bool,
    log: Arc<Mutex<CallLog>>,
}

#[async_trait::async_trait]
impl ChargePoint for MockChargePoint {
    async fn status(&mut self) -> Result<ChargerStatus> {
        self.log.lock().unwrap().status_requests += 1;
        if self.fail_status {
            return Err(HeliosError::charger("scripted status failure"));
        }
        Ok(self.status.lock().unwrap().clone())
    }

    async fn set_current(&mut self, amps: u16) -> Result<()> {
        self.log.lock().unwrap().set_current.push(amps);
        Ok(())
    }

    async fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.log.lock().unwrap().set_enabled.push(enabled);
        Ok(())
    }
}

struct MockStore {
    fail: bool,
    log: Arc<Mutex<CallLog>>,
}

#[async_trait::async_trait]
impl TelemetryStore for MockStore {
    async fn save_telemetry(&mut self, _snapshot: &TelemetrySnapshot) -> Result<()> {
        if self.fail {
            return Err(HeliosError::storage("scripted storage failure"));
        }
        self.log.lock().unwrap().telemetry_saved += 1;
        Ok(())
    }

    async fn save_charger_status(&mut self, _status: &ChargerStatus) -> Result<()> {
        if self.fail {
            return Err(HeliosError::storage("scripted storage failure"));
        }
        self.log.lock().unwrap().status_saved += 1;
        Ok(())
    }
}

struct MockOracle {
    night: bool,
}

impl DayNightOracle for MockOracle {
    fn is_night(&self, _now: DateTime<Utc>, _latitude: f64, _longitude: f64) -> bool {
        self.night
    }
}

struct Fixture {
    controller: SurplusController,
    snapshot: Arc<Mutex<Option<TelemetrySnapshot>>>,
    status: Arc<Mutex<ChargerStatus>>,
    log: Arc<Mutex<CallLog>>,
}

fn fixture(config: Config, telemetry: Option<TelemetrySnapshot>, status: ChargerStatus) -> Fixture {
    fixture_with(config, telemetry, status, false, false, false)
}

fn fixture_with(
    config: Config,
    telemetry: Option<TelemetrySnapshot>,
    status: ChargerStatus,
    night: bool,
    fail_status: bool,
    fail_storage: bool,
) -> Fixture {
    let snapshot = Arc::new(Mutex::new(telemetry));
    let status = Arc::new(Mutex::new(status));
    let log = Arc::new(Mutex::new(CallLog::default()));

    let controller = SurplusController::new(
        config,
        Box::new(MockTelemetry {
            snapshot: snapshot.clone(),
        }),
        Box::new(MockChargePoint {
            status: status.clone(),
            fail_status,
            log: log.clone(),
        }),
        Box::new(MockStore {
            fail: fail_storage,
            log: log.clone(),
        }),
        Box::new(MockOracle { night }),
    );

    Fixture {
        controller,
        snapshot,
        status,
        log,
    }
}

fn connected_status(charging: bool) -> ChargerStatus {
    ChargerStatus {
        online: true,
        charging,
        vehicle_connected: true,
        power_w: if charging { 1500.0 } else { 0.0 },
        set_current_a: if charging { 6 } else { 0 },
        mode_code: 0,
    }
}

fn base_config() -> Config {
    let mut config = Config::default();
    config.poll_interval_ms = 1000;
    config
}

#[tokio::test]
async fn disabled_automation_does_nothing() {
    let mut config = base_config();
    config.automation.enabled = false;
    let mut f = fixture(config, Some(snapshot(5000.0, 500.0, 95.0)), connected_status(false));

    f.controller.tick().await.unwrap();

    let log = f.log.lock().unwrap();
    assert_eq!(log.status_requests, 0);
    assert_eq!(log.telemetry_saved, 0);
    assert_eq!(f.controller.loop_state().run_count, 0);
}

#[tokio::test]
async fn telemetry_failure_skips_the_tick() {
    let mut f = fixture(base_config(), None, connected_status(false));

    f.controller.tick().await.unwrap();

    let log = f.log.lock().unwrap();
    assert_eq!(log.status_requests, 0);
    assert_eq!(log.set_current.len(), 0);
    assert_eq!(f.controller.loop_state().run_count, 0);
}

#[tokio::test]
async fn night_persists_telemetry_but_leaves_charger_alone() {
    let mut f = fixture_with(
        base_config(),
        Some(snapshot(0.0, 400.0, 80.0)),
        connected_status(true),
        true,
        false,
        false,
    );

    f.controller.tick().await.unwrap();

    let log = f.log.lock().unwrap();
    assert_eq!(log.telemetry_saved, 1);
    assert_eq!(log.status_requests, 0);
    assert_eq!(log.set_current.len(), 0);
    assert_eq!(f.controller.loop_state().run_count, 1);
}

#[tokio::test]
async fn surplus_mode_commands_bounded_current() {
    // 9000 W solar, 800 W house, full battery: plenty of surplus,
    // bounded by the 4600 W configured maximum -> 20 A
    let mut f = fixture(
        base_config(),
        Some(snapshot(9000.0, 800.0, 95.0)),
        connected_status(false),
    );

    f.controller.tick().await.unwrap();

    let log = f.log.lock().unwrap();
    assert_eq!(log.set_current, vec![20]);
    // Charger was not charging, so it gets enabled
    assert_eq!(log.set_enabled, vec![true]);
    assert_eq!(log.status_saved, 1);
}

#[tokio::test]
async fn surplus_mode_respects_capacity_limit() {
    let mut config = base_config();
    config.automation.max_charging_power_w = 2300.0; // 10 A
    let mut f = fixture(
        config,
        Some(snapshot(9000.0, 800.0, 95.0)),
        connected_status(false),
    );

    f.controller.tick().await.unwrap();

    assert_eq!(f.log.lock().unwrap().set_current, vec![10]);
}

#[tokio::test]
async fn redundant_current_commands_are_suppressed() {
    let mut f = fixture(
        base_config(),
        Some(snapshot(9000.0, 800.0, 95.0)),
        connected_status(false),
    );

    f.controller.tick().await.unwrap();
    // Same conditions on the next tick: no second command
    f.controller.tick().await.unwrap();

    let log = f.log.lock().unwrap();
    assert_eq!(log.set_current, vec![20]);
    assert_eq!(log.status_requests, 2);
}

#[tokio::test]
async fn vehicle_disconnected_means_no_action() {
    let mut status = connected_status(false);
    status.vehicle_connected = false;
    let mut f = fixture(base_config(), Some(snapshot(9000.0, 800.0, 95.0)), status);

    f.controller.tick().await.unwrap();

    let log = f.log.lock().unwrap();
    assert!(log.set_current.is_empty());
    assert!(log.set_enabled.is_empty());
    assert_eq!(f.controller.loop_state().run_count, 1);
}

#[tokio::test]
async fn insufficient_power_stops_only_after_grace_window() {
    // No solar at all while a session is active
    let mut f = fixture(
        base_config(),
        Some(snapshot(0.0, 400.0, 95.0)),
        connected_status(true),
    );

    // First detection: grace window starts, no stop yet
    f.controller.tick().await.unwrap();
    assert!(f.controller.state.insufficient_since.is_some());
    assert!(f.log.lock().unwrap().set_enabled.is_empty());

    // One interval later: still inside the 1.5x window, no stop yet
    f.controller.state.insufficient_since =
        Some(Instant::now() - Duration::from_millis(1000));
    f.controller.tick().await.unwrap();
    assert!(f.log.lock().unwrap().set_enabled.is_empty());
    assert!(f.controller.state.insufficient_since.is_some());

    // Two intervals after first detection: stop exactly once
    f.controller.state.insufficient_since =
        Some(Instant::now() - Duration::from_millis(2000));
    f.controller.tick().await.unwrap();
    assert_eq!(f.log.lock().unwrap().set_enabled, vec![false]);
    assert!(f.controller.state.insufficient_since.is_none());
    assert_eq!(f.controller.state.last_commanded_current, None);
}

#[tokio::test]
async fn recovered_power_clears_the_detection_timestamp() {
    let mut f = fixture(
        base_config(),
        Some(snapshot(0.0, 400.0, 95.0)),
        connected_status(true),
    );

    f.controller.tick().await.unwrap();
    assert!(f.controller.state.insufficient_since.is_some());

    // Sun returns before the grace window runs out
    *f.snapshot.lock().unwrap() = Some(snapshot(6000.0, 400.0, 95.0));
    f.controller.tick().await.unwrap();
    assert!(f.controller.state.insufficient_since.is_none());
    // And charging was commanded instead of stopped
    let log = f.log.lock().unwrap();
    assert!(log.set_enabled.iter().all(|&enabled| enabled));
    assert!(!log.set_current.is_empty());
}

#[tokio::test]
async fn insufficiency_while_not_charging_needs_no_grace() {
    let mut f = fixture(
        base_config(),
        Some(snapshot(0.0, 400.0, 95.0)),
        connected_status(false),
    );

    f.controller.tick().await.unwrap();

    // Nothing to stop and no pending detection
    assert!(f.controller.state.insufficient_since.is_none());
    assert!(f.log.lock().unwrap().set_enabled.is_empty());
}

#[tokio::test]
async fn minimum_mode_holds_off_below_threshold() {
    let mut config = base_config();
    config.automation.mode = ChargingMode::Minimum;
    // 2000 - 800 = 1200 W available, below the 1380 W minimum
    let mut f = fixture(
        config,
        Some(snapshot(2000.0, 800.0, 95.0)),
        connected_status(false),
    );

    f.controller.tick().await.unwrap();

    let log = f.log.lock().unwrap();
    assert!(log.set_current.is_empty());
    assert!(log.set_enabled.is_empty());
}

#[tokio::test]
async fn minimum_mode_never_stop_overrides_threshold() {
    let mut config = base_config();
    config.automation.mode = ChargingMode::Minimum;
    config.automation.never_stop_charging = true;
    let mut f = fixture(
        config,
        Some(snapshot(2000.0, 800.0, 95.0)),
        connected_status(false),
    );

    f.controller.tick().await.unwrap();

    assert_eq!(f.log.lock().unwrap().set_current, vec![6]);
}

#[tokio::test]
async fn minimum_mode_boost_raises_the_floor() {
    let mut config = base_config();
    config.automation.mode = ChargingMode::Minimum;
    config.automation.boost_level = 2;
    let mut f = fixture(
        config,
        Some(snapshot(4000.0, 800.0, 95.0)),
        connected_status(false),
    );

    f.controller.tick().await.unwrap();

    assert_eq!(f.log.lock().unwrap().set_current, vec![8]);
}

#[tokio::test]
async fn force_minimum_ignores_available_power() {
    let mut config = base_config();
    config.automation.mode = ChargingMode::ForceMinimum;
    let mut f = fixture(
        config,
        Some(snapshot(0.0, 800.0, 95.0)),
        connected_status(false),
    );

    f.controller.tick().await.unwrap();

    assert_eq!(f.log.lock().unwrap().set_current, vec![6]);
}

#[tokio::test]
async fn manual_mode_never_touches_the_charger() {
    let mut config = base_config();
    config.automation.mode = ChargingMode::Manual;
    let mut f = fixture(
        config,
        Some(snapshot(9000.0, 800.0, 95.0)),
        connected_status(true),
    );

    f.controller.tick().await.unwrap();

    let log = f.log.lock().unwrap();
    // Status is still polled and persisted, but nothing is commanded
    assert_eq!(log.status_requests, 1);
    assert!(log.set_current.is_empty());
    assert!(log.set_enabled.is_empty());
}

#[tokio::test]
async fn charger_status_failure_is_isolated() {
    let mut f = fixture_with(
        base_config(),
        Some(snapshot(9000.0, 800.0, 95.0)),
        connected_status(false),
        false,
        true,
        false,
    );

    f.controller.tick().await.unwrap();

    let log = f.log.lock().unwrap();
    assert!(log.set_current.is_empty());
    assert_eq!(f.controller.loop_state().run_count, 1);
}

#[tokio::test]
async fn storage_failure_does_not_abort_the_tick() {
    let mut f = fixture_with(
        base_config(),
        Some(snapshot(9000.0, 800.0, 95.0)),
        connected_status(false),
        false,
        false,
        true,
    );

    f.controller.tick().await.unwrap();

    // The charger command still went out
    assert_eq!(f.log.lock().unwrap().set_current, vec![20]);
}

#[tokio::test]
async fn commands_update_automation_settings() {
    let mut f = fixture(
        base_config(),
        Some(snapshot(9000.0, 800.0, 95.0)),
        connected_status(false),
    );

    f.controller
        .handle_command(ControllerCommand::SetMode(ChargingMode::Manual));
    assert_eq!(f.controller.config.automation.mode, ChargingMode::Manual);

    f.controller
        .handle_command(ControllerCommand::SetEnabled(false));
    assert!(!f.controller.config.automation.enabled);

    f.controller
        .handle_command(ControllerCommand::SetMaxPower(-50.0));
    assert_eq!(f.controller.config.automation.max_charging_power_w, 0.0);
}

#[tokio::test]
async fn cached_status_is_refreshed_each_tick() {
    let mut f = fixture(
        base_config(),
        Some(snapshot(9000.0, 800.0, 95.0)),
        connected_status(false),
    );

    f.controller.tick().await.unwrap();
    assert!(!f.controller.charger_status.charging);

    *f.status.lock().unwrap() = connected_status(true);
    f.controller.tick().await.unwrap();
    assert!(f.controller.charger_status.charging);
}
