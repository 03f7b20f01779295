use helios::config::{ChargingMode, Config};

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn config_round_trips_through_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("helios_config.yaml");

    let mut config = Config::default();
    config.automation.mode = ChargingMode::Minimum;
    config.automation.never_stop_charging = true;
    config.serial.device = "/dev/ttyAMA0".to_string();
    config.site.latitude = 47.5;

    config.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.automation.mode, ChargingMode::Minimum);
    assert!(loaded.automation.never_stop_charging);
    assert_eq!(loaded.serial.device, "/dev/ttyAMA0");
    assert_eq!(loaded.site.latitude, 47.5);
}

#[test]
fn missing_file_errors() {
    assert!(Config::from_file("/nonexistent/helios.yaml").is_err());
}

#[test]
fn partial_yaml_with_defaults_for_automation_enabled() {
    // enabled defaults to true when omitted from the automation section
    let yaml = r#"
serial:
  device: /dev/ttyUSB1
  baud_rate: 19200
  unit_id: 3
  response_timeout_ms: 500
  inter_command_delay_ms: 50
inverter:
  rated_power_w: 8000.0
charger:
  base_url: http://wallbox.local
  request_timeout_ms: 2000
automation:
  mode: surplus
  max_charging_power_w: 3680.0
  priority_load_reserve_w: 100.0
  never_stop_charging: false
  boost_level: 0
balance:
  soc_reserve_floor_percent: 30.0
  soc_reserve_ceiling_percent: 90.0
  battery_reserve_share: 0.1
  battery_reserve_cap_w: 300.0
  overload_derating_percent: 90.0
site:
  latitude: 52.0
  longitude: 5.0
storage:
  data_dir: /tmp/helios-data
logging:
  level: DEBUG
  file: /tmp/helios.log
  backup_count: 3
  console_output: true
  json_format: false
poll_interval_ms: 5000
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert!(config.automation.enabled);
    assert_eq!(config.serial.baud_rate, 19200);
    assert_eq!(config.poll_interval_ms, 5000);
    assert!(config.validate().is_ok());
}

#[test]
fn validation_rejects_out_of_range_values() {
    let mut config = Config::default();
    config.poll_interval_ms = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.automation.max_charging_power_w = 0.0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.balance.battery_reserve_share = 1.5;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.site.longitude = 200.0;
    assert!(config.validate().is_err());
}
