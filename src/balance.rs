//! Power balance calculation
//!
//! Pure mapping from {telemetry, charger status, configuration} to the
//! power that is safely available for vehicle charging. No I/O and no
//! state, so every rule is testable with literal input/output pairs.

use crate::charger::ChargerStatus;
use crate::config::{AutomationConfig, BalanceConfig, InverterConfig};
use crate::telemetry::TelemetrySnapshot;

/// Compute the power available for vehicle charging, in watts.
///
/// Always returns a value `>= 0`. Rules, in order: clamp solar production
/// to the inverter rating, take the EV's own draw out of the house load,
/// form the base surplus, apply the battery reserve tiers on state of
/// charge, subtract the priority load reserve, derate when the house
/// exceeds the inverter rating, and finally cap at solar production when
/// the EV is already drawing more than the sun delivers (so the battery
/// or grid is subsidizing it).
pub fn available_charging_power(
    telemetry: &TelemetrySnapshot,
    charger: &ChargerStatus,
    automation: &AutomationConfig,
    inverter: &InverterConfig,
    balance: &BalanceConfig,
) -> f64 {
    let solar = telemetry.solar_production_w();
    let clamped_solar = solar.min(inverter.rated_power_w);

    // House consumption attributable to the home itself
    let house = (telemetry.house.consumption_w - charger.power_w).max(0.0);

    let mut surplus = (clamped_solar - house).max(0.0);

    // Battery reserve tiers: below the floor the battery has absolute
    // priority; up to the ceiling part of the surplus is withheld.
    let soc = telemetry.battery.soc_percent;
    if soc < balance.soc_reserve_floor_percent {
        return 0.0;
    }
    if soc < balance.soc_reserve_ceiling_percent {
        let reserve = (surplus * balance.battery_reserve_share).min(balance.battery_reserve_cap_w);
        surplus -= reserve;
    }

    surplus = (surplus - automation.priority_load_reserve_w).max(0.0);

    // Protects against undersized inverter headroom
    let derating = if telemetry.house.consumption_w > inverter.rated_power_w {
        balance.overload_derating_percent / 100.0
    } else {
        1.0
    };
    surplus *= derating;

    // The EV drawing more than current production means the battery or
    // grid is subsidizing it; cap at production minus the reserve to
    // prevent runaway import.
    if charger.power_w > solar {
        surplus = (solar - automation.priority_load_reserve_w).max(0.0) * derating;
    }

    surplus.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{
        AcReading, BatteryReading, GridReading, HouseReading, PvReading, StringReading,
    };
    use chrono::Utc;

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

    fn charger(power_w: f64) -> ChargerStatus {
        ChargerStatus {
            online: true,
            charging: power_w > 0.0,
            vehicle_connected: true,
            power_w,
            set_current_a: 0,
            mode_code: 0,
        }
    }

    fn defaults() -> (AutomationConfig, InverterConfig, BalanceConfig) {
        (
            AutomationConfig::default(),
            InverterConfig::default(),
            BalanceConfig::default(),
        )
    }

    #[test]
    fn full_battery_surplus_flows_through() {
        let (automation, inverter, balance) = defaults();
        let available = available_charging_power(
            &snapshot(4500.0, 800.0, 95.0),
            &charger(0.0),
            &automation,
            &inverter,
            &balance,
        );
        assert_eq!(available, 3700.0);
    }

    #[test]
    fn mid_soc_withholds_capped_battery_reserve() {
        let (automation, inverter, balance) = defaults();
        // 4500 - 800 = 3700; 10% is 370 which the cap trims to 300
        let available = available_charging_power(
            &snapshot(4500.0, 800.0, 85.0),
            &charger(0.0),
            &automation,
            &inverter,
            &balance,
        );
        assert_eq!(available, 3400.0);
    }

    #[test]
    fn small_surplus_reserve_stays_under_cap() {
        let (automation, inverter, balance) = defaults();
        // 1000 surplus, 10% = 100 < 300 cap
        let available = available_charging_power(
            &snapshot(1800.0, 800.0, 50.0),
            &charger(0.0),
            &automation,
            &inverter,
            &balance,
        );
        assert_eq!(available, 900.0);
    }

    #[test]
    fn low_soc_yields_zero_regardless_of_surplus() {
        let (automation, inverter, balance) = defaults();
        let available = available_charging_power(
            &snapshot(9000.0, 0.0, 25.0),
            &charger(0.0),
            &automation,
            &inverter,
            &balance,
        );
        assert_eq!(available, 0.0);
    }

    #[test]
    fn priority_reserve_is_subtracted_and_floored() {
        let (mut automation, inverter, balance) = defaults();
        automation.priority_load_reserve_w = 500.0;
        let available = available_charging_power(
            &snapshot(4500.0, 800.0, 95.0),
            &charger(0.0),
            &automation,
            &inverter,
            &balance,
        );
        assert_eq!(available, 3200.0);

        // Reserve larger than the surplus floors at zero
        automation.priority_load_reserve_w = 10_000.0;
        let available = available_charging_power(
            &snapshot(4500.0, 800.0, 95.0),
            &charger(0.0),
            &automation,
            &inverter,
            &balance,
        );
        assert_eq!(available, 0.0);
    }

    #[test]
    fn ev_draw_is_excluded_from_house_load() {
        let (automation, inverter, balance) = defaults();
        // House meter shows 3000 W but 2200 of that is the EV itself
        let available = available_charging_power(
            &snapshot(4500.0, 3000.0, 95.0),
            &charger(2200.0),
            &automation,
            &inverter,
            &balance,
        );
        assert_eq!(available, 3700.0);
    }

    #[test]
    fn solar_is_clamped_to_inverter_rating() {
        let (automation, inverter, balance) = defaults();
        // 12 kW claimed production against a 10 kW rating
        let available = available_charging_power(
            &snapshot(12_000.0, 1000.0, 95.0),
            &charger(0.0),
            &automation,
            &inverter,
            &balance,
        );
        assert_eq!(available, 9000.0);
    }

    #[test]
    fn overload_derating_applies_when_house_exceeds_rating() {
        let (automation, inverter, balance) = defaults();
        // House over the 10 kW rating; EV draw brings the net load down
        let available = available_charging_power(
            &snapshot(10_000.0, 10_500.0, 95.0),
            &charger(4000.0),
            &automation,
            &inverter,
            &balance,
        );
        // surplus = 10000 - 6500 = 3500, derated by 90%
        assert_eq!(available, 3150.0);
    }

    #[test]
    fn grid_subsidized_charging_is_capped_at_production() {
        let (automation, inverter, balance) = defaults();
        // EV draws 3000 W against only 1000 W of sun
        let available = available_charging_power(
            &snapshot(1000.0, 3200.0, 95.0),
            &charger(3000.0),
            &automation,
            &inverter,
            &balance,
        );
        assert!(available <= 1000.0);
        assert_eq!(available, 1000.0);
    }

    #[test]
    fn grid_subsidy_cap_honors_priority_reserve() {
        let (mut automation, inverter, balance) = defaults();
        automation.priority_load_reserve_w = 400.0;
        let available = available_charging_power(
            &snapshot(1000.0, 3200.0, 95.0),
            &charger(3000.0),
            &automation,
            &inverter,
            &balance,
        );
        assert_eq!(available, 600.0);
    }

    #[test]
    fn never_negative() {
        let (automation, inverter, balance) = defaults();
        for (solar, house, soc, ev) in [
            (0.0, 5000.0, 95.0, 0.0),
            (0.0, 0.0, 0.0, 0.0),
            (100.0, 20_000.0, 99.0, 500.0),
            (5000.0, 0.0, 29.9, 0.0),
        ] {
            let available = available_charging_power(
                &snapshot(solar, house, soc),
                &charger(ev),
                &automation,
                &inverter,
                &balance,
            );
            assert!(available >= 0.0, "negative for {solar}/{house}/{soc}/{ev}");
        }
    }
}
