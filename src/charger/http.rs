//! HTTP adapter for charge points with a JSON API

use crate::charger::{ChargePoint, ChargerStatus};
use crate::config::ChargerConfig;
use crate::error::{HeliosError, Result};
use crate::logging::get_logger;
use serde::Deserialize;
use std::time::Duration;

/// Wire format of the charge point's status endpoint
#[derive(Debug, Deserialize)]
struct StatusPayload {
    /// Vehicle plugged in
    connected: bool,

    /// Session currently delivering power
    charging: bool,

    /// Present power draw in watts
    power_w: f64,

    /// Configured charging current in amperes
    current_a: u16,

    /// Operating mode code
    #[serde(default)]
    mode: u8,
}

/// Charge point client over its HTTP API
pub struct HttpChargePoint {
    client: reqwest::Client,
    base_url: String,
    logger: crate::logging::StructuredLogger,
}

impl HttpChargePoint {
    /// Create a new client from configuration
    pub fn new(config: &ChargerConfig) -> Result<Self> {
        let logger = get_logger("charger");
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| HeliosError::charger(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            logger,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl ChargePoint for HttpChargePoint {
    async fn status(&mut self) -> Result<ChargerStatus> {
        let response = self
            .client
            .get(self.url("api/status"))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| HeliosError::charger(format!("Status request rejected: {}", e)))?;

        let payload: StatusPayload = response.json().await?;
        self.logger.trace(&format!(
            "Charge point status: connected={} charging={} power={:.0}W current={}A",
            payload.connected, payload.charging, payload.power_w, payload.current_a
        ));

        Ok(ChargerStatus {
            online: true,
            charging: payload.charging,
            vehicle_connected: payload.connected,
            power_w: payload.power_w,
            set_current_a: payload.current_a,
            mode_code: payload.mode,
        })
    }

    async fn set_current(&mut self, amps: u16) -> Result<()> {
        self.logger
            .debug(&format!("Setting charge current to {} A", amps));
        self.client
            .post(self.url("api/current"))
            .json(&serde_json::json!({ "amps": amps }))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| HeliosError::charger(format!("Set current rejected: {}", e)))?;
        Ok(())
    }

    async fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.logger
            .debug(&format!("Setting charging enabled to {}", enabled));
        self.client
            .post(self.url("api/enabled"))
            .json(&serde_json::json!({ "enabled": enabled }))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| HeliosError::charger(format!("Set enabled rejected: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let config = ChargerConfig {
            base_url: "http://wallbox.local/".to_string(),
            request_timeout_ms: 1000,
        };
        let charger = HttpChargePoint::new(&config).unwrap();
        assert_eq!(charger.url("api/status"), "http://wallbox.local/api/status");
    }

    #[test]
    fn status_payload_parses_with_default_mode() {
        let json = r#"{"connected":true,"charging":false,"power_w":0.0,"current_a":6}"#;
        let payload: StatusPayload = serde_json::from_str(json).unwrap();
        assert!(payload.connected);
        assert!(!payload.charging);
        assert_eq!(payload.current_a, 6);
        assert_eq!(payload.mode, 0);
    }
}
