use anyhow::Result;
use helios::charger::HttpChargePoint;
use helios::config::Config;
use helios::controller::SurplusController;
use helios::inverter::TelemetryReader;
use helios::serial::{FrameExchange, SerialPort};
use helios::storage::JsonlStore;
use helios::sun::SolarCalculator;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    helios::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Helios {} solar surplus charging controller starting up",
        env!("APP_VERSION")
    );

    // The serial port is opened once; failing here is fatal
    let port = SerialPort::open(&config.serial)
        .map_err(|e| anyhow::anyhow!("Failed to open serial port: {}", e))?;
    let exchange = FrameExchange::from_config(Box::new(port), &config.serial);
    let reader = TelemetryReader::new(exchange, config.serial.unit_id);

    let charger = HttpChargePoint::new(&config.charger)
        .map_err(|e| anyhow::anyhow!("Failed to create charger client: {}", e))?;
    let storage = JsonlStore::new(&config.storage.data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to open storage: {}", e))?;

    let mut controller = SurplusController::new(
        config,
        Box::new(reader),
        Box::new(charger),
        Box::new(storage),
        Box::new(SolarCalculator),
    );

    // Ctrl-C requests an orderly shutdown of the loop
    let shutdown = controller.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.send(()).ok();
        }
    });

    match controller.run().await {
        Ok(()) => {
            info!("Controller shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Controller failed with error: {}", e);
            Err(anyhow::anyhow!("Controller error: {}", e))
        }
    }
}
