//! Serial transport for the half-duplex inverter bus
//!
//! The core only needs two primitives from the transport: send bytes and
//! await arrived bytes. `SerialPort` provides them over a real RS-485
//! adapter; tests substitute scripted transports. `FrameExchange` layers
//! the request/response discipline on top: settle delay between commands,
//! response reassembly via the frame codec, and a response timeout.

use crate::config::SerialConfig;
use crate::error::{HeliosError, Result};
use crate::frame;
use crate::logging::get_logger;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{Instant, sleep, timeout_at};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Byte-level transport primitives the protocol layer depends on
#[async_trait::async_trait]
pub trait ByteTransport: Send {
    /// Write a full request onto the bus
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Wait until at least one byte has arrived and copy what is
    /// available into `buf`, returning the number of bytes read
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Serial port transport
///
/// The port is opened once at startup; a failure to open is fatal upstream.
pub struct SerialPort {
    stream: SerialStream,
}

impl SerialPort {
    /// Open the configured serial device
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let logger = get_logger("serial");
        let stream = tokio_serial::new(&config.device, config.baud_rate).open_native_async()?;
        logger.info(&format!(
            "Opened serial device {} at {} baud",
            config.device, config.baud_rate
        ));
        Ok(Self { stream })
    }
}

#[async_trait::async_trait]
impl ByteTransport for SerialPort {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.stream.read(buf).await?)
    }
}

/// Request/response exchange over a half-duplex bus.
///
/// `exchange` takes `&mut self`, so at most one request can be in flight
/// at any time. A mandatory settle window is enforced between consecutive
/// exchanges to let the bus quiesce.
pub struct FrameExchange {
    transport: Box<dyn ByteTransport>,
    response_timeout: Duration,
    settle_delay: Duration,
    last_exchange: Option<Instant>,
    logger: crate::logging::StructuredLogger,
}

impl FrameExchange {
    /// Create a new exchange over the given transport
    pub fn new(
        transport: Box<dyn ByteTransport>,
        response_timeout: Duration,
        settle_delay: Duration,
    ) -> Self {
        let logger = get_logger("serial");
        Self {
            transport,
            response_timeout,
            settle_delay,
            last_exchange: None,
            logger,
        }
    }

    /// Create an exchange from the serial configuration
    pub fn from_config(transport: Box<dyn ByteTransport>, config: &SerialConfig) -> Self {
        Self::new(
            transport,
            Duration::from_millis(config.response_timeout_ms),
            Duration::from_millis(config.inter_command_delay_ms),
        )
    }

    /// Send one request frame and collect the complete response frame.
    ///
    /// Bytes are accumulated until the codec reports a complete frame; a
    /// `Timeout` error cancels only this exchange.
    pub async fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        if let Some(last) = self.last_exchange {
            let elapsed = last.elapsed();
            if elapsed < self.settle_delay {
                sleep(self.settle_delay - elapsed).await;
            }
        }

        let result = self.exchange_inner(request).await;
        self.last_exchange = Some(Instant::now());
        result
    }

    async fn exchange_inner(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        self.logger
            .trace(&format!("Sending {} byte request", request.len()));
        self.transport.send(request).await?;

        let deadline = Instant::now() + self.response_timeout;
        let mut response = Vec::with_capacity(64);
        let mut chunk = [0u8; 64];

        while !frame::frame_complete(&response) {
            let n = match timeout_at(deadline, self.transport.recv(&mut chunk)).await {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(HeliosError::timeout(format!(
                        "No complete response within {} ms ({} bytes received)",
                        self.response_timeout.as_millis(),
                        response.len()
                    )));
                }
            };
            if n == 0 {
                return Err(HeliosError::serial("Transport closed while receiving"));
            }
            response.extend_from_slice(&chunk[..n]);
        }

        self.logger
            .trace(&format!("Received {} byte response", response.len()));
        Ok(response)
    }
}
