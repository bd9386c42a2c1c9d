//! Transport abstractions.
//!
//! The Smoothieware controller's single IO task drives a [`Transport`]
//! directly: `write` never blocks on an ack, and inbound bytes arrive on a
//! broadcast channel instead of a polling `receive()` call — flow control is
//! the Sender's job (see `firmware::smoothieware::sender`), not the
//! transport's.
//!
//! Two backends are provided: [`serial::RealSerialPort`]-backed
//! [`SerialTransport`], and [`tcp::TcpTransport`].

pub mod serial;
pub mod tcp;

pub use serial::{list_ports, RealSerialPort, SerialPort, SerialPortInfo};
pub use tcp::{TcpConnectionInfo, TcpTransport};

use async_trait::async_trait;
use smoothie_core::Result;
use std::sync::Arc;
use tokio::sync::broadcast;

/// How a connection reaches the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDriver {
    /// Serial/USB connection.
    Serial,
    /// TCP/IP connection.
    Tcp,
}

/// Serial parity setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerialParity {
    /// No parity bit.
    #[default]
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

/// Parameters needed to open a connection, for either driver.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionParams {
    /// Which transport to use.
    pub driver: ConnectionDriver,
    /// Serial port path (e.g. `/dev/ttyUSB0`) or TCP host.
    pub port: String,
    /// Baud rate (serial only).
    pub baud_rate: u32,
    /// Data bits (serial only).
    pub data_bits: u8,
    /// Stop bits (serial only).
    pub stop_bits: u8,
    /// Parity (serial only).
    pub parity: SerialParity,
    /// Hardware flow control (serial only).
    pub flow_control: bool,
    /// TCP port (TCP only).
    pub tcp_port: u16,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            driver: ConnectionDriver::Serial,
            port: String::new(),
            baud_rate: 115_200,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            flow_control: false,
            tcp_port: 23,
        }
    }
}

impl ConnectionParams {
    /// Build params for a serial connection.
    pub fn serial(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            driver: ConnectionDriver::Serial,
            port: port.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Build params for a TCP connection.
    pub fn tcp(host: impl Into<String>, tcp_port: u16) -> Self {
        Self {
            driver: ConnectionDriver::Tcp,
            port: host.into(),
            tcp_port,
            ..Default::default()
        }
    }
}

/// Event published by a [`Transport`] for its own lifecycle, separate from
/// the bytes it carries.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connection opened.
    Opened,
    /// The connection closed, expectedly or not.
    Closed,
    /// Bytes arrived from the device.
    Data(Vec<u8>),
}

/// Async, non-blocking transport to a controller.
///
/// `write` is fire-and-forget: it queues bytes for the underlying channel
/// and returns without waiting for an acknowledgment — flow control is the
/// Sender's job, not the transport's. Inbound bytes are delivered through
/// the broadcast receiver returned by `subscribe`, so a single controller
/// task can `tokio::select!` across the tick timer, transport inbound, and
/// command channel at once.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the connection.
    async fn open(&mut self) -> Result<()>;

    /// Close the connection.
    async fn close(&mut self) -> Result<()>;

    /// Write bytes without waiting for any response.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Whether the connection is currently open.
    fn is_open(&self) -> bool;

    /// Subscribe to transport lifecycle/data events.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;

    /// Identity string for logging (port path or host:port).
    fn ident(&self) -> &str;
}

/// `Transport` that discards writes and never produces inbound data.
/// Used in tests and for offline controller-logic exercises.
pub struct NoOpTransport {
    ident: String,
    open: bool,
    tx: broadcast::Sender<TransportEvent>,
}

impl NoOpTransport {
    /// Create a new no-op transport identified by `ident`.
    pub fn new(ident: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            ident: ident.into(),
            open: false,
            tx,
        }
    }
}

#[async_trait]
impl Transport for NoOpTransport {
    async fn open(&mut self) -> Result<()> {
        self.open = true;
        let _ = self.tx.send(TransportEvent::Opened);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        let _ = self.tx.send(TransportEvent::Closed);
        Ok(())
    }

    fn write(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.tx.subscribe()
    }

    fn ident(&self) -> &str {
        &self.ident
    }
}

/// `Transport` backed by a real serial port, read on a dedicated blocking
/// task so the async controller loop never stalls on a port read.
pub struct SerialTransport {
    ident: String,
    params: ConnectionParams,
    port: Arc<parking_lot::Mutex<Option<RealSerialPort>>>,
    tx: broadcast::Sender<TransportEvent>,
    reader_task: Option<tokio::task::JoinHandle<()>>,
}

impl SerialTransport {
    /// Create a serial transport for the given connection parameters.
    pub fn new(params: ConnectionParams) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            ident: params.port.clone(),
            params,
            port: Arc::new(parking_lot::Mutex::new(None)),
            tx,
            reader_task: None,
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<()> {
        let opened = RealSerialPort::open(&self.params)?;
        *self.port.lock() = Some(opened);

        let port = self.port.clone();
        let tx = self.tx.clone();
        self.reader_task = Some(tokio::task::spawn_blocking(move || loop {
            let mut buf = [0u8; 256];
            let read = {
                let mut guard = port.lock();
                match guard.as_mut() {
                    Some(p) => p.read(&mut buf),
                    None => break,
                }
            };
            match read {
                Ok(0) => {}
                Ok(n) => {
                    if tx.send(TransportEvent::Data(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(_) => {
                    let _ = tx.send(TransportEvent::Closed);
                    break;
                }
            }
        }));

        let _ = self.tx.send(TransportEvent::Opened);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        *self.port.lock() = None;
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        let _ = self.tx.send(TransportEvent::Closed);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut guard = self.port.lock();
        let port = guard
            .as_mut()
            .ok_or_else(|| smoothie_core::Error::other("transport not open"))?;
        port.write(data)
            .map_err(|e| smoothie_core::Error::other(e.to_string()))?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.lock().is_some()
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.tx.subscribe()
    }

    fn ident(&self) -> &str {
        &self.ident
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_transport_open_close() {
        let mut t = NoOpTransport::new("test");
        assert!(!t.is_open());
        t.open().await.unwrap();
        assert!(t.is_open());
        t.write(b"G0 X0\n").unwrap();
        t.close().await.unwrap();
        assert!(!t.is_open());
    }
}
