//! TCP/IP communication implementation.
//!
//! Used for network-attached Smoothieware boards (Wi-Fi or Ethernet add-on
//! boards that expose the same textual protocol over a raw TCP socket
//! instead of USB serial).

use crate::communication::{ConnectionParams, Transport, TransportEvent};
use async_trait::async_trait;
use smoothie_core::{Error, Result};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream as AsyncTcpStream;
use tokio::sync::broadcast;

/// Host and port identifying a TCP-attached controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConnectionInfo {
    /// Hostname or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl TcpConnectionInfo {
    /// Create connection info for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Render as a `host:port` string suitable for `TcpStream::connect`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&ConnectionParams> for TcpConnectionInfo {
    fn from(params: &ConnectionParams) -> Self {
        Self::new(params.port.clone(), params.tcp_port)
    }
}

/// Async [`Transport`] backed by `tokio::net::TcpStream`, read on a spawned
/// task the same way [`super::SerialTransport`] reads on a blocking one.
pub struct TcpTransport {
    info: TcpConnectionInfo,
    ident: String,
    writer: Option<Arc<tokio::sync::Mutex<tokio::net::tcp::OwnedWriteHalf>>>,
    tx: broadcast::Sender<TransportEvent>,
    reader_task: Option<tokio::task::JoinHandle<()>>,
}

impl TcpTransport {
    /// Create a TCP transport for `host:port`.
    pub fn new(info: TcpConnectionInfo) -> Self {
        let (tx, _) = broadcast::channel(256);
        let ident = info.addr();
        Self {
            info,
            ident,
            writer: None,
            tx,
            reader_task: None,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&mut self) -> Result<()> {
        let stream = AsyncTcpStream::connect(self.info.addr())
            .await
            .map_err(|e| Error::other(format!("Failed to connect to {}: {}", self.info.addr(), e)))?;
        stream.set_nodelay(true).map_err(|e| Error::other(e.to_string()))?;
        let (mut read_half, write_half) = stream.into_split();
        self.writer = Some(Arc::new(tokio::sync::Mutex::new(write_half)));

        let tx = self.tx.clone();
        self.reader_task = Some(tokio::spawn(async move {
            let mut buf = [0u8; 512];
            loop {
                match read_half.read(&mut buf).await {
                    Ok(0) => {
                        let _ = tx.send(TransportEvent::Closed);
                        break;
                    }
                    Ok(n) => {
                        if tx.send(TransportEvent::Data(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(_) => {
                        let _ = tx.send(TransportEvent::Closed);
                        break;
                    }
                }
            }
        }));

        let _ = self.tx.send(TransportEvent::Opened);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.writer = None;
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        let _ = self.tx.send(TransportEvent::Closed);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let writer = self
            .writer
            .clone()
            .ok_or_else(|| Error::other("transport not open"))?;
        let data = data.to_vec();
        tokio::spawn(async move {
            let mut w = writer.lock().await;
            let _ = w.write_all(&data).await;
        });
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
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

    #[test]
    fn connection_info_addr_format() {
        let info = TcpConnectionInfo::new("192.168.1.50", 23);
        assert_eq!(info.addr(), "192.168.1.50:23");
    }
}
