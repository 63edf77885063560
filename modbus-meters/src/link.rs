//! Physical transports a [`crate::connection::Bus`] can be opened over.

use std::fmt;
use std::io;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_modbus::client::{rtu, tcp, Context};
use tokio_modbus::slave::Slave;

/// Default Modbus TCP port, added when an address has none.
pub const DEFAULT_TCP_PORT: u16 = 502;

/// Static description of a transport that can open a fresh client [`Context`].
#[async_trait]
pub trait Link: fmt::Display + fmt::Debug + Clone + Send + Sync + 'static {
    async fn open(&self, slave: Slave) -> io::Result<Context>;
}

fn with_default_port(address: &str) -> String {
    let has_port = address
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if has_port {
        address.to_string()
    } else {
        format!("{address}:{DEFAULT_TCP_PORT}")
    }
}

async fn resolve(address: &str) -> io::Result<std::net::SocketAddr> {
    tokio::net::lookup_host(address).await?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("could not resolve {address}"),
        )
    })
}

/// Modbus TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpLink {
    address: String,
}

impl TcpLink {
    pub fn new(address: &str) -> Self {
        Self {
            address: with_default_port(address),
        }
    }
}

impl fmt::Display for TcpLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

#[async_trait]
impl Link for TcpLink {
    async fn open(&self, slave: Slave) -> io::Result<Context> {
        let socket_addr = resolve(&self.address).await?;
        tcp::connect_slave(socket_addr, slave).await
    }
}

/// RTU frames tunnelled through a TCP stream, as spoken by serial gateways.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtuOverTcpLink {
    address: String,
}

impl RtuOverTcpLink {
    pub fn new(address: &str) -> Self {
        Self {
            address: with_default_port(address),
        }
    }
}

impl fmt::Display for RtuOverTcpLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

#[async_trait]
impl Link for RtuOverTcpLink {
    async fn open(&self, slave: Slave) -> io::Result<Context> {
        let socket_addr = resolve(&self.address).await?;
        let stream = TcpStream::connect(socket_addr).await?;
        Ok(rtu::attach_slave(stream, slave))
    }
}

/// Modbus RTU over a local serial port.
#[cfg(feature = "serial")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtuLink {
    path: String,
    baud_rate: u32,
    data_bits: tokio_serial::DataBits,
    parity: tokio_serial::Parity,
    stop_bits: tokio_serial::StopBits,
}

#[cfg(feature = "serial")]
impl RtuLink {
    /// 8N1 serial line.
    pub fn new(path: &str, baud_rate: u32) -> Self {
        Self {
            path: path.to_string(),
            baud_rate,
            data_bits: tokio_serial::DataBits::Eight,
            parity: tokio_serial::Parity::None,
            stop_bits: tokio_serial::StopBits::One,
        }
    }

    pub fn data_bits(mut self, data_bits: tokio_serial::DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn parity(mut self, parity: tokio_serial::Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn stop_bits(mut self, stop_bits: tokio_serial::StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }
}

#[cfg(feature = "serial")]
impl fmt::Display for RtuLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

#[cfg(feature = "serial")]
#[async_trait]
impl Link for RtuLink {
    async fn open(&self, slave: Slave) -> io::Result<Context> {
        let builder = tokio_serial::new(&self.path, self.baud_rate)
            .data_bits(self.data_bits)
            .parity(self.parity)
            .stop_bits(self.stop_bits);
        let serial = tokio_serial::SerialStream::open(&builder).map_err(io::Error::from)?;
        Ok(rtu::attach_slave(serial, slave))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port() {
        assert_eq!(TcpLink::new("192.168.0.7").to_string(), "192.168.0.7:502");
        assert_eq!(TcpLink::new("meter.local:1502").to_string(), "meter.local:1502");
        assert_eq!(RtuOverTcpLink::new("gateway").to_string(), "gateway:502");
    }
}
