//! Bus connections shared by many slave devices.
//!
//! A [`Connection`] owns one tokio-modbus client [`Context`] and remembers which slave
//! it currently addresses. Some meters (Eastron SDM in particular) drop requests when
//! the slave id changes too quickly, so switching away from a previously addressed
//! slave waits for a settle delay first.
//!
//! The link is opened lazily on the first transaction and reopened after [`Connection::close`]
//! or a transport failure. Devices polled from different tasks each get their own
//! connection through [`Connection::clone_slave`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_modbus::client::{Context, Reader};
use tokio_modbus::slave::{Slave, SlaveContext};
use tracing::{debug, warn};

use crate::codec::{Address, Quantity, Word};
use crate::error::{Error, Result};
use crate::link::{Link, RtuOverTcpLink, TcpLink};
use crate::logger::{BusLogger, BusRecord};
use crate::operation::FunctionCode;

/// Pause before talking to a different slave.
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);
/// Per-transaction timeout of a new connection.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Session on one physical transport.
///
/// `Display` renders the transport address.
#[async_trait]
pub trait Connection: fmt::Display + Send {
    /// Address `slave_id` in the following transactions.
    ///
    /// Waits [`SETTLE_DELAY`] first if a different, non-zero slave was addressed before.
    async fn slave(&mut self, slave_id: u8);

    /// Set the transaction timeout, returning the previous one.
    fn timeout(&mut self, timeout: Duration) -> Duration;

    /// Wait `delay` after opening the link before sending the first request.
    fn connect_delay(&mut self, delay: Duration);

    /// Drop the link. The next transaction reopens it.
    async fn close(&mut self);

    /// Independent connection to the same transport, addressing `slave_id`.
    ///
    /// Nothing but static configuration is shared with `self`.
    fn clone_slave(&self, slave_id: u8) -> Box<dyn Connection>;

    /// Underlying client, opening the link if needed.
    async fn client(&mut self) -> Result<&mut Context>;

    /// Attach a sink for raw bus records.
    fn logger(&mut self, logger: Arc<dyn BusLogger>);

    /// Read `count` registers of the class selected by `function`.
    async fn read_registers(
        &mut self,
        function: FunctionCode,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Word>>;
}

/// [`Connection`] over any [`Link`].
pub struct Bus<L: Link> {
    link: L,
    address: String,
    context: Option<Context>,
    slave_id: u8,
    prev_id: u8,
    timeout: Duration,
    connect_delay: Duration,
    settle_delay: Duration,
    logger: Option<Arc<dyn BusLogger>>,
}

pub type TcpConnection = Bus<TcpLink>;
pub type RtuOverTcpConnection = Bus<RtuOverTcpLink>;
#[cfg(feature = "serial")]
pub type RtuConnection = Bus<crate::link::RtuLink>;

impl Bus<TcpLink> {
    pub fn tcp(address: &str) -> Self {
        Self::new(TcpLink::new(address))
    }
}

impl Bus<RtuOverTcpLink> {
    pub fn rtu_over_tcp(address: &str) -> Self {
        Self::new(RtuOverTcpLink::new(address))
    }
}

#[cfg(feature = "serial")]
impl Bus<crate::link::RtuLink> {
    pub fn rtu(path: &str, baud_rate: u32) -> Self {
        Self::new(crate::link::RtuLink::new(path, baud_rate))
    }
}

impl<L: Link> Bus<L> {
    pub fn new(link: L) -> Self {
        let address = link.to_string();
        Self {
            link,
            address,
            context: None,
            slave_id: 0,
            prev_id: 0,
            timeout: DEFAULT_TIMEOUT,
            connect_delay: Duration::ZERO,
            settle_delay: SETTLE_DELAY,
            logger: None,
        }
    }

    /// Override [`SETTLE_DELAY`].
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Currently addressed slave, `0` if none was set.
    pub fn slave_id(&self) -> u8 {
        self.slave_id
    }

    pub fn is_open(&self) -> bool {
        self.context.is_some()
    }

    fn log(&self, record: BusRecord<'_>) {
        if let Some(logger) = &self.logger {
            logger.log(&record);
        }
    }

    async fn open(&mut self) -> Result<Context> {
        let context = tokio::time::timeout(self.timeout, self.link.open(Slave(self.slave_id)))
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        debug!("Connected to {} (slave {})", self.address, self.slave_id);
        self.log(BusRecord::Connected {
            address: &self.address,
            slave: self.slave_id,
        });

        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }

        Ok(context)
    }

    async fn transaction(
        &mut self,
        function: FunctionCode,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Word>> {
        let timeout = self.timeout;
        let client = self.client().await?;

        let response = tokio::time::timeout(timeout, async {
            match function {
                FunctionCode::ReadHoldingRegisters => {
                    client.read_holding_registers(address, count).await
                }
                FunctionCode::ReadInputRegisters => {
                    client.read_input_registers(address, count).await
                }
            }
        })
        .await
        .map_err(|_| Error::Timeout(timeout))?;

        Ok(response??)
    }
}

impl<L: Link> fmt::Display for Bus<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

impl<L: Link> fmt::Debug for Bus<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("link", &self.link)
            .field("open", &self.context.is_some())
            .field("slave_id", &self.slave_id)
            .field("prev_id", &self.prev_id)
            .field("timeout", &self.timeout)
            .field("connect_delay", &self.connect_delay)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<L: Link> Connection for Bus<L> {
    async fn slave(&mut self, slave_id: u8) {
        if self.prev_id != 0 && slave_id != self.prev_id {
            debug!(
                "Switching {} from slave {} to {}",
                self.address, self.prev_id, slave_id
            );
            tokio::time::sleep(self.settle_delay).await;
        }
        self.prev_id = slave_id;
        self.slave_id = slave_id;

        if let Some(context) = self.context.as_mut() {
            context.set_slave(Slave(slave_id));
        }
    }

    fn timeout(&mut self, timeout: Duration) -> Duration {
        std::mem::replace(&mut self.timeout, timeout)
    }

    fn connect_delay(&mut self, delay: Duration) {
        self.connect_delay = delay;
    }

    async fn close(&mut self) {
        if self.context.take().is_some() {
            debug!("Closed {}", self.address);
            self.log(BusRecord::Closed {
                address: &self.address,
            });
        }
    }

    fn clone_slave(&self, slave_id: u8) -> Box<dyn Connection> {
        Box::new(Self {
            link: self.link.clone(),
            address: self.address.clone(),
            context: None,
            slave_id,
            prev_id: slave_id,
            timeout: self.timeout,
            connect_delay: self.connect_delay,
            settle_delay: self.settle_delay,
            logger: self.logger.clone(),
        })
    }

    async fn client(&mut self) -> Result<&mut Context> {
        let context = match self.context.take() {
            Some(context) => context,
            None => self.open().await?,
        };
        Ok(self.context.insert(context))
    }

    fn logger(&mut self, logger: Arc<dyn BusLogger>) {
        self.logger = Some(logger);
    }

    async fn read_registers(
        &mut self,
        function: FunctionCode,
        address: Address,
        count: Quantity,
    ) -> Result<Vec<Word>> {
        let slave = self.slave_id;
        self.log(BusRecord::Request {
            slave,
            function,
            address,
            count,
        });

        match self.transaction(function, address, count).await {
            Ok(words) => {
                self.log(BusRecord::Response {
                    slave,
                    words: &words,
                });
                Ok(words)
            }
            Err(err) => {
                self.log(BusRecord::Failed { slave, error: &err });
                if !matches!(err, Error::Exception(_)) && self.context.take().is_some() {
                    warn!("Dropping link to {} after error: {}", self.address, err);
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Instant;

    use super::*;

    // nothing listens here; the tests below never open the link unless stated
    const ADDRESS: &str = "127.0.0.1:1";

    async fn elapsed<F: std::future::Future>(f: F) -> Duration {
        let start = Instant::now();
        f.await;
        start.elapsed()
    }

    #[tokio::test]
    async fn test_first_slave_does_not_block() {
        let mut conn = TcpConnection::tcp(ADDRESS);
        assert!(elapsed(conn.slave(5)).await < SETTLE_DELAY);
        assert_eq!(conn.slave_id(), 5);
    }

    #[tokio::test]
    async fn test_same_slave_does_not_block() {
        let mut conn = TcpConnection::tcp(ADDRESS);
        conn.slave(5).await;
        assert!(elapsed(conn.slave(5)).await < SETTLE_DELAY);
    }

    #[tokio::test]
    async fn test_slave_switch_waits_settle_delay() {
        let mut conn = TcpConnection::tcp(ADDRESS);
        conn.slave(5).await;
        assert!(elapsed(conn.slave(7)).await >= SETTLE_DELAY);
        assert_eq!(conn.slave_id(), 7);

        // 7 is now the previous slave
        assert!(elapsed(conn.slave(7)).await < SETTLE_DELAY);
        assert!(elapsed(conn.slave(5)).await >= SETTLE_DELAY);
    }

    #[tokio::test]
    async fn test_custom_settle_delay() {
        let delay = Duration::from_millis(250);
        let mut conn = TcpConnection::tcp(ADDRESS).with_settle_delay(delay);
        conn.slave(1).await;
        assert!(elapsed(conn.slave(2)).await >= delay);
    }

    #[tokio::test]
    async fn test_clone_starts_from_its_own_slave() {
        let mut conn = TcpConnection::tcp(ADDRESS);
        conn.slave(5).await;

        let mut clone = conn.clone_slave(9);
        assert_eq!(clone.to_string(), conn.to_string());

        // the original moves on independently
        conn.slave(3).await;

        assert!(elapsed(clone.slave(9)).await < SETTLE_DELAY);
        assert!(elapsed(clone.slave(4)).await >= SETTLE_DELAY);
    }

    #[tokio::test]
    async fn test_clone_copies_static_configuration() {
        let mut conn = TcpConnection::tcp(ADDRESS);
        conn.timeout(Duration::from_millis(300));

        let mut clone = conn.clone_slave(2);
        assert_eq!(clone.timeout(DEFAULT_TIMEOUT), Duration::from_millis(300));

        // changing the clone does not touch the original
        assert_eq!(
            conn.timeout(Duration::from_millis(400)),
            Duration::from_millis(300)
        );
    }

    #[test]
    fn test_timeout_returns_previous() {
        let mut conn = RtuOverTcpConnection::rtu_over_tcp(ADDRESS);
        let previous = conn.timeout(Duration::from_secs(5));
        assert_eq!(previous, DEFAULT_TIMEOUT);
        assert_eq!(conn.timeout(previous), Duration::from_secs(5));
    }

    #[derive(Default)]
    struct RecordingLogger(Mutex<Vec<String>>);

    impl BusLogger for RecordingLogger {
        fn log(&self, record: &BusRecord<'_>) {
            self.0.lock().unwrap().push(record.to_string());
        }
    }

    #[tokio::test]
    async fn test_failed_read_is_returned_and_logged() {
        let logger = Arc::new(RecordingLogger::default());
        let mut conn = TcpConnection::tcp(ADDRESS);
        conn.logger(logger.clone());
        conn.slave(1).await;

        let err = conn
            .read_registers(FunctionCode::ReadInputRegisters, 0, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_) | Error::Timeout(_)), "{err}");
        assert!(!conn.is_open());

        let records = logger.0.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], "slave 1 -> fc 0x04 addr 0x0000 cnt 2");
        assert!(records[1].starts_with("slave 1 !! "));
    }

    #[tokio::test]
    async fn test_close_never_fails() {
        let mut conn = TcpConnection::tcp(ADDRESS);
        conn.close().await;
        conn.close().await;
        assert!(!conn.is_open());
    }
}
