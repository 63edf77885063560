use std::fmt;

use tracing::trace;

use crate::codec::{Address, Quantity, Word};
use crate::error::Error;
use crate::operation::FunctionCode;

/// Raw bus activity reported to a [`BusLogger`].
#[derive(Debug)]
pub enum BusRecord<'a> {
    Connected { address: &'a str, slave: u8 },
    Closed { address: &'a str },
    Request {
        slave: u8,
        function: FunctionCode,
        address: Address,
        count: Quantity,
    },
    Response { slave: u8, words: &'a [Word] },
    Failed { slave: u8, error: &'a Error },
}

impl fmt::Display for BusRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusRecord::Connected { address, slave } => {
                write!(f, "connected {address} (slave {slave})")
            }
            BusRecord::Closed { address } => write!(f, "closed {address}"),
            BusRecord::Request {
                slave,
                function,
                address,
                count,
            } => write!(
                f,
                "slave {slave} -> fc {function} addr 0x{address:04x} cnt {count}"
            ),
            BusRecord::Response { slave, words } => {
                write!(f, "slave {slave} <- ")?;
                for (i, word) in words.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{word:04x}")?;
                }
                Ok(())
            }
            BusRecord::Failed { slave, error } => write!(f, "slave {slave} !! {error}"),
        }
    }
}

/// Sink for raw bus trace records. Attaching one has no effect on the protocol.
pub trait BusLogger: Send + Sync {
    fn log(&self, record: &BusRecord<'_>);
}

/// Forwards bus records to `tracing` at `TRACE` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl BusLogger for TracingLogger {
    fn log(&self, record: &BusRecord<'_>) {
        trace!(target: "modbus_meters::bus", "{}", record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_display() {
        let record = BusRecord::Request {
            slave: 1,
            function: FunctionCode::ReadInputRegisters,
            address: 0x34,
            count: 2,
        };
        assert_eq!(record.to_string(), "slave 1 -> fc 0x04 addr 0x0034 cnt 2");

        let record = BusRecord::Response {
            slave: 1,
            words: &[0x0901, 0x0000],
        };
        assert_eq!(record.to_string(), "slave 1 <- 0901 0000");
    }
}
