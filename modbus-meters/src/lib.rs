//! Smart meter polling over Modbus, based on [tokio-modbus](https://github.com/slowtec/tokio-modbus).
//!
//! ## Building blocks
//!
//! - [`measurement::Measurement`] is the closed set of quantities a meter can report.
//! - [`transform::Transform`] decodes raw register words (16-bit, word-swapped 32-bit or
//!   float) and divides the result by the model's scale factor.
//! - [`opcodes::Opcodes`] maps the measurements a meter model supports to register addresses.
//! - A [`producer::Producer`] turns a model's catalog into [`operation::Operation`]s: one
//!   probe read and the reads of a full poll.
//! - [`registry::Registry`] maps model names to producers. It is built explicitly at startup,
//!   usually with [`registry::Registry::with_builtin_models`].
//! - A [`connection::Connection`] owns one physical link (TCP, RTU over TCP or RTU with the
//!   `serial` feature) and the slave currently addressed on it.
//!
//! ## Example
//!
//! ```no_run
//! use modbus_meters::{connection::{Connection, TcpConnection}, query, registry::Registry};
//!
//! # async fn run() -> modbus_meters::Result<()> {
//! let registry = Registry::with_builtin_models()?;
//! let producer = registry.create("CGEM24_E1")?;
//!
//! let mut conn = TcpConnection::tcp("192.168.1.20");
//! conn.slave(1).await;
//!
//! for reading in query::query(&mut conn, producer.as_ref()).await? {
//!     println!("{} = {} {}", reading.measurement, reading.value, reading.measurement.unit());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `serial` - RTU over local serial ports via `tokio-serial`
//! - `simulator` - Modbus servers serving simulated meters, for tests and demos

/// Utilities for encoding from and decoding to Modbus registers
pub mod codec;
/// Device configuration file
pub mod config;
/// Bus connections and slave addressing
pub mod connection;
mod error;
/// Physical transports
pub mod link;
/// Raw bus trace sink
pub mod logger;
/// Quantities reported by meters
pub mod measurement;
/// Meter models
pub mod models;
/// Per-model measurement to register address catalogs
pub mod opcodes;
/// Register read descriptors
pub mod operation;
/// Turning a model catalog into reads
pub mod producer;
/// Executing operations and collecting readings
pub mod query;
/// Model name to producer lookup
pub mod registry;
/// Decoding and scaling register words
pub mod transform;

/// Meter simulator (based on tokio-modbus [servers examples](https://github.com/slowtec/tokio-modbus/tree/main/examples))
#[cfg(feature = "simulator")]
pub mod simulator;

pub use error::{Error, Result};
