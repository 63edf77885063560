use std::{
    collections::{BTreeMap, HashMap},
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use futures::future;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_modbus::{server, Exception, Request, Response};
use tokio_stream::{wrappers::IntervalStream, StreamExt};
use tracing::{debug, error, warn};

use crate::codec::{Address, Quantity, Word};
use crate::error::{Error, Result};
use crate::measurement::Measurement;
use crate::operation::{FunctionCode, Operation};
use crate::producer::Producer;

#[derive(Debug, Clone, Default)]
/// A raw Modbus input and holding registers representation
pub struct Registers(HashMap<Address, Word>);

impl Registers {
    /// Insert new consecutive registers with `words` values starting at `addr` address.
    ///
    /// Words that would land past the last address are dropped.
    pub fn insert(&mut self, addr: Address, words: Vec<Word>) {
        for (i, value) in words.into_iter().enumerate() {
            let offset = Address::try_from(i).ok();
            let Some(reg_addr) = offset.and_then(|offset| addr.checked_add(offset)) else {
                warn!("SERVER: register {addr} + {i} is out of range");
                break;
            };
            self.0.insert(reg_addr, value);
        }
    }

    /// Read `cnt` consecutive registers starting at `addr`.
    pub fn read(&self, addr: Address, cnt: Quantity) -> Result<Vec<Word>, Exception> {
        (0..cnt)
            .map(|i| {
                addr.checked_add(i)
                    .and_then(|reg_addr| self.0.get(&reg_addr).copied())
                    .ok_or_else(|| {
                        debug!("SERVER: no register at address {addr} + {i}");
                        Exception::IllegalDataAddress
                    })
            })
            .collect()
    }

    /// Write `words` into existing consecutive registers starting at `addr`.
    pub fn write(&mut self, addr: Address, words: &[Word]) -> Result<(), Exception> {
        for (i, value) in words.iter().enumerate() {
            let reg = Address::try_from(i)
                .ok()
                .and_then(|i| addr.checked_add(i))
                .and_then(|reg_addr| self.0.get_mut(&reg_addr));
            match reg {
                Some(r) => *r = *value,
                None => return Err(Exception::IllegalDataAddress),
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
/// Input and holding register maps served by a simulated device.
pub struct RegisterImage {
    pub input_registers: Registers,
    pub holding_registers: Registers,
}

impl RegisterImage {
    /// Store `value` where `op` reads it, encoded through its transform.
    pub fn load(&mut self, op: &Operation, value: f64) {
        let words = op.transform().encode(value);
        match op.function() {
            FunctionCode::ReadInputRegisters => self.input_registers.insert(op.address(), words),
            FunctionCode::ReadHoldingRegisters => {
                self.holding_registers.insert(op.address(), words)
            }
        }
    }

    /// Method to be used to implement [tokio_modbus::server::Service](https://docs.rs/tokio-modbus/latest/tokio_modbus/server/trait.Service.html).
    pub fn service_call(&mut self, req: Request) -> future::Ready<Result<Response, Exception>> {
        match req {
            Request::ReadInputRegisters(addr, cnt) => future::ready(
                self.input_registers
                    .read(addr, cnt)
                    .map(Response::ReadInputRegisters),
            ),
            Request::ReadHoldingRegisters(addr, cnt) => future::ready(
                self.holding_registers
                    .read(addr, cnt)
                    .map(Response::ReadHoldingRegisters),
            ),
            Request::WriteSingleRegister(addr, value) => future::ready(
                self.holding_registers
                    .write(addr, std::slice::from_ref(&value))
                    .map(|_| Response::WriteSingleRegister(addr, value)),
            ),
            _ => {
                warn!("SERVER: Unimplemented function code in request: {req:?}");
                future::ready(Err(Exception::IllegalFunction))
            }
        }
    }
}

/// Meter whose registers hold fixed measurement values, laid out by a [`Producer`].
#[derive(Debug, Clone)]
pub struct SimulatedMeter {
    operations: Vec<Operation>,
    values: BTreeMap<Measurement, f64>,
    image: RegisterImage,
}

impl SimulatedMeter {
    /// Meter answering every produced operation, all values zero.
    pub fn new(producer: &dyn Producer) -> Result<Self> {
        let mut operations = producer.produce()?;
        let probe = producer.probe()?;
        if !operations.contains(&probe) {
            operations.push(probe);
        }

        let mut meter = Self {
            operations,
            values: BTreeMap::new(),
            image: RegisterImage::default(),
        };
        let measurements = meter
            .operations
            .iter()
            .map(Operation::measurement)
            .collect::<Vec<_>>();
        for measurement in measurements {
            meter.set(measurement, 0.0)?;
        }
        Ok(meter)
    }

    /// Update a measurement and its registers.
    pub fn set(&mut self, measurement: Measurement, value: f64) -> Result<()> {
        let mut found = false;
        for op in self
            .operations
            .iter()
            .filter(|op| op.measurement() == measurement)
        {
            self.image.load(op, value);
            found = true;
        }
        if !found {
            return Err(Error::UnsupportedMeasurement { measurement });
        }
        self.values.insert(measurement, value);
        Ok(())
    }

    pub fn get(&self, measurement: Measurement) -> Option<f64> {
        self.values.get(&measurement).copied()
    }

    pub fn measurements(&self) -> impl Iterator<Item = (Measurement, f64)> + '_ {
        self.values.iter().map(|(m, v)| (*m, *v))
    }

    pub fn image(&self) -> &RegisterImage {
        &self.image
    }
}

impl Device for SimulatedMeter {
    fn service_call(&mut self, req: Request) -> future::Ready<Result<Response, Exception>> {
        self.image.service_call(req)
    }
}

/// Modbus device simulator trait.
pub trait Device {
    fn service_call(&mut self, req: Request) -> future::Ready<Result<Response, Exception>>;

    /// Advance the simulated state, called periodically by [`run_tcp_simulator`].
    fn update_state(&mut self) {}
}

#[derive(Debug)]
/// Wrapper around [Device] needed because of [tokio_modbus::server::Service](https://docs.rs/tokio-modbus/latest/tokio_modbus/server/trait.Service.html).
pub struct Simulator<D: Device>(pub Arc<Mutex<D>>);

impl<D: Device> Simulator<D> {
    pub fn new(device: D) -> Self {
        Self(Arc::new(Mutex::new(device)))
    }

    /// Run `f` with exclusive access to the device.
    pub fn with_device<T>(&self, f: impl FnOnce(&mut D) -> T) -> T {
        let mut device = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut device)
    }
}

impl<D: Device> Clone for Simulator<D> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<D: Device> tokio_modbus::server::Service for Simulator<D> {
    type Request = Request<'static>;
    type Future = future::Ready<Result<Response, Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        self.with_device(|device| device.service_call(req))
    }
}

async fn run_tcp_server_context<D: Device + Send + 'static>(
    listener: TcpListener,
    simulator: Simulator<D>,
) {
    let server = server::tcp::Server::new(listener);
    let new_service = |_socket_addr| Ok(Some(simulator.clone()));
    let on_connected = |stream, socket_addr| async move {
        server::tcp::accept_tcp_connection(stream, socket_addr, new_service)
    };
    let on_process_error = |err| {
        error!("SERVER: {err}");
    };
    if let Err(err) = server.serve(&on_connected, on_process_error).await {
        error!("SERVER: {err}");
    }
}

/// Bind a TCP listener for the simulator. Use port `0` to let the OS pick one.
pub async fn bind_tcp(socket_addr: SocketAddr) -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(socket_addr).await?;
    let local_addr = listener.local_addr()?;
    Ok((listener, local_addr))
}

/// Utility function to spawn and run simulator TCP simulator forever.
pub fn spawn_tcp_simulator<D: Device + Send + 'static>(
    listener: TcpListener,
    simulator: Simulator<D>,
) -> JoinHandle<()> {
    tokio::spawn(run_tcp_server_context(listener, simulator))
}

/// Serve `simulator` over TCP, calling [`Device::update_state`] every `period`.
pub async fn run_tcp_simulator<D: Device + Send + 'static>(
    listener: TcpListener,
    simulator: Simulator<D>,
    period: Duration,
) {
    let server = spawn_tcp_simulator(listener, simulator.clone());

    let mut ticks = IntervalStream::new(tokio::time::interval(period));
    while ticks.next().await.is_some() {
        if server.is_finished() {
            break;
        }
        simulator.with_device(|device| device.update_state());
    }
}

/// Utility function to spawn and run simulator RTU simulator forever.
pub fn spawn_rtu_simulator<D: Device + Send + 'static>(
    path: &str,
    baud_rate: u32,
    simulator: Simulator<D>,
) -> Result<JoinHandle<()>> {
    let builder = tokio_serial::new(path, baud_rate);
    let serial_stream =
        tokio_serial::SerialStream::open(&builder).map_err(std::io::Error::from)?;
    let server = server::rtu::Server::new(serial_stream);

    Ok(tokio::spawn(async move {
        if let Err(err) = server.serve_forever(simulator).await {
            error!("SERVER: {err}");
        };
    }))
}
