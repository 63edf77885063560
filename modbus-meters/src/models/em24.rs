//! Carlo Gavazzi EM24 with Ethernet interface.
//!
//! Input registers, 32-bit values sent low word first.
//! Datasheet: <https://www.enika.eu/data/files/produkty/energy%20m/CP/em24%20ethernet%20cp.pdf>

use crate::error::Result;
use crate::measurement::Measurement::{self, *};
use crate::opcodes::Opcodes;
use crate::operation::{FunctionCode, Operation};
use crate::producer::Producer;
use crate::registry::Registry;
use crate::transform::Transform;

pub const MODEL: &str = "CGEM24_E1";

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register(MODEL, new_producer)
}

pub fn new_producer() -> Box<dyn Producer> {
    Box::new(Em24Producer::new())
}

#[derive(Debug, Clone)]
pub struct Em24Producer {
    opcodes: Opcodes,
}

impl Em24Producer {
    pub fn new() -> Self {
        let opcodes = Opcodes::from([
            (VoltageL1, 0x00),
            (VoltageL2, 0x02),
            (VoltageL3, 0x04),
            (CurrentL1, 0x0C),
            (CurrentL2, 0x0E),
            (CurrentL3, 0x10),
            (PowerL1, 0x12),
            (PowerL2, 0x14),
            (PowerL3, 0x16),
            (Power, 0x28),
            (CosphiL1, 0x2E),
            (CosphiL2, 0x2F),
            (CosphiL3, 0x30),
            (Cosphi, 0x31),
            (Frequency, 0x33),
            (Import, 0x34),
            (ImportL1, 0x40),
            (ImportL2, 0x42),
            (ImportL3, 0x44),
            (Export, 0x4E),
        ]);
        Self { opcodes }
    }

    fn snip16(&self, measurement: Measurement, divisor: f64) -> Result<Operation> {
        self.opcodes.operation(
            FunctionCode::ReadInputRegisters,
            measurement,
            Transform::INT16.scaled(divisor),
        )
    }

    fn snip32(&self, measurement: Measurement, divisor: f64) -> Result<Operation> {
        self.opcodes.operation(
            FunctionCode::ReadInputRegisters,
            measurement,
            Transform::INT32_SWAPPED.scaled(divisor),
        )
    }
}

impl Default for Em24Producer {
    fn default() -> Self {
        Self::new()
    }
}

impl Producer for Em24Producer {
    fn description(&self) -> &str {
        "Carlo Gavazzi EM24_E1"
    }

    fn opcodes(&self) -> &Opcodes {
        &self.opcodes
    }

    fn probe(&self) -> Result<Operation> {
        self.snip32(VoltageL1, 10.0)
    }

    fn produce(&self) -> Result<Vec<Operation>> {
        let mut res = Vec::with_capacity(self.opcodes.len());

        for m in [VoltageL1, VoltageL2, VoltageL3] {
            res.push(self.snip32(m, 10.0)?);
        }
        for m in [CurrentL1, CurrentL2, CurrentL3] {
            res.push(self.snip32(m, 1000.0)?);
        }
        for m in [Cosphi, CosphiL1, CosphiL2, CosphiL3] {
            res.push(self.snip16(m, 1000.0)?);
        }
        res.push(self.snip16(Frequency, 10.0)?);
        for m in [Power, PowerL1, PowerL2, PowerL3] {
            res.push(self.snip32(m, 10.0)?);
        }
        for m in [Import, ImportL1, ImportL2, ImportL3, Export] {
            res.push(self.snip32(m, 10.0)?);
        }

        Ok(res)
    }
}
