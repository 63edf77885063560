//! Eastron SDM630 three-phase meter.
//!
//! Input registers, every value is an IEEE-754 float in physical units.

use crate::error::Result;
use crate::measurement::Measurement::{self, *};
use crate::opcodes::Opcodes;
use crate::operation::{FunctionCode, Operation};
use crate::producer::Producer;
use crate::registry::Registry;
use crate::transform::Transform;

pub const MODEL: &str = "SDM";

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register(MODEL, new_producer)
}

pub fn new_producer() -> Box<dyn Producer> {
    Box::new(SdmProducer::new())
}

#[derive(Debug, Clone)]
pub struct SdmProducer {
    opcodes: Opcodes,
}

impl SdmProducer {
    pub fn new() -> Self {
        let opcodes = Opcodes::from([
            (VoltageL1, 0x00),
            (VoltageL2, 0x02),
            (VoltageL3, 0x04),
            (CurrentL1, 0x06),
            (CurrentL2, 0x08),
            (CurrentL3, 0x0A),
            (PowerL1, 0x0C),
            (PowerL2, 0x0E),
            (PowerL3, 0x10),
            (ApparentPowerL1, 0x12),
            (ApparentPowerL2, 0x14),
            (ApparentPowerL3, 0x16),
            (ReactivePowerL1, 0x18),
            (ReactivePowerL2, 0x1A),
            (ReactivePowerL3, 0x1C),
            (CosphiL1, 0x1E),
            (CosphiL2, 0x20),
            (CosphiL3, 0x22),
            (Power, 0x34),
            (ApparentPower, 0x38),
            (ReactivePower, 0x3C),
            (Cosphi, 0x3E),
            (Frequency, 0x46),
            (Import, 0x48),
            (Export, 0x4A),
        ]);
        Self { opcodes }
    }

    fn snip(&self, measurement: Measurement) -> Result<Operation> {
        self.opcodes.operation(
            FunctionCode::ReadInputRegisters,
            measurement,
            Transform::FLOAT32,
        )
    }
}

impl Default for SdmProducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Producer for SdmProducer {
    fn description(&self) -> &str {
        "Eastron SDM630"
    }

    fn opcodes(&self) -> &Opcodes {
        &self.opcodes
    }

    fn probe(&self) -> Result<Operation> {
        self.snip(VoltageL1)
    }

    fn produce(&self) -> Result<Vec<Operation>> {
        // catalog order is ascending by measurement, not address; sort for contiguous reads
        let mut measurements = self.opcodes.iter().collect::<Vec<_>>();
        measurements.sort_by_key(|(_, address)| *address);

        measurements
            .into_iter()
            .map(|(measurement, _)| self.snip(measurement))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encode;

    #[test]
    fn test_produce_every_entry_in_address_order() {
        let producer = SdmProducer::new();
        let ops = producer.produce().unwrap();

        assert_eq!(ops.len(), producer.opcodes().len());
        assert!(ops.windows(2).all(|w| w[0].address() < w[1].address()));
        assert!(ops.iter().all(|op| op.count() == 2));
        assert_eq!(ops.first().unwrap().measurement(), VoltageL1);
        assert_eq!(ops.last().unwrap().measurement(), Export);
    }

    #[test]
    fn test_probe_decodes_float() {
        let op = SdmProducer::new().probe().unwrap();
        assert_eq!(op.address(), 0x00);
        assert_eq!(op.decode(&231.5f32.to_be_words()).unwrap(), 231.5);
    }
}
