use std::fmt;

use crate::codec::{Address, Quantity, Word};
use crate::error::Result;
use crate::measurement::Measurement;
use crate::transform::Transform;

/// Register class selected by the Modbus function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// `0x03`
    ReadHoldingRegisters,
    /// `0x04`
    ReadInputRegisters,
}

impl FunctionCode {
    pub fn value(&self) -> u8 {
        match self {
            FunctionCode::ReadHoldingRegisters => 0x03,
            FunctionCode::ReadInputRegisters => 0x04,
        }
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.value())
    }
}

/// A single register read yielding one [`Measurement`].
///
/// The word count always equals the transform width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operation {
    function: FunctionCode,
    address: Address,
    count: Quantity,
    measurement: Measurement,
    transform: Transform,
}

impl Operation {
    pub fn new(
        function: FunctionCode,
        address: Address,
        measurement: Measurement,
        transform: Transform,
    ) -> Self {
        Self {
            function,
            address,
            count: transform.word_size(),
            measurement,
            transform,
        }
    }

    pub fn function(&self) -> FunctionCode {
        self.function
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn count(&self) -> Quantity {
        self.count
    }

    pub fn measurement(&self) -> Measurement {
        self.measurement
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Apply the transform to the words returned by the read.
    pub fn decode(&self, words: &[Word]) -> Result<f64> {
        self.transform.apply(words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_follows_transform() {
        let op = Operation::new(
            FunctionCode::ReadInputRegisters,
            0x34,
            Measurement::Import,
            Transform::INT32_SWAPPED.scaled(10.0),
        );
        assert_eq!(op.count(), 2);
        assert_eq!(op.decode(&[0x3039, 0x0000]).unwrap(), 1234.5);

        let op = Operation::new(
            FunctionCode::ReadHoldingRegisters,
            0x33,
            Measurement::Frequency,
            Transform::INT16,
        );
        assert_eq!(op.count(), 1);
        assert_eq!(op.function().to_string(), "0x03");
    }
}
