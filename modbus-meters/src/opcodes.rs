use std::collections::BTreeMap;

use crate::codec::Address;
use crate::error::{Error, Result};
use crate::measurement::Measurement;
use crate::operation::{FunctionCode, Operation};
use crate::transform::Transform;

/// Register catalog of one meter model: where each supported measurement starts.
///
/// Measurements without an entry are not available on that model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Opcodes(BTreeMap<Measurement, Address>);

impl Opcodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start address of `measurement`.
    pub fn opcode(&self, measurement: Measurement) -> Result<Address> {
        self.0
            .get(&measurement)
            .copied()
            .ok_or(Error::UnsupportedMeasurement { measurement })
    }

    pub fn contains(&self, measurement: Measurement) -> bool {
        self.0.contains_key(&measurement)
    }

    pub fn insert(&mut self, measurement: Measurement, address: Address) -> Option<Address> {
        self.0.insert(measurement, address)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Measurement, Address)> + '_ {
        self.0.iter().map(|(m, a)| (*m, *a))
    }

    /// Build the read of `measurement` from this catalog.
    pub fn operation(
        &self,
        function: FunctionCode,
        measurement: Measurement,
        transform: Transform,
    ) -> Result<Operation> {
        let address = self.opcode(measurement)?;
        Ok(Operation::new(function, address, measurement, transform))
    }
}

impl<const N: usize> From<[(Measurement, Address); N]> for Opcodes {
    fn from(entries: [(Measurement, Address); N]) -> Self {
        Self(BTreeMap::from(entries))
    }
}

impl FromIterator<(Measurement, Address)> for Opcodes {
    fn from_iter<T: IntoIterator<Item = (Measurement, Address)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
