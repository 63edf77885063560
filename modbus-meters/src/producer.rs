use crate::error::Result;
use crate::opcodes::Opcodes;
use crate::operation::Operation;

/// Builds the register reads for one meter model.
///
/// Implementations hold their [`Opcodes`] catalog and nothing else, so a single
/// producer can be shared by every device of the same model.
pub trait Producer: Send + Sync {
    /// Human readable model name, e.g. `"Carlo Gavazzi EM24_E1"`.
    fn description(&self) -> &str;

    /// Register catalog the operations are built from.
    fn opcodes(&self) -> &Opcodes;

    /// Single cheap read to check the device answers.
    fn probe(&self) -> Result<Operation>;

    /// All reads of a full poll.
    ///
    /// The order only groups neighbouring registers; callers treat the reads as independent.
    fn produce(&self) -> Result<Vec<Operation>>;
}

/// Constructor stored in the [`crate::registry::Registry`].
pub type ProducerFactory = fn() -> Box<dyn Producer>;
