use std::time::Duration;

use thiserror::Error;

use crate::codec::WordsCountError;
use crate::measurement::Measurement;

/// Errors raised by register catalogs, the model registry and bus connections.
#[derive(Debug, Error)]
pub enum Error {
    #[error("measurement {measurement} is not supported by this meter model")]
    UnsupportedMeasurement { measurement: Measurement },
    #[error("unknown meter model: {0}")]
    UnknownModel(String),
    #[error("meter model {0} is already registered")]
    DuplicateModelRegistration(String),
    #[error("expected {expected} register word(s), got {actual}")]
    WordCount { expected: usize, actual: usize },
    #[error("transaction timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(#[from] tokio_modbus::Error),
    #[error("modbus exception: {0}")]
    Exception(#[from] tokio_modbus::Exception),
    #[error("link error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<WordsCountError> for Error {
    fn from(err: WordsCountError) -> Self {
        Error::WordCount {
            expected: err.expected,
            actual: err.actual,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
