//! Register catalogs of the supported meter models.
//!
//! Each model module exposes a `register` function; [`register_all`] wires them
//! into a [`Registry`] at startup.

use crate::error::Result;
use crate::registry::Registry;

pub mod em24;
pub mod sdm;

/// Register every built-in model.
pub fn register_all(registry: &mut Registry) -> Result<()> {
    em24::register(registry)?;
    sdm::register(registry)?;
    Ok(())
}
