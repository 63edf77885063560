use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::producer::{Producer, ProducerFactory};

/// Meter models known to the process, keyed by case-sensitive model name.
///
/// Filled once by the composition root before polling starts, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    factories: BTreeMap<String, ProducerFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every model shipped in [`crate::models`].
    pub fn with_builtin_models() -> Result<Self> {
        let mut registry = Self::new();
        crate::models::register_all(&mut registry)?;
        Ok(registry)
    }

    /// Add a model. A name can only be registered once.
    pub fn register(&mut self, name: &str, factory: ProducerFactory) -> Result<()> {
        if self.factories.contains_key(name) {
            return Err(Error::DuplicateModelRegistration(name.to_string()));
        }
        debug!("Registered meter model '{}'", name);
        self.factories.insert(name.to_string(), factory);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<ProducerFactory> {
        self.factories
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownModel(name.to_string()))
    }

    /// Construct the producer of model `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn Producer>> {
        self.lookup(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered model names in sorted order.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{em24, sdm};

    #[test]
    fn test_duplicate_registration_fails_every_time() {
        for _ in 0..10 {
            let mut registry = Registry::new();
            registry.register("X", em24::new_producer).unwrap();

            let err = registry.register("X", sdm::new_producer).unwrap_err();
            assert!(matches!(err, Error::DuplicateModelRegistration(ref name) if name == "X"));

            // the first registration stays in place
            let producer = registry.create("X").unwrap();
            assert_eq!(producer.description(), "Carlo Gavazzi EM24_E1");
        }
    }

    #[test]
    fn test_unknown_model() {
        let registry = Registry::with_builtin_models().unwrap();
        assert!(matches!(
            registry.lookup("cgem24_e1"),
            Err(Error::UnknownModel(ref name)) if name == "cgem24_e1"
        ));
        assert!(registry.create("NOPE").is_err());
    }

    #[test]
    fn test_builtin_models() {
        let registry = Registry::with_builtin_models().unwrap();
        assert_eq!(registry.models().collect::<Vec<_>>(), vec!["CGEM24_E1", "SDM"]);
        assert!(registry.contains("SDM"));
        assert_eq!(
            registry.create("SDM").unwrap().description(),
            "Eastron SDM630"
        );
    }
}
