//! Named diff-algorithm registry.
//!
//! A `Registry` is a plain owned value; callers build one (usually via
//! [`Registry::standard`]) and share it by reference.  The first
//! algorithm registered becomes the default, so `standard()` makes
//! `lcs` the default with `hashline` selectable by name.

use log::debug;

use crate::errors::{RegistryError, Result};
use crate::script::EdScript;
use crate::{hashline, lcs};

/// A diff generator: produce an ed script turning `from` into `to`.
pub type Generator = fn(&[&str], &[&str]) -> std::result::Result<EdScript, crate::DeltaError>;

pub struct Registry {
    algorithms: Vec<(String, Generator)>,
}

impl Registry {
    pub fn empty() -> Registry {
        Registry {
            algorithms: Vec::new(),
        }
    }

    /// The stock registry: `lcs` (default) and `hashline`.
    pub fn standard() -> Registry {
        let mut registry = Registry::empty();
        registry.register("lcs", lcs::generate);
        registry.register("hashline", hashline::generate);
        registry
    }

    /// Register `generator` under `name`, replacing any previous
    /// registration of the same name.  The first name registered is
    /// the default.
    pub fn register(&mut self, name: &str, generator: Generator) {
        debug!("registering diff algorithm {:?}", name);
        if let Some(slot) = self.algorithms.iter_mut().find(|(n, _)| n == name) {
            slot.1 = generator;
        } else {
            self.algorithms.push((name.to_string(), generator));
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.algorithms.iter().map(|(n, _)| n.as_str())
    }

    pub fn get(&self, name: &str) -> std::result::Result<Generator, RegistryError> {
        self.algorithms
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, g)| *g)
            .ok_or_else(|| RegistryError::UnknownAlgorithm(name.to_string()))
    }

    pub fn default_generator(&self) -> std::result::Result<Generator, RegistryError> {
        self.algorithms
            .first()
            .map(|(_, g)| *g)
            .ok_or(RegistryError::Empty)
    }

    /// Diff with the named algorithm, or the default when `name` is
    /// `None`.
    pub fn generate(&self, from: &[&str], to: &[&str], name: Option<&str>) -> Result<EdScript> {
        let generator = match name {
            Some(name) => self.get(name)?,
            None => self.default_generator()?,
        };
        Ok(generator(from, to)?)
    }
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn standard_has_lcs_default() {
        let registry = Registry::standard();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["lcs", "hashline"]);
        let from = ["a", "b"];
        let to = ["a"];
        let by_default = registry.generate(&from, &to, None).unwrap();
        let by_name = registry.generate(&from, &to, Some("lcs")).unwrap();
        assert_eq!(by_default, by_name);
    }

    #[test]
    fn unknown_name_errors() {
        let registry = Registry::standard();
        match registry.generate(&[], &[], Some("patience")) {
            Err(Error::Registry(RegistryError::UnknownAlgorithm(name))) => {
                assert_eq!(name, "patience")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn empty_registry_has_no_default() {
        let registry = Registry::empty();
        assert!(matches!(
            registry.default_generator(),
            Err(RegistryError::Empty)
        ));
    }

    #[test]
    fn reregistering_replaces_without_reordering() {
        fn noop(_: &[&str], _: &[&str]) -> std::result::Result<EdScript, crate::DeltaError> {
            Ok(EdScript::default())
        }
        let mut registry = Registry::standard();
        registry.register("lcs", noop);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["lcs", "hashline"]);
        assert!(registry
            .generate(&["a"], &["b"], None)
            .unwrap()
            .is_empty());
    }
}
