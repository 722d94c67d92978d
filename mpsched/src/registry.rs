//! Schedulers by name.
//!
//! A host picks the policy of each connection by name, typically from its
//! configuration. [`Registry::builtin`] knows the policies of this crate,
//! more can be added with [`Registry::register`].

use std::collections::BTreeMap;

use thiserror::Error;

use crate::{DefaultScheduler, EcfScheduler, Scheduler};

/// Creates a fresh scheduler for one connection.
pub type Factory = fn() -> Box<dyn Scheduler>;

pub const DEFAULT: &str = "default";
pub const ECF: &str = "ecf";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Scheduler {0} is already registered")]
    Duplicate(String),
    #[error("Unknown scheduler {0}")]
    Unknown(String),
}

#[derive(Debug, Default, Clone)]
pub struct Registry {
    factories: BTreeMap<String, Factory>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `"default"` and `"ecf"`.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .factories
            .insert(DEFAULT.to_owned(), || Box::new(DefaultScheduler::new()));
        registry
            .factories
            .insert(ECF.to_owned(), || Box::new(EcfScheduler::default()));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: Factory) -> Result<(), Error> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::Duplicate(name));
        }
        tracing::debug!(target: "registry", %name, "register scheduler");
        self.factories.insert(name, factory);
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> Result<(), Error> {
        if self.factories.remove(name).is_none() {
            return Err(Error::Unknown(name.to_owned()));
        }
        tracing::debug!(target: "registry", %name, "unregister scheduler");
        Ok(())
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Scheduler>, Error> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| Error::Unknown(name.to_owned()))
    }

    /// Registered names in lexical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin() {
        let registry = Registry::builtin();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec![DEFAULT, ECF]);
        assert_eq!(registry.create(ECF).map(|s| s.name()), Ok(ECF));
        assert_eq!(registry.create(DEFAULT).map(|s| s.name()), Ok(DEFAULT));
        assert_eq!(
            registry.create("redundant").map(|s| s.name()),
            Err(Error::Unknown("redundant".to_owned()))
        );
    }

    #[test]
    fn test_register() {
        let mut registry = Registry::builtin();
        assert_eq!(
            registry.register(ECF, || Box::new(EcfScheduler::default())),
            Err(Error::Duplicate(ECF.to_owned()))
        );

        registry
            .register("ecf-8", || Box::new(EcfScheduler::default().with_r_beta(8)))
            .unwrap();
        assert!(registry.create("ecf-8").is_ok());

        registry.unregister("ecf-8").unwrap();
        assert_eq!(
            registry.unregister("ecf-8"),
            Err(Error::Unknown("ecf-8".to_owned()))
        );
        assert!(registry.create("ecf-8").is_err());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::Duplicate(ECF.to_owned()).to_string(),
            "Scheduler ecf is already registered"
        );
        assert_eq!(
            Error::Unknown("x".to_owned()).to_string(),
            "Unknown scheduler x"
        );
    }
}
