//! Typename-keyed object factory

use super::object::Persistable;
use crate::error::{Error, Result};
use std::collections::HashMap;
use tracing::trace;

type MakeFn = Box<dyn Fn() -> Box<dyn Persistable>>;

/// Registry mapping type-name strings to constructor functions.
///
/// Every format backend goes through a factory to materialize
/// placeholder objects from the type tags it finds on the wire; the
/// same table serves as a plugin-style extension point for host
/// applications. Factories are explicit values threaded by reference,
/// so independent object universes (e.g. in tests) cannot see each
/// other's types.
pub struct TypeFactory {
    makers: HashMap<String, MakeFn>,
}

impl TypeFactory {
    pub fn new() -> Self {
        TypeFactory {
            makers: HashMap::new(),
        }
    }

    /// Register a default-constructible type under `name`.
    ///
    /// Fails with a logic error if the name is already taken; a type tag
    /// must map to exactly one constructor.
    pub fn register<T>(&mut self, name: &str) -> Result<()>
    where
        T: Persistable + Default,
    {
        self.register_fn(name, || Box::new(T::default()))
    }

    /// Register an arbitrary constructor under `name`.
    pub fn register_fn<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: Fn() -> Box<dyn Persistable> + 'static,
    {
        if self.makers.contains_key(name) {
            return Err(Error::Logic(format!(
                "type '{}' already registered",
                name
            )));
        }
        self.makers.insert(name.to_string(), Box::new(f));
        Ok(())
    }

    /// Construct a fresh, attribute-less instance of the named type.
    pub fn create(&self, name: &str) -> Result<Box<dyn Persistable>> {
        trace!("creating object of type '{}'", name);
        let maker = self
            .makers
            .get(name)
            .ok_or_else(|| Error::UnknownType(name.to_string()))?;
        Ok(maker())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.makers.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.makers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for TypeFactory {
    fn default() -> Self {
        Self::new()
    }
}
