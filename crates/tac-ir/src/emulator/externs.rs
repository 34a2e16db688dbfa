use std::{fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{error::EmulatorError, name::Name, value::Value};

/// A host function. It receives the splatted call argument and returns
/// exactly one value.
pub type ExternFn = Rc<dyn Fn(&[Value]) -> Result<Value, EmulatorError>>;

/// The table of host functions that native function references resolve
/// to, by name.
///
/// Cloning is cheap and shares the handlers, so one table can drive
/// several emulators. Handlers must not be registered or removed while a
/// run that may call them is in progress.
#[derive(Clone, Default)]
pub struct Externs {
    handlers: IndexMap<Name, ExternFn>,
}

impl Externs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`, returning the handler it
    /// replaces.
    pub fn register<F>(&mut self, name: impl Into<Name>, handler: F) -> Option<ExternFn>
    where
        F: Fn(&[Value]) -> Result<Value, EmulatorError> + 'static,
    {
        self.handlers.insert(name.into(), Rc::new(handler))
    }

    pub fn remove(&mut self, name: &str) -> Option<ExternFn> {
        self.handlers.shift_remove(name)
    }

    /// Removes every handler.
    pub fn reset(&mut self) {
        self.handlers.clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ExternFn> {
        self.handlers.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &Name> {
        self.handlers.keys()
    }
}

impl fmt::Debug for Externs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_register_remove_reset() {
        let mut externs = Externs::new();
        assert!(externs.register("one", |_| Ok(Value::Int(1))).is_none());
        assert!(externs.register("two", |_| Ok(Value::Int(2))).is_none());
        assert!(externs.contains("one"));

        let old = externs.register("one", |_| Ok(Value::Int(11))).unwrap();
        assert_eq!(old(&[]).unwrap(), Value::Int(1));
        assert_eq!(externs.get("one").unwrap()(&[]).unwrap(), Value::Int(11));

        assert!(externs.remove("two").is_some());
        assert!(!externs.contains("two"));
        assert!(externs.remove("two").is_none());

        let shared = externs.clone();
        externs.reset();
        assert_eq!(externs.names().count(), 0);
        assert!(shared.contains("one"));
    }
}
