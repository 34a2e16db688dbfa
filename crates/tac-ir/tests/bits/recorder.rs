use std::{cell::RefCell, rc::Rc};

use tac_ir::{EmulatorError, Externs, Value};

/// One extern invocation.
pub type ExternCall = (String, Vec<Value>);

/// Host functions that log every call they receive.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    calls: Rc<RefCell<Vec<ExternCall>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `print_str` and `print_int`, both returning unit.
    pub fn externs(&self) -> Externs {
        let mut externs = Externs::new();
        for name in ["print_str", "print_int"] {
            let calls = Rc::clone(&self.calls);
            externs.register(name, move |args| {
                calls.borrow_mut().push((name.to_owned(), args.to_vec()));
                match args {
                    [_] => Ok(Value::Unit),
                    _ => Err(EmulatorError::extern_failed(name, "expected one argument")),
                }
            });
        }
        externs
    }

    pub fn take(&self) -> Vec<ExternCall> {
        self.calls.take()
    }
}
