use buggy::Bug;

use crate::{
    block::BlockId,
    name::{Name, QualifiedName},
    ops::ArithError,
    program::SubId,
    types::Type,
};

/// A malformed block or type, rejected when it is built.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ConstructionError {
    #[error("block `{0}` has no statements")]
    EmptyBlock(Name),
    #[error("block `{block}` has a control transfer at {index} that is not its last statement")]
    MisplacedTransfer { block: Name, index: usize },
    #[error("block `{0}` does not end in a control transfer")]
    MissingTransfer(Name),
    #[error("block names must not be empty")]
    EmptyBlockName,
    #[error("integer width must be positive, got {0}")]
    IntegerWidth(i64),
    #[error("tuples need at least two elements, got {0}")]
    TupleArity(usize),
    #[error("unknown block {0}")]
    UnknownBlock(BlockId),
    #[error("bug: {0}")]
    Bug(&'static str),
}

impl From<Bug> for ConstructionError {
    fn from(bug: Bug) -> Self {
        Self::Bug(bug.msg())
    }
}

/// An ill-typed statement or subroutine signature.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("type mismatch in `{context}`: expected `{expected}`, found `{actual}`")]
    Mismatch {
        expected: Type,
        actual: Type,
        context: String,
    },
    #[error("`{sub}` declares {actual} parameter(s) but its input splats to {expected}")]
    ParameterArity {
        sub: QualifiedName,
        expected: usize,
        actual: usize,
    },
    #[error("`{0}` is listed as a parameter but is not a parameter binding")]
    NotAParameter(Name),
    #[error("`{actual}` is not a function type in `{context}`")]
    NotAFunction { actual: Type, context: String },
    #[error("`{actual}` is not a reference type in `{context}`")]
    NotAReference { actual: Type, context: String },
    #[error("store through an immutable reference in `{0}`")]
    ImmutableStore(String),
    #[error("mutable reference to non-mutable binding in `{0}`")]
    ImmutableBorrow(String),
    #[error("unknown block {0}")]
    UnknownBlock(BlockId),
    #[error("unknown subroutine {0}")]
    UnknownSubroutine(SubId),
}

impl TypeError {
    pub(crate) fn mismatch(expected: &Type, actual: &Type, context: impl ToString) -> Self {
        Self::Mismatch {
            expected: expected.clone(),
            actual: actual.clone(),
            context: context.to_string(),
        }
    }
}

/// An inconsistent block graph found while tracing it.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("`{binding}` is read in block `{block}` before any statement writes it")]
    UnwrittenRead { binding: Name, block: Name },
    #[error("unknown block {0}")]
    UnknownBlock(BlockId),
    #[error("bug: {0}")]
    Bug(Bug),
}

impl From<Bug> for TraceError {
    fn from(bug: Bug) -> Self {
        Self::Bug(bug)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OptimizeError {
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error(transparent)]
    Construction(#[from] ConstructionError),
    #[error("unknown subroutine {0}")]
    UnknownSubroutine(SubId),
    #[error("bug: {0}")]
    Bug(Bug),
}

impl From<Bug> for OptimizeError {
    fn from(bug: Bug) -> Self {
        Self::Bug(bug)
    }
}

/// A failed emulator run.
#[derive(Debug, thiserror::Error)]
pub enum EmulatorError {
    #[error("`{callee}` takes {expected} argument(s), got {actual}")]
    Arity {
        callee: String,
        expected: usize,
        actual: usize,
    },
    #[error("no extern named `{0}` is registered")]
    UnknownExtern(Name),
    #[error("extern `{name}` failed: {message}")]
    Extern { name: Name, message: String },
    #[error("`{0}` is read before it is bound")]
    Unbound(Name),
    #[error("reference to `{0}` outlived its frame")]
    DanglingReference(Name),
    #[error("store through an immutable reference to `{0}`")]
    ImmutableStore(Name),
    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] ArithError),
    #[error("call depth exceeded {0}")]
    StackOverflow(usize),
    #[error("fuel exhausted after {0} statements")]
    OutOfFuel(u64),
    #[error("`{0}` is not callable")]
    NotCallable(String),
    #[error("cannot execute `{0}`")]
    Unexecutable(String),
    #[error("unknown subroutine {0}")]
    UnknownSubroutine(SubId),
    #[error("unknown block {0}")]
    UnknownBlock(BlockId),
    #[error("bug: {0}")]
    Bug(Bug),
}

impl EmulatorError {
    /// Constructs an [`EmulatorError::Extern`].
    pub fn extern_failed(name: impl Into<Name>, message: impl Into<String>) -> Self {
        Self::Extern {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Reports whether the error points at malformed IR rather than at
    /// a value the program could legitimately compute.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::Arity { .. }
                | Self::Unbound(_)
                | Self::ImmutableStore(_)
                | Self::NotCallable(_)
                | Self::Unexecutable(_)
                | Self::UnknownSubroutine(_)
                | Self::UnknownBlock(_)
                | Self::Bug(_)
        )
    }
}

impl From<Bug> for EmulatorError {
    fn from(bug: Bug) -> Self {
        Self::Bug(bug)
    }
}
