use std::fmt;

use buggy::Bug;
use tac_ir::{BlockId, SubId, Type};

/// An error from a [`CodeGenerator`](crate::CodeGenerator).
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error("unknown subroutine {0}")]
    UnknownSubroutine(SubId),
    #[error("`{sub}` refers to unknown block {block}")]
    UnknownBlock { sub: String, block: BlockId },
    /// The backend has no representation for a type.
    #[error("cannot represent `{ty}` in {backend}")]
    UnsupportedType { ty: Type, backend: &'static str },
    /// The backend has no representation for a statement or value.
    #[error("cannot generate `{what}` in {backend}")]
    Unsupported { what: String, backend: &'static str },
    /// Entry points take no arguments and return unit or an integer.
    #[error("`{0}` cannot be an entry point")]
    EntryPoint(String),
    #[error(transparent)]
    Fmt(#[from] fmt::Error),
    #[error("bug: {0}")]
    Bug(Bug),
}

impl From<Bug> for CodegenError {
    fn from(bug: Bug) -> Self {
        Self::Bug(bug)
    }
}
