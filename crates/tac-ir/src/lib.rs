//! A typed three-address-code IR.
//!
//! A [`Program`] owns [`Subroutine`]s, each a graph of [`Block`]s of
//! [`Statement`]s over typed [`Binding`]s. Subroutines are type-checked
//! with [`Subroutine::validate`], rewritten to a fixed point with
//! [`Subroutine::optimize`] and executed by the [`Emulator`], which also
//! precomputes calls to `expr` subroutines while optimizing.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod arena;
mod block;
mod display;
pub mod emulator;
mod error;
mod fold;
mod name;
mod ops;
mod optimize;
mod program;
mod statement;
mod subroutine;
mod trace;
mod types;
mod value;

pub use block::*;
pub use display::*;
pub use emulator::{Emulator, EmulatorConfig, EmulatorMetrics, ExternFn, Externs};
pub use error::*;
pub use name::*;
pub use ops::*;
pub use program::*;
pub use statement::*;
pub use subroutine::*;
pub use trace::*;
pub use types::*;
pub use value::*;
