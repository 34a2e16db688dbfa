//! Code generators for tac programs.
//!
//! A [`CodeGenerator`] accumulates output across
//! [`visit_subroutine`](CodeGenerator::visit_subroutine) calls until it is
//! [`reset`](CodeGenerator::reset). Generators only emit blocks reachable
//! from each subroutine's entry, each once.

mod c;
mod error;
mod ir;
pub mod mangle;

use tac_ir::{Program, SubId};

pub use c::CGenerator;
pub use error::CodegenError;
pub use ir::IrGenerator;

/// Translates subroutines of a [`Program`] into some textual form.
pub trait CodeGenerator {
    /// Discards everything generated so far.
    fn reset(&mut self);

    /// Emits the declaration and body of subroutine `id`.
    fn visit_subroutine(&mut self, program: &Program, id: SubId) -> Result<(), CodegenError>;

    /// The output generated since the last reset.
    fn generated(&self) -> &str;

    /// Marks subroutine `id` as the program entry point.
    fn add_entry_point(&mut self, program: &Program, id: SubId) -> Result<(), CodegenError>;
}
