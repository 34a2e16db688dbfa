use std::fmt::Write as _;

use tac_ir::{Program, SubId};
use tracing::debug;

use crate::{CodeGenerator, CodegenError};

/// Re-emits subroutines in the textual IR syntax, separated by blank
/// lines.
#[derive(Clone, Debug, Default)]
pub struct IrGenerator {
    out: String,
}

impl IrGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodeGenerator for IrGenerator {
    fn reset(&mut self) {
        self.out.clear();
    }

    fn visit_subroutine(&mut self, program: &Program, id: SubId) -> Result<(), CodegenError> {
        let sub = program.get(id).ok_or(CodegenError::UnknownSubroutine(id))?;
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        writeln!(self.out, "{sub}")?;
        debug!(sub = %sub.name(), "emitted ir");
        Ok(())
    }

    fn generated(&self) -> &str {
        &self.out
    }

    /// The textual form has no notion of an entry point.
    fn add_entry_point(&mut self, program: &Program, id: SubId) -> Result<(), CodegenError> {
        program.get(id).ok_or(CodegenError::UnknownSubroutine(id))?;
        Ok(())
    }
}
