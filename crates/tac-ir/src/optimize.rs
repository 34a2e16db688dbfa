//! The fixed-point optimizer.

use buggy::BugExt as _;
use tracing::{debug, instrument};

use crate::{
    block::{Block, BlockId},
    emulator::{Emulator, EmulatorConfig},
    error::OptimizeError,
    program::Program,
    subroutine::Subroutine,
    value::Binding,
};

/// The rewrite passes, tried in order on every round.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Pass {
    SquashJumps,
    DropDeadStores,
    FoldAndPropagate,
    CompactCalls,
    TrimBlocks,
}

impl Subroutine {
    /// Rewrites the subroutine until no pass applies.
    ///
    /// Every round starts by validating, so a rewrite that produced an
    /// ill-typed graph is reported rather than carried forward. Calls are
    /// resolved against `program`; calls to `expr` subroutines with
    /// constant arguments are precomputed when they succeed within
    /// [`EmulatorConfig::speculative`] limits.
    ///
    /// Returns whether anything changed.
    #[instrument(skip_all, fields(sub = %self.name()))]
    pub fn optimize(&mut self, program: &Program) -> Result<bool, OptimizeError> {
        let mut speculator = Emulator::with_config(program, EmulatorConfig::speculative());
        let mut changed = false;
        loop {
            self.validate()?;
            let pass = if self.squash_jumps()? {
                Pass::SquashJumps
            } else if self.drop_dead_stores()? {
                Pass::DropDeadStores
            } else if self.fold_and_propagate(program, &mut speculator)? {
                Pass::FoldAndPropagate
            } else if self.compact_calls()? {
                Pass::CompactCalls
            } else if self.trim_blocks()? {
                Pass::TrimBlocks
            } else {
                break;
            };
            debug!(?pass, "rewrote");
            changed = true;
        }
        Ok(changed)
    }

    fn reachable_block_mut(&mut self, id: BlockId) -> Result<&mut Block, OptimizeError> {
        Ok(self.block_mut(id).assume("reachable block exists")?)
    }

    /// Inlines jump targets that nothing else reaches.
    fn squash_jumps(&mut self) -> Result<bool, OptimizeError> {
        let trace = self.trace()?;
        for id in trace.blocks() {
            let Some(target) = self.block(id).and_then(Block::jump_target) else {
                continue;
            };
            if target == id || trace.visits(target) != 1 {
                continue;
            }
            let Some(target) = self.block(target).cloned() else {
                continue;
            };
            if self.reachable_block_mut(id)?.squash_jump(&target) {
                // Visit counts are stale now.
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Removes pure statements that write bindings nothing reads.
    fn drop_dead_stores(&mut self) -> Result<bool, OptimizeError> {
        let trace = self.trace()?;
        let dead: Vec<Binding> = trace.unread().cloned().collect();
        if dead.is_empty() {
            return Ok(false);
        }
        let mut changed = false;
        for id in trace.blocks() {
            let block = self.reachable_block_mut(id)?;
            for binding in &dead {
                changed |= block.drop_binding_stores(binding);
            }
        }
        Ok(changed)
    }

    fn fold_and_propagate(
        &mut self,
        program: &Program,
        speculator: &mut Emulator<'_>,
    ) -> Result<bool, OptimizeError> {
        let mut changed = false;
        for id in self.reachable_blocks() {
            let block = self.reachable_block_mut(id)?;
            changed |= block.expand_temporaries();
            changed |= block.unfold_constant_exprs(program, Some(&mut *speculator));
        }
        Ok(changed)
    }

    fn compact_calls(&mut self) -> Result<bool, OptimizeError> {
        let output = self.ty().output.clone();
        let mut changed = false;
        for id in self.reachable_blocks() {
            changed |= self.reachable_block_mut(id)?.compact_function_calls(&output);
        }
        Ok(changed)
    }

    fn trim_blocks(&mut self) -> Result<bool, OptimizeError> {
        let mut changed = false;
        for id in self.reachable_blocks() {
            changed |= self.reachable_block_mut(id)?.drop_unreachable_statements();
        }
        Ok(changed)
    }
}
