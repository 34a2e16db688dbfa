//! Reachability and binding liveness over a subroutine's block graph.

use indexmap::{IndexMap, IndexSet};

use crate::{
    arena::Arena,
    block::{Block, BlockId},
    error::TraceError,
    value::Binding,
};

/// How often a binding is read and written across the reachable graph.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BindingCounter {
    pub reads: usize,
    pub writes: usize,
}

/// The result of tracing a block graph from its entry.
#[derive(Clone, Debug, Default)]
pub struct Trace {
    /// Visit counts, in first-visit order.
    visits: IndexMap<BlockId, usize>,
    counters: IndexMap<Binding, BindingCounter>,
}

impl Trace {
    /// Reachable blocks in the order they were first reached.
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.visits.keys().copied()
    }

    /// How many times `block` was reached: once from the entry or a
    /// predecessor for each incoming edge.
    pub fn visits(&self, block: BlockId) -> usize {
        self.visits.get(&block).copied().unwrap_or(0)
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.visits.contains_key(&block)
    }

    pub fn counter(&self, binding: &Binding) -> BindingCounter {
        self.counters.get(binding).copied().unwrap_or_default()
    }

    pub fn counters(&self) -> impl Iterator<Item = (&Binding, &BindingCounter)> {
        self.counters.iter()
    }

    /// Bindings that are written but never read.
    pub fn unread(&self) -> impl Iterator<Item = &Binding> {
        self.counters
            .iter()
            .filter(|(_, c)| c.reads == 0)
            .map(|(b, _)| b)
    }
}

/// Walks a block graph depth first, counting block visits and binding
/// accesses. Revisited blocks are counted but not walked again.
pub(crate) struct Tracer<'a> {
    blocks: &'a Arena<BlockId, Block>,
    trace: Trace,
    /// Blocks reached but not yet visited, the next one on top.
    pending: Vec<BlockId>,
}

impl<'a> Tracer<'a> {
    pub(crate) fn new(blocks: &'a Arena<BlockId, Block>) -> Self {
        Self {
            blocks,
            trace: Trace::default(),
            pending: Vec::new(),
        }
    }

    /// Records `param` as written once and read twice so that it is never
    /// considered dead.
    pub(crate) fn seed_parameter(&mut self, param: &Binding) {
        let counter = self.trace.counters.entry(param.clone()).or_default();
        counter.writes = counter.writes.saturating_add(1);
        counter.reads = counter.reads.saturating_add(2);
    }

    /// Counts a read of `binding`. Returns false if nothing wrote it
    /// first.
    pub(crate) fn read(&mut self, binding: &Binding) -> bool {
        match self.trace.counters.get_mut(binding) {
            Some(counter) if counter.writes > 0 => {
                counter.reads = counter.reads.saturating_add(1);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn write(&mut self, binding: &Binding) {
        let counter = self.trace.counters.entry(binding.clone()).or_default();
        counter.writes = counter.writes.saturating_add(1);
    }

    /// Queues the targets of a control transfer. The first target is
    /// walked completely before the next.
    pub(crate) fn reach(&mut self, targets: impl DoubleEndedIterator<Item = BlockId>) {
        self.pending.extend(targets.rev());
    }

    /// Walks everything reachable from `entry`, walking the statements of
    /// each block on its first visit.
    pub(crate) fn visit(&mut self, entry: BlockId) -> Result<(), TraceError> {
        self.pending.push(entry);
        while let Some(id) = self.pending.pop() {
            let visits = self.trace.visits.entry(id).or_insert(0);
            *visits = visits.saturating_add(1);
            if *visits > 1 {
                continue;
            }
            let blocks = self.blocks;
            let block = blocks.get(id).ok_or(TraceError::UnknownBlock(id))?;
            for stmt in block.statements() {
                stmt.reach_block(self, block)?;
            }
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> Trace {
        self.trace
    }
}

/// Blocks reachable from `entry` in trace order, without checking
/// bindings. Unknown targets are skipped.
pub(crate) fn reachable(blocks: &Arena<BlockId, Block>, entry: BlockId) -> Vec<BlockId> {
    let mut seen = IndexSet::new();
    let mut stack = vec![entry];
    while let Some(id) = stack.pop() {
        if seen.contains(&id) {
            continue;
        }
        let Some(block) = blocks.get(id) else {
            continue;
        };
        seen.insert(id);
        if let Some(term) = block.terminator() {
            let targets: Vec<_> = term.targets().collect();
            stack.extend(targets.into_iter().rev());
        }
    }
    seen.into_iter().collect()
}
