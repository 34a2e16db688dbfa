use indexmap::IndexMap;
use tracing::debug;

use crate::{
    arena::new_key_type,
    emulator::Emulator,
    error::ConstructionError,
    name::Name,
    program::Program,
    statement::{Call, Return, Statement, TailCall, owned},
    types::Type,
    value::{Binding, Value},
};

new_key_type! {
    /// Identifies a [`Block`] within its [`Subroutine`](crate::Subroutine).
    pub struct BlockId;
}

/// A straight-line run of statements ending in exactly one control
/// transfer.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    id: BlockId,
    name: Name,
    statements: Vec<Statement>,
}

impl Block {
    /// Creates a block whose only statement jumps to itself.
    pub(crate) fn new(id: BlockId, name: Name) -> Self {
        Self {
            id,
            name,
            statements: vec![Statement::goto(id)],
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// The block's control transfer.
    pub fn terminator(&self) -> Option<&Statement> {
        self.statements.last()
    }

    /// Replaces the block's statements.
    ///
    /// The list must be non-empty and hold exactly one control transfer,
    /// in last position.
    pub fn set_statements(&mut self, statements: Vec<Statement>) -> Result<(), ConstructionError> {
        let Some((last, rest)) = statements.split_last() else {
            return Err(ConstructionError::EmptyBlock(self.name.clone()));
        };
        if let Some(index) = rest.iter().position(Statement::is_control_transfer) {
            return Err(ConstructionError::MisplacedTransfer {
                block: self.name.clone(),
                index,
            });
        }
        if !last.is_control_transfer() {
            return Err(ConstructionError::MissingTransfer(self.name.clone()));
        }
        self.statements = statements;
        Ok(())
    }

    /// The target of the block's unconditional jump, if it ends in one.
    pub fn jump_target(&self) -> Option<BlockId> {
        match self.terminator() {
            Some(Statement::Goto(g)) => Some(g.target),
            _ => None,
        }
    }

    /// Reports whether the block can transfer control to itself.
    pub fn is_self_looping(&self) -> bool {
        self.terminator()
            .is_some_and(|t| t.targets().any(|id| id == self.id))
    }

    /// Replaces a trailing jump to `target` with a copy of `target`'s
    /// statements.
    ///
    /// Never inlines this block into itself, nor a self-looping target.
    pub fn squash_jump(&mut self, target: &Block) -> bool {
        if target.id == self.id || target.is_self_looping() {
            return false;
        }
        if self.jump_target() != Some(target.id) {
            return false;
        }
        self.statements.pop();
        self.statements.extend(target.statements.iter().cloned());
        true
    }

    /// Removes every pure statement that writes `binding`.
    pub fn drop_binding_stores(&mut self, binding: &Binding) -> bool {
        let before = self.statements.len();
        self.statements
            .retain(|s| !(s.is_pure() && s.result_register() == Some(binding)));
        self.statements.len() != before
    }

    /// Copies the value of each pure move into an immutable binding into
    /// the statements that follow it.
    pub fn expand_temporaries(&mut self) -> bool {
        let mut known: IndexMap<Binding, Value> = IndexMap::new();
        let mut changed = false;
        for stmt in &mut self.statements {
            if !known.is_empty() {
                let rewritten = stmt.rewrite_reads(&mut |b| known.get(b).cloned());
                if let Some(new) = owned(rewritten) {
                    *stmt = new;
                    changed = true;
                }
            }
            // Parameters may be reassigned.
            if let Some(dst) = stmt.result_register() {
                known.retain(|k, v| k != dst && !v.mentions(dst));
            }
            if let Statement::Move(m) = &*stmt {
                if m.dst.is_immutable() && m.src.is_stable() && !m.src.mentions(&m.dst) {
                    known.insert(m.dst.clone(), m.src.clone());
                }
            }
        }
        changed
    }

    /// Folds constant operations and calls in place.
    pub fn unfold_constant_exprs(
        &mut self,
        program: &Program,
        mut speculator: Option<&mut Emulator<'_>>,
    ) -> bool {
        let mut changed = false;
        for stmt in &mut self.statements {
            let folded = stmt.unfold_constants(program, speculator.as_deref_mut());
            if let Some(new) = owned(folded) {
                *stmt = new;
                changed = true;
            }
        }
        changed
    }

    /// Removes statements after the first control transfer.
    pub fn drop_unreachable_statements(&mut self) -> bool {
        let Some(end) = self.statements.iter().position(Statement::is_control_transfer) else {
            return false;
        };
        let len = end.saturating_add(1);
        if len >= self.statements.len() {
            return false;
        }
        debug!(block = %self.name, dropped = self.statements.len().saturating_sub(len), "trailing statements");
        self.statements.truncate(len);
        true
    }

    /// Turns a call whose result is immediately returned into a tail
    /// call.
    ///
    /// `output` is the enclosing subroutine's result type; the callee's
    /// must be exactly equivalent. Calls passing references stay
    /// ordinary calls since the caller's frame has to outlive them.
    pub fn compact_function_calls(&mut self, output: &Type) -> bool {
        let [.., call, ret] = self.statements.as_slice() else {
            return false;
        };
        let (Statement::Call(Call { dst, func, arg }), Statement::Return(Return { value })) =
            (call, ret)
        else {
            return false;
        };
        let returns_result = match value {
            Value::Binding(b) => b == dst,
            Value::Unit => dst.ty().is_unit(),
            _ => false,
        };
        if !returns_result || arg.carries_reference() {
            return false;
        }
        let Some(callee) = func.ty().as_function().map(|f| f.output.clone()) else {
            return false;
        };
        if !callee.is_equivalent(output) {
            return false;
        }
        let tail = TailCall {
            func: func.clone(),
            arg: arg.clone(),
        };
        self.statements
            .truncate(self.statements.len().saturating_sub(2));
        self.statements.push(tail.into());
        true
    }
}
