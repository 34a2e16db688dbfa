use crate::{
    arena::Arena,
    block::{Block, BlockId},
    error::{ConstructionError, TraceError, TypeError},
    name::{Name, QualifiedName},
    statement::Statement,
    trace::{self, Trace, Tracer},
    types::FunctionType,
    value::Binding,
};

/// A named, typed function body: parameters plus a graph of blocks
/// rooted at an entry block.
#[derive(Clone, Debug, PartialEq)]
pub struct Subroutine {
    name: QualifiedName,
    ty: FunctionType,
    /// The result may be computed at compile time for constant inputs.
    expr: bool,
    /// Visible outside the program.
    export: bool,
    params: Vec<Binding>,
    blocks: Arena<BlockId, Block>,
    entry: BlockId,
}

impl Subroutine {
    /// The name of the entry block every subroutine starts with.
    pub const ENTRY: &'static str = "entry";

    /// Creates a subroutine whose entry block is a placeholder self-jump.
    pub fn new(name: QualifiedName, ty: FunctionType) -> Result<Self, ConstructionError> {
        let mut blocks = Arena::new();
        let entry = blocks.insert_with_key(|id| Block::new(id, Name::from(Self::ENTRY)))?;
        Ok(Self {
            name,
            ty,
            expr: false,
            export: false,
            params: Vec::new(),
            blocks,
            entry,
        })
    }

    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    pub fn ty(&self) -> &FunctionType {
        &self.ty
    }

    pub fn is_expr(&self) -> bool {
        self.expr
    }

    pub fn set_expr(&mut self, expr: bool) {
        self.expr = expr;
    }

    pub fn is_export(&self) -> bool {
        self.export
    }

    pub fn set_export(&mut self, export: bool) {
        self.export = export;
    }

    pub fn params(&self) -> &[Binding] {
        &self.params
    }

    pub fn set_params(&mut self, params: Vec<Binding>) {
        self.params = params;
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn set_entry(&mut self, entry: BlockId) -> Result<(), ConstructionError> {
        if !self.blocks.contains(entry) {
            return Err(ConstructionError::UnknownBlock(entry));
        }
        self.entry = entry;
        Ok(())
    }

    pub fn entry_block(&self) -> &Block {
        &self.blocks[self.entry]
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(id)
    }

    /// Every block ever added, reachable or not.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().map(|(_, b)| b)
    }

    /// Adds a block that initially jumps to itself.
    pub fn add_block(&mut self, name: impl Into<Name>) -> Result<BlockId, ConstructionError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConstructionError::EmptyBlockName);
        }
        Ok(self.blocks.insert_with_key(|id| Block::new(id, name))?)
    }

    pub fn set_statements(
        &mut self,
        id: BlockId,
        statements: Vec<Statement>,
    ) -> Result<(), ConstructionError> {
        self.blocks
            .get_mut(id)
            .ok_or(ConstructionError::UnknownBlock(id))?
            .set_statements(statements)
    }

    /// Blocks reachable from the entry, each once, in trace order.
    pub fn reachable_blocks(&self) -> Vec<BlockId> {
        trace::reachable(&self.blocks, self.entry)
    }

    /// Traces the block graph from the entry block.
    pub fn trace(&self) -> Result<Trace, TraceError> {
        let mut tracer = Tracer::new(&self.blocks);
        for param in &self.params {
            tracer.seed_parameter(param);
        }
        tracer.visit(self.entry)?;
        Ok(tracer.finish())
    }

    /// Type-checks the parameter list and every reachable statement.
    pub fn validate(&self) -> Result<(), TypeError> {
        let expected = self.ty.params();
        if expected.len() != self.params.len() {
            return Err(TypeError::ParameterArity {
                sub: self.name.clone(),
                expected: expected.len(),
                actual: self.params.len(),
            });
        }
        for (want, param) in expected.iter().zip(&self.params) {
            if !param.is_parameter() {
                return Err(TypeError::NotAParameter(param.name().clone()));
            }
            if !want.is_equivalent(param.ty()) {
                return Err(TypeError::mismatch(
                    want,
                    param.ty(),
                    format_args!("parameter `{}` of `{}`", param, self.name),
                ));
            }
        }
        for id in self.reachable_blocks() {
            let block = self.block(id).ok_or(TypeError::UnknownBlock(id))?;
            for stmt in block.statements() {
                stmt.validate_type(self)?;
            }
        }
        Ok(())
    }
}
