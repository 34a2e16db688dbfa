use tracing::{debug, instrument};

use crate::{
    arena::{Arena, new_key_type},
    error::{ConstructionError, OptimizeError, TypeError},
    name::QualifiedName,
    subroutine::Subroutine,
    types::FunctionType,
    value::FuncRef,
};

new_key_type! {
    /// Identifies a [`Subroutine`] within its [`Program`].
    pub struct SubId;
}

/// Owns every subroutine of a compilation unit.
///
/// Local function references name subroutines by [`SubId`], so
/// subroutines may call each other, and themselves, freely.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    subs: Arena<SubId, Subroutine>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subroutine with an empty body.
    pub fn declare(
        &mut self,
        name: QualifiedName,
        ty: FunctionType,
    ) -> Result<SubId, ConstructionError> {
        let sub = Subroutine::new(name, ty)?;
        Ok(self.subs.insert(sub)?)
    }

    pub fn get(&self, id: SubId) -> Option<&Subroutine> {
        self.subs.get(id)
    }

    pub fn get_mut(&mut self, id: SubId) -> Option<&mut Subroutine> {
        self.subs.get_mut(id)
    }

    /// A function reference that calls subroutine `id`.
    pub fn func_ref(&self, id: SubId) -> Option<FuncRef> {
        let sub = self.subs.get(id)?;
        Some(FuncRef::Local {
            id,
            name: sub.name().clone(),
            ty: sub.ty().clone(),
        })
    }

    /// Looks a subroutine up by its qualified name.
    pub fn find(&self, name: &QualifiedName) -> Option<SubId> {
        self.subs
            .iter()
            .find_map(|(id, sub)| (sub.name() == name).then_some(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (SubId, &Subroutine)> {
        self.subs.iter()
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    pub fn validate(&self, id: SubId) -> Result<(), TypeError> {
        self.get(id)
            .ok_or(TypeError::UnknownSubroutine(id))?
            .validate()
    }

    /// Optimizes subroutine `id` to a fixed point.
    ///
    /// Calls inside it are resolved against the program as it was before
    /// the subroutine changed.
    #[instrument(skip(self))]
    pub fn optimize(&mut self, id: SubId) -> Result<bool, OptimizeError> {
        let mut sub = self
            .get(id)
            .ok_or(OptimizeError::UnknownSubroutine(id))?
            .clone();
        let changed = sub.optimize(self)?;
        if changed {
            let slot = self
                .get_mut(id)
                .ok_or(OptimizeError::UnknownSubroutine(id))?;
            *slot = sub;
        }
        Ok(changed)
    }

    /// Optimizes every subroutine in declaration order.
    pub fn optimize_all(&mut self) -> Result<bool, OptimizeError> {
        let ids: Vec<SubId> = self.subs.iter().map(|(id, _)| id).collect();
        let mut changed = false;
        for id in ids {
            changed |= self.optimize(id)?;
        }
        debug!(changed, subs = self.len(), "optimized program");
        Ok(changed)
    }
}
