//! The closed set of IR statements.

use std::borrow::Cow;

use crate::{
    block::{Block, BlockId},
    error::{TraceError, TypeError},
    ops::{BinaryOp, CondOp, UnaryOp},
    subroutine::Subroutine,
    trace::Tracer,
    types::{FunctionType, Mutability, Type},
    value::{Binding, Value},
};

/// Declares a statement variant.
macro_rules! stmt {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(pub $field:ident: $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        $vis struct $name {
            $(pub $field: $ty),*
        }
    };
}

stmt! {
    /// `dst := src`
    pub struct Move {
        pub dst: Binding,
        pub src: Value,
    }
}

stmt! {
    /// `dst := op src`
    pub struct Unary {
        pub op: UnaryOp,
        pub dst: Binding,
        pub src: Value,
    }
}

stmt! {
    /// `dst := lhs op rhs`
    pub struct Binary {
        pub op: BinaryOp,
        pub dst: Binding,
        pub lhs: Value,
        pub rhs: Value,
    }
}

stmt! {
    /// Branches to `if_true` when `lhs op rhs` holds, otherwise to
    /// `if_false`.
    pub struct ConditionalJump {
        pub op: CondOp,
        pub lhs: Value,
        pub rhs: Value,
        pub if_true: BlockId,
        pub if_false: BlockId,
    }
}

stmt! {
    pub struct Goto {
        pub target: BlockId,
    }
}

stmt! {
    pub struct Return {
        pub value: Value,
    }
}

stmt! {
    /// Calls `func` and returns its result without growing the call
    /// stack.
    pub struct TailCall {
        pub func: Value,
        pub arg: Value,
    }
}

stmt! {
    /// `dst := func(arg)`
    pub struct Call {
        pub dst: Binding,
        pub func: Value,
        pub arg: Value,
    }
}

stmt! {
    /// `dst := &src`
    pub struct MakeRef {
        pub dst: Binding,
        pub src: Binding,
        pub mutability: Mutability,
    }
}

stmt! {
    /// `dst := *reference`
    pub struct LoadRef {
        pub dst: Binding,
        pub reference: Value,
    }
}

stmt! {
    /// `*reference := src`
    pub struct StoreRef {
        pub reference: Value,
        pub src: Value,
    }
}

macro_rules! enum_decl {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident($inner:ty)
            ),+ $(,)?
        }
    )=>{
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant($inner)
            ),+
        }
        $(impl From<$inner> for $name {
            fn from(inner: $inner) -> Self {
                $name::$variant(inner)
            }
        })+
    };
}

enum_decl! {
    pub enum Statement {
        Move(Move),
        Unary(Unary),
        Binary(Binary),
        ConditionalJump(ConditionalJump),
        Goto(Goto),
        Return(Return),
        TailCall(TailCall),
        Call(Call),
        MakeRef(MakeRef),
        LoadRef(LoadRef),
        StoreRef(StoreRef),
    }
}

impl Statement {
    pub fn goto(target: BlockId) -> Self {
        Goto { target }.into()
    }

    pub fn ret(value: impl Into<Value>) -> Self {
        Return {
            value: value.into(),
        }
        .into()
    }

    pub fn mov(dst: Binding, src: impl Into<Value>) -> Self {
        Move {
            dst,
            src: src.into(),
        }
        .into()
    }

    /// Reports whether the statement, given identical inputs, produces
    /// identical outputs and no observable side effect.
    ///
    /// A `Move` is pure only when it defines an immutable binding; moves
    /// into mutable or parameter bindings are stores.
    pub fn is_pure(&self) -> bool {
        match self {
            Self::Move(s) => s.dst.is_immutable(),
            Self::Unary(_)
            | Self::Binary(_)
            | Self::ConditionalJump(_)
            | Self::Goto(_)
            | Self::MakeRef(_) => true,
            Self::LoadRef(s) => matches!(
                s.reference.ty().as_reference(),
                Some((_, Mutability::Immutable))
            ),
            Self::Return(_) | Self::TailCall(_) | Self::Call(_) | Self::StoreRef(_) => false,
        }
    }

    /// Reports whether the statement ends a block.
    pub fn is_control_transfer(&self) -> bool {
        matches!(
            self,
            Self::ConditionalJump(_) | Self::Goto(_) | Self::Return(_) | Self::TailCall(_)
        )
    }

    /// Reports whether the statement leaves the subroutine with a value.
    pub fn is_yield(&self) -> bool {
        matches!(self, Self::Return(_) | Self::TailCall(_))
    }

    /// The binding this statement writes, if any.
    pub fn result_register(&self) -> Option<&Binding> {
        match self {
            Self::Move(Move { dst, .. })
            | Self::Unary(Unary { dst, .. })
            | Self::Binary(Binary { dst, .. })
            | Self::Call(Call { dst, .. })
            | Self::MakeRef(MakeRef { dst, .. })
            | Self::LoadRef(LoadRef { dst, .. }) => Some(dst),
            Self::ConditionalJump(_)
            | Self::Goto(_)
            | Self::Return(_)
            | Self::TailCall(_)
            | Self::StoreRef(_) => None,
        }
    }

    /// The blocks this statement may transfer control to, in order.
    pub fn targets(&self) -> impl DoubleEndedIterator<Item = BlockId> {
        let (first, second) = match self {
            Self::ConditionalJump(s) => (Some(s.if_true), Some(s.if_false)),
            Self::Goto(s) => (Some(s.target), None),
            _ => (None, None),
        };
        first.into_iter().chain(second)
    }

    /// Visits every binding the statement reads.
    ///
    /// Taking a reference counts as a read of the referenced slot.
    pub fn for_each_read(&self, f: &mut impl FnMut(&Binding)) {
        match self {
            Self::Move(s) => s.src.for_each_binding(f),
            Self::Unary(s) => s.src.for_each_binding(f),
            Self::Binary(s) => {
                s.lhs.for_each_binding(f);
                s.rhs.for_each_binding(f);
            }
            Self::ConditionalJump(s) => {
                s.lhs.for_each_binding(f);
                s.rhs.for_each_binding(f);
            }
            Self::Goto(_) => {}
            Self::Return(s) => s.value.for_each_binding(f),
            Self::TailCall(TailCall { func, arg }) | Self::Call(Call { func, arg, .. }) => {
                func.for_each_binding(f);
                arg.for_each_binding(f);
            }
            Self::MakeRef(s) => f(&s.src),
            Self::LoadRef(s) => s.reference.for_each_binding(f),
            Self::StoreRef(s) => {
                s.reference.for_each_binding(f);
                s.src.for_each_binding(f);
            }
        }
    }

    /// Reports whether the statement reads `binding`.
    pub fn reads(&self, binding: &Binding) -> bool {
        let mut found = false;
        self.for_each_read(&mut |b| found |= b == binding);
        found
    }

    /// Records the statement's reads and writes with `tracer` and queues
    /// any blocks it transfers control to.
    pub(crate) fn reach_block(
        &self,
        tracer: &mut Tracer<'_>,
        block: &Block,
    ) -> Result<(), TraceError> {
        let mut unwritten = None;
        self.for_each_read(&mut |b| {
            if !tracer.read(b) && unwritten.is_none() {
                unwritten = Some(b.name().clone());
            }
        });
        if let Some(binding) = unwritten {
            return Err(TraceError::UnwrittenRead {
                binding,
                block: block.name().clone(),
            });
        }
        if let Some(dst) = self.result_register() {
            tracer.write(dst);
        }
        tracer.reach(self.targets());
        Ok(())
    }

    /// Replaces every substitutable read of `binding` with
    /// `replacement`.
    pub fn replace_read(&self, binding: &Binding, replacement: &Value) -> Cow<'_, Statement> {
        self.rewrite_reads(&mut |b| (b == binding).then(|| replacement.clone()))
    }

    /// Rewrites every substitutable read for which `f` returns a value.
    ///
    /// Returns [`Cow::Borrowed`] when nothing was replaced. The slot named
    /// by `MakeRef` and the reference operand of `LoadRef` and `StoreRef`
    /// are never rewritten since they identify storage rather than carry
    /// a value.
    pub fn rewrite_reads(
        &self,
        f: &mut impl FnMut(&Binding) -> Option<Value>,
    ) -> Cow<'_, Statement> {
        let stmt: Statement = match self {
            Self::Move(s) => match s.src.rewrite(f) {
                Some(src) => Move {
                    dst: s.dst.clone(),
                    src,
                }
                .into(),
                None => return Cow::Borrowed(self),
            },
            Self::Unary(s) => match s.src.rewrite(f) {
                Some(src) => Unary {
                    op: s.op,
                    dst: s.dst.clone(),
                    src,
                }
                .into(),
                None => return Cow::Borrowed(self),
            },
            Self::Binary(s) => match rewrite_pair(&s.lhs, &s.rhs, f) {
                Some((lhs, rhs)) => Binary {
                    op: s.op,
                    dst: s.dst.clone(),
                    lhs,
                    rhs,
                }
                .into(),
                None => return Cow::Borrowed(self),
            },
            Self::ConditionalJump(s) => match rewrite_pair(&s.lhs, &s.rhs, f) {
                Some((lhs, rhs)) => ConditionalJump {
                    op: s.op,
                    lhs,
                    rhs,
                    if_true: s.if_true,
                    if_false: s.if_false,
                }
                .into(),
                None => return Cow::Borrowed(self),
            },
            Self::Return(s) => match s.value.rewrite(f) {
                Some(value) => Return { value }.into(),
                None => return Cow::Borrowed(self),
            },
            Self::TailCall(s) => match rewrite_pair(&s.func, &s.arg, f) {
                Some((func, arg)) => TailCall { func, arg }.into(),
                None => return Cow::Borrowed(self),
            },
            Self::Call(s) => match rewrite_pair(&s.func, &s.arg, f) {
                Some((func, arg)) => Call {
                    dst: s.dst.clone(),
                    func,
                    arg,
                }
                .into(),
                None => return Cow::Borrowed(self),
            },
            Self::StoreRef(s) => match s.src.rewrite(f) {
                Some(src) => StoreRef {
                    reference: s.reference.clone(),
                    src,
                }
                .into(),
                None => return Cow::Borrowed(self),
            },
            Self::Goto(_) | Self::MakeRef(_) | Self::LoadRef(_) => return Cow::Borrowed(self),
        };
        Cow::Owned(stmt)
    }

    /// Checks operand and result types within `sub`.
    pub fn validate_type(&self, sub: &Subroutine) -> Result<(), TypeError> {
        let ctx = || self.display(sub).to_string();
        let expect = |expected: &Type, actual: &Type| {
            if expected.is_equivalent(actual) {
                Ok(())
            } else {
                Err(TypeError::mismatch(expected, actual, ctx()))
            }
        };
        match self {
            Self::Move(s) => expect(s.dst.ty(), &s.src.ty()),
            Self::Unary(s) => {
                let (out, src) = s.op.signature();
                expect(&src, &s.src.ty())?;
                expect(&out, s.dst.ty())
            }
            Self::Binary(s) => {
                let (out, lhs, rhs) = s.op.signature();
                expect(&lhs, &s.lhs.ty())?;
                expect(&rhs, &s.rhs.ty())?;
                expect(&out, s.dst.ty())
            }
            Self::ConditionalJump(s) => {
                let (lhs, rhs) = s.op.signature();
                expect(&lhs, &s.lhs.ty())?;
                expect(&rhs, &s.rhs.ty())?;
                check_target(sub, s.if_true)?;
                check_target(sub, s.if_false)
            }
            Self::Goto(s) => check_target(sub, s.target),
            Self::Return(s) => expect(&sub.ty().output, &s.value.ty()),
            Self::TailCall(s) => {
                let func = callee_type(&s.func, &ctx)?;
                let arg = s.arg.ty();
                if !func.input.is_assignable_from(&arg) {
                    return Err(TypeError::mismatch(&func.input, &arg, ctx()));
                }
                // The callee's result becomes ours unchanged.
                expect(&sub.ty().output, &func.output)
            }
            Self::Call(s) => {
                let func = callee_type(&s.func, &ctx)?;
                let arg = s.arg.ty();
                if !func.input.is_assignable_from(&arg) {
                    return Err(TypeError::mismatch(&func.input, &arg, ctx()));
                }
                if !s.dst.ty().is_assignable_from(&func.output) {
                    return Err(TypeError::mismatch(s.dst.ty(), &func.output, ctx()));
                }
                Ok(())
            }
            Self::MakeRef(s) => {
                if s.mutability.is_mutable() && !s.src.is_mutable() {
                    return Err(TypeError::ImmutableBorrow(ctx()));
                }
                let want = Type::reference(s.src.ty().clone(), s.mutability);
                expect(&want, s.dst.ty())
            }
            Self::LoadRef(s) => {
                let ty = s.reference.ty();
                let (referent, _) = ty.as_reference().ok_or_else(|| TypeError::NotAReference {
                    actual: ty.clone(),
                    context: ctx(),
                })?;
                expect(referent, s.dst.ty())
            }
            Self::StoreRef(s) => {
                let ty = s.reference.ty();
                let (referent, mutability) =
                    ty.as_reference().ok_or_else(|| TypeError::NotAReference {
                        actual: ty.clone(),
                        context: ctx(),
                    })?;
                if !mutability.is_mutable() {
                    return Err(TypeError::ImmutableStore(ctx()));
                }
                expect(referent, &s.src.ty())
            }
        }
    }
}

/// The rewritten statement, if a rewrite happened.
pub(crate) fn owned<T: Clone>(cow: Cow<'_, T>) -> Option<T> {
    match cow {
        Cow::Owned(t) => Some(t),
        Cow::Borrowed(_) => None,
    }
}

fn rewrite_pair(
    a: &Value,
    b: &Value,
    f: &mut impl FnMut(&Binding) -> Option<Value>,
) -> Option<(Value, Value)> {
    match (a.rewrite(f), b.rewrite(f)) {
        (None, None) => None,
        (a2, b2) => Some((a2.unwrap_or_else(|| a.clone()), b2.unwrap_or_else(|| b.clone()))),
    }
}

fn check_target(sub: &Subroutine, target: BlockId) -> Result<(), TypeError> {
    if sub.block(target).is_some() {
        Ok(())
    } else {
        Err(TypeError::UnknownBlock(target))
    }
}

fn callee_type(func: &Value, ctx: impl Fn() -> String) -> Result<FunctionType, TypeError> {
    match func.ty() {
        Type::Function(f) => Ok(*f),
        actual => Err(TypeError::NotAFunction {
            actual,
            context: ctx(),
        }),
    }
}
