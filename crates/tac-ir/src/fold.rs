//! Statement-level constant folding and call inlining.
//!
//! The optimizer folds with a speculative [`Emulator`] so that calls to
//! `expr` subroutines with constant arguments can be precomputed; the
//! emulator folds every statement it executes without one.

use std::borrow::Cow;

use tracing::{debug, trace};

use crate::{
    emulator::Emulator,
    program::{Program, SubId},
    statement::{Binary, Call, ConditionalJump, Return, Statement, TailCall, Unary},
    types::Type,
    value::{FuncRef, Value},
};

/// Reports whether `v` is a literal that operators can evaluate.
fn is_literal(v: &Value) -> bool {
    matches!(
        v,
        Value::Unit
            | Value::Bool(_)
            | Value::Byte(_)
            | Value::Int(_)
            | Value::Char(_)
            | Value::Str(_)
            | Value::Double(_)
    )
}

impl Statement {
    /// Folds the statement if its operands allow it.
    ///
    /// Returns [`Cow::Borrowed`] when nothing could be folded. Calls
    /// through local function references are inlined when the callee's
    /// entry block is a single `ret`, or precomputed with `speculator`
    /// when the callee is `expr` and the argument is constant. A failed
    /// precomputation leaves the call in place, and the speculator does not
    /// retry it.
    pub fn unfold_constants(
        &self,
        program: &Program,
        speculator: Option<&mut Emulator<'_>>,
    ) -> Cow<'_, Statement> {
        let folded = match self {
            Self::Unary(Unary { op, dst, src }) if is_literal(src) => op
                .eval(src)
                .ok()
                .map(|v| Statement::mov(dst.clone(), v)),
            Self::Binary(Binary { op, dst, lhs, rhs }) if is_literal(lhs) && is_literal(rhs) => op
                .eval(lhs, rhs)
                .ok()
                .map(|v| Statement::mov(dst.clone(), v)),
            Self::ConditionalJump(ConditionalJump {
                op,
                lhs,
                rhs,
                if_true,
                if_false,
            }) if is_literal(lhs) && is_literal(rhs) => op
                .eval(lhs, rhs)
                .ok()
                .map(|holds| Statement::goto(if holds { *if_true } else { *if_false })),
            Self::Call(Call { dst, func, arg }) => {
                fold_call(program, speculator, func, arg, Some(dst.ty()))
                    .map(|v| Statement::mov(dst.clone(), v))
            }
            Self::TailCall(TailCall { func, arg }) => {
                fold_call(program, speculator, func, arg, None).map(Statement::ret)
            }
            _ => None,
        };
        match folded {
            Some(stmt) => Cow::Owned(stmt),
            None => Cow::Borrowed(self),
        }
    }
}

/// Computes the value of `func(arg)` at compile time, if possible.
///
/// `want` is the type the result is stored as, when it is stored.
fn fold_call(
    program: &Program,
    speculator: Option<&mut Emulator<'_>>,
    func: &Value,
    arg: &Value,
    want: Option<&Type>,
) -> Option<Value> {
    let Value::Func(FuncRef::Local { id, ty, .. }) = func else {
        return None;
    };
    let fits = |v: &Value| {
        let ty_v = v.ty();
        ty_v.is_equivalent(&ty.output) && want.is_none_or(|w| w.is_equivalent(&ty_v))
    };
    if let Some(v) = inline_return(program, *id, arg) {
        return fits(&v).then_some(v);
    }
    let callee = program.get(*id)?;
    if !callee.is_expr() || !arg.is_constant() {
        return None;
    }
    let emu = speculator?;
    match emu.speculate(*id, arg)? {
        Ok(v) if v.is_constant() && fits(&v) => {
            debug!(callee = %callee.name(), value = %v, "precomputed call");
            Some(v)
        }
        Ok(_) => None,
        Err(err) if err.is_malformed() => {
            debug!(callee = %callee.name(), %err, "speculative call hit malformed IR");
            None
        }
        Err(err) => {
            trace!(callee = %callee.name(), %err, "speculative call failed");
            None
        }
    }
}

/// Substitutes `arg` into the callee's returned value if its entry block
/// is nothing but a `ret`.
fn inline_return(program: &Program, id: SubId, arg: &Value) -> Option<Value> {
    let callee = program.get(id)?;
    let [Statement::Return(Return { value })] = callee.entry_block().statements() else {
        return None;
    };
    let args = arg.clone().splat();
    let params = callee.params();
    if args.len() != params.len() {
        return None;
    }
    // Anything else the value reads is unbound at the call site.
    let mut closed = true;
    value.for_each_binding(&mut |b| closed &= params.contains(b));
    if !closed {
        return None;
    }
    let inlined = value.rewrite(&mut |b| {
        params
            .iter()
            .position(|p| p == b)
            .and_then(|i| args.get(i).cloned())
    });
    Some(inlined.unwrap_or_else(|| value.clone()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::{
        emulator::EmulatorConfig,
        name::QualifiedName,
        ops::{BinaryOp, CondDomain, CondOp, Relation, UnaryOp},
        types::FunctionType,
        value::Binding,
    };

    fn int(name: &str) -> Binding {
        Binding::immutable(name, Type::int())
    }

    #[test]
    fn test_fold_binary_and_unary() {
        let program = Program::new();
        let x = int("x");
        let add = Statement::from(Binary {
            op: BinaryOp::AddI,
            dst: x.clone(),
            lhs: Value::Int(2),
            rhs: Value::Int(3),
        });
        assert_eq!(
            *add.unfold_constants(&program, None),
            Statement::mov(x.clone(), 5)
        );

        let neg = Statement::from(Unary {
            op: UnaryOp::NegI,
            dst: x.clone(),
            src: int("y").into(),
        });
        assert!(matches!(
            neg.unfold_constants(&program, None),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_division_by_zero_is_not_folded() {
        let program = Program::new();
        let div = Statement::from(Binary {
            op: BinaryOp::DivI,
            dst: int("x"),
            lhs: Value::Int(1),
            rhs: Value::Int(0),
        });
        assert!(matches!(
            div.unfold_constants(&program, None),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_fold_conditional_jump() {
        let mut program = Program::new();
        let id = program
            .declare(
                QualifiedName::simple("f"),
                FunctionType::new(Type::Unit, Type::Unit),
            )
            .unwrap();
        let sub = program.get_mut(id).unwrap();
        let a = sub.add_block("a").unwrap();
        let b = sub.add_block("b").unwrap();
        let jump = Statement::from(ConditionalJump {
            op: CondOp::new(Relation::Ge, CondDomain::Int).unwrap(),
            lhs: Value::Int(1),
            rhs: Value::Int(2),
            if_true: a,
            if_false: b,
        });
        assert_eq!(*jump.unfold_constants(&program, None), Statement::goto(b));
    }

    #[test]
    fn test_inline_single_return_callee() {
        let mut program = Program::new();
        let ty = FunctionType::new(
            Type::tuple(vec![Type::int(), Type::int()]).unwrap(),
            Type::tuple(vec![Type::int(), Type::int()]).unwrap(),
        );
        let swap = program
            .declare(QualifiedName::simple("swap"), ty)
            .unwrap();
        let a = Binding::parameter("a", Type::int());
        let b = Binding::parameter("b", Type::int());
        let sub = program.get_mut(swap).unwrap();
        sub.set_params(vec![a.clone(), b.clone()]);
        sub.set_statements(
            sub.entry(),
            vec![Statement::ret(Value::tuple(vec![b.into(), a.into()]))],
        )
        .unwrap();

        let x = int("x");
        let dst = Binding::immutable("r", Type::tuple(vec![Type::int(), Type::int()]).unwrap());
        let call = Statement::from(Call {
            dst: dst.clone(),
            func: program.func_ref(swap).unwrap().into(),
            arg: Value::tuple(vec![x.clone().into(), Value::Int(2)]),
        });
        assert_eq!(
            *call.unfold_constants(&program, None),
            Statement::mov(dst, Value::tuple(vec![Value::Int(2), x.into()]))
        );
    }

    #[test]
    fn test_speculative_failure_keeps_call() {
        let mut program = Program::new();
        let ty = FunctionType::new(Type::int(), Type::int());
        let id = program.declare(QualifiedName::simple("div"), ty).unwrap();
        let n = Binding::parameter("n", Type::int());
        let q = int("q");
        let sub = program.get_mut(id).unwrap();
        sub.set_expr(true);
        sub.set_params(vec![n.clone()]);
        sub.set_statements(
            sub.entry(),
            vec![
                Binary {
                    op: BinaryOp::DivI,
                    dst: q.clone(),
                    lhs: Value::Int(100),
                    rhs: n.into(),
                }
                .into(),
                Statement::ret(q),
            ],
        )
        .unwrap();

        let mut emu = Emulator::with_config(&program, EmulatorConfig::speculative());
        let call = |arg: i32| {
            Statement::from(Call {
                dst: int("r"),
                func: program.func_ref(id).unwrap().into(),
                arg: Value::Int(arg),
            })
        };

        let ok = call(5);
        assert_eq!(
            *ok.unfold_constants(&program, Some(&mut emu)),
            Statement::mov(int("r"), 20)
        );
        let zero = call(0);
        assert!(matches!(
            zero.unfold_constants(&program, Some(&mut emu)),
            Cow::Borrowed(_)
        ));
        // Known failures are not run again.
        let spent = emu.metrics().statements;
        assert!(matches!(
            zero.unfold_constants(&program, Some(&mut emu)),
            Cow::Borrowed(_)
        ));
        assert_eq!(emu.metrics().statements, spent);
        // Other arguments still are.
        assert_eq!(
            *call(4).unfold_constants(&program, Some(&mut emu)),
            Statement::mov(int("r"), 25)
        );
        // Without a speculator nothing is precomputed.
        assert!(matches!(
            ok.unfold_constants(&program, None),
            Cow::Borrowed(_)
        ));
    }
}
