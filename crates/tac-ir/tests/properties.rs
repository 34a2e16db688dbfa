#![cfg(test)]
#![allow(clippy::unwrap_used)]

mod bits;

use bits::programs::*;
use proptest::prelude::*;
use tac_ir::{
    Binary, BinaryOp, Binding, Emulator, Program, Statement, SubId, Type, Unary, UnaryOp, Value,
};

/// `expr op(a, b) = a <op> b` over two ints.
fn binary_expr(program: &mut Program, op: BinaryOp) -> SubId {
    let (out, lhs, rhs) = op.signature();
    let input = Type::tuple(vec![lhs.clone(), rhs.clone()]).unwrap();
    let id = declare(program, op.mnemonic(), input, out.clone()).unwrap();
    let a = Binding::parameter("a", lhs);
    let b = Binding::parameter("b", rhs);
    let r = Binding::immutable("r", out);
    let sub = sub_mut(program, id).unwrap();
    sub.set_expr(true);
    sub.set_params(vec![a.clone(), b.clone()]);
    sub.set_statements(
        sub.entry(),
        vec![
            Binary {
                op,
                dst: r.clone(),
                lhs: a.into(),
                rhs: b.into(),
            }
            .into(),
            Statement::ret(r),
        ],
    )
    .unwrap();
    id
}

fn int_op() -> impl Strategy<Value = BinaryOp> {
    prop::sample::select(
        BinaryOp::ALL
            .iter()
            .copied()
            .filter(|op| op.signature().1 == Type::int())
            .collect::<Vec<_>>(),
    )
}

fn int_unary_op() -> impl Strategy<Value = UnaryOp> {
    prop::sample::select(
        UnaryOp::ALL
            .iter()
            .copied()
            .filter(|op| op.signature().1 == Type::int())
            .collect::<Vec<_>>(),
    )
}

proptest! {
    #[test]
    fn proptest_precomputed_calls_match_runtime(op in int_op(), a in any::<i32>(), b in any::<i32>()) {
        let mut program = Program::new();
        let callee = binary_expr(&mut program, op);
        let arg = Value::tuple(vec![Value::Int(a), Value::Int(b)]);
        let main = caller(&mut program, "main", callee, arg).unwrap();

        let runtime = Emulator::new(&program).call(main, Value::Unit);
        program.optimize(main).unwrap();
        let statements = program.get(main).unwrap().entry_block().statements().to_vec();
        match runtime {
            Ok(value) => {
                prop_assert_eq!(statements, vec![Statement::ret(value)]);
            }
            Err(_) => {
                // The failure is left for runtime.
                prop_assert!(matches!(statements.as_slice(), [Statement::TailCall(_)]));
                prop_assert!(Emulator::new(&program).call(main, Value::Unit).is_err());
            }
        }
    }

    #[test]
    fn proptest_unary_folding_matches_eval(op in int_unary_op(), x in any::<i32>()) {
        let program = Program::new();
        let (out, _) = op.signature();
        let stmt = Statement::from(Unary {
            op,
            dst: Binding::immutable("d", out),
            src: Value::Int(x),
        });
        let folded = stmt.unfold_constants(&program, None).into_owned();
        let Statement::Move(m) = folded else {
            return Err(TestCaseError::fail("unary op on a literal did not fold"));
        };
        prop_assert_eq!(m.src, op.eval(&Value::Int(x)).unwrap());
    }

    #[test]
    fn proptest_optimize_preserves_results(x in any::<i32>(), n in 0i32..200) {
        let mut program = Program::new();
        let poly = poly(&mut program).unwrap();
        let sum = recursive_sum(&mut program).unwrap();
        let sum_arg = Value::tuple(vec![Value::Int(n), Value::Int(x)]);

        let before = program.clone();
        program.optimize_all().unwrap();
        for (id, arg) in [(poly, Value::Int(x)), (sum, sum_arg)] {
            let want = Emulator::new(&before).call(id, arg.clone()).unwrap();
            let got = Emulator::new(&program).call(id, arg).unwrap();
            prop_assert_eq!(want, got);
        }
    }
}
