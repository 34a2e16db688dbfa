//! Subroutines shared by the integration tests.

use anyhow::{Context, Result};
use tac_ir::{
    Binary, BinaryOp, Binding, Call, CondDomain, CondOp, ConditionalJump, FuncRef, FunctionType,
    LoadRef, MakeRef, Mutability, Program, QualifiedName, Relation, Statement, StoreRef, SubId,
    Subroutine, Type, Value,
};

pub fn int(name: &str) -> Binding {
    Binding::immutable(name, Type::int())
}

pub fn sub_mut(program: &mut Program, id: SubId) -> Result<&mut Subroutine> {
    program.get_mut(id).context("unknown subroutine")
}

pub fn declare(program: &mut Program, name: &str, input: Type, output: Type) -> Result<SubId> {
    Ok(program.declare(QualifiedName::dotted(name), FunctionType::new(input, output))?)
}

fn native(name: &str, input: Type) -> FuncRef {
    FuncRef::native(name, FunctionType::new(input, Type::Unit))
}

fn lt_int() -> Result<CondOp> {
    CondOp::new(Relation::Lt, CondDomain::Int).context("ordered int comparison")
}

/// ```text
/// export function main() {
/// entry:
///     mov %0, "Hello, world!"
///     call %1, print_str %0
///     ret ()
/// }
/// ```
pub fn hello_world(program: &mut Program) -> Result<SubId> {
    let id = declare(program, "main", Type::Unit, Type::Unit)?;
    let s0 = Binding::immutable("%0", Type::string());
    let s1 = Binding::immutable("%1", Type::Unit);
    let sub = sub_mut(program, id)?;
    sub.set_export(true);
    sub.set_statements(
        sub.entry(),
        vec![
            Statement::mov(s0.clone(), "Hello, world!"),
            Call {
                dst: s1,
                func: native("print_str", Type::string()).into(),
                arg: s0.into(),
            }
            .into(),
            Statement::ret(()),
        ],
    )?;
    Ok(id)
}

/// Counts `mut_i` up to 10 in steps of two, each made of two increments
/// through a temporary, prints it and returns it.
pub fn counting_loop(program: &mut Program) -> Result<SubId> {
    let id = declare(program, "count", Type::Unit, Type::int())?;
    let i = Binding::mutable("mut_i", Type::int());
    let t = int("%t");
    let u = Binding::immutable("%u", Type::Unit);
    let sub = sub_mut(program, id)?;
    let head = sub.add_block("loop")?;
    let body = sub.add_block("body")?;
    let done = sub.add_block("done")?;
    sub.set_statements(
        sub.entry(),
        vec![Statement::mov(i.clone(), 0), Statement::goto(head)],
    )?;
    sub.set_statements(
        head,
        vec![
            ConditionalJump {
                op: lt_int()?,
                lhs: i.clone().into(),
                rhs: Value::Int(10),
                if_true: body,
                if_false: done,
            }
            .into(),
        ],
    )?;
    sub.set_statements(
        body,
        vec![
            Binary {
                op: BinaryOp::AddI,
                dst: t.clone(),
                lhs: i.clone().into(),
                rhs: Value::Int(1),
            }
            .into(),
            Binary {
                op: BinaryOp::AddI,
                dst: i.clone(),
                lhs: t.into(),
                rhs: Value::Int(1),
            }
            .into(),
            Statement::goto(head),
        ],
    )?;
    sub.set_statements(
        done,
        vec![
            Call {
                dst: u,
                func: native("print_int", Type::int()).into(),
                arg: i.clone().into(),
            }
            .into(),
            Statement::ret(i),
        ],
    )?;
    Ok(id)
}

/// `swap(a: &mut char, b: &mut char) -> (char, char)` exchanges the
/// referents and returns them in their new order; `main` calls it on
/// references to two locals holding `'A'` and `'B'`.
///
/// Returns `(swap, main)`.
pub fn reference_swap(program: &mut Program) -> Result<(SubId, SubId)> {
    let cell = Type::reference(Type::char(), Mutability::Mutable);
    let pair = Type::tuple(vec![Type::char(), Type::char()])?;
    let swap = declare(
        program,
        "swap",
        Type::tuple(vec![cell.clone(), cell.clone()])?,
        pair.clone(),
    )?;
    let main = declare(program, "main", Type::Unit, pair.clone())?;
    let swap_ref = program.func_ref(swap).context("swap")?;

    let a = Binding::parameter("a", cell.clone());
    let b = Binding::parameter("b", cell.clone());
    let char_tmp = |name: &str| Binding::immutable(name, Type::char());
    let (ta, tb, x, y) = (char_tmp("ta"), char_tmp("tb"), char_tmp("x"), char_tmp("y"));
    let sub = sub_mut(program, swap)?;
    sub.set_params(vec![a.clone(), b.clone()]);
    sub.set_statements(
        sub.entry(),
        vec![
            LoadRef {
                dst: ta.clone(),
                reference: a.clone().into(),
            }
            .into(),
            LoadRef {
                dst: tb.clone(),
                reference: b.clone().into(),
            }
            .into(),
            StoreRef {
                reference: a.clone().into(),
                src: tb.into(),
            }
            .into(),
            StoreRef {
                reference: b.clone().into(),
                src: ta.into(),
            }
            .into(),
            LoadRef {
                dst: x.clone(),
                reference: a.into(),
            }
            .into(),
            LoadRef {
                dst: y.clone(),
                reference: b.into(),
            }
            .into(),
            Statement::ret(Value::tuple(vec![x.into(), y.into()])),
        ],
    )?;

    let first = Binding::mutable("first", Type::char());
    let second = Binding::mutable("second", Type::char());
    let ra = Binding::immutable("ra", cell.clone());
    let rb = Binding::immutable("rb", cell);
    let r = Binding::immutable("r", pair);
    let sub = sub_mut(program, main)?;
    sub.set_statements(
        sub.entry(),
        vec![
            Statement::mov(first.clone(), Value::char('A')),
            Statement::mov(second.clone(), Value::char('B')),
            MakeRef {
                dst: ra.clone(),
                src: first,
                mutability: Mutability::Mutable,
            }
            .into(),
            MakeRef {
                dst: rb.clone(),
                src: second,
                mutability: Mutability::Mutable,
            }
            .into(),
            Call {
                dst: r.clone(),
                func: swap_ref.into(),
                arg: Value::tuple(vec![ra.into(), rb.into()]),
            }
            .into(),
            Statement::ret(r),
        ],
    )?;
    Ok((swap, main))
}

/// `sum(n, acc)` adds `n + (n-1) + ... + 1` to `acc`, recursing through
/// an ordinary call that the optimizer turns into a tail call.
pub fn recursive_sum(program: &mut Program) -> Result<SubId> {
    let id = declare(
        program,
        "sum",
        Type::tuple(vec![Type::int(), Type::int()])?,
        Type::int(),
    )?;
    let this = program.func_ref(id).context("sum")?;
    let n = Binding::parameter("n", Type::int());
    let acc = Binding::parameter("acc", Type::int());
    let (n1, acc1, r) = (int("n1"), int("acc1"), int("r"));

    let sub = sub_mut(program, id)?;
    sub.set_params(vec![n.clone(), acc.clone()]);
    let done = sub.add_block("done")?;
    let more = sub.add_block("more")?;
    sub.set_statements(
        sub.entry(),
        vec![
            ConditionalJump {
                op: CondOp::new(Relation::Le, CondDomain::Int).context("le")?,
                lhs: n.clone().into(),
                rhs: Value::Int(0),
                if_true: done,
                if_false: more,
            }
            .into(),
        ],
    )?;
    sub.set_statements(done, vec![Statement::ret(acc.clone())])?;
    sub.set_statements(
        more,
        vec![
            Binary {
                op: BinaryOp::AddI,
                dst: acc1.clone(),
                lhs: acc.into(),
                rhs: n.clone().into(),
            }
            .into(),
            Binary {
                op: BinaryOp::SubI,
                dst: n1.clone(),
                lhs: n.into(),
                rhs: Value::Int(1),
            }
            .into(),
            Call {
                dst: r.clone(),
                func: this.into(),
                arg: Value::tuple(vec![n1.into(), acc1.into()]),
            }
            .into(),
            Statement::ret(r),
        ],
    )?;
    Ok(id)
}

/// `expr square(n) = n * n`, kept out of reach of single-`ret` inlining
/// by a temporary.
pub fn square(program: &mut Program) -> Result<SubId> {
    let id = declare(program, "math.square", Type::int(), Type::int())?;
    let n = Binding::parameter("n", Type::int());
    let r = int("r");
    let sub = sub_mut(program, id)?;
    sub.set_expr(true);
    sub.set_params(vec![n.clone()]);
    sub.set_statements(
        sub.entry(),
        vec![
            Binary {
                op: BinaryOp::MulI,
                dst: r.clone(),
                lhs: n.clone().into(),
                rhs: n.into(),
            }
            .into(),
            Statement::ret(r),
        ],
    )?;
    Ok(id)
}

/// `name() = callee(arg)`.
pub fn caller(program: &mut Program, name: &str, callee: SubId, arg: Value) -> Result<SubId> {
    let func = program.func_ref(callee).context("callee")?;
    let output = func.ty().output.clone();
    let id = declare(program, name, Type::Unit, output.clone())?;
    let r = Binding::immutable("r", output);
    let sub = sub_mut(program, id)?;
    sub.set_statements(
        sub.entry(),
        vec![
            Call {
                dst: r.clone(),
                func: func.into(),
                arg,
            }
            .into(),
            Statement::ret(r),
        ],
    )?;
    Ok(id)
}

/// `poly(x) = ((x * 3) + 7) ^ x`, spread over two blocks with a dead
/// temporary and an unused mutable store.
pub fn poly(program: &mut Program) -> Result<SubId> {
    let id = declare(program, "poly", Type::int(), Type::int())?;
    let x = Binding::parameter("x", Type::int());
    let (a, b, c, dead) = (int("a"), int("b"), int("c"), int("dead"));
    let scratch = Binding::mutable("scratch", Type::int());
    let sub = sub_mut(program, id)?;
    sub.set_params(vec![x.clone()]);
    let tail = sub.add_block("tail")?;
    sub.set_statements(
        sub.entry(),
        vec![
            Binary {
                op: BinaryOp::MulI,
                dst: a.clone(),
                lhs: x.clone().into(),
                rhs: Value::Int(3),
            }
            .into(),
            Statement::mov(dead, Value::Int(99)),
            Statement::mov(scratch, a.clone()),
            Statement::goto(tail),
        ],
    )?;
    sub.set_statements(
        tail,
        vec![
            Binary {
                op: BinaryOp::AddI,
                dst: b.clone(),
                lhs: a.into(),
                rhs: Value::Int(7),
            }
            .into(),
            Binary {
                op: BinaryOp::XorI,
                dst: c.clone(),
                lhs: b.into(),
                rhs: x.into(),
            }
            .into(),
            Statement::ret(c),
        ],
    )?;
    Ok(id)
}
