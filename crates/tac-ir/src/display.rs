//! Textual rendering of statements, blocks and subroutines.
//!
//! ```text
//! export function main() {
//! entry:
//!     mov %0, "Hello, world!"
//!     call %1, print_str %0
//!     ret ()
//! }
//! ```
//!
//! Jump targets render as block names, so statements are displayed
//! through their enclosing [`Subroutine`].

use std::fmt;

use crate::{
    block::{Block, BlockId},
    statement::Statement,
    subroutine::Subroutine,
    types::Mutability,
};

/// Helper struct to display a statement inside its subroutine.
pub struct StatementDisplay<'a> {
    stmt: &'a Statement,
    sub: &'a Subroutine,
}

impl Statement {
    pub fn display<'a>(&'a self, sub: &'a Subroutine) -> StatementDisplay<'a> {
        StatementDisplay { stmt: self, sub }
    }
}

impl StatementDisplay<'_> {
    fn target(&self, f: &mut fmt::Formatter<'_>, id: BlockId) -> fmt::Result {
        match self.sub.block(id) {
            Some(block) => write!(f, "{}", block.name()),
            None => write!(f, "@{id}"),
        }
    }
}

impl fmt::Display for StatementDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stmt {
            Statement::Move(s) => write!(f, "mov {}, {}", s.dst, s.src),
            Statement::Unary(s) => write!(f, "{} {}, {}", s.op, s.dst, s.src),
            Statement::Binary(s) => write!(f, "{} {}, {}, {}", s.op, s.dst, s.lhs, s.rhs),
            Statement::ConditionalJump(s) => {
                write!(f, "{} {}, {}, ", s.op, s.lhs, s.rhs)?;
                self.target(f, s.if_true)?;
                write!(f, ", ")?;
                self.target(f, s.if_false)
            }
            Statement::Goto(s) => {
                write!(f, "jmp ")?;
                self.target(f, s.target)
            }
            Statement::Return(s) => write!(f, "ret {}", s.value),
            Statement::TailCall(s) => write!(f, "tailcall {} {}", s.func, s.arg),
            Statement::Call(s) => write!(f, "call {}, {} {}", s.dst, s.func, s.arg),
            Statement::MakeRef(s) => match s.mutability {
                Mutability::Immutable => write!(f, "mkref {}, {}", s.dst, s.src),
                Mutability::Mutable => write!(f, "mkref.mut {}, {}", s.dst, s.src),
            },
            Statement::LoadRef(s) => write!(f, "ldref {}, {}", s.dst, s.reference),
            Statement::StoreRef(s) => write!(f, "stref {}, {}", s.reference, s.src),
        }
    }
}

/// Helper struct to display a block inside its subroutine.
pub struct BlockDisplay<'a> {
    block: &'a Block,
    sub: &'a Subroutine,
}

impl Block {
    pub fn display<'a>(&'a self, sub: &'a Subroutine) -> BlockDisplay<'a> {
        BlockDisplay { block: self, sub }
    }
}

impl fmt::Display for BlockDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.block.name())?;
        for stmt in self.block.statements() {
            writeln!(f, "    {}", stmt.display(self.sub))?;
        }
        Ok(())
    }
}

/// Renders the signature line, e.g. `export function main(a: i32) {`.
pub(crate) struct Signature<'a>(pub(crate) &'a Subroutine);

impl fmt::Display for Signature<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sub = self.0;
        if sub.is_export() {
            write!(f, "export ")?;
        }
        let kind = if sub.is_expr() { "expr" } else { "function" };
        write!(f, "{kind} {}(", sub.name())?;
        for (i, param) in sub.params().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}: {}", param.ty())?;
        }
        write!(f, ") {{")
    }
}

/// Renders reachable blocks only, in trace order.
impl fmt::Display for Subroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", Signature(self))?;
        for id in self.reachable_blocks() {
            if let Some(block) = self.block(id) {
                write!(f, "{}", block.display(self))?;
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::{
        name::QualifiedName,
        ops::{CondDomain, CondOp, Relation},
        statement::{Call, ConditionalJump},
        types::{FunctionType, Type},
        value::{Binding, FuncRef, Value},
    };

    #[test]
    fn test_hello_world() {
        let mut sub = Subroutine::new(
            QualifiedName::simple("main"),
            FunctionType::new(Type::Unit, Type::Unit),
        )
        .unwrap();
        sub.set_export(true);
        let s0 = Binding::immutable("%0", Type::string());
        let s1 = Binding::immutable("%1", Type::Unit);
        let print = FuncRef::native("print_str", FunctionType::new(Type::string(), Type::Unit));
        sub.set_statements(
            sub.entry(),
            vec![
                Statement::mov(s0.clone(), "Hello, world!"),
                Call {
                    dst: s1,
                    func: print.into(),
                    arg: s0.into(),
                }
                .into(),
                Statement::ret(()),
            ],
        )
        .unwrap();

        assert_eq!(
            sub.to_string(),
            "export function main() {\n\
             entry:\n    \
             mov %0, \"Hello, world!\"\n    \
             call %1, print_str %0\n    \
             ret ()\n\
             }"
        );
    }

    #[test]
    fn test_jumps_render_block_names() {
        let mut sub = Subroutine::new(
            QualifiedName::dotted("std.loop"),
            FunctionType::new(Type::int(), Type::int()),
        )
        .unwrap();
        sub.set_expr(true);
        let n = Binding::parameter("n", Type::int());
        sub.set_params(vec![n.clone()]);
        let yes = sub.add_block("yes").unwrap();
        let no = sub.add_block("no").unwrap();
        let jump = Statement::from(ConditionalJump {
            op: CondOp::new(Relation::Lt, CondDomain::Int).unwrap(),
            lhs: n.clone().into(),
            rhs: Value::Int(10),
            if_true: yes,
            if_false: no,
        });
        sub.set_statements(sub.entry(), vec![jump.clone()]).unwrap();
        sub.set_statements(yes, vec![Statement::ret(1)]).unwrap();
        sub.set_statements(no, vec![Statement::goto(yes)]).unwrap();

        assert_eq!(jump.display(&sub).to_string(), "jlt.ii n, 10, yes, no");
        let text = sub.to_string();
        assert!(text.starts_with("expr std.loop(n: i32) {\n"));
        assert!(text.contains("no:\n    jmp yes\n"));
    }
}
