//! Operator vocabularies, their type signatures, and their evaluation.
//!
//! The constant folder and the emulator both evaluate operators through
//! [`UnaryOp::eval`], [`BinaryOp::eval`] and [`CondOp::eval`], so a folded
//! result is always the value the program would compute at runtime.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

use crate::{types::Type, value::Value};

/// Why an operator could not be evaluated.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ArithError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("`{op}` is not defined for ({operands})")]
    Operands { op: &'static str, operands: String },
}

fn operands_err(op: &'static str, values: &[&Value]) -> ArithError {
    let operands = values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    ArithError::Operands { op, operands }
}

fn ordering_to_int(ord: Ordering) -> i32 {
    match ord {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Three-way comparison of doubles. Unordered operands (NaN) compare
/// as equal, matching `cmp.dd` in generated C.
fn compare_doubles(a: f64, b: f64) -> i32 {
    a.partial_cmp(&b).map_or(0, ordering_to_int)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Integer negation.
    NegI,
    /// Integer bitwise complement.
    NotI,
    /// Boolean negation.
    NotB,
    /// Double negation.
    NegD,
    IntToDouble,
    /// Saturating; NaN converts to zero.
    DoubleToInt,
    ByteToInt,
    /// Truncating.
    IntToByte,
    CharToInt,
    /// Truncating.
    IntToChar,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 10] = [
        Self::NegI,
        Self::NotI,
        Self::NotB,
        Self::NegD,
        Self::IntToDouble,
        Self::DoubleToInt,
        Self::ByteToInt,
        Self::IntToByte,
        Self::CharToInt,
        Self::IntToChar,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::NegI => "neg.i",
            Self::NotI => "not.i",
            Self::NotB => "not.b",
            Self::NegD => "neg.d",
            Self::IntToDouble => "cvt.id",
            Self::DoubleToInt => "cvt.di",
            Self::ByteToInt => "cvt.bi",
            Self::IntToByte => "cvt.ib",
            Self::CharToInt => "cvt.ci",
            Self::IntToChar => "cvt.ic",
        }
    }

    /// The `(output, operand)` types.
    pub fn signature(self) -> (Type, Type) {
        match self {
            Self::NegI | Self::NotI => (Type::int(), Type::int()),
            Self::NotB => (Type::bool(), Type::bool()),
            Self::NegD => (Type::double(), Type::double()),
            Self::IntToDouble => (Type::double(), Type::int()),
            Self::DoubleToInt => (Type::int(), Type::double()),
            Self::ByteToInt => (Type::int(), Type::byte()),
            Self::IntToByte => (Type::byte(), Type::int()),
            Self::CharToInt => (Type::int(), Type::char()),
            Self::IntToChar => (Type::char(), Type::int()),
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn eval(self, src: &Value) -> Result<Value, ArithError> {
        let v = match (self, src) {
            (Self::NegI, Value::Int(a)) => Value::Int(a.wrapping_neg()),
            (Self::NotI, Value::Int(a)) => Value::Int(!a),
            (Self::NotB, Value::Bool(a)) => Value::Bool(!a),
            (Self::NegD, Value::Double(a)) => Value::Double(-a),
            (Self::IntToDouble, Value::Int(a)) => Value::Double(f64::from(*a)),
            // `as` saturates and maps NaN to zero.
            (Self::DoubleToInt, Value::Double(a)) => Value::Int(*a as i32),
            (Self::ByteToInt, Value::Byte(a)) => Value::Int(i32::from(*a)),
            (Self::IntToByte, Value::Int(a)) => Value::Byte(*a as i8),
            (Self::CharToInt, Value::Char(a)) => Value::Int(i32::from(*a)),
            (Self::IntToChar, Value::Int(a)) => Value::Char(*a as u16),
            _ => return Err(operands_err(self.mnemonic(), &[src])),
        };
        Ok(v)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    AddI,
    SubI,
    MulI,
    DivI,
    RemI,
    AndI,
    OrI,
    XorI,
    ShlI,
    /// Arithmetic shift.
    ShrI,
    CmpI,
    AddD,
    SubD,
    MulD,
    DivD,
    CmpD,
    CmpC,
    /// Ordinal comparison of UTF-16 code units.
    CmpS,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 18] = [
        Self::AddI,
        Self::SubI,
        Self::MulI,
        Self::DivI,
        Self::RemI,
        Self::AndI,
        Self::OrI,
        Self::XorI,
        Self::ShlI,
        Self::ShrI,
        Self::CmpI,
        Self::AddD,
        Self::SubD,
        Self::MulD,
        Self::DivD,
        Self::CmpD,
        Self::CmpC,
        Self::CmpS,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::AddI => "add.ii",
            Self::SubI => "sub.ii",
            Self::MulI => "mul.ii",
            Self::DivI => "div.ii",
            Self::RemI => "mod.ii",
            Self::AndI => "and.ii",
            Self::OrI => "or.ii",
            Self::XorI => "xor.ii",
            Self::ShlI => "shl.ii",
            Self::ShrI => "shr.ii",
            Self::CmpI => "cmp.ii",
            Self::AddD => "add.dd",
            Self::SubD => "sub.dd",
            Self::MulD => "mul.dd",
            Self::DivD => "div.dd",
            Self::CmpD => "cmp.dd",
            Self::CmpC => "cmp.cc",
            Self::CmpS => "cmp.ss",
        }
    }

    /// The `(output, lhs, rhs)` types. Comparisons produce an integer in
    /// `{-1, 0, 1}`.
    pub fn signature(self) -> (Type, Type, Type) {
        match self {
            Self::AddI
            | Self::SubI
            | Self::MulI
            | Self::DivI
            | Self::RemI
            | Self::AndI
            | Self::OrI
            | Self::XorI
            | Self::ShlI
            | Self::ShrI
            | Self::CmpI => (Type::int(), Type::int(), Type::int()),
            Self::AddD | Self::SubD | Self::MulD | Self::DivD => {
                (Type::double(), Type::double(), Type::double())
            }
            Self::CmpD => (Type::int(), Type::double(), Type::double()),
            Self::CmpC => (Type::int(), Type::char(), Type::char()),
            Self::CmpS => (Type::int(), Type::string(), Type::string()),
        }
    }

    #[allow(clippy::arithmetic_side_effects, clippy::cast_sign_loss)]
    pub fn eval(self, lhs: &Value, rhs: &Value) -> Result<Value, ArithError> {
        use Value::{Char, Double, Int, Str};

        let v = match (self, lhs, rhs) {
            (Self::AddI, Int(a), Int(b)) => Int(a.wrapping_add(*b)),
            (Self::SubI, Int(a), Int(b)) => Int(a.wrapping_sub(*b)),
            (Self::MulI, Int(a), Int(b)) => Int(a.wrapping_mul(*b)),
            (Self::DivI | Self::RemI, Int(_), Int(0)) => return Err(ArithError::DivisionByZero),
            (Self::DivI, Int(a), Int(b)) => Int(a.wrapping_div(*b)),
            (Self::RemI, Int(a), Int(b)) => Int(a.wrapping_rem(*b)),
            (Self::AndI, Int(a), Int(b)) => Int(a & b),
            (Self::OrI, Int(a), Int(b)) => Int(a | b),
            (Self::XorI, Int(a), Int(b)) => Int(a ^ b),
            // Shift amounts are masked to the operand width.
            (Self::ShlI, Int(a), Int(b)) => Int(a.wrapping_shl(*b as u32)),
            (Self::ShrI, Int(a), Int(b)) => Int(a.wrapping_shr(*b as u32)),
            (Self::CmpI, Int(a), Int(b)) => Int(ordering_to_int(a.cmp(b))),

            (Self::AddD, Double(a), Double(b)) => Double(a + b),
            (Self::SubD, Double(a), Double(b)) => Double(a - b),
            (Self::MulD, Double(a), Double(b)) => Double(a * b),
            (Self::DivD, Double(a), Double(b)) => Double(a / b),
            (Self::CmpD, Double(a), Double(b)) => Int(compare_doubles(*a, *b)),

            (Self::CmpC, Char(a), Char(b)) => Int(ordering_to_int(a.cmp(b))),
            (Self::CmpS, Str(a), Str(b)) => Int(ordering_to_int(a.cmp(b))),
            _ => return Err(operands_err(self.mnemonic(), &[lhs, rhs])),
        };
        Ok(v)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// The operand domain of a [`CondOp`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum CondDomain {
    Int,
    Double,
    Char,
    Str,
    Unit,
    Bool,
}

impl CondDomain {
    pub fn ty(self) -> Type {
        match self {
            Self::Int => Type::int(),
            Self::Double => Type::double(),
            Self::Char => Type::char(),
            Self::Str => Type::string(),
            Self::Unit => Type::Unit,
            Self::Bool => Type::bool(),
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Int => "ii",
            Self::Double => "dd",
            Self::Char => "cc",
            Self::Str => "ss",
            Self::Unit => "uu",
            Self::Bool => "bb",
        }
    }

    /// Unit and bool only support equality.
    pub fn is_ordered(self) -> bool {
        !matches!(self, Self::Unit | Self::Bool)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Relation {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    fn prefix(self) -> &'static str {
        match self {
            Self::Eq => "jeq",
            Self::Ne => "jne",
            Self::Lt => "jlt",
            Self::Le => "jle",
            Self::Gt => "jgt",
            Self::Ge => "jge",
        }
    }

    pub fn holds(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::Ne => ord != Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::Le => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }
}

/// The comparison tested by a conditional jump.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CondOp {
    relation: Relation,
    domain: CondDomain,
}

impl CondOp {
    /// Returns `None` for an ordering relation over an unordered domain.
    pub fn new(relation: Relation, domain: CondDomain) -> Option<Self> {
        if !relation.is_equality() && !domain.is_ordered() {
            return None;
        }
        Some(Self { relation, domain })
    }

    pub fn relation(self) -> Relation {
        self.relation
    }

    pub fn domain(self) -> CondDomain {
        self.domain
    }

    /// The `(lhs, rhs)` types.
    pub fn signature(self) -> (Type, Type) {
        (self.domain.ty(), self.domain.ty())
    }

    pub fn eval(self, lhs: &Value, rhs: &Value) -> Result<bool, ArithError> {
        use Value::{Bool, Char, Double, Int, Str, Unit};

        let holds = match (self.domain, lhs, rhs) {
            (CondDomain::Int, Int(a), Int(b)) => self.relation.holds(a.cmp(b)),
            (CondDomain::Char, Char(a), Char(b)) => self.relation.holds(a.cmp(b)),
            (CondDomain::Str, Str(a), Str(b)) => self.relation.holds(a.cmp(b)),
            // IEEE semantics: every relation but `!=` is false for NaN.
            (CondDomain::Double, Double(a), Double(b)) => match a.partial_cmp(b) {
                Some(ord) => self.relation.holds(ord),
                None => self.relation == Relation::Ne,
            },
            (CondDomain::Unit, Unit, Unit) => self.relation.holds(Ordering::Equal),
            (CondDomain::Bool, Bool(a), Bool(b)) => self.relation.holds(a.cmp(b)),
            _ => return Err(operands_err("conditional jump", &[lhs, rhs])),
        };
        Ok(holds)
    }
}

impl fmt::Display for CondOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.relation.prefix(), self.domain.suffix())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_int_arith_wraps() {
        assert_eq!(
            BinaryOp::AddI.eval(&Value::Int(i32::MAX), &Value::Int(1)),
            Ok(Value::Int(i32::MIN))
        );
        assert_eq!(
            BinaryOp::DivI.eval(&Value::Int(i32::MIN), &Value::Int(-1)),
            Ok(Value::Int(i32::MIN))
        );
        assert_eq!(
            UnaryOp::NegI.eval(&Value::Int(i32::MIN)),
            Ok(Value::Int(i32::MIN))
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            BinaryOp::DivI.eval(&Value::Int(1), &Value::Int(0)),
            Err(ArithError::DivisionByZero)
        );
        assert_eq!(
            BinaryOp::RemI.eval(&Value::Int(1), &Value::Int(0)),
            Err(ArithError::DivisionByZero)
        );
        // Doubles follow IEEE instead.
        assert_eq!(
            BinaryOp::DivD.eval(&Value::Double(1.0), &Value::Double(0.0)),
            Ok(Value::Double(f64::INFINITY))
        );
    }

    #[test]
    fn test_compare_is_three_way() {
        let cmp = |a, b| BinaryOp::CmpI.eval(&Value::Int(a), &Value::Int(b)).unwrap();
        assert_eq!(cmp(1, 2), Value::Int(-1));
        assert_eq!(cmp(2, 2), Value::Int(0));
        assert_eq!(cmp(3, 2), Value::Int(1));

        assert_eq!(
            BinaryOp::CmpS.eval(&Value::str("abc"), &Value::str("abd")),
            Ok(Value::Int(-1))
        );
    }

    #[test]
    fn test_operand_mismatch() {
        let err = BinaryOp::AddI
            .eval(&Value::Int(1), &Value::Bool(true))
            .unwrap_err();
        assert!(matches!(err, ArithError::Operands { op: "add.ii", .. }));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(
            UnaryOp::DoubleToInt.eval(&Value::Double(f64::NAN)),
            Ok(Value::Int(0))
        );
        assert_eq!(
            UnaryOp::DoubleToInt.eval(&Value::Double(1e20)),
            Ok(Value::Int(i32::MAX))
        );
        assert_eq!(
            UnaryOp::IntToByte.eval(&Value::Int(300)),
            Ok(Value::Byte(44))
        );
        assert_eq!(
            UnaryOp::CharToInt.eval(&Value::char('A')),
            Ok(Value::Int(65))
        );
    }

    #[test]
    fn test_cond_ops() {
        let lt = CondOp::new(Relation::Lt, CondDomain::Int).unwrap();
        assert_eq!(lt.to_string(), "jlt.ii");
        assert_eq!(lt.eval(&Value::Int(1), &Value::Int(2)), Ok(true));
        assert_eq!(lt.eval(&Value::Int(2), &Value::Int(2)), Ok(false));

        assert!(CondOp::new(Relation::Lt, CondDomain::Bool).is_none());
        let eq = CondOp::new(Relation::Eq, CondDomain::Unit).unwrap();
        assert_eq!(eq.eval(&Value::Unit, &Value::Unit), Ok(true));

        let ne = CondOp::new(Relation::Ne, CondDomain::Double).unwrap();
        let nan = Value::Double(f64::NAN);
        assert_eq!(ne.eval(&nan, &nan), Ok(true));
        let eq = CondOp::new(Relation::Eq, CondDomain::Double).unwrap();
        assert_eq!(eq.eval(&nan, &nan), Ok(false));
    }

    #[test]
    fn test_signatures_cover_all_ops() {
        for op in BinaryOp::ALL {
            let (_, lhs, rhs) = op.signature();
            assert_eq!(lhs, rhs, "{op}");
        }
        for op in UnaryOp::ALL {
            let (out, src) = op.signature();
            assert!(!out.is_unit() && !src.is_unit(), "{op}");
        }
    }
}
