//! The structural type algebra.
//!
//! Types here are always concrete: there are no inference variables or
//! aliases to expand, so equivalence is plain structural equality.
//! Assignability is the subtyping relation used at call sites.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{error::ConstructionError, name::Name};

/// Whether a reference may be stored through.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Mutability {
    Immutable,
    Mutable,
}

impl Mutability {
    pub fn is_mutable(self) -> bool {
        matches!(self, Self::Mutable)
    }
}

/// A function's signature. Multiple parameters are expressed as a tuple
/// input.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub input: Type,
    pub output: Type,
}

impl FunctionType {
    pub fn new(input: Type, output: Type) -> Self {
        Self { input, output }
    }

    /// The parameter types the input splats to.
    pub fn params(&self) -> &[Type] {
        self.input.splat()
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn({}) -> {}", self.input, self.output)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// The singleton type.
    Unit,
    /// A fixed-width signed integer. The width is in bits.
    Integer(u32),
    /// A named atomic type such as `bool` or `string`.
    Nomial(Name),
    Function(Box<FunctionType>),
    /// Two or more elements.
    Tuple(Vec<Type>),
    Reference(Box<Type>, Mutability),
}

impl Type {
    pub const BOOL: &'static str = "bool";
    pub const CHAR: &'static str = "char";
    pub const STRING: &'static str = "string";
    pub const DOUBLE: &'static str = "double";

    pub fn bool() -> Self {
        Self::Nomial(Name::from(Self::BOOL))
    }

    /// A signed 8-bit integer.
    pub fn byte() -> Self {
        Self::Integer(8)
    }

    /// A signed 32-bit integer.
    pub fn int() -> Self {
        Self::Integer(32)
    }

    /// A UTF-16 code unit.
    pub fn char() -> Self {
        Self::Nomial(Name::from(Self::CHAR))
    }

    /// A UTF-16 string.
    pub fn string() -> Self {
        Self::Nomial(Name::from(Self::STRING))
    }

    pub fn double() -> Self {
        Self::Nomial(Name::from(Self::DOUBLE))
    }

    /// An integer type of the given width.
    pub fn integer(bits: i64) -> Result<Self, ConstructionError> {
        match u32::try_from(bits) {
            Ok(bits) if bits > 0 => Ok(Self::Integer(bits)),
            _ => Err(ConstructionError::IntegerWidth(bits)),
        }
    }

    pub fn tuple(elems: Vec<Type>) -> Result<Self, ConstructionError> {
        if elems.len() < 2 {
            return Err(ConstructionError::TupleArity(elems.len()));
        }
        Ok(Self::Tuple(elems))
    }

    pub fn function(input: Type, output: Type) -> Self {
        Self::Function(Box::new(FunctionType::new(input, output)))
    }

    pub fn reference(referent: Type, mutability: Mutability) -> Self {
        Self::Reference(Box::new(referent), mutability)
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }

    pub fn is_nomial(&self, name: &str) -> bool {
        matches!(self, Self::Nomial(n) if n.as_str() == name)
    }

    pub fn as_function(&self) -> Option<&FunctionType> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// The referent and mutability of a reference type.
    pub fn as_reference(&self) -> Option<(&Type, Mutability)> {
        match self {
            Self::Reference(t, m) => Some((t, *m)),
            _ => None,
        }
    }

    /// Structural type equality.
    pub fn is_equivalent(&self, other: &Type) -> bool {
        self == other
    }

    /// Reports whether a value of type `other` may be used where `self`
    /// is expected.
    ///
    /// Functions are contravariant in their input and covariant in their
    /// output. A mutable reference may stand in for an immutable one,
    /// never the reverse, and referents must be equivalent.
    pub fn is_assignable_from(&self, other: &Type) -> bool {
        match (self, other) {
            (Self::Unit, Self::Unit) => true,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Nomial(a), Self::Nomial(b)) => a == b,
            (Self::Function(want), Self::Function(got)) => {
                got.input.is_assignable_from(&want.input)
                    && want.output.is_assignable_from(&got.output)
            }
            (Self::Tuple(want), Self::Tuple(got)) => {
                want.len() == got.len()
                    && want
                        .iter()
                        .zip(got)
                        .all(|(w, g)| w.is_assignable_from(g))
            }
            (Self::Reference(want, wm), Self::Reference(got, gm)) => {
                want.is_equivalent(got) && (!wm.is_mutable() || gm.is_mutable())
            }
            _ => false,
        }
    }

    /// Replaces every sub-type equivalent to `from` with `to`.
    pub fn substitute(&self, from: &Type, to: &Type) -> Type {
        if self.is_equivalent(from) {
            return to.clone();
        }
        match self {
            Self::Unit | Self::Integer(_) | Self::Nomial(_) => self.clone(),
            Self::Function(f) => Self::function(
                f.input.substitute(from, to),
                f.output.substitute(from, to),
            ),
            Self::Tuple(elems) => {
                Self::Tuple(elems.iter().map(|t| t.substitute(from, to)).collect())
            }
            Self::Reference(t, m) => Self::reference(t.substitute(from, to), *m),
        }
    }

    /// The component types a value of this type splats to: nothing for
    /// unit, the elements of a tuple, or the type itself.
    pub fn splat(&self) -> &[Type] {
        match self {
            Self::Unit => &[],
            Self::Tuple(elems) => elems,
            other => std::slice::from_ref(other),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "()"),
            Self::Integer(bits) => write!(f, "i{bits}"),
            Self::Nomial(name) => write!(f, "{name}"),
            Self::Function(func) => write!(f, "{func}"),
            Self::Tuple(elems) => {
                write!(f, "(")?;
                for (i, t) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
            Self::Reference(t, Mutability::Immutable) => write!(f, "&{t}"),
            Self::Reference(t, Mutability::Mutable) => write!(f, "&mut {t}"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn pair(a: Type, b: Type) -> Type {
        Type::tuple(vec![a, b]).unwrap()
    }

    #[test]
    fn test_construction_errors() {
        assert_eq!(Type::integer(-8), Err(ConstructionError::IntegerWidth(-8)));
        assert_eq!(Type::integer(0), Err(ConstructionError::IntegerWidth(0)));
        assert_eq!(Type::integer(16), Ok(Type::Integer(16)));
        assert_eq!(Type::tuple(vec![]), Err(ConstructionError::TupleArity(0)));
        assert_eq!(
            Type::tuple(vec![Type::int()]),
            Err(ConstructionError::TupleArity(1))
        );
    }

    #[test]
    fn test_reference_assignability() {
        let imm = Type::reference(Type::char(), Mutability::Immutable);
        let mutable = Type::reference(Type::char(), Mutability::Mutable);

        assert!(imm.is_assignable_from(&mutable));
        assert!(!mutable.is_assignable_from(&imm));
        assert!(imm.is_assignable_from(&imm));
        assert!(mutable.is_assignable_from(&mutable));

        // Referents must match exactly.
        let other = Type::reference(Type::int(), Mutability::Mutable);
        assert!(!imm.is_assignable_from(&other));
    }

    #[test]
    fn test_function_variance() {
        let imm = Type::reference(Type::int(), Mutability::Immutable);
        let mutable = Type::reference(Type::int(), Mutability::Mutable);

        // Takes `&int`: callable with `&mut int` too.
        let takes_imm = Type::function(imm.clone(), Type::Unit);
        let takes_mut = Type::function(mutable.clone(), Type::Unit);
        assert!(takes_mut.is_assignable_from(&takes_imm));
        assert!(!takes_imm.is_assignable_from(&takes_mut));

        // Returns `&mut int`: usable where `&int` is returned.
        let gives_imm = Type::function(Type::Unit, imm);
        let gives_mut = Type::function(Type::Unit, mutable);
        assert!(gives_imm.is_assignable_from(&gives_mut));
        assert!(!gives_mut.is_assignable_from(&gives_imm));
    }

    #[test]
    fn test_tuple_and_nomial() {
        let a = pair(Type::int(), Type::bool());
        let b = pair(Type::int(), Type::bool());
        let c = pair(Type::bool(), Type::int());
        assert!(a.is_equivalent(&b));
        assert!(a.is_assignable_from(&b));
        assert!(!a.is_assignable_from(&c));
        assert!(!Type::char().is_assignable_from(&Type::string()));
        assert!(!Type::byte().is_assignable_from(&Type::int()));
    }

    #[test]
    fn test_substitute() {
        let t = Type::Nomial(Name::from("T"));
        let generic = Type::function(pair(t.clone(), Type::int()), t.clone());
        let concrete = generic.substitute(&t, &Type::double());
        assert_eq!(
            concrete,
            Type::function(pair(Type::double(), Type::int()), Type::double())
        );
    }

    #[test]
    fn test_splat() {
        assert!(Type::Unit.splat().is_empty());
        assert_eq!(Type::int().splat(), &[Type::int()]);
        let t = pair(Type::int(), Type::char());
        assert_eq!(t.splat(), &[Type::int(), Type::char()]);
    }

    #[test]
    fn test_display() {
        let t = Type::function(
            pair(
                Type::reference(Type::char(), Mutability::Mutable),
                Type::byte(),
            ),
            Type::Unit,
        );
        assert_eq!(t.to_string(), "fn((&mut char, i8)) -> ()");
    }
}
