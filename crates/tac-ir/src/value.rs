use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::ConstructionError,
    name::{Name, QualifiedName},
    program::SubId,
    types::{FunctionType, Mutability, Type},
};

/// How a [`Binding`] may be written.
///
/// Each kind scopes its own names: an immutable `x` and a mutable `x`
/// are different storage locations.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum BindingKind {
    /// Assigned exactly once.
    Immutable,
    /// Reassignable.
    Mutable,
    /// A subroutine input. Immutable, but never treated as a dead store.
    Parameter,
}

/// A named, typed storage location.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Binding {
    name: Name,
    kind: BindingKind,
    ty: Type,
}

impl Binding {
    pub fn new(name: impl Into<Name>, kind: BindingKind, ty: Type) -> Self {
        Self {
            name: name.into(),
            kind,
            ty,
        }
    }

    pub fn immutable(name: impl Into<Name>, ty: Type) -> Self {
        Self::new(name, BindingKind::Immutable, ty)
    }

    pub fn mutable(name: impl Into<Name>, ty: Type) -> Self {
        Self::new(name, BindingKind::Mutable, ty)
    }

    pub fn parameter(name: impl Into<Name>, ty: Type) -> Self {
        Self::new(name, BindingKind::Parameter, ty)
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn is_immutable(&self) -> bool {
        self.kind == BindingKind::Immutable
    }

    pub fn is_mutable(&self) -> bool {
        self.kind == BindingKind::Mutable
    }

    pub fn is_parameter(&self) -> bool {
        self.kind == BindingKind::Parameter
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A backend-facing named value.
///
/// The optimizer never creates or reasons about these; the type is
/// whatever the backend that introduced it assigned.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Temporary {
    pub name: Name,
    pub ty: Type,
}

/// A string of UTF-16 code units, compared ordinally.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Utf16String(Vec<u16>);

impl Utf16String {
    pub fn from_units(units: Vec<u16>) -> Self {
        Self(units)
    }

    pub fn units(&self) -> &[u16] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy conversion for display and host interop.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }
}

impl From<&str> for Utf16String {
    fn from(s: &str) -> Self {
        Self(s.encode_utf16().collect())
    }
}

impl fmt::Display for Utf16String {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

/// A reference to a callable.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum FuncRef {
    /// An external symbol, resolved by name when called.
    Native { name: Name, ty: FunctionType },
    /// A subroutine of the same [`Program`](crate::Program).
    Local {
        id: SubId,
        name: QualifiedName,
        ty: FunctionType,
    },
}

impl FuncRef {
    pub fn native(name: impl Into<Name>, ty: FunctionType) -> Self {
        Self::Native {
            name: name.into(),
            ty,
        }
    }

    pub fn ty(&self) -> &FunctionType {
        match self {
            Self::Native { ty, .. } | Self::Local { ty, .. } => ty,
        }
    }

    pub fn local_id(&self) -> Option<SubId> {
        match self {
            Self::Local { id, .. } => Some(*id),
            Self::Native { .. } => None,
        }
    }
}

impl fmt::Display for FuncRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native { name, .. } => write!(f, "{name}"),
            Self::Local { name, .. } => write!(f, "{name}"),
        }
    }
}

/// An ordered sequence of two or more values.
#[derive(Clone, Debug, PartialEq)]
pub struct Tuple {
    elems: Vec<Value>,
    ty: Type,
}

impl Tuple {
    /// Builds a tuple whose type is derived from its elements.
    pub fn new(elems: Vec<Value>) -> Result<Self, ConstructionError> {
        let ty = Type::tuple(elems.iter().map(Value::ty).collect())?;
        Ok(Self { elems, ty })
    }

    /// Builds a tuple with a declared type, which must have one element
    /// type per value.
    pub fn with_type(elems: Vec<Value>, ty: Type) -> Result<Self, ConstructionError> {
        match &ty {
            Type::Tuple(tys) if tys.len() == elems.len() => Ok(Self { elems, ty }),
            _ => Err(ConstructionError::TupleArity(elems.len())),
        }
    }

    pub fn elems(&self) -> &[Value] {
        &self.elems
    }

    pub fn into_elems(self) -> Vec<Value> {
        self.elems
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

/// Identifies one activation of a subroutine inside an emulator run.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FrameId(pub(crate) u64);

/// A runtime load/store capability for one storage slot.
///
/// Only produced by executing a `MakeRef`; never part of a static
/// program.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RefHandle {
    pub(crate) frame: FrameId,
    pub(crate) slot: Binding,
    pub(crate) mutability: Mutability,
}

impl RefHandle {
    pub fn slot(&self) -> &Binding {
        &self.slot
    }

    pub fn mutability(&self) -> Mutability {
        self.mutability
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Byte(i8),
    Int(i32),
    /// A UTF-16 code unit.
    Char(u16),
    Str(Utf16String),
    Double(f64),
    Binding(Binding),
    Temporary(Temporary),
    Func(FuncRef),
    Tuple(Tuple),
    Ref(RefHandle),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Self::Str(Utf16String::from(s))
    }

    /// A character from a Rust `char` in the basic multilingual plane.
    pub fn char(c: char) -> Self {
        let mut buf = [0u16; 2];
        Self::Char(c.encode_utf16(&mut buf)[0])
    }

    /// Builds a tuple value, or unit/the sole element for fewer than two
    /// values, mirroring how values splat.
    pub fn tuple(elems: Vec<Value>) -> Self {
        match elems.len() {
            0 => Self::Unit,
            1 => elems.into_iter().next().unwrap_or(Self::Unit),
            _ => match Tuple::new(elems) {
                Ok(t) => Self::Tuple(t),
                Err(_) => Self::Unit,
            },
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Self::Unit => Type::Unit,
            Self::Bool(_) => Type::bool(),
            Self::Byte(_) => Type::byte(),
            Self::Int(_) => Type::int(),
            Self::Char(_) => Type::char(),
            Self::Str(_) => Type::string(),
            Self::Double(_) => Type::double(),
            Self::Binding(b) => b.ty().clone(),
            Self::Temporary(t) => t.ty.clone(),
            Self::Func(f) => Type::Function(Box::new(f.ty().clone())),
            Self::Tuple(t) => t.ty().clone(),
            Self::Ref(r) => Type::reference(r.slot.ty().clone(), r.mutability),
        }
    }

    /// Reports whether the value is known at compile time.
    ///
    /// Native functions are platform dependent and so are not constant.
    pub fn is_constant(&self) -> bool {
        match self {
            Self::Unit
            | Self::Bool(_)
            | Self::Byte(_)
            | Self::Int(_)
            | Self::Char(_)
            | Self::Str(_)
            | Self::Double(_) => true,
            Self::Func(FuncRef::Local { .. }) => true,
            Self::Tuple(t) => t.elems.iter().all(Value::is_constant),
            Self::Binding(_) | Self::Temporary(_) | Self::Func(FuncRef::Native { .. }) => false,
            Self::Ref(_) => false,
        }
    }

    /// Reports whether the value is fully evaluated: it mentions no
    /// binding or temporary anywhere inside.
    pub fn is_concrete(&self) -> bool {
        match self {
            Self::Binding(_) | Self::Temporary(_) => false,
            Self::Tuple(t) => t.elems.iter().all(Value::is_concrete),
            _ => true,
        }
    }

    /// Reports whether the value can be copied forward past later
    /// statements without changing meaning: it names no mutable storage
    /// and holds no runtime reference.
    pub fn is_stable(&self) -> bool {
        match self {
            Self::Binding(b) => !b.is_mutable(),
            Self::Ref(_) => false,
            Self::Tuple(t) => t.elems.iter().all(Value::is_stable),
            _ => true,
        }
    }

    /// Reports whether any part of the value has reference type.
    pub fn carries_reference(&self) -> bool {
        match self {
            Self::Tuple(t) => t.elems.iter().any(Value::carries_reference),
            other => type_carries_reference(&other.ty()),
        }
    }

    pub fn as_binding(&self) -> Option<&Binding> {
        match self {
            Self::Binding(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&FuncRef> {
        match self {
            Self::Func(f) => Some(f),
            _ => None,
        }
    }

    /// Expands the value into its components: nothing for unit, the
    /// elements of a tuple, or the value itself.
    pub fn splat(self) -> Vec<Value> {
        match self {
            Self::Unit => Vec::new(),
            Self::Tuple(t) => t.elems,
            other => vec![other],
        }
    }

    /// Visits every binding the value reads.
    pub fn for_each_binding(&self, f: &mut impl FnMut(&Binding)) {
        match self {
            Self::Binding(b) => f(b),
            Self::Tuple(t) => t.elems.iter().for_each(|v| v.for_each_binding(f)),
            _ => {}
        }
    }

    /// Reports whether the value reads `binding`.
    pub fn mentions(&self, binding: &Binding) -> bool {
        let mut found = false;
        self.for_each_binding(&mut |b| found |= b == binding);
        found
    }

    /// Rewrites every binding for which `f` returns a replacement.
    ///
    /// Returns `None` when nothing was replaced.
    pub fn rewrite(&self, f: &mut impl FnMut(&Binding) -> Option<Value>) -> Option<Value> {
        match self {
            Self::Binding(b) => f(b),
            Self::Tuple(t) => {
                let mut changed = false;
                let elems = t
                    .elems
                    .iter()
                    .map(|v| match v.rewrite(f) {
                        Some(new) => {
                            changed = true;
                            new
                        }
                        None => v.clone(),
                    })
                    .collect();
                changed.then(|| {
                    Self::Tuple(Tuple {
                        elems,
                        ty: t.ty.clone(),
                    })
                })
            }
            _ => None,
        }
    }
}

fn type_carries_reference(ty: &Type) -> bool {
    match ty {
        Type::Reference(..) => true,
        Type::Tuple(elems) => elems.iter().any(type_carries_reference),
        _ => false,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "()"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}b"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Char(v) => match char::from_u32(u32::from(*v)) {
                Some(c) if !c.is_control() => write!(f, "{c:?}"),
                _ => write!(f, "'\\u{{{v:04x}}}'"),
            },
            Self::Str(s) => write!(f, "{s}"),
            Self::Double(v) => write!(f, "{v:?}"),
            Self::Binding(b) => write!(f, "{b}"),
            Self::Temporary(t) => write!(f, "{}", t.name),
            Self::Func(func) => write!(f, "{func}"),
            Self::Tuple(t) => {
                write!(f, "(")?;
                for (i, v) in t.elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
            Self::Ref(r) => write!(f, "<ref {}#{}>", r.slot, r.frame.0),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Self::Byte(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<Binding> for Value {
    fn from(b: Binding) -> Self {
        Self::Binding(b)
    }
}

impl From<&Binding> for Value {
    fn from(b: &Binding) -> Self {
        Self::Binding(b.clone())
    }
}

impl From<FuncRef> for Value {
    fn from(f: FuncRef) -> Self {
        Self::Func(f)
    }
}

impl From<Tuple> for Value {
    fn from(t: Tuple) -> Self {
        Self::Tuple(t)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Unit
    }
}
