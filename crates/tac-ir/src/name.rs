use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

use crate::types::Type;

/// An identifier: a binding, block, extern or namespace segment name.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The full identity of a subroutine.
///
/// Generic type arguments only affect how the name is displayed and
/// mangled; two instantiations of one generic are distinct subroutines.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub namespace: Vec<Name>,
    pub name: Name,
    pub type_args: Vec<Type>,
}

impl QualifiedName {
    /// A name in the root namespace.
    pub fn simple(name: impl Into<Name>) -> Self {
        Self {
            namespace: Vec::new(),
            name: name.into(),
            type_args: Vec::new(),
        }
    }

    /// Parses `a.b.c` into namespace `[a, b]` and name `c`.
    pub fn dotted(path: &str) -> Self {
        let mut segments: Vec<Name> = path.split('.').map(Name::from).collect();
        let name = segments.pop().unwrap_or_else(|| Name::from(path));
        Self {
            namespace: segments,
            name,
            type_args: Vec::new(),
        }
    }

    pub fn with_type_args(mut self, type_args: Vec<Type>) -> Self {
        self.type_args = type_args;
        self
    }

    pub fn is_generic(&self) -> bool {
        !self.type_args.is_empty()
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.namespace {
            write!(f, "{segment}.")?;
        }
        write!(f, "{}", self.name)?;
        if let Some((first, rest)) = self.type_args.split_first() {
            write!(f, "<{first}")?;
            for ty in rest {
                write!(f, ", {ty}")?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

impl From<&str> for QualifiedName {
    fn from(path: &str) -> Self {
        Self::dotted(path)
    }
}
