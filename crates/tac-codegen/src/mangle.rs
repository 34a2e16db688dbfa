//! Length-prefixed symbol mangling.
//!
//! A symbol is `_X` (exported) or `_I` (internal), followed by every
//! namespace segment and then the simple name, each written as its
//! length in bytes followed by its text. Generic instances append `G`,
//! the mangled type arguments and `E`. Because every segment carries its
//! length, `a.bc` and `ab.c` never collide.
//!
//! Types mangle as:
//!
//! | Type | Mangling |
//! |---|---|
//! | `()` | `v` |
//! | `iN` | `iN_` |
//! | named | `N` + length-prefixed name |
//! | `fn(A) -> B` | `F` A B |
//! | `(A, B, ..)` | `T` A B .. `E` |
//! | `&T` / `&mut T` | `R` T / `M` T |

use std::fmt::Write as _;

use tac_ir::{Mutability, QualifiedName, Type};

/// Mangles a subroutine name.
pub fn mangle(name: &QualifiedName, export: bool) -> String {
    let mut out = String::from(if export { "_X" } else { "_I" });
    for segment in &name.namespace {
        push_segment(&mut out, segment.as_str());
    }
    push_segment(&mut out, name.name.as_str());
    if name.is_generic() {
        out.push('G');
        for ty in &name.type_args {
            push_type(&mut out, ty);
        }
        out.push('E');
    }
    out
}

/// Mangles a type on its own.
pub fn mangle_type(ty: &Type) -> String {
    let mut out = String::new();
    push_type(&mut out, ty);
    out
}

fn push_segment(out: &mut String, segment: &str) {
    // Writing to a `String` cannot fail.
    let _ = write!(out, "{}{segment}", segment.len());
}

fn push_type(out: &mut String, ty: &Type) {
    match ty {
        Type::Unit => out.push('v'),
        Type::Integer(bits) => {
            let _ = write!(out, "i{bits}_");
        }
        Type::Nomial(name) => {
            out.push('N');
            push_segment(out, name.as_str());
        }
        Type::Function(f) => {
            out.push('F');
            push_type(out, &f.input);
            push_type(out, &f.output);
        }
        Type::Tuple(elems) => {
            out.push('T');
            for elem in elems {
                push_type(out, elem);
            }
            out.push('E');
        }
        Type::Reference(referent, mutability) => {
            out.push(match mutability {
                Mutability::Immutable => 'R',
                Mutability::Mutable => 'M',
            });
            push_type(out, referent);
        }
    }
}
