//! A C99 backend.
//!
//! | IR type | C type |
//! |---|---|
//! | `()` | elided |
//! | `bool` | `bool` |
//! | `i8`, `i16`, `i32`, `i64` | `int8_t` .. `int64_t` |
//! | `char` | `uint16_t` |
//! | `double` | `double` |
//! | `string` | `const tac_str *` |
//! | tuples | generated `tac_tupleN` structs |
//! | functions | generated `tac_fnN` pointer typedefs |
//! | `&T` / `&mut T` | `const T *` / `T *` |
//!
//! Integer arithmetic wraps and division by zero aborts, matching the
//! emulator. Native functions are declared `extern` under their own
//! names and must be linked in.

use std::fmt::{self, Write as _};

use buggy::BugExt as _;
use indexmap::{IndexMap, IndexSet};
use tac_ir::{
    BinaryOp, Binding, BindingKind, Block, BlockId, CondDomain, FuncRef, FunctionType, Mutability,
    Program, Relation, Statement, SubId, Subroutine, Type, UnaryOp, Value,
};
use tracing::debug;

use crate::{CodeGenerator, CodegenError, mangle::mangle};

const BACKEND: &str = "C";

const PRELUDE: &str = "\
#include <math.h>
#include <stdbool.h>
#include <stdint.h>
#include <stdlib.h>

#define TAC_CMP(a, b) (((a) > (b)) - ((a) < (b)))

typedef struct tac_str {
    int32_t len;
    const uint16_t *units;
} tac_str;

static inline int32_t tac_str_cmp(const tac_str *a, const tac_str *b) {
    int32_t n = a->len < b->len ? a->len : b->len;
    for (int32_t i = 0; i < n; i++) {
        if (a->units[i] != b->units[i]) return TAC_CMP(a->units[i], b->units[i]);
    }
    return TAC_CMP(a->len, b->len);
}

static inline int32_t tac_wrap(int64_t v) {
    return (int32_t)(uint32_t)(uint64_t)v;
}

static inline int32_t tac_div(int32_t a, int32_t b) {
    if (b == 0) abort();
    if (a == INT32_MIN && b == -1) return INT32_MIN;
    return a / b;
}

static inline int32_t tac_rem(int32_t a, int32_t b) {
    if (b == 0) abort();
    if (b == -1) return 0;
    return a % b;
}

static inline int32_t tac_d2i(double d) {
    if (isnan(d)) return 0;
    if (d >= 2147483647.0) return INT32_MAX;
    if (d <= -2147483648.0) return INT32_MIN;
    return (int32_t)d;
}

static inline int32_t tac_cmp_d(double a, double b) {
    if (isnan(a) || isnan(b)) return 0;
    return TAC_CMP(a, b);
}
";

/// Emits a single C translation unit.
///
/// Output is split into sections (type definitions, string literals,
/// prototypes, bodies, `main`) so that definitions discovered while
/// emitting a body still precede it.
#[derive(Clone, Debug)]
pub struct CGenerator {
    types: IndexMap<Type, String>,
    typedefs: String,
    literals: String,
    literal_count: usize,
    /// Symbols that already have a prototype.
    declared: IndexSet<String>,
    prototypes: String,
    bodies: String,
    entry: Option<String>,
    out: String,
}

impl Default for CGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CGenerator {
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
            typedefs: String::new(),
            literals: String::new(),
            literal_count: 0,
            declared: IndexSet::new(),
            prototypes: String::new(),
            bodies: String::new(),
            entry: None,
            out: String::from(PRELUDE),
        }
    }

    fn assemble(&mut self) {
        let mut out = String::from(PRELUDE);
        let sections = [
            Some(&self.typedefs),
            Some(&self.literals),
            Some(&self.prototypes),
            Some(&self.bodies),
            self.entry.as_ref(),
        ];
        for section in sections.into_iter().flatten() {
            if !section.is_empty() {
                out.push('\n');
                out.push_str(section);
            }
        }
        self.out = out;
    }

    /// The C type for `ty`, or `None` if values of it are elided.
    fn c_type(&mut self, ty: &Type) -> Result<Option<String>, CodegenError> {
        let name = match ty {
            Type::Unit => return Ok(None),
            Type::Integer(bits @ (8 | 16 | 32 | 64)) => format!("int{bits}_t"),
            Type::Integer(_) => return Err(unsupported_type(ty)),
            Type::Nomial(name) => match name.as_str() {
                Type::BOOL => "bool".to_owned(),
                Type::CHAR => "uint16_t".to_owned(),
                Type::DOUBLE => "double".to_owned(),
                Type::STRING => "const tac_str *".to_owned(),
                _ => return Err(unsupported_type(ty)),
            },
            Type::Reference(referent, mutability) => {
                let inner = self.c_type(referent)?.unwrap_or_else(|| "void".to_owned());
                match mutability {
                    Mutability::Immutable => format!("const {inner} *"),
                    Mutability::Mutable => format!("{inner} *"),
                }
            }
            Type::Tuple(_) | Type::Function(_) => self.generated_type(ty)?,
        };
        Ok(Some(name))
    }

    /// Names a tuple struct or function pointer typedef, defining it on
    /// first use.
    fn generated_type(&mut self, ty: &Type) -> Result<String, CodegenError> {
        if let Some(name) = self.types.get(ty) {
            return Ok(name.clone());
        }
        // Component types are defined first so they precede this one.
        let (name, def) = match ty {
            Type::Tuple(elems) => {
                let mut fields = String::new();
                for (i, elem) in elems.iter().enumerate() {
                    if let Some(c) = self.c_type(elem)? {
                        writeln!(fields, "    {};", decl(&c, &format!("_{i}")))?;
                    }
                }
                if fields.is_empty() {
                    fields.push_str("    char _unused;\n");
                }
                let name = format!("tac_tuple{}", self.types.len());
                let def = format!("typedef struct {{\n{fields}}} {name};\n");
                (name, def)
            }
            Type::Function(f) => {
                let ret = self.return_type(&f.output)?;
                let params = self.param_types(f)?;
                let name = format!("tac_fn{}", self.types.len());
                let def = format!("typedef {ret} (*{name})({params});\n");
                (name, def)
            }
            _ => {
                return Err(CodegenError::Unsupported {
                    what: format!("generated type for `{ty}`"),
                    backend: BACKEND,
                });
            }
        };
        self.typedefs.push_str(&def);
        self.types.insert(ty.clone(), name.clone());
        Ok(name)
    }

    fn return_type(&mut self, ty: &Type) -> Result<String, CodegenError> {
        Ok(self.c_type(ty)?.unwrap_or_else(|| "void".to_owned()))
    }

    /// The parameter list of a prototype for `f`.
    fn param_types(&mut self, f: &FunctionType) -> Result<String, CodegenError> {
        let mut params = Vec::new();
        for ty in f.params() {
            params.extend(self.c_type(ty)?);
        }
        Ok(param_list(params))
    }

    fn signature(&mut self, sub: &Subroutine) -> Result<String, CodegenError> {
        let ret = self.return_type(&sub.ty().output)?;
        let mut params = Vec::new();
        for param in sub.params() {
            if let Some(c) = self.c_type(param.ty())? {
                params.push(decl(&c, &local(param)));
            }
        }
        let storage = if sub.is_export() { "" } else { "static " };
        Ok(format!(
            "{storage}{} {}({})",
            ret,
            mangle(sub.name(), sub.is_export()),
            param_list(params)
        ))
    }

    /// Returns the C symbol for `func`, emitting its prototype once.
    fn declare(&mut self, program: &Program, func: &FuncRef) -> Result<String, CodegenError> {
        let (symbol, prototype) = match func {
            FuncRef::Native { name, ty } => {
                let symbol = name.as_str().to_owned();
                if self.declared.contains(&symbol) {
                    return Ok(symbol);
                }
                let ret = self.return_type(&ty.output)?;
                let params = self.param_types(ty)?;
                let prototype = format!("extern {ret} {symbol}({params});\n");
                (symbol, prototype)
            }
            FuncRef::Local { id, .. } => {
                let sub = program
                    .get(*id)
                    .ok_or(CodegenError::UnknownSubroutine(*id))?;
                let symbol = mangle(sub.name(), sub.is_export());
                if self.declared.contains(&symbol) {
                    return Ok(symbol);
                }
                let prototype = format!("{};\n", self.signature(sub)?);
                (symbol, prototype)
            }
        };
        self.prototypes.push_str(&prototype);
        self.declared.insert(symbol.clone());
        Ok(symbol)
    }

    fn string_literal(&mut self, units: &[u16]) -> Result<String, CodegenError> {
        let name = format!("tac_lit{}", self.literal_count);
        self.literal_count = self.literal_count.saturating_add(1);
        let data = if units.is_empty() {
            "0".to_owned()
        } else {
            units
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        writeln!(
            self.literals,
            "static const uint16_t {name}_units[] = {{{data}}};"
        )?;
        writeln!(
            self.literals,
            "static const tac_str {name} = {{{}, {name}_units}};",
            units.len()
        )?;
        Ok(format!("&{name}"))
    }

    /// Renders an operand. Unit-typed operands render as `None`.
    fn value(&mut self, program: &Program, v: &Value) -> Result<Option<String>, CodegenError> {
        let text = match v {
            Value::Unit => return Ok(None),
            Value::Bool(b) => b.to_string(),
            Value::Byte(b) => format!("(int8_t){b}"),
            Value::Int(i32::MIN) => "(-2147483647 - 1)".to_owned(),
            Value::Int(i) => i.to_string(),
            Value::Char(c) => format!("(uint16_t){c}"),
            Value::Str(s) => self.string_literal(s.units())?,
            Value::Double(d) if d.is_nan() => "NAN".to_owned(),
            Value::Double(d) if d.is_infinite() => {
                if d.is_sign_negative() {
                    "(-INFINITY)".to_owned()
                } else {
                    "INFINITY".to_owned()
                }
            }
            Value::Double(d) => format!("{d:?}"),
            Value::Binding(b) if b.ty().is_unit() => return Ok(None),
            Value::Binding(b) => local(b),
            Value::Func(f) => self.declare(program, f)?,
            Value::Tuple(t) => {
                let ty = self.generated_type(t.ty())?;
                let mut fields = Vec::new();
                for elem in t.elems() {
                    fields.extend(self.value(program, elem)?);
                }
                if fields.is_empty() {
                    fields.push("0".to_owned());
                }
                format!("(({ty}){{{}}})", fields.join(", "))
            }
            Value::Temporary(_) | Value::Ref(_) => {
                return Err(CodegenError::Unsupported {
                    what: v.to_string(),
                    backend: BACKEND,
                });
            }
        };
        Ok(Some(text))
    }

    /// Renders an operand that cannot be elided.
    fn operand(&mut self, program: &Program, v: &Value) -> Result<String, CodegenError> {
        self.value(program, v)?
            .ok_or_else(|| CodegenError::Unsupported {
                what: format!("unit operand `{v}`"),
                backend: BACKEND,
            })
    }

    /// Renders a call argument splatted into the callee's parameters.
    fn args(&mut self, program: &Program, arg: &Value) -> Result<String, CodegenError> {
        let mut out = Vec::new();
        match arg {
            Value::Tuple(t) => {
                for elem in t.elems() {
                    out.extend(self.value(program, elem)?);
                }
            }
            Value::Binding(b) if matches!(b.ty(), Type::Tuple(_)) => {
                for (i, elem) in b.ty().splat().iter().enumerate() {
                    if !elem.is_unit() {
                        out.push(format!("{}._{i}", local(b)));
                    }
                }
            }
            other => out.extend(self.value(program, other)?),
        }
        Ok(out.join(", "))
    }

    fn call(
        &mut self,
        program: &Program,
        func: &Value,
        arg: &Value,
    ) -> Result<String, CodegenError> {
        let callee = self.operand(program, func)?;
        let args = self.args(program, arg)?;
        Ok(format!("{callee}({args})"))
    }

    /// Renders one statement, or nothing if it only moves unit values.
    fn statement(
        &mut self,
        program: &Program,
        sub: &Subroutine,
        stmt: &Statement,
    ) -> Result<Option<String>, CodegenError> {
        let line = match stmt {
            Statement::Move(s) => match self.value(program, &s.src)? {
                Some(src) if !s.dst.ty().is_unit() => format!("{} = {src};", local(&s.dst)),
                _ => return Ok(None),
            },
            Statement::Unary(s) => {
                let src = self.operand(program, &s.src)?;
                format!("{} = {};", local(&s.dst), unary(s.op, &src))
            }
            Statement::Binary(s) => {
                let lhs = self.operand(program, &s.lhs)?;
                let rhs = self.operand(program, &s.rhs)?;
                format!("{} = {};", local(&s.dst), binary(s.op, &lhs, &rhs))
            }
            Statement::ConditionalJump(s) => {
                let rel = relation(s.op.relation());
                let cond = match s.op.domain() {
                    CondDomain::Unit => {
                        let holds = s.op.relation() == Relation::Eq;
                        let cond = if holds { "1" } else { "0" };
                        cond.to_owned()
                    }
                    CondDomain::Str => {
                        let lhs = self.operand(program, &s.lhs)?;
                        let rhs = self.operand(program, &s.rhs)?;
                        format!("tac_str_cmp({lhs}, {rhs}) {rel} 0")
                    }
                    CondDomain::Double => {
                        let lhs = self.operand(program, &s.lhs)?;
                        let rhs = self.operand(program, &s.rhs)?;
                        format!("tac_cmp_d({lhs}, {rhs}) {rel} 0")
                    }
                    CondDomain::Int | CondDomain::Char | CondDomain::Bool => {
                        let lhs = self.operand(program, &s.lhs)?;
                        let rhs = self.operand(program, &s.rhs)?;
                        format!("{lhs} {rel} {rhs}")
                    }
                };
                format!(
                    "if ({cond}) goto {}; else goto {};",
                    label(sub, s.if_true)?,
                    label(sub, s.if_false)?
                )
            }
            Statement::Goto(s) => format!("goto {};", label(sub, s.target)?),
            Statement::Return(s) => match self.value(program, &s.value)? {
                Some(v) => format!("return {v};"),
                None => "return;".to_owned(),
            },
            Statement::TailCall(s) => {
                let call = self.call(program, &s.func, &s.arg)?;
                if sub.ty().output.is_unit() {
                    format!("{call}; return;")
                } else {
                    format!("return {call};")
                }
            }
            Statement::Call(s) => {
                let call = self.call(program, &s.func, &s.arg)?;
                if s.dst.ty().is_unit() {
                    format!("{call};")
                } else {
                    format!("{} = {call};", local(&s.dst))
                }
            }
            Statement::MakeRef(s) => format!("{} = &{};", local(&s.dst), local(&s.src)),
            Statement::LoadRef(s) => {
                if s.dst.ty().is_unit() {
                    return Ok(None);
                }
                let reference = self.operand(program, &s.reference)?;
                format!("{} = *{reference};", local(&s.dst))
            }
            Statement::StoreRef(s) => match self.value(program, &s.src)? {
                Some(src) => {
                    let reference = self.operand(program, &s.reference)?;
                    format!("*{reference} = {src};")
                }
                None => return Ok(None),
            },
        };
        Ok(Some(line))
    }

    fn body(&mut self, program: &Program, sub: &Subroutine) -> Result<String, CodegenError> {
        let blocks = sub.reachable_blocks();

        let mut locals: IndexSet<&Binding> = IndexSet::new();
        for &id in &blocks {
            for stmt in block(sub, id)?.statements() {
                if let Some(dst) = stmt.result_register() {
                    if !dst.is_parameter() && !dst.ty().is_unit() {
                        locals.insert(dst);
                    }
                }
            }
        }

        let mut out = format!("{} {{\n", self.signature(sub)?);
        for binding in locals {
            let ty = self
                .c_type(binding.ty())?
                .assume("unit locals are skipped")?;
            writeln!(out, "    {};", decl(&ty, &local(binding)))?;
        }
        for id in blocks {
            writeln!(out, "{}:", label(sub, id)?)?;
            for stmt in block(sub, id)?.statements() {
                if let Some(line) = self.statement(program, sub, stmt)? {
                    writeln!(out, "    {line}")?;
                }
            }
        }
        out.push_str("}\n");
        Ok(out)
    }
}

impl CodeGenerator for CGenerator {
    fn reset(&mut self) {
        *self = Self::new();
    }

    fn visit_subroutine(&mut self, program: &Program, id: SubId) -> Result<(), CodegenError> {
        let sub = program.get(id).ok_or(CodegenError::UnknownSubroutine(id))?;
        let func = program
            .func_ref(id)
            .ok_or(CodegenError::UnknownSubroutine(id))?;
        self.declare(program, &func)?;
        let body = self.body(program, sub)?;
        if !self.bodies.is_empty() {
            self.bodies.push('\n');
        }
        self.bodies.push_str(&body);
        self.assemble();
        debug!(sub = %sub.name(), "emitted c");
        Ok(())
    }

    fn generated(&self) -> &str {
        &self.out
    }

    /// Adds a `main` that calls subroutine `id`. The subroutine must take
    /// no arguments and return unit or `i32`.
    fn add_entry_point(&mut self, program: &Program, id: SubId) -> Result<(), CodegenError> {
        let sub = program.get(id).ok_or(CodegenError::UnknownSubroutine(id))?;
        let output = &sub.ty().output;
        if !sub.ty().params().is_empty() || !(output.is_unit() || *output == Type::int()) {
            return Err(CodegenError::EntryPoint(sub.name().to_string()));
        }
        let func = program
            .func_ref(id)
            .ok_or(CodegenError::UnknownSubroutine(id))?;
        let symbol = self.declare(program, &func)?;
        self.entry = Some(if output.is_unit() {
            format!("int main(void) {{\n    {symbol}();\n    return 0;\n}}\n")
        } else {
            format!("int main(void) {{\n    return {symbol}();\n}}\n")
        });
        self.assemble();
        Ok(())
    }
}

impl fmt::Display for CGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.out)
    }
}

fn block(sub: &Subroutine, id: BlockId) -> Result<&Block, CodegenError> {
    sub.block(id).ok_or_else(|| CodegenError::UnknownBlock {
        sub: sub.name().to_string(),
        block: id,
    })
}

fn label(sub: &Subroutine, id: BlockId) -> Result<String, CodegenError> {
    Ok(format!("L{id}_{}", sanitize(block(sub, id)?.name().as_str())))
}

/// `ty name`, keeping a trailing `*` against the name.
fn decl(ty: &str, name: &str) -> String {
    if ty.ends_with('*') {
        format!("{ty}{name}")
    } else {
        format!("{ty} {name}")
    }
}

fn param_list(params: Vec<String>) -> String {
    if params.is_empty() {
        "void".to_owned()
    } else {
        params.join(", ")
    }
}

/// The C name of a binding. Kinds are separate namespaces, so each gets
/// its own prefix.
fn local(binding: &Binding) -> String {
    let prefix = match binding.kind() {
        BindingKind::Immutable => "v",
        BindingKind::Mutable => "m",
        BindingKind::Parameter => "p",
    };
    format!("{prefix}_{}", sanitize(binding.name().as_str()))
}

/// Maps a name onto C identifier characters. `_` doubles and anything
/// else non-alphanumeric becomes `_u<hex>_`, so distinct names stay
/// distinct.
fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => out.push(c),
            '_' => out.push_str("__"),
            other => {
                let _ = write!(out, "_u{:x}_", u32::from(other));
            }
        }
    }
    out
}

fn unary(op: UnaryOp, src: &str) -> String {
    match op {
        UnaryOp::NegI => format!("tac_wrap(-(int64_t){src})"),
        UnaryOp::NotI => format!("~{src}"),
        UnaryOp::NotB => format!("!{src}"),
        UnaryOp::NegD => format!("-{src}"),
        UnaryOp::IntToDouble => format!("(double){src}"),
        UnaryOp::DoubleToInt => format!("tac_d2i({src})"),
        UnaryOp::ByteToInt | UnaryOp::CharToInt => format!("(int32_t){src}"),
        UnaryOp::IntToByte => format!("(int8_t){src}"),
        UnaryOp::IntToChar => format!("(uint16_t){src}"),
    }
}

fn binary(op: BinaryOp, lhs: &str, rhs: &str) -> String {
    match op {
        BinaryOp::AddI => format!("tac_wrap((int64_t){lhs} + {rhs})"),
        BinaryOp::SubI => format!("tac_wrap((int64_t){lhs} - {rhs})"),
        BinaryOp::MulI => format!("tac_wrap((int64_t){lhs} * {rhs})"),
        BinaryOp::DivI => format!("tac_div({lhs}, {rhs})"),
        BinaryOp::RemI => format!("tac_rem({lhs}, {rhs})"),
        BinaryOp::AndI => format!("{lhs} & {rhs}"),
        BinaryOp::OrI => format!("{lhs} | {rhs}"),
        BinaryOp::XorI => format!("{lhs} ^ {rhs}"),
        BinaryOp::ShlI => format!("tac_wrap((uint32_t){lhs} << ({rhs} & 31))"),
        BinaryOp::ShrI => format!("{lhs} >> ({rhs} & 31)"),
        BinaryOp::CmpI | BinaryOp::CmpC => format!("TAC_CMP({lhs}, {rhs})"),
        BinaryOp::AddD => format!("{lhs} + {rhs}"),
        BinaryOp::SubD => format!("{lhs} - {rhs}"),
        BinaryOp::MulD => format!("{lhs} * {rhs}"),
        BinaryOp::DivD => format!("{lhs} / {rhs}"),
        BinaryOp::CmpD => format!("tac_cmp_d({lhs}, {rhs})"),
        BinaryOp::CmpS => format!("tac_str_cmp({lhs}, {rhs})"),
    }
}

fn relation(r: Relation) -> &'static str {
    match r {
        Relation::Eq => "==",
        Relation::Ne => "!=",
        Relation::Lt => "<",
        Relation::Le => "<=",
        Relation::Gt => ">",
        Relation::Ge => ">=",
    }
}

fn unsupported_type(ty: &Type) -> CodegenError {
    CodegenError::UnsupportedType {
        ty: ty.clone(),
        backend: BACKEND,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use tac_ir::{Call, QualifiedName};

    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("abc1"), "abc1");
        assert_eq!(sanitize("a_b"), "a__b");
        assert_eq!(sanitize("a.b"), "a_u2e_b");
        assert_ne!(sanitize("a_u2e_b"), sanitize("a.b"));
    }

    #[test]
    fn test_local_prefixes() {
        assert_eq!(local(&Binding::immutable("x", Type::int())), "v_x");
        assert_eq!(local(&Binding::mutable("x", Type::int())), "m_x");
        assert_eq!(local(&Binding::parameter("x", Type::int())), "p_x");
    }

    #[test]
    fn test_types() {
        let mut c = CGenerator::new();
        assert_eq!(c.c_type(&Type::Unit).unwrap(), None);
        assert_eq!(c.c_type(&Type::int()).unwrap().unwrap(), "int32_t");
        assert_eq!(c.c_type(&Type::char()).unwrap().unwrap(), "uint16_t");
        assert_eq!(
            c.c_type(&Type::reference(Type::char(), Mutability::Immutable))
                .unwrap()
                .unwrap(),
            "const uint16_t *"
        );

        let pair = Type::tuple(vec![Type::int(), Type::bool()]).unwrap();
        assert_eq!(c.c_type(&pair).unwrap().unwrap(), "tac_tuple0");
        // Repeated use reuses the definition.
        assert_eq!(c.c_type(&pair).unwrap().unwrap(), "tac_tuple0");
        assert_eq!(
            c.typedefs,
            "typedef struct {\n    int32_t _0;\n    bool _1;\n} tac_tuple0;\n"
        );

        let f = Type::function(pair, Type::Unit);
        assert_eq!(c.c_type(&f).unwrap().unwrap(), "tac_fn1");
        assert!(
            c.typedefs
                .ends_with("typedef void (*tac_fn1)(int32_t, bool);\n")
        );

        assert!(matches!(
            c.c_type(&Type::Integer(7)),
            Err(CodegenError::UnsupportedType { .. })
        ));
        assert!(matches!(
            c.c_type(&Type::Nomial("widget".into())),
            Err(CodegenError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_values() {
        let program = Program::new();
        let mut c = CGenerator::new();
        let mut render = |v: Value| c.value(&program, &v).unwrap();
        assert_eq!(render(Value::Unit), None);
        assert_eq!(render(Value::Int(i32::MIN)).unwrap(), "(-2147483647 - 1)");
        assert_eq!(render(Value::Double(f64::NAN)).unwrap(), "NAN");
        assert_eq!(
            render(Value::Double(f64::NEG_INFINITY)).unwrap(),
            "(-INFINITY)"
        );
        assert_eq!(render(Value::Double(1.0)).unwrap(), "1.0");
        assert_eq!(render(Value::str("hi")).unwrap(), "&tac_lit0");
        assert_eq!(
            c.literals,
            "static const uint16_t tac_lit0_units[] = {104, 105};\n\
             static const tac_str tac_lit0 = {2, tac_lit0_units};\n"
        );
    }

    #[test]
    fn test_natives_declared_once() {
        let mut program = Program::new();
        let print = FuncRef::native("print_int", FunctionType::new(Type::int(), Type::Unit));
        let id = program
            .declare(
                QualifiedName::simple("twice"),
                FunctionType::new(Type::Unit, Type::Unit),
            )
            .unwrap();
        let sub = program.get_mut(id).unwrap();
        let stmts = vec![
            Statement::Call(Call {
                dst: Binding::immutable("d1", Type::Unit),
                func: Value::Func(print.clone()),
                arg: Value::Int(1),
            }),
            Statement::Call(Call {
                dst: Binding::immutable("d2", Type::Unit),
                func: Value::Func(print),
                arg: Value::Int(2),
            }),
            Statement::ret(()),
        ];
        sub.set_statements(sub.entry(), stmts).unwrap();

        let mut c = CGenerator::new();
        c.visit_subroutine(&program, id).unwrap();
        assert_eq!(
            c.prototypes,
            "static void _I5twice(void);\nextern void print_int(int32_t);\n"
        );
        assert!(c.generated().ends_with(
            "static void _I5twice(void) {\n\
             L0_entry:\n    \
             print_int(1);\n    \
             print_int(2);\n    \
             return;\n\
             }\n"
        ));
    }

    #[test]
    fn test_entry_point_shape() {
        let mut program = Program::new();
        let id = program
            .declare(
                QualifiedName::simple("f"),
                FunctionType::new(Type::int(), Type::int()),
            )
            .unwrap();
        let mut c = CGenerator::new();
        assert!(matches!(
            c.add_entry_point(&program, id),
            Err(CodegenError::EntryPoint(name)) if name == "f"
        ));
    }
}
