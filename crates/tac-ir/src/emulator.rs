//! The reference interpreter.
//!
//! Every statement is executed by first substituting the current locals
//! into it and folding it, so interpretation and constant folding share
//! one code path. Calls push frames onto an explicit stack driven by one
//! loop, and tail calls replace the calling frame, which keeps
//! tail-recursive programs at constant depth.

mod externs;

use buggy::BugExt as _;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};

pub use self::externs::{ExternFn, Externs};
use crate::{
    block::{Block, BlockId},
    error::EmulatorError,
    program::{Program, SubId},
    statement::{self, Statement},
    subroutine::Subroutine,
    value::{Binding, FrameId, FuncRef, RefHandle, Value},
};

/// Limits for an emulator run.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// The deepest chain of nested, non-tail calls.
    pub max_depth: usize,
    /// How many statements one top-level call may execute, if bounded.
    pub fuel: Option<u64>,
}

impl EmulatorConfig {
    pub const DEFAULT_MAX_DEPTH: usize = 1024;
    pub const SPECULATIVE_FUEL: u64 = 1_000_000;

    /// The limits used when precomputing `expr` calls during
    /// optimization.
    pub const fn speculative() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            fuel: Some(Self::SPECULATIVE_FUEL),
        }
    }
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            fuel: None,
        }
    }
}

/// Counters accumulated across runs until [`Emulator::reset_metrics`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct EmulatorMetrics {
    pub statements: u64,
    /// Calls started with `call`, including the top-level one.
    pub calls: u64,
    pub tail_calls: u64,
    pub extern_calls: u64,
    /// The most frames that were live at once.
    pub max_depth: usize,
}

/// Why the top frame stopped running.
enum Exit {
    Return(Value),
    /// Continue with another call in place of the finished frame.
    TailCall(FuncRef, Value),
    /// Run a nested call, then store its result into `dst` in the
    /// suspended frame.
    Call {
        func: FuncRef,
        arg: Value,
        dst: Binding,
    },
}

/// What to do after a statement.
enum Step {
    Next,
    Jump(BlockId),
    Exit(Exit),
}

/// One activation of a subroutine.
struct Frame<'p> {
    id: FrameId,
    sub: &'p Subroutine,
    block: &'p Block,
    pc: usize,
    locals: IndexMap<Binding, Value>,
    /// Where the caller wants the result, or `None` for the frame that
    /// started the run.
    ret: Option<Binding>,
}

/// Executes subroutines of one [`Program`].
///
/// Nested calls live on an explicit frame stack, so the emulated call
/// depth is bounded by [`EmulatorConfig::max_depth`] and not by the host
/// stack.
///
/// An emulator is not reentrant and must not be shared across threads
/// without external synchronization.
pub struct Emulator<'p> {
    program: &'p Program,
    externs: Externs,
    config: EmulatorConfig,
    metrics: EmulatorMetrics,
    frames: Vec<Frame<'p>>,
    next_frame: u64,
    /// Statements left in the current top-level call.
    fuel: Option<u64>,
    /// Speculative calls known to fail.
    failed: Vec<(SubId, Value)>,
}

impl<'p> Emulator<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self::with_config(program, EmulatorConfig::default())
    }

    pub fn with_config(program: &'p Program, config: EmulatorConfig) -> Self {
        Self {
            program,
            externs: Externs::new(),
            config,
            metrics: EmulatorMetrics::default(),
            frames: Vec::new(),
            next_frame: 0,
            fuel: None,
            failed: Vec::new(),
        }
    }

    pub fn with_externs(mut self, externs: Externs) -> Self {
        self.externs = externs;
        self
    }

    pub fn externs(&self) -> &Externs {
        &self.externs
    }

    pub fn externs_mut(&mut self) -> &mut Externs {
        &mut self.externs
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &EmulatorMetrics {
        &self.metrics
    }

    pub fn reset_metrics(&mut self) {
        self.metrics = EmulatorMetrics::default();
    }

    /// Calls subroutine `id` with `arg`, which splats to its parameters.
    #[instrument(skip_all, fields(sub = %id))]
    pub fn call(&mut self, id: SubId, arg: Value) -> Result<Value, EmulatorError> {
        let func = self
            .program
            .func_ref(id)
            .ok_or(EmulatorError::UnknownSubroutine(id))?;
        self.call_func(func, arg)
    }

    /// Calls a local or native function.
    pub fn call_func(&mut self, func: FuncRef, arg: Value) -> Result<Value, EmulatorError> {
        let base = self.frames.len();
        if base == 0 {
            self.fuel = self.config.fuel;
        }
        self.metrics.calls = self.metrics.calls.saturating_add(1);
        let result = self.run(func, arg);
        // Frames of a failed run are abandoned.
        self.frames.truncate(base);
        result
    }

    /// Like [`call`](Self::call), but gives up at once on an argument
    /// that already failed and remembers new failures.
    pub(crate) fn speculate(
        &mut self,
        id: SubId,
        arg: &Value,
    ) -> Option<Result<Value, EmulatorError>> {
        if self.failed.iter().any(|(f, a)| *f == id && a == arg) {
            return None;
        }
        let result = self.call(id, arg.clone());
        if result.is_err() {
            self.failed.push((id, arg.clone()));
        }
        Some(result)
    }

    /// The trampoline: runs the top frame until it calls, tail calls or
    /// returns, then pushes, replaces or pops frames accordingly.
    fn run(&mut self, func: FuncRef, arg: Value) -> Result<Value, EmulatorError> {
        if let Some(value) = self.enter(func, arg, None)? {
            return Ok(value);
        }
        loop {
            match self.execute()? {
                Exit::Call { func, arg, dst } => {
                    self.metrics.calls = self.metrics.calls.saturating_add(1);
                    if let Some(value) = self.enter(func, arg, Some(dst.clone()))? {
                        self.store(dst, value)?;
                    }
                }
                Exit::Return(value) => {
                    let frame = self.frames.pop().assume("a frame is live while executing")?;
                    if let Some(value) = self.deliver(frame.ret, value)? {
                        return Ok(value);
                    }
                }
                Exit::TailCall(func, arg) => {
                    self.metrics.tail_calls = self.metrics.tail_calls.saturating_add(1);
                    let frame = self.frames.pop().assume("a frame is live while executing")?;
                    if let Some(value) = self.enter(func, arg, frame.ret.clone())? {
                        if let Some(value) = self.deliver(frame.ret, value)? {
                            return Ok(value);
                        }
                    }
                }
            }
        }
    }

    /// Starts a call. Native calls finish immediately and yield their
    /// result; local calls push a frame and yield `None`.
    fn enter(
        &mut self,
        func: FuncRef,
        arg: Value,
        ret: Option<Binding>,
    ) -> Result<Option<Value>, EmulatorError> {
        match func {
            FuncRef::Native { name, .. } => self.call_extern(name.as_str(), arg).map(Some),
            FuncRef::Local { id, .. } => {
                self.push_frame(id, arg, ret)?;
                Ok(None)
            }
        }
    }

    /// Hands a finished call's result to the frame waiting for it, or
    /// returns it if the run is over.
    fn deliver(
        &mut self,
        ret: Option<Binding>,
        value: Value,
    ) -> Result<Option<Value>, EmulatorError> {
        match ret {
            Some(dst) => {
                self.store(dst, value)?;
                Ok(None)
            }
            None => Ok(Some(value)),
        }
    }

    fn call_extern(&mut self, name: &str, arg: Value) -> Result<Value, EmulatorError> {
        let handler = self
            .externs
            .get(name)
            .cloned()
            .ok_or_else(|| EmulatorError::UnknownExtern(name.into()))?;
        let args = arg.splat();
        self.metrics.extern_calls = self.metrics.extern_calls.saturating_add(1);
        trace!(func = name, args = args.len(), "extern call");
        handler(&args)
    }

    /// Pushes a frame for `id` with its parameters bound.
    fn push_frame(
        &mut self,
        id: SubId,
        arg: Value,
        ret: Option<Binding>,
    ) -> Result<(), EmulatorError> {
        let program = self.program;
        let sub = program
            .get(id)
            .ok_or(EmulatorError::UnknownSubroutine(id))?;
        let args = arg.splat();
        if args.len() != sub.params().len() {
            return Err(EmulatorError::Arity {
                callee: sub.name().to_string(),
                expected: sub.params().len(),
                actual: args.len(),
            });
        }
        if self.frames.len() >= self.config.max_depth {
            return Err(EmulatorError::StackOverflow(self.config.max_depth));
        }

        let frame = FrameId(self.next_frame);
        self.next_frame = self.next_frame.wrapping_add(1);
        self.frames.push(Frame {
            id: frame,
            sub,
            block: sub.entry_block(),
            pc: 0,
            locals: sub.params().iter().cloned().zip(args).collect(),
            ret,
        });
        self.metrics.max_depth = self.metrics.max_depth.max(self.frames.len());
        Ok(())
    }

    /// Runs the top frame until it leaves its own block graph.
    fn execute(&mut self) -> Result<Exit, EmulatorError> {
        loop {
            let frame = self.frame()?;
            let (sub, block, pc) = (frame.sub, frame.block, frame.pc);
            let stmt = block
                .statements()
                .get(pc)
                .assume("blocks end in a control transfer")?;
            self.burn_fuel()?;
            match self.step(stmt)? {
                Step::Next => {
                    let frame = self.frame_mut()?;
                    frame.pc = frame.pc.saturating_add(1);
                }
                Step::Jump(target) => {
                    let next = sub
                        .block(target)
                        .ok_or(EmulatorError::UnknownBlock(target))?;
                    let frame = self.frame_mut()?;
                    frame.block = next;
                    frame.pc = 0;
                }
                Step::Exit(exit) => {
                    if matches!(exit, Exit::Call { .. }) {
                        // Resume after the call once it returns.
                        let frame = self.frame_mut()?;
                        frame.pc = frame.pc.saturating_add(1);
                    }
                    return Ok(exit);
                }
            }
        }
    }

    fn burn_fuel(&mut self) -> Result<(), EmulatorError> {
        self.metrics.statements = self.metrics.statements.saturating_add(1);
        if let Some(fuel) = &mut self.fuel {
            if *fuel == 0 {
                return Err(EmulatorError::OutOfFuel(self.config.fuel.unwrap_or(0)));
            }
            *fuel = fuel.saturating_sub(1);
        }
        Ok(())
    }

    fn frame(&self) -> Result<&Frame<'p>, EmulatorError> {
        Ok(self.frames.last().assume("a frame is live while executing")?)
    }

    fn frame_mut(&mut self) -> Result<&mut Frame<'p>, EmulatorError> {
        Ok(self
            .frames
            .last_mut()
            .assume("a frame is live while executing")?)
    }

    /// Substitutes the current locals into `stmt` and folds it.
    fn resolve(&self, stmt: &Statement) -> Result<Statement, EmulatorError> {
        let locals = &self.frame()?.locals;
        let resolved = stmt
            .rewrite_reads(&mut |b| locals.get(b).cloned())
            .into_owned();
        let folded = statement::owned(resolved.unfold_constants(self.program, None));
        Ok(folded.unwrap_or(resolved))
    }

    fn step(&mut self, stmt: &Statement) -> Result<Step, EmulatorError> {
        let step = match self.resolve(stmt)? {
            Statement::Move(s) => {
                let value = concrete(s.src)?;
                self.store(s.dst, value)?;
                Step::Next
            }
            // Operators that survive folding have failed to evaluate;
            // evaluating again reports why.
            Statement::Unary(s) => {
                let value = s.op.eval(&concrete(s.src)?)?;
                self.store(s.dst, value)?;
                Step::Next
            }
            Statement::Binary(s) => {
                let value = s.op.eval(&concrete(s.lhs)?, &concrete(s.rhs)?)?;
                self.store(s.dst, value)?;
                Step::Next
            }
            Statement::ConditionalJump(s) => {
                if s.op.eval(&concrete(s.lhs)?, &concrete(s.rhs)?)? {
                    Step::Jump(s.if_true)
                } else {
                    Step::Jump(s.if_false)
                }
            }
            Statement::Goto(s) => Step::Jump(s.target),
            Statement::Return(s) => Step::Exit(Exit::Return(concrete(s.value)?)),
            Statement::TailCall(s) => {
                let func = callee(s.func)?;
                Step::Exit(Exit::TailCall(func, concrete(s.arg)?))
            }
            Statement::Call(s) => Step::Exit(Exit::Call {
                func: callee(s.func)?,
                arg: concrete(s.arg)?,
                dst: s.dst,
            }),
            Statement::MakeRef(s) => {
                let handle = RefHandle {
                    frame: self.frame()?.id,
                    slot: s.src,
                    mutability: s.mutability,
                };
                self.store(s.dst, Value::Ref(handle))?;
                Step::Next
            }
            Statement::LoadRef(s) => {
                let handle = self.handle(&s.reference)?;
                let value = self.load(&handle)?;
                self.store(s.dst, value)?;
                Step::Next
            }
            Statement::StoreRef(s) => {
                let handle = self.handle(&s.reference)?;
                let value = concrete(s.src)?;
                self.store_through(&handle, value)?;
                Step::Next
            }
        };
        Ok(step)
    }

    fn store(&mut self, dst: Binding, value: Value) -> Result<(), EmulatorError> {
        self.frame_mut()?.locals.insert(dst, value);
        Ok(())
    }

    /// Finds the handle a `ldref`/`stref` operand holds.
    fn handle(&self, operand: &Value) -> Result<RefHandle, EmulatorError> {
        let value = match operand {
            Value::Binding(b) => self
                .frame()?
                .locals
                .get(b)
                .ok_or_else(|| EmulatorError::Unbound(b.name().clone()))?,
            other => other,
        };
        match value {
            Value::Ref(handle) => Ok(handle.clone()),
            other => Err(EmulatorError::Unexecutable(format!(
                "dereference of `{other}`"
            ))),
        }
    }

    fn live_frame(&self, handle: &RefHandle) -> Option<usize> {
        self.frames.iter().rposition(|f| f.id == handle.frame)
    }

    fn load(&self, handle: &RefHandle) -> Result<Value, EmulatorError> {
        let idx = self
            .live_frame(handle)
            .ok_or_else(|| EmulatorError::DanglingReference(handle.slot.name().clone()))?;
        self.frames[idx]
            .locals
            .get(&handle.slot)
            .cloned()
            .ok_or_else(|| EmulatorError::Unbound(handle.slot.name().clone()))
    }

    fn store_through(&mut self, handle: &RefHandle, value: Value) -> Result<(), EmulatorError> {
        if !handle.mutability.is_mutable() {
            return Err(EmulatorError::ImmutableStore(handle.slot.name().clone()));
        }
        let idx = self
            .live_frame(handle)
            .ok_or_else(|| EmulatorError::DanglingReference(handle.slot.name().clone()))?;
        self.frames[idx].locals.insert(handle.slot.clone(), value);
        Ok(())
    }
}

/// Requires `value` to be fully evaluated.
fn concrete(value: Value) -> Result<Value, EmulatorError> {
    if value.is_concrete() {
        return Ok(value);
    }
    let mut unbound = None;
    value.for_each_binding(&mut |b| {
        unbound.get_or_insert_with(|| b.name().clone());
    });
    match (unbound, &value) {
        (Some(name), _) => Err(EmulatorError::Unbound(name)),
        (None, Value::Temporary(t)) => Err(EmulatorError::Unbound(t.name.clone())),
        (None, _) => Err(EmulatorError::Unexecutable(value.to_string())),
    }
}

fn callee(func: Value) -> Result<FuncRef, EmulatorError> {
    match concrete(func)? {
        Value::Func(f) => Ok(f),
        other => Err(EmulatorError::NotCallable(other.to_string())),
    }
}
