//! The Emit pass.
//!
//! Lowers the analyzed tree into an [`InstructionSink`]. Every expression compiler
//! returns the [`PhpTypeCode`] of what it left on the operand stack; the generator
//! inserts boxing and conversions where a consumer needs a different representation.

mod branching;
mod chain;

pub use branching::{BranchKind, BranchingStack};
pub use chain::ChainBuilder;

use crate::compiler::diagnostics::{DiagnosticKind, ErrorSink};
use crate::compiler::error::{CompileError, CompileResult, InternalFault};
use crate::compiler::opcode::{Label, OpCode, Temp};
use crate::compiler::options::CompileOptions;
use crate::compiler::registry::{CompilerTable, ExprHandle};
use crate::compiler::runtime::RuntimeOp;
use crate::compiler::sink::InstructionSink;
use crate::compiler::type_code::PhpTypeCode;
use crate::core::value::Val;
use crate::parser::ast::{Expr, Stmt};
use std::collections::HashMap;
use tracing::{error, trace};

/// Which half of an l-value the next `emit_prepare` addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSelector {
    Read,
    Write,
}

#[derive(Debug)]
struct RoutineContext {
    returns_ref: bool,
    epilogue: Option<Label>,
    return_temp: Option<Temp>,
    labels: HashMap<String, Label>,
    branching: BranchingStack,
    exception_nesting: usize,
}

impl RoutineContext {
    fn new(returns_ref: bool) -> Self {
        Self {
            returns_ref,
            epilogue: None,
            return_temp: None,
            labels: HashMap::new(),
            branching: BranchingStack::default(),
            exception_nesting: 0,
        }
    }
}

pub struct CodeGenerator<'r, 'e> {
    sink: &'e mut dyn InstructionSink,
    compilers: CompilerTable<'r>,
    errors: &'e mut dyn ErrorSink,
    options: &'r CompileOptions,
    access_selector: AccessSelector,
    chains: Vec<ChainBuilder>,
    routine: RoutineContext,
    saved_routines: Vec<RoutineContext>,
}

impl<'r, 'e> CodeGenerator<'r, 'e> {
    pub fn new(
        sink: &'e mut dyn InstructionSink,
        compilers: CompilerTable<'r>,
        errors: &'e mut dyn ErrorSink,
        options: &'r CompileOptions,
    ) -> Self {
        Self {
            sink,
            compilers,
            errors,
            options,
            access_selector: AccessSelector::Read,
            chains: Vec::new(),
            routine: RoutineContext::new(false),
            saved_routines: Vec::new(),
        }
    }

    pub fn into_compilers(self) -> CompilerTable<'r> {
        self.compilers
    }

    pub fn options(&self) -> &'r CompileOptions {
        self.options
    }

    // Dispatch

    pub fn emit(&mut self, expr: &Expr) -> CompileResult<PhpTypeCode> {
        let compiler = self.compilers.expr_compiler(expr)?;
        compiler.emit(expr, self)
    }

    /// Emit a statement. A failure is reported once at the statement's span and then
    /// propagated as [`CompileError::Reported`], aborting the unit.
    pub fn emit_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        if self.options.sequence_points && !stmt.is_empty() {
            self.sink.mark_sequence_point(stmt.span);
        }
        trace!(kind = ?stmt.node_kind(), start = stmt.span.start, "emit statement");

        let result = self
            .compilers
            .stmt_compiler(stmt)
            .and_then(|compiler| compiler.emit(stmt, self));
        match result {
            Err(err) if !err.is_reported() => {
                error!(%err, start = stmt.span.start, "statement emission failed");
                self.errors.report(
                    DiagnosticKind::EmissionFailed {
                        message: err.to_string(),
                    },
                    stmt.span,
                );
                Err(CompileError::Reported {
                    span: stmt.span,
                    source: Box::new(err),
                })
            }
            other => other,
        }
    }

    pub fn emit_statements(&mut self, statements: &[Stmt]) -> CompileResult<()> {
        statements.iter().try_for_each(|stmt| self.emit_stmt(stmt))
    }

    /// Emit a whole routine body followed by its epilogue. `return` statements store
    /// into the routine's return slot and branch to the epilogue.
    pub fn emit_routine(&mut self, body: &[Stmt], returns_ref: bool) -> CompileResult<()> {
        let outer = std::mem::replace(&mut self.routine, RoutineContext::new(returns_ref));
        self.saved_routines.push(outer);

        let result = self.emit_routine_body(body, returns_ref);

        if let Some(outer) = self.saved_routines.pop() {
            self.routine = outer;
        }
        result
    }

    fn emit_routine_body(&mut self, body: &[Stmt], returns_ref: bool) -> CompileResult<()> {
        self.emit_statements(body)?;

        // implicit `return null;`
        if returns_ref {
            self.emit_call(RuntimeOp::NewReferenceEmpty)?;
        } else {
            self.emit_literal(&Val::Null)?;
        }
        if let (Some(epilogue), Some(temp)) = (self.routine.epilogue, self.routine.return_temp) {
            self.emit_op(OpCode::StoreTemp(temp))?;
            self.mark_label(epilogue)?;
            self.emit_op(OpCode::LoadTemp(temp))?;
            self.return_temp(temp);
        }
        self.emit_op(OpCode::Return)
    }

    pub fn routine_returns_ref(&self) -> bool {
        self.routine.returns_ref
    }

    /// Store the value on the stack as the routine's result and jump to the epilogue.
    pub fn emit_return_jump(&mut self) -> CompileResult<()> {
        let temp = match self.routine.return_temp {
            Some(temp) => temp,
            None => {
                let temp = self.declare_temp()?;
                self.routine.return_temp = Some(temp);
                temp
            }
        };
        let epilogue = match self.routine.epilogue {
            Some(label) => label,
            None => {
                let label = self.define_label();
                self.routine.epilogue = Some(label);
                label
            }
        };
        self.emit_op(OpCode::StoreTemp(temp))?;
        self.emit_jump(epilogue, 0)
    }

    /// Backend label for a `goto` target in the current routine.
    pub fn routine_label(&mut self, name: &str) -> Label {
        if let Some(label) = self.routine.labels.get(name) {
            return *label;
        }
        let label = self.sink.define_label();
        self.routine.labels.insert(name.to_string(), label);
        label
    }

    // Primitives

    pub fn sink(&mut self) -> &mut dyn InstructionSink {
        &mut *self.sink
    }

    pub fn emit_op(&mut self, op: OpCode) -> CompileResult<()> {
        self.sink.emit(op)?;
        Ok(())
    }

    pub fn emit_call(&mut self, op: RuntimeOp) -> CompileResult<PhpTypeCode> {
        self.sink.emit(OpCode::Call(op))?;
        Ok(op.result())
    }

    pub fn emit_literal(&mut self, value: &Val) -> CompileResult<PhpTypeCode> {
        let idx = self.sink.add_constant(value.clone())?;
        self.sink.emit(OpCode::Const(idx))?;
        Ok(PhpTypeCode::of_literal(value))
    }

    pub fn define_label(&mut self) -> Label {
        self.sink.define_label()
    }

    pub fn mark_label(&mut self, label: Label) -> CompileResult<()> {
        self.sink.mark_label(label)?;
        Ok(())
    }

    pub fn declare_temp(&mut self) -> CompileResult<Temp> {
        Ok(self.sink.declare_temp()?)
    }

    pub fn return_temp(&mut self, temp: Temp) {
        self.sink.return_temp(temp);
    }

    /// Branch to `target`, leaving exception regions when the target lies outside the
    /// current one.
    pub fn emit_jump(&mut self, target: Label, target_exception_level: usize) -> CompileResult<()> {
        if self.routine.exception_nesting != target_exception_level {
            self.emit_op(OpCode::Leave(target))
        } else {
            self.emit_op(OpCode::Branch(target))
        }
    }

    // Type codes

    /// Convert a primitive on the stack to the generic representation.
    pub fn emit_boxing(&mut self, code: PhpTypeCode) -> CompileResult<PhpTypeCode> {
        match code {
            c if c.is_primitive() => {
                self.emit_op(OpCode::Box(c))?;
                Ok(PhpTypeCode::Object)
            }
            PhpTypeCode::Void | PhpTypeCode::Unknown => Err(InternalFault::UnexpectedTypeCode {
                expected: "a value".to_string(),
                found: code.to_string(),
            }
            .into()),
            other => Ok(other),
        }
    }

    /// Emit `expr` and coerce its value to `target`.
    pub fn emit_conversion(&mut self, expr: &Expr, target: PhpTypeCode) -> CompileResult<PhpTypeCode> {
        let code = self.emit(expr)?;
        self.emit_convert_top(code, target)
    }

    /// Coerce the value on top of the stack from `code` to `target`.
    pub fn emit_convert_top(&mut self, code: PhpTypeCode, target: PhpTypeCode) -> CompileResult<PhpTypeCode> {
        if code == target {
            return Ok(code);
        }
        let op = match target {
            PhpTypeCode::Object => return self.emit_boxing(code),
            PhpTypeCode::String => RuntimeOp::ToString,
            PhpTypeCode::Bytes => RuntimeOp::ToBytes,
            PhpTypeCode::Boolean => RuntimeOp::ToBool,
            PhpTypeCode::LongInteger => RuntimeOp::ToLong,
            PhpTypeCode::Double => RuntimeOp::ToDouble,
            other => {
                return Err(InternalFault::UnexpectedTypeCode {
                    expected: "a conversion target".to_string(),
                    found: other.to_string(),
                }
                .into());
            }
        };
        self.emit_boxing(code)?;
        self.emit_call(op)
    }

    /// Emit a value the consumer needs in generic form.
    pub fn emit_boxed(&mut self, expr: &Expr) -> CompileResult<PhpTypeCode> {
        let code = self.emit(expr)?;
        self.emit_boxing(code)
    }

    /// Drop whatever the emitted sequence left behind.
    pub fn emit_discard(&mut self, code: PhpTypeCode) -> CompileResult<PhpTypeCode> {
        if code.is_value() {
            self.emit_op(OpCode::Pop)?;
        }
        Ok(PhpTypeCode::Void)
    }

    // L-values

    pub fn access_selector(&self) -> AccessSelector {
        self.access_selector
    }

    fn lvalue_handle(&mut self, expr: &Expr) -> CompileResult<ExprHandle> {
        let handle = self.compilers.expr_compiler(expr)?;
        if handle.lvalue().is_none() {
            return Err(InternalFault::NotAnLValue(expr.node_kind()).into());
        }
        Ok(handle)
    }

    pub fn is_lvalue(&mut self, expr: &Expr) -> CompileResult<bool> {
        Ok(self.compilers.expr_compiler(expr)?.lvalue().is_some())
    }

    /// Emit the addressing half of an l-value for `selector`.
    pub fn emit_prepare(&mut self, expr: &Expr, selector: AccessSelector) -> CompileResult<()> {
        let handle = self.lvalue_handle(expr)?;
        let previous = std::mem::replace(&mut self.access_selector, selector);
        let result = match handle.lvalue() {
            Some(lvalue) => lvalue.emit_prepare(expr, self),
            None => Err(InternalFault::NotAnLValue(expr.node_kind()).into()),
        };
        self.access_selector = previous;
        result
    }

    /// Fetch the value of a read-prepared l-value.
    pub fn emit_load(&mut self, expr: &Expr) -> CompileResult<PhpTypeCode> {
        let handle = self.lvalue_handle(expr)?;
        match handle.lvalue() {
            Some(lvalue) => lvalue.emit_load(expr, self),
            None => Err(InternalFault::NotAnLValue(expr.node_kind()).into()),
        }
    }

    /// Store the value on top of a write-prepared l-value.
    pub fn emit_store(&mut self, expr: &Expr) -> CompileResult<()> {
        let handle = self.lvalue_handle(expr)?;
        match handle.lvalue() {
            Some(lvalue) => lvalue.emit_store(expr, self),
            None => Err(InternalFault::NotAnLValue(expr.node_kind()).into()),
        }
    }

    pub fn emit_load_ref(&mut self, expr: &Expr) -> CompileResult<PhpTypeCode> {
        let handle = self.lvalue_handle(expr)?;
        match handle.lvalue() {
            Some(lvalue) => lvalue.emit_load_ref(expr, self),
            None => Err(InternalFault::NotAnLValue(expr.node_kind()).into()),
        }
    }

    /// Push the array held by an l-value, creating it if needed. Other expressions
    /// are read; writes then go to a temporary.
    pub fn emit_array_for_write(&mut self, expr: &Expr) -> CompileResult<PhpTypeCode> {
        let handle = self.compilers.expr_compiler(expr)?;
        match handle.lvalue() {
            Some(lvalue) => lvalue.emit_array_for_write(expr, self),
            None => self.emit_boxed(expr),
        }
    }

    /// Push the current value of a container: l-values are read through their
    /// prepare/load halves so cached chain operands are reused.
    pub fn emit_container_read(&mut self, expr: &Expr) -> CompileResult<PhpTypeCode> {
        let handle = self.compilers.expr_compiler(expr)?;
        match handle.lvalue() {
            Some(lvalue) => {
                let previous = std::mem::replace(&mut self.access_selector, AccessSelector::Read);
                let result = lvalue.emit_prepare(expr, self);
                self.access_selector = previous;
                result?;
                lvalue.emit_load(expr, self)
            }
            None => self.emit_boxed(expr),
        }
    }

    pub fn emit_unset(&mut self, expr: &Expr) -> CompileResult<()> {
        let handle = self.lvalue_handle(expr)?;
        match handle.lvalue() {
            Some(lvalue) => lvalue.emit_unset(expr, self),
            None => Err(InternalFault::NotAnLValue(expr.node_kind()).into()),
        }
    }

    // Exceptions

    pub fn exception_nesting(&self) -> usize {
        self.routine.exception_nesting
    }

    pub fn enter_exception_block(&mut self) {
        self.routine.exception_nesting += 1;
    }

    pub fn leave_exception_block(&mut self) {
        debug_assert!(self.routine.exception_nesting > 0, "unbalanced exception block");
        self.routine.exception_nesting = self.routine.exception_nesting.saturating_sub(1);
    }
}
