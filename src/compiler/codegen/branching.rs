use super::CodeGenerator;
use crate::compiler::error::{CompileResult, InternalFault};
use crate::compiler::opcode::{Label, OpCode};
use crate::compiler::runtime::RuntimeOp;
use crate::compiler::type_code::PhpTypeCode;
use crate::parser::ast::Expr;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Break,
    Continue,
}

/// Targets of one enclosing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchItem {
    pub break_label: Label,
    pub continue_label: Label,
    /// Exception nesting at the loop statement.
    pub exception_level: usize,
}

impl BranchItem {
    pub fn target(&self, kind: BranchKind) -> Label {
        match kind {
            BranchKind::Break => self.break_label,
            BranchKind::Continue => self.continue_label,
        }
    }
}

/// Enclosing loops of the routine being emitted, innermost last.
#[derive(Debug, Clone, Default)]
pub struct BranchingStack {
    items: SmallVec<[BranchItem; 4]>,
}

impl BranchingStack {
    pub fn push(&mut self, item: BranchItem) {
        self.items.push(item);
    }

    pub fn pop(&mut self) -> Option<BranchItem> {
        self.items.pop()
    }

    pub fn depth(&self) -> usize {
        self.items.len()
    }

    /// Loop `level` counted outwards from the innermost (1).
    pub fn item(&self, level: usize) -> Option<BranchItem> {
        if level == 0 || level > self.items.len() {
            return None;
        }
        self.items.get(self.items.len() - level).copied()
    }
}

impl CodeGenerator<'_, '_> {
    pub fn enter_loop(&mut self, break_label: Label, continue_label: Label) {
        let item = BranchItem {
            break_label,
            continue_label,
            exception_level: self.routine.exception_nesting,
        };
        self.routine.branching.push(item);
    }

    pub fn leave_loop(&mut self) {
        let popped = self.routine.branching.pop();
        debug_assert!(popped.is_some(), "unbalanced loop");
    }

    pub fn loop_depth(&self) -> usize {
        self.routine.branching.depth()
    }

    /// `break n;` / `continue n;` with a level known at compile time. Level 0 means 1.
    pub fn emit_branch(&mut self, kind: BranchKind, level: usize) -> CompileResult<()> {
        let level = level.max(1);
        let item = self
            .routine
            .branching
            .item(level)
            .ok_or(InternalFault::BranchOutsideLoop {
                level,
                depth: self.routine.branching.depth(),
            })?;
        self.emit_jump(item.target(kind), item.exception_level)
    }

    /// `break $n;`: dispatch on the level at runtime. Levels outside the enclosing
    /// loops raise a runtime error.
    pub fn emit_runtime_branch(&mut self, kind: BranchKind, level: &Expr) -> CompileResult<()> {
        let depth = self.routine.branching.depth();
        let innermost = self.routine.branching.item(1).ok_or(InternalFault::BranchOutsideLoop {
            level: 1,
            depth,
        })?;

        self.emit_conversion(level, PhpTypeCode::LongInteger)?;
        let temp = self.declare_temp()?;
        self.emit_op(OpCode::Dup)?;
        self.emit_op(OpCode::StoreTemp(temp))?;

        // entry 0 behaves as level 1
        let table: Vec<Label> = (0..=depth).map(|_| self.define_label()).collect();
        self.emit_op(OpCode::Switch(table.clone()))?;

        self.emit_op(OpCode::LoadTemp(temp))?;
        self.emit_call(RuntimeOp::ThrowInvalidBreakLevel)?;
        self.emit_jump(innermost.target(BranchKind::Break), innermost.exception_level)?;

        for (index, label) in table.into_iter().enumerate() {
            self.mark_label(label)?;
            let item = self
                .routine
                .branching
                .item(index.max(1))
                .ok_or(InternalFault::BranchOutsideLoop { level: index, depth })?;
            self.emit_jump(item.target(kind), item.exception_level)?;
        }

        self.return_temp(temp);
        Ok(())
    }
}
