//! `break`, `continue`, `return`, `goto` and labels.

use super::{StmtCompiler, wrong_kind};
use crate::compiler::access::{AccessType, ExpressionContext};
use crate::compiler::analyzer::{Analyzer, LabelState};
use crate::compiler::codegen::{BranchKind, CodeGenerator};
use crate::compiler::diagnostics::DiagnosticKind;
use crate::compiler::error::CompileResult;
use crate::compiler::opcode::OpCode;
use crate::compiler::runtime::RuntimeOp;
use crate::compiler::type_code::PhpTypeCode;
use crate::core::value::Val;
use crate::parser::ast::{Expr, JumpKind, NodeKind, Stmt, StmtKind};
use std::sync::{Arc, OnceLock};
use tracing::debug;

#[derive(Debug, Default)]
pub struct JumpCompiler;

impl JumpCompiler {
    fn check_level(&self, level: Option<&Expr>, stmt: &Stmt, analyzer: &mut Analyzer<'_, '_>) {
        let static_level = match level {
            None => Some(1),
            Some(expr) => expr.value().map(Val::to_long),
        };
        let depth = analyzer.loop_depth();
        let invalid = match static_level {
            Some(level) => level < 1 || usize::try_from(level).map_or(true, |l| l > depth),
            None => depth == 0,
        };
        if invalid {
            analyzer.report(
                DiagnosticKind::InvalidBreakLevel {
                    level: static_level.unwrap_or(1),
                },
                stmt.span,
            );
        }
    }

    fn emit_return(&self, expr: Option<&Expr>, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        if cg.routine_returns_ref() {
            match expr {
                None => {
                    cg.emit_call(RuntimeOp::NewReferenceEmpty)?;
                }
                Some(expr) => {
                    let code = cg.emit(expr)?;
                    if code != PhpTypeCode::ReferenceCell {
                        cg.emit_boxing(code)?;
                        cg.emit_call(RuntimeOp::NewReference)?;
                    }
                }
            }
        } else {
            match expr {
                None => {
                    cg.emit_literal(&Val::Null)?;
                }
                Some(expr) => match cg.emit(expr)? {
                    PhpTypeCode::ReferenceCell => {
                        cg.emit_call(RuntimeOp::Dereference)?;
                    }
                    PhpTypeCode::ArrayHandle => {
                        // the caller takes over the array instead of copying it
                        cg.emit_op(OpCode::Dup)?;
                        cg.emit_call(RuntimeOp::MarkInplaceCopyOnReturn)?;
                    }
                    code => {
                        cg.emit_boxing(code)?;
                    }
                },
            }
        }
        cg.emit_return_jump()
    }
}

impl StmtCompiler for JumpCompiler {
    fn analyze(&self, stmt: Stmt, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Stmt> {
        let found = stmt.node_kind();
        let Stmt { id, span, kind } = stmt;
        let StmtKind::Jump { kind: jump, expr } = kind else {
            return Err(wrong_kind(NodeKind::Jump, found));
        };

        let ctx = match (jump, &expr) {
            (JumpKind::Return, Some(e)) if analyzer.routine_returns_ref() && e.is_var_like() => {
                ExpressionContext::new(AccessType::ReadRef)
            }
            _ => ExpressionContext::READ,
        };
        let expr = match expr {
            Some(expr) => Some(analyzer.analyze_literalized(expr, ctx)?),
            None => None,
        };

        let stmt = Stmt {
            id,
            span,
            kind: StmtKind::Jump { kind: jump, expr },
        };
        if let StmtKind::Jump {
            kind: JumpKind::Break | JumpKind::Continue,
            expr,
        } = &stmt.kind
        {
            self.check_level(expr.as_ref(), &stmt, analyzer);
        }
        analyzer.enter_unreachable();
        Ok(stmt)
    }

    fn emit(&self, stmt: &Stmt, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let (jump, expr) = expect_kind!(stmt, NodeKind::Jump, StmtKind::Jump { kind, expr } => (*kind, expr.as_ref()));
        let branch = match jump {
            JumpKind::Return => return self.emit_return(expr, cg),
            JumpKind::Break => BranchKind::Break,
            JumpKind::Continue => BranchKind::Continue,
        };
        match expr {
            None => cg.emit_branch(branch, 1),
            Some(level) => match level.value() {
                Some(value) => cg.emit_branch(branch, usize::try_from(value.to_long()).unwrap_or(0)),
                None => {
                    debug!(depth = cg.loop_depth(), "runtime break dispatch");
                    cg.emit_runtime_branch(branch, level)
                }
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct GotoCompiler;

impl StmtCompiler for GotoCompiler {
    fn analyze(&self, stmt: Stmt, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Stmt> {
        let label = expect_kind!(stmt, NodeKind::Goto, StmtKind::Goto { label } => label);
        analyzer.goto_label(label, stmt.span);
        analyzer.enter_unreachable();
        Ok(stmt)
    }

    fn emit(&self, stmt: &Stmt, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let label = expect_kind!(stmt, NodeKind::Goto, StmtKind::Goto { label } => label);
        let target = cg.routine_label(label);
        cg.emit_jump(target, 0)
    }
}

/// Per-node: shares the label's state with the analyzer's label table.
#[derive(Debug, Default)]
pub struct LabelCompiler {
    state: OnceLock<Arc<LabelState>>,
}

impl StmtCompiler for LabelCompiler {
    fn analyze(&self, stmt: Stmt, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Stmt> {
        let name = expect_kind!(stmt, NodeKind::Label, StmtKind::Label { name } => name);
        if let Some(state) = analyzer.define_label(name, stmt.span) {
            let _ = self.state.set(state);
        }
        Ok(stmt)
    }

    fn emit(&self, stmt: &Stmt, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let name = expect_kind!(stmt, NodeKind::Label, StmtKind::Label { name } => name);
        // a label nobody jumps to needs no mark
        if self.state.get().is_some_and(|s| s.is_referenced()) {
            let label = cg.routine_label(name);
            cg.mark_label(label)?;
        }
        Ok(())
    }
}
