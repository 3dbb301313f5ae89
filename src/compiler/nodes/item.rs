use super::{ExprCompiler, LValueCompiler, emit_lvalue_read, wrong_kind};
use crate::compiler::access::{AccessType, ExpressionContext};
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::{AccessSelector, CodeGenerator};
use crate::compiler::error::{CompileError, CompileResult, InternalFault};
use crate::compiler::evaluation::Evaluation;
use crate::compiler::runtime::RuntimeOp;
use crate::compiler::type_code::PhpTypeCode;
use crate::parser::ast::{Expr, ExprKind, NodeKind};

/// `$array[index]` and the append form `$array[]`.
#[derive(Debug, Default)]
pub struct ItemCompiler;

fn parts(expr: &Expr) -> CompileResult<(&Expr, Option<&Expr>)> {
    Ok(expect_kind!(expr, NodeKind::Item, ExprKind::Item { array, index } => (array.as_ref(), index.as_deref())))
}

fn append_unsupported(access: &str) -> CompileError {
    InternalFault::UnsupportedAccess {
        kind: NodeKind::Item,
        access: format!("{} of an append item", access),
    }
    .into()
}

impl ExprCompiler for ItemCompiler {
    fn analyze(&self, expr: Expr, ctx: ExpressionContext, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Evaluation> {
        let found = expr.node_kind();
        let Expr { id, span, access, kind } = expr;
        let ExprKind::Item { array, index } = kind else {
            return Err(wrong_kind(NodeKind::Item, found));
        };

        // writes through the item modify the container in place
        let container_access = match ctx.access.container_access() {
            AccessType::ReadAndWrite if array.is_var_like() => AccessType::ReadAndWrite,
            _ => AccessType::Read,
        };
        let array = analyzer.analyze_literalized(*array, ExpressionContext::new(container_access).with_parent(id))?;
        let index = match index {
            Some(index) => Some(Box::new(analyzer.analyze_literalized(*index, ExpressionContext::READ)?)),
            None => None,
        };

        Ok(Evaluation::residual(Expr {
            id,
            span,
            access,
            kind: ExprKind::Item {
                array: Box::new(array),
                index,
            },
        }))
    }

    fn emit(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        emit_lvalue_read(self, expr, cg)
    }

    fn lvalue(&self) -> Option<&dyn LValueCompiler> {
        Some(self)
    }
}

impl LValueCompiler for ItemCompiler {
    /// Push `[array, key]` (`[array]` for the append form).
    fn emit_prepare(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let (array, index) = parts(expr)?;
        match cg.access_selector() {
            AccessSelector::Write => {
                cg.emit_array_for_write(array)?;
            }
            AccessSelector::Read => {
                if index.is_none() {
                    return Err(append_unsupported("read"));
                }
                cg.emit_container_read(array)?;
            }
        }
        if let Some(index) = index {
            cg.emit_chain_operand(index)?;
        }
        Ok(())
    }

    fn emit_load(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        if parts(expr)?.1.is_none() {
            return Err(append_unsupported("read"));
        }
        let op = if cg.chain_is_quiet() {
            RuntimeOp::GetItemQuiet
        } else {
            RuntimeOp::GetItem
        };
        cg.emit_call(op)
    }

    fn emit_store(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let op = match parts(expr)?.1 {
            Some(_) => RuntimeOp::SetItem,
            None => RuntimeOp::Append,
        };
        cg.emit_call(op).map(|_| ())
    }

    fn emit_load_ref(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        cg.emit_prepare(expr, AccessSelector::Write)?;
        match parts(expr)?.1 {
            Some(_) => cg.emit_call(RuntimeOp::GetItemRef),
            None => cg.emit_call(RuntimeOp::AppendReference),
        }
    }

    fn emit_array_for_write(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        cg.emit_prepare(expr, AccessSelector::Write)?;
        match parts(expr)?.1 {
            Some(_) => cg.emit_call(RuntimeOp::GetItemForWrite),
            None => cg.emit_call(RuntimeOp::AppendArray),
        }
    }

    fn emit_unset(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        if parts(expr)?.1.is_none() {
            return Err(append_unsupported("unset"));
        }
        cg.emit_prepare(expr, AccessSelector::Read)?;
        cg.emit_call(RuntimeOp::UnsetItem).map(|_| ())
    }
}
