use super::{ExprCompiler, wrong_kind};
use crate::compiler::access::{AccessType, ExpressionContext};
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::CodeGenerator;
use crate::compiler::error::CompileResult;
use crate::compiler::evaluation::Evaluation;
use crate::compiler::opcode::OpCode;
use crate::compiler::runtime::RuntimeOp;
use crate::compiler::type_code::PhpTypeCode;
use crate::parser::ast::{Expr, ExprKind, NodeKind};

/// `cond ? a : b` and the shortcut form `cond ?: b`.
#[derive(Debug, Default)]
pub struct ConditionalCompiler;

impl ExprCompiler for ConditionalCompiler {
    fn analyze(&self, expr: Expr, ctx: ExpressionContext, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Evaluation> {
        let found = expr.node_kind();
        let Expr { id, span, access, kind } = expr;
        let ExprKind::Conditional {
            condition,
            if_true,
            if_false,
        } = kind
        else {
            return Err(wrong_kind(NodeKind::Conditional, found));
        };

        let branch_ctx = match ctx.access {
            AccessType::None => ExpressionContext::NONE,
            _ => ExpressionContext::READ,
        };
        let condition = analyzer.analyze_expr(*condition, ExpressionContext::READ)?;

        if analyzer.fold_constants()
            && let Some(truthy) = condition.value().map(|v| v.to_bool())
        {
            return match (truthy, if_true) {
                // the shortcut form yields the condition itself
                (true, None) => {
                    let mut node = analyzer.literalize(condition);
                    node.access = ctx.access;
                    let value = node.value().cloned();
                    Ok(Evaluation::from_parts(node, value))
                }
                (true, Some(if_true)) => analyzer.analyze_expr(*if_true, branch_ctx),
                (false, _) => analyzer.analyze_expr(*if_false, branch_ctx),
            };
        }

        let condition = analyzer.literalize(condition);
        analyzer.enter_conditional();
        let if_true = match if_true {
            Some(if_true) => Some(analyzer.analyze_literalized(*if_true, branch_ctx)),
            None => None,
        };
        analyzer.leave_conditional();
        analyzer.enter_conditional();
        let if_false = analyzer.analyze_literalized(*if_false, branch_ctx);
        analyzer.leave_conditional();

        let if_true = match if_true {
            Some(result) => Some(Box::new(result?)),
            None => None,
        };
        Ok(Evaluation::residual(Expr {
            id,
            span,
            access,
            kind: ExprKind::Conditional {
                condition: Box::new(condition),
                if_true,
                if_false: Box::new(if_false?),
            },
        }))
    }

    fn emit(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        let (condition, if_true, if_false) = expect_kind!(
            expr,
            NodeKind::Conditional,
            ExprKind::Conditional { condition, if_true, if_false } => (condition.as_ref(), if_true.as_deref(), if_false.as_ref())
        );
        let read = expr.access != AccessType::None;
        let end = cg.define_label();

        match if_true {
            Some(if_true) => {
                let otherwise = cg.define_label();
                cg.emit_conversion(condition, PhpTypeCode::Boolean)?;
                cg.emit_op(OpCode::BranchIfFalse(otherwise))?;
                self.emit_branch(if_true, read, cg)?;
                cg.emit_op(OpCode::Branch(end))?;
                cg.mark_label(otherwise)?;
                self.emit_branch(if_false, read, cg)?;
            }
            None if read => {
                // keep the condition's value when it is truthy
                cg.emit_boxed(condition)?;
                cg.emit_op(OpCode::Dup)?;
                cg.emit_call(RuntimeOp::ToBool)?;
                cg.emit_op(OpCode::BranchIfTrue(end))?;
                cg.emit_op(OpCode::Pop)?;
                self.emit_branch(if_false, read, cg)?;
            }
            None => {
                cg.emit_conversion(condition, PhpTypeCode::Boolean)?;
                cg.emit_op(OpCode::BranchIfTrue(end))?;
                self.emit_branch(if_false, read, cg)?;
            }
        }

        cg.mark_label(end)?;
        Ok(if read {
            PhpTypeCode::Object
        } else {
            PhpTypeCode::Void
        })
    }
}

impl ConditionalCompiler {
    fn emit_branch(&self, branch: &Expr, read: bool, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let code = cg.emit(branch)?;
        if read {
            cg.emit_boxing(code)?;
        } else {
            cg.emit_discard(code)?;
        }
        Ok(())
    }
}
