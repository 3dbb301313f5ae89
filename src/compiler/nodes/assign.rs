use super::{ExprCompiler, wrong_kind};
use crate::compiler::access::{AccessType, ExpressionContext};
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::{AccessSelector, CodeGenerator};
use crate::compiler::error::CompileResult;
use crate::compiler::evaluation::Evaluation;
use crate::compiler::opcode::OpCode;
use crate::compiler::runtime::RuntimeOp;
use crate::compiler::type_code::PhpTypeCode;
use crate::parser::ast::{Expr, ExprKind, NodeKind};

/// `$target = value`, copying arrays read from another location.
#[derive(Debug, Default)]
pub struct AssignCompiler;

impl ExprCompiler for AssignCompiler {
    fn analyze(&self, expr: Expr, _ctx: ExpressionContext, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Evaluation> {
        let found = expr.node_kind();
        let Expr { id, span, access, kind } = expr;
        let ExprKind::Assign { target, value } = kind else {
            return Err(wrong_kind(NodeKind::Assign, found));
        };

        let target = analyzer.analyze_literalized(*target, ExpressionContext::new(AccessType::Write).with_parent(id))?;
        let value = analyzer.analyze_literalized(*value, ExpressionContext::READ.with_parent(id))?;

        Ok(Evaluation::residual(Expr {
            id,
            span,
            access,
            kind: ExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
        }))
    }

    fn emit(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        let (target, value) = expect_kind!(expr, NodeKind::Assign, ExprKind::Assign { target, value } => (target.as_ref(), value.as_ref()));
        let read = expr.access != AccessType::None;

        cg.begin_chain(false);
        cg.emit_prepare(target, AccessSelector::Write)?;
        let code = cg.emit_boxed(value)?;
        if value.is_var_like() && code.may_be_array() {
            cg.emit_call(RuntimeOp::DeepCopy)?;
        }
        let saved = if read {
            let temp = cg.declare_temp()?;
            cg.emit_op(OpCode::Dup)?;
            cg.emit_op(OpCode::StoreTemp(temp))?;
            Some(temp)
        } else {
            None
        };
        cg.emit_store(target)?;
        cg.end_chain();

        match saved {
            Some(temp) => {
                cg.emit_op(OpCode::LoadTemp(temp))?;
                cg.return_temp(temp);
                Ok(PhpTypeCode::Object)
            }
            None => Ok(PhpTypeCode::Void),
        }
    }
}
