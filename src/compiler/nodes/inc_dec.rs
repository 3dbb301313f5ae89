use super::{ExprCompiler, wrong_kind};
use crate::compiler::access::{AccessType, ExpressionContext};
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::{AccessSelector, CodeGenerator};
use crate::compiler::error::{CompileResult, InternalFault};
use crate::compiler::evaluation::Evaluation;
use crate::compiler::opcode::OpCode;
use crate::compiler::runtime::RuntimeOp;
use crate::compiler::type_code::PhpTypeCode;
use crate::parser::ast::{Expr, ExprKind, NodeKind};

/// `++$x`, `$x++`, `--$x`, `$x--`.
#[derive(Debug, Default)]
pub struct IncDecCompiler;

impl ExprCompiler for IncDecCompiler {
    fn analyze(&self, expr: Expr, _ctx: ExpressionContext, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Evaluation> {
        let found = expr.node_kind();
        let Expr { id, span, access, kind } = expr;
        let ExprKind::IncDec { inc, post, target } = kind else {
            return Err(wrong_kind(NodeKind::IncDec, found));
        };

        let ctx = ExpressionContext::new(AccessType::ReadAndWrite).with_parent(id);
        let target = analyzer.analyze_literalized(*target, ctx)?;

        Ok(Evaluation::residual(Expr {
            id,
            span,
            access,
            kind: ExprKind::IncDec {
                inc,
                post,
                target: Box::new(target),
            },
        }))
    }

    /// The target is prepared for writing, then for reading; index operands are
    /// evaluated by the first preparation only.
    fn emit(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        let (inc, post, target) =
            expect_kind!(expr, NodeKind::IncDec, ExprKind::IncDec { inc, post, target } => (*inc, *post, target.as_ref()));
        if !cg.is_lvalue(target)? {
            return Err(InternalFault::NotAnLValue(target.node_kind()).into());
        }
        let read = match expr.access {
            AccessType::None => false,
            AccessType::Read | AccessType::ReadUnknown => true,
            other => {
                return Err(InternalFault::UnsupportedAccess {
                    kind: NodeKind::IncDec,
                    access: format!("{:?}", other),
                }
                .into());
            }
        };

        cg.begin_chain(false);
        cg.emit_prepare(target, AccessSelector::Write)?;
        cg.emit_prepare(target, AccessSelector::Read)?;
        let code = cg.emit_load(target)?;
        cg.emit_boxing(code)?;

        let saved = if read { Some(cg.declare_temp()?) } else { None };
        if let (Some(temp), true) = (saved, post) {
            cg.emit_op(OpCode::Dup)?;
            cg.emit_op(OpCode::StoreTemp(temp))?;
        }
        let op = if inc {
            RuntimeOp::Increment
        } else {
            RuntimeOp::Decrement
        };
        cg.emit_call(op)?;
        if let (Some(temp), false) = (saved, post) {
            cg.emit_op(OpCode::Dup)?;
            cg.emit_op(OpCode::StoreTemp(temp))?;
        }

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
