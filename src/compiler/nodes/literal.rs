use super::ExprCompiler;
use crate::compiler::access::{AccessType, ExpressionContext};
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::CodeGenerator;
use crate::compiler::error::{CompileResult, InternalFault};
use crate::compiler::evaluation::Evaluation;
use crate::compiler::type_code::PhpTypeCode;
use crate::parser::ast::{Expr, ExprKind, NodeKind};

#[derive(Debug, Default)]
pub struct LiteralCompiler;

impl ExprCompiler for LiteralCompiler {
    fn analyze(&self, expr: Expr, _ctx: ExpressionContext, _analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Evaluation> {
        let value = expect_kind!(expr, NodeKind::Literal, ExprKind::Literal(value) => value.clone());
        Ok(Evaluation::with_value(expr, value))
    }

    fn emit(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        let value = expect_kind!(expr, NodeKind::Literal, ExprKind::Literal(value) => value);
        match expr.access {
            AccessType::None => Ok(PhpTypeCode::Void),
            access if access.is_write() => Err(InternalFault::UnsupportedAccess {
                kind: NodeKind::Literal,
                access: format!("{:?}", access),
            }
            .into()),
            _ => cg.emit_literal(value),
        }
    }
}
