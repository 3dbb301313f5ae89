use super::ExprCompiler;
use crate::compiler::access::{AccessType, ExpressionContext};
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::CodeGenerator;
use crate::compiler::error::CompileResult;
use crate::compiler::evaluation::Evaluation;
use crate::compiler::opcode::OpCode;
use crate::compiler::type_code::PhpTypeCode;
use crate::parser::ast::{Expr, ExprKind, NodeKind};

/// Global constant reference; folds when the value is known at compile time.
#[derive(Debug, Default)]
pub struct ConstantCompiler;

impl ExprCompiler for ConstantCompiler {
    fn analyze(&self, expr: Expr, _ctx: ExpressionContext, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Evaluation> {
        let name = expect_kind!(expr, NodeKind::Constant, ExprKind::Constant { name } => name);
        let value = if analyzer.fold_constants() {
            analyzer.resolve_constant(name)
        } else {
            None
        };
        Ok(Evaluation::from_parts(expr, value))
    }

    fn emit(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        let name = expect_kind!(expr, NodeKind::Constant, ExprKind::Constant { name } => name);
        cg.emit_op(OpCode::LoadConstant(name.clone()))?;
        if expr.access == AccessType::None {
            return cg.emit_discard(PhpTypeCode::Object);
        }
        Ok(PhpTypeCode::Object)
    }
}
