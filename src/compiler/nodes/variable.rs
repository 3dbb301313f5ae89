use super::{ExprCompiler, LValueCompiler, emit_lvalue_read};
use crate::compiler::access::ExpressionContext;
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::CodeGenerator;
use crate::compiler::error::CompileResult;
use crate::compiler::evaluation::Evaluation;
use crate::compiler::opcode::OpCode;
use crate::compiler::type_code::PhpTypeCode;
use crate::parser::ast::{Expr, ExprKind, NodeKind};

/// `$name`. Needs no addressing operands, so preparing it twice is free.
#[derive(Debug, Default)]
pub struct VariableCompiler;

fn name(expr: &Expr) -> CompileResult<&str> {
    Ok(expect_kind!(expr, NodeKind::Variable, ExprKind::Variable { name } => name.as_str()))
}

impl ExprCompiler for VariableCompiler {
    fn analyze(&self, expr: Expr, _ctx: ExpressionContext, _analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Evaluation> {
        Ok(Evaluation::residual(expr))
    }

    fn emit(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        emit_lvalue_read(self, expr, cg)
    }

    fn lvalue(&self) -> Option<&dyn LValueCompiler> {
        Some(self)
    }
}

impl LValueCompiler for VariableCompiler {
    fn emit_prepare(&self, expr: &Expr, _cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        name(expr).map(|_| ())
    }

    fn emit_load(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        cg.emit_op(OpCode::LoadVar(name(expr)?.to_string()))?;
        Ok(PhpTypeCode::Object)
    }

    fn emit_store(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        cg.emit_op(OpCode::StoreVar(name(expr)?.to_string()))
    }

    fn emit_load_ref(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        cg.emit_op(OpCode::LoadVarRef(name(expr)?.to_string()))?;
        Ok(PhpTypeCode::ReferenceCell)
    }

    fn emit_array_for_write(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        cg.emit_op(OpCode::LoadVarArray(name(expr)?.to_string()))?;
        Ok(PhpTypeCode::ArrayHandle)
    }

    fn emit_unset(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        cg.emit_op(OpCode::UnsetVar(name(expr)?.to_string()))
    }
}
