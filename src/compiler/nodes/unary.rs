use super::{ExprCompiler, wrong_kind};
use crate::compiler::access::{AccessType, ExpressionContext};
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::CodeGenerator;
use crate::compiler::diagnostics::DiagnosticKind;
use crate::compiler::error::CompileResult;
use crate::compiler::evaluation::Evaluation;
use crate::compiler::runtime::RuntimeOp;
use crate::compiler::type_code::PhpTypeCode;
use crate::core::value::Val;
use crate::parser::ast::{Expr, ExprKind, NodeKind, UnaryOp};

#[derive(Debug, Default)]
pub struct UnaryCompiler;

/// Compile-time result of `op value`, `None` where the operator must run at runtime.
fn fold(op: UnaryOp, value: &Val) -> Option<Val> {
    match op {
        UnaryOp::Plus => Some(value.identity()),
        UnaryOp::Minus => Some(value.negate()),
        UnaryOp::LogicNot => Some(Val::Bool(!value.to_bool())),
        UnaryOp::BitNot => value.bit_not(),
        UnaryOp::Silence => Some(value.clone()),
        UnaryOp::IntCast => Some(Val::integer(value.to_long())),
        UnaryOp::DoubleCast => Some(Val::Double(value.to_double())),
        UnaryOp::StringCast => Some(Val::String(value.to_php_string())),
        UnaryOp::BinaryCast => Some(Val::Bytes(value.to_bytes())),
        UnaryOp::BoolCast => Some(Val::Bool(value.to_bool())),
        UnaryOp::UnsetCast => Some(Val::Null),
        UnaryOp::Print | UnaryOp::Clone => None,
    }
}

fn cast_target(op: UnaryOp) -> Option<PhpTypeCode> {
    match op {
        UnaryOp::IntCast => Some(PhpTypeCode::LongInteger),
        UnaryOp::DoubleCast => Some(PhpTypeCode::Double),
        UnaryOp::StringCast => Some(PhpTypeCode::String),
        UnaryOp::BinaryCast => Some(PhpTypeCode::Bytes),
        UnaryOp::BoolCast => Some(PhpTypeCode::Boolean),
        _ => None,
    }
}

impl ExprCompiler for UnaryCompiler {
    fn analyze(&self, expr: Expr, ctx: ExpressionContext, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Evaluation> {
        let found = expr.node_kind();
        let Expr { id, span, access, kind } = expr;
        let ExprKind::Unary { op, expr: operand } = kind else {
            return Err(wrong_kind(NodeKind::Unary, found));
        };

        if op == UnaryOp::UnsetCast {
            analyzer.report(
                DiagnosticKind::DeprecatedConstruct {
                    what: "(unset) cast".to_string(),
                },
                span,
            );
        }

        // `@` is transparent: its operand is used exactly like the whole expression
        let operand_ctx = match op {
            UnaryOp::Silence => ExpressionContext::new(ctx.access),
            _ => ExpressionContext::READ,
        };
        let operand = analyzer.analyze_expr(*operand, operand_ctx)?;
        let (operand, value) = analyzer.evaluate(operand, |v| fold(op, v));

        let node = Expr {
            id,
            span,
            access,
            kind: ExprKind::Unary {
                op,
                expr: Box::new(operand),
            },
        };
        Ok(Evaluation::from_parts(node, value))
    }

    fn emit(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        let (op, operand) = expect_kind!(expr, NodeKind::Unary, ExprKind::Unary { op, expr } => (*op, expr.as_ref()));

        let code = match op {
            UnaryOp::Silence => {
                cg.emit_call(RuntimeOp::BeginSilence)?;
                let code = cg.emit(operand)?;
                cg.emit_call(RuntimeOp::EndSilence)?;
                return Ok(code);
            }
            UnaryOp::UnsetCast => {
                let code = cg.emit(operand)?;
                cg.emit_discard(code)?;
                cg.emit_literal(&Val::Null)?
            }
            UnaryOp::Plus => self.emit_call(operand, RuntimeOp::Plus, cg)?,
            UnaryOp::Minus => self.emit_call(operand, RuntimeOp::Negate, cg)?,
            UnaryOp::LogicNot => self.emit_call(operand, RuntimeOp::LogicNot, cg)?,
            UnaryOp::BitNot => self.emit_call(operand, RuntimeOp::BitNot, cg)?,
            UnaryOp::Clone => self.emit_call(operand, RuntimeOp::Clone, cg)?,
            UnaryOp::Print => self.emit_call(operand, RuntimeOp::Print, cg)?,
            cast => match cast_target(cast) {
                Some(target) => cg.emit_conversion(operand, target)?,
                None => return Err(wrong_kind(NodeKind::Unary, expr.node_kind())),
            },
        };

        if expr.access == AccessType::None {
            return cg.emit_discard(code);
        }
        Ok(code)
    }
}

impl UnaryCompiler {
    fn emit_call(&self, operand: &Expr, op: RuntimeOp, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        cg.emit_boxed(operand)?;
        cg.emit_call(op)
    }
}
