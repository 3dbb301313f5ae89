use super::{ExprCompiler, wrong_kind};
use crate::compiler::access::{AccessType, ExpressionContext};
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::CodeGenerator;
use crate::compiler::error::CompileResult;
use crate::compiler::evaluation::Evaluation;
use crate::compiler::runtime::RuntimeOp;
use crate::compiler::type_code::PhpTypeCode;
use crate::core::value::Val;
use crate::parser::ast::{BinaryOp, Expr, ExprKind, NodeKind};

#[derive(Debug, Default)]
pub struct BinaryCompiler;

fn fold(op: BinaryOp, left: &Val, right: &Val) -> Val {
    match op {
        BinaryOp::Add => left.add(right),
        BinaryOp::Sub => left.sub(right),
        BinaryOp::Mul => left.mul(right),
        BinaryOp::Identical => Val::Bool(left.identical(right)),
        BinaryOp::NotIdentical => Val::Bool(!left.identical(right)),
        BinaryOp::LessThan => Val::Bool(left.less_than(right)),
        BinaryOp::GreaterThan => Val::Bool(right.less_than(left)),
    }
}

fn runtime_op(op: BinaryOp) -> RuntimeOp {
    match op {
        BinaryOp::Add => RuntimeOp::Add,
        BinaryOp::Sub => RuntimeOp::Sub,
        BinaryOp::Mul => RuntimeOp::Mul,
        BinaryOp::Identical => RuntimeOp::Identical,
        BinaryOp::NotIdentical => RuntimeOp::NotIdentical,
        BinaryOp::LessThan => RuntimeOp::LessThan,
        BinaryOp::GreaterThan => RuntimeOp::GreaterThan,
    }
}

impl ExprCompiler for BinaryCompiler {
    fn analyze(&self, expr: Expr, _ctx: ExpressionContext, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Evaluation> {
        let found = expr.node_kind();
        let Expr { id, span, access, kind } = expr;
        let ExprKind::Binary { op, left, right } = kind else {
            return Err(wrong_kind(NodeKind::Binary, found));
        };

        let left = analyzer.analyze_expr(*left, ExpressionContext::READ)?;
        let right = analyzer.analyze_expr(*right, ExpressionContext::READ)?;
        let (left, right, value) = analyzer.evaluate_pair(left, right, |l, r| Some(fold(op, l, r)));

        let node = Expr {
            id,
            span,
            access,
            kind: ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        };
        Ok(Evaluation::from_parts(node, value))
    }

    fn emit(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        let (op, left, right) = expect_kind!(expr, NodeKind::Binary, ExprKind::Binary { op, left, right } => (*op, left, right));
        cg.emit_boxed(left)?;
        cg.emit_boxed(right)?;
        let code = cg.emit_call(runtime_op(op))?;
        if expr.access == AccessType::None {
            return cg.emit_discard(code);
        }
        Ok(code)
    }
}
