use super::{ExprCompiler, wrong_kind};
use crate::compiler::access::{AccessType, ExpressionContext};
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::CodeGenerator;
use crate::compiler::error::CompileResult;
use crate::compiler::evaluation::Evaluation;
use crate::compiler::opcode::OpCode;
use crate::compiler::runtime::RuntimeOp;
use crate::compiler::type_code::PhpTypeCode;
use crate::parser::ast::{ArrayItem, Expr, ExprKind, NodeKind};
use std::sync::atomic::{AtomicUsize, Ordering};

/// `array(...)` / `[...]`.
///
/// Per-node: analysis counts the keys so emission can size the new array up front.
#[derive(Debug, Default)]
pub struct ArrayCompiler {
    int_keys: AtomicUsize,
    string_keys: AtomicUsize,
}

impl ArrayCompiler {
    pub fn capacity(&self) -> (usize, usize) {
        (
            self.int_keys.load(Ordering::Relaxed),
            self.string_keys.load(Ordering::Relaxed),
        )
    }

    fn count_key(&self, key: Option<&Expr>) {
        let counter = match key.map(Expr::value) {
            // implicit keys continue the integer sequence
            None => &self.int_keys,
            Some(Some(value)) if value.is_integer_key() => &self.int_keys,
            Some(_) => &self.string_keys,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl ExprCompiler for ArrayCompiler {
    fn analyze(&self, expr: Expr, _ctx: ExpressionContext, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Evaluation> {
        let found = expr.node_kind();
        let Expr { id, span, access, kind } = expr;
        let ExprKind::Array { items } = kind else {
            return Err(wrong_kind(NodeKind::Array, found));
        };

        let mut analyzed = Vec::with_capacity(items.len());
        for item in items {
            let key = match item.key {
                Some(key) => Some(analyzer.analyze_literalized(key, ExpressionContext::READ)?),
                None => None,
            };
            let value = analyzer.analyze_literalized(item.value, ExpressionContext::READ.with_parent(id))?;
            self.count_key(key.as_ref());
            analyzed.push(ArrayItem {
                key,
                value,
                span: item.span,
            });
        }

        Ok(Evaluation::residual(Expr {
            id,
            span,
            access,
            kind: ExprKind::Array { items: analyzed },
        }))
    }

    fn emit(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        let items = expect_kind!(expr, NodeKind::Array, ExprKind::Array { items } => items);
        let (int_keys, string_keys) = self.capacity();
        cg.emit_op(OpCode::NewArray {
            int_capacity: u32::try_from(int_keys).unwrap_or(u32::MAX),
            string_capacity: u32::try_from(string_keys).unwrap_or(u32::MAX),
        })?;

        for item in items {
            cg.emit_op(OpCode::Dup)?;
            if let Some(key) = &item.key {
                cg.emit_boxed(key)?;
            }
            let code = cg.emit_boxed(&item.value)?;
            if item.value.is_var_like() && code.may_be_array() {
                cg.emit_call(RuntimeOp::DeepCopy)?;
            }
            let store = if item.key.is_some() {
                RuntimeOp::SetItem
            } else {
                RuntimeOp::Append
            };
            cg.emit_call(store)?;
        }

        if expr.access == AccessType::None {
            return cg.emit_discard(PhpTypeCode::ArrayHandle);
        }
        Ok(PhpTypeCode::ArrayHandle)
    }
}
