use super::{ExprCompiler, wrong_kind};
use crate::compiler::access::{AccessType, ExpressionContext};
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::CodeGenerator;
use crate::compiler::diagnostics::DiagnosticKind;
use crate::compiler::error::{CompileResult, SinkError};
use crate::compiler::evaluation::Evaluation;
use crate::compiler::opcode::OpCode;
use crate::compiler::type_code::PhpTypeCode;
use crate::parser::ast::{Expr, ExprKind, NodeKind};

/// Direct call of a named function.
#[derive(Debug, Default)]
pub struct CallCompiler;

impl ExprCompiler for CallCompiler {
    fn analyze(&self, expr: Expr, _ctx: ExpressionContext, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Evaluation> {
        let found = expr.node_kind();
        let Expr { id, span, access, kind } = expr;
        let ExprKind::Call { name, args } = kind else {
            return Err(wrong_kind(NodeKind::Call, found));
        };

        let signature = analyzer.resolve_function(&name);
        if signature.is_none() {
            analyzer.report(DiagnosticKind::UnknownFunction { name: name.clone() }, span);
        }

        let mut analyzed = Vec::with_capacity(args.len());
        for (index, arg) in args.into_iter().enumerate() {
            let access = match &signature {
                Some(sig) if sig.param_by_ref(index) && arg.is_var_like() => AccessType::ReadRef,
                None if arg.is_var_like() => AccessType::ReadUnknown,
                _ => AccessType::Read,
            };
            analyzed.push(analyzer.analyze_literalized(arg, ExpressionContext::new(access).with_parent(id))?);
        }

        Ok(Evaluation::residual(Expr {
            id,
            span,
            access,
            kind: ExprKind::Call { name, args: analyzed },
        }))
    }

    fn emit(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        let (name, args) = expect_kind!(expr, NodeKind::Call, ExprKind::Call { name, args } => (name, args));
        let argc = u8::try_from(args.len()).map_err(|_| SinkError::ResourceExhausted("call arguments"))?;

        for arg in args {
            let code = cg.emit(arg)?;
            if code != PhpTypeCode::ReferenceCell {
                cg.emit_boxing(code)?;
            }
        }
        cg.emit_op(OpCode::CallFunction {
            name: name.clone(),
            argc,
        })?;

        if expr.access == AccessType::None {
            return cg.emit_discard(PhpTypeCode::Object);
        }
        Ok(PhpTypeCode::Object)
    }
}
