use super::{ExprCompiler, wrong_kind};
use crate::compiler::access::{AccessType, ExpressionContext};
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::CodeGenerator;
use crate::compiler::error::{CompileResult, SinkError};
use crate::compiler::evaluation::Evaluation;
use crate::compiler::opcode::OpCode;
use crate::compiler::runtime::RuntimeOp;
use crate::compiler::type_code::PhpTypeCode;
use crate::core::value::Val;
use crate::parser::ast::{Expr, ExprKind, NodeIds, NodeKind};
use crate::parser::span::Span;

/// One run of a chunked concatenation.
#[derive(Debug, Clone)]
pub enum ConcatChunk {
    /// Consecutive compile-time operands, already concatenated.
    Value { value: Val, span: Span },
    /// Consecutive operands only known at runtime.
    Residual(Vec<Expr>),
}

impl ConcatChunk {
    pub fn value(&self) -> Option<&Val> {
        match self {
            ConcatChunk::Value { value, .. } => Some(value),
            ConcatChunk::Residual(_) => None,
        }
    }
}

/// Collapse nested concatenations into one operand list.
pub fn flatten_operands(operands: Vec<Expr>) -> Vec<Expr> {
    let mut flat = Vec::with_capacity(operands.len());
    for operand in operands {
        match operand.kind {
            ExprKind::Concat { operands } => flat.extend(flatten_operands(operands)),
            _ => flat.push(operand),
        }
    }
    flat
}

/// Group analyzed operands into value and residual runs.
///
/// With `fold` set, consecutive values are concatenated into one string chunk and values
/// that concatenate to nothing are dropped; an operand list made only of such values
/// yields a single empty-string chunk. Without it every operand is its own chunk.
pub fn chunk_operands(operands: Vec<Evaluation>, fold: bool) -> Vec<ConcatChunk> {
    let mut chunks: Vec<ConcatChunk> = Vec::new();

    if !fold {
        for operand in operands {
            let chunk = match operand {
                Evaluation::Value { value, node } => ConcatChunk::Value { value, span: node.span },
                Evaluation::Residual(node) => ConcatChunk::Residual(vec![node]),
            };
            chunks.push(chunk);
        }
        return chunks;
    }

    let mut whole = Span::default();
    for (i, operand) in operands.into_iter().enumerate() {
        let span = operand.node().span;
        whole = if i == 0 { span } else { whole.merge(span) };
        match operand {
            Evaluation::Value { value, .. } => {
                if value.is_empty_string_like() {
                    continue;
                }
                match chunks.last_mut() {
                    Some(ConcatChunk::Value { value: run, span: run_span }) => {
                        *run = run.concat(&value);
                        *run_span = run_span.merge(span);
                    }
                    _ => chunks.push(ConcatChunk::Value {
                        value: Val::String(String::new()).concat(&value),
                        span,
                    }),
                }
            }
            Evaluation::Residual(node) => match chunks.last_mut() {
                Some(ConcatChunk::Residual(run)) => run.push(node),
                _ => chunks.push(ConcatChunk::Residual(vec![node])),
            },
        }
    }

    if chunks.is_empty() {
        chunks.push(ConcatChunk::Value {
            value: Val::String(String::new()),
            span: whole,
        });
    }
    chunks
}

fn chunks_into_operands(chunks: Vec<ConcatChunk>, ids: &mut NodeIds) -> Vec<Expr> {
    let mut operands = Vec::new();
    for chunk in chunks {
        match chunk {
            ConcatChunk::Value { value, span } => operands.push(Expr {
                id: ids.next(),
                span,
                access: AccessType::Read,
                kind: ExprKind::Literal(value),
            }),
            ConcatChunk::Residual(run) => operands.extend(run),
        }
    }
    operands
}

/// Representation of a concatenation operand on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Str,
    Bytes,
    Obj,
}

#[derive(Debug, Default)]
pub struct ConcatCompiler;

impl ConcatCompiler {
    /// Push an operand of a two-operand concatenation in the cheapest usable form.
    fn emit_operand(&self, operand: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<Operand> {
        if let Some(value) = operand.value() {
            return match value {
                Val::Bytes(_) => {
                    cg.emit_literal(value)?;
                    Ok(Operand::Bytes)
                }
                other => {
                    cg.emit_literal(&Val::String(other.to_php_string()))?;
                    Ok(Operand::Str)
                }
            };
        }

        match cg.emit(operand)? {
            PhpTypeCode::String => Ok(Operand::Str),
            PhpTypeCode::Bytes => Ok(Operand::Bytes),
            code if code.is_primitive() => {
                cg.emit_boxing(code)?;
                cg.emit_call(RuntimeOp::ToString)?;
                Ok(Operand::Str)
            }
            code => {
                cg.emit_boxing(code)?;
                Ok(Operand::Obj)
            }
        }
    }

    fn emit_single(&self, operand: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        if let Some(value) = operand.value() {
            return match value {
                Val::Bytes(_) => cg.emit_literal(value),
                other => cg.emit_literal(&Val::String(other.to_php_string())),
            };
        }

        let code = cg.emit(operand)?;
        if matches!(code, PhpTypeCode::String | PhpTypeCode::Bytes) {
            return Ok(code);
        }
        cg.emit_boxing(code)?;
        // binary strings stay binary
        let done = cg.define_label();
        cg.emit_op(OpCode::Dup)?;
        cg.emit_call(RuntimeOp::IsBytes)?;
        cg.emit_op(OpCode::BranchIfTrue(done))?;
        cg.emit_call(RuntimeOp::ToString)?;
        cg.mark_label(done)?;
        Ok(PhpTypeCode::Object)
    }

    fn emit_pair(&self, left: &Expr, right: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        let l = self.emit_operand(left, cg)?;
        let r = self.emit_operand(right, cg)?;
        let op = match (l, r) {
            (Operand::Str, Operand::Str) => RuntimeOp::ConcatStrStr,
            (Operand::Str, Operand::Obj) => RuntimeOp::ConcatStrObj,
            (Operand::Obj, Operand::Str) => RuntimeOp::ConcatObjStr,
            (Operand::Obj, Operand::Obj) => RuntimeOp::ConcatObjObj,
            (Operand::Bytes, Operand::Bytes) => RuntimeOp::ConcatBytesBytes,
            (Operand::Bytes, _) => RuntimeOp::ConcatBytesObj,
            (_, Operand::Bytes) => RuntimeOp::ConcatObjBytes,
        };
        cg.emit_call(op)
    }

    fn emit_many(&self, operands: &[Expr], cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        let count = u16::try_from(operands.len()).map_err(|_| SinkError::ResourceExhausted("concatenation operands"))?;
        for operand in operands {
            cg.emit_boxed(operand)?;
        }
        cg.emit_op(OpCode::NewValueArray(count))?;
        cg.emit_call(RuntimeOp::ConcatN)
    }
}

impl ExprCompiler for ConcatCompiler {
    fn analyze(&self, expr: Expr, _ctx: ExpressionContext, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Evaluation> {
        let found = expr.node_kind();
        let Expr { id, span, access, kind } = expr;
        let ExprKind::Concat { operands } = kind else {
            return Err(wrong_kind(NodeKind::Concat, found));
        };

        let mut evaluations = Vec::new();
        for operand in flatten_operands(operands) {
            evaluations.push(analyzer.analyze_expr(operand, ExpressionContext::READ)?);
        }

        let fold = analyzer.fold_constants();
        let mut chunks = chunk_operands(evaluations, fold);
        if fold && chunks.len() == 1 && chunks[0].value().is_some() {
            if let Some(ConcatChunk::Value { value, .. }) = chunks.pop() {
                let literal = Expr {
                    id: analyzer.ids().next(),
                    span,
                    access,
                    kind: ExprKind::Literal(value.clone()),
                };
                return Ok(Evaluation::with_value(literal, value));
            }
        }

        let operands = chunks_into_operands(chunks, analyzer.ids());
        Ok(Evaluation::residual(Expr {
            id,
            span,
            access,
            kind: ExprKind::Concat { operands },
        }))
    }

    fn emit(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        let operands = expect_kind!(expr, NodeKind::Concat, ExprKind::Concat { operands } => operands);
        let code = match operands.as_slice() {
            [] => cg.emit_literal(&Val::String(String::new()))?,
            [single] => self.emit_single(single, cg)?,
            [left, right] => self.emit_pair(left, right, cg)?,
            many => self.emit_many(many, cg)?,
        };
        if expr.access == AccessType::None {
            return cg.emit_discard(code);
        }
        Ok(code)
    }
}
