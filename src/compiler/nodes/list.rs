use super::{ExprCompiler, wrong_kind};
use crate::compiler::access::{AccessType, ExpressionContext};
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::{AccessSelector, CodeGenerator};
use crate::compiler::error::CompileResult;
use crate::compiler::evaluation::Evaluation;
use crate::compiler::opcode::OpCode;
use crate::compiler::runtime::RuntimeOp;
use crate::compiler::type_code::PhpTypeCode;
use crate::core::value::Val;
use crate::parser::ast::{Expr, ExprKind, ListItem, NodeId, NodeKind};

/// `list($a, , list($b, $c)) = value`.
#[derive(Debug, Default)]
pub struct ListCompiler;

fn analyze_targets(
    targets: Vec<ListItem>,
    parent: NodeId,
    analyzer: &mut Analyzer<'_, '_>,
) -> CompileResult<Vec<ListItem>> {
    let ctx = ExpressionContext::new(AccessType::Write).with_parent(parent);
    targets
        .into_iter()
        .map(|target| {
            Ok(match target {
                ListItem::Skip => ListItem::Skip,
                ListItem::Target(expr) => ListItem::Target(analyzer.analyze_literalized(expr, ctx)?),
                ListItem::Nested(items) => ListItem::Nested(analyze_targets(items, parent, analyzer)?),
            })
        })
        .collect()
}

impl ExprCompiler for ListCompiler {
    fn analyze(&self, expr: Expr, _ctx: ExpressionContext, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Evaluation> {
        let found = expr.node_kind();
        let Expr { id, span, access, kind } = expr;
        let ExprKind::List { targets, value } = kind else {
            return Err(wrong_kind(NodeKind::List, found));
        };

        let value = analyzer.analyze_literalized(*value, ExpressionContext::READ.with_parent(id))?;
        let targets = analyze_targets(targets, id, analyzer)?;

        Ok(Evaluation::residual(Expr {
            id,
            span,
            access,
            kind: ExprKind::List {
                targets,
                value: Box::new(value),
            },
        }))
    }

    fn emit(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode> {
        let (targets, value) = expect_kind!(expr, NodeKind::List, ExprKind::List { targets, value } => (targets, value.as_ref()));
        let read = expr.access != AccessType::None;

        cg.emit_boxed(value)?;
        if read {
            cg.emit_op(OpCode::Dup)?;
        }
        self.emit_unpack(targets, cg)?;

        Ok(if read {
            PhpTypeCode::Object
        } else {
            PhpTypeCode::Void
        })
    }
}

impl ListCompiler {
    /// Consume the value on the stack, assigning it to `targets`.
    fn emit_unpack(&self, targets: &[ListItem], cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let not_array = cg.define_label();
        let end = cg.define_label();

        cg.emit_op(OpCode::Dup)?;
        cg.emit_call(RuntimeOp::IsArrayLike)?;
        cg.emit_op(OpCode::BranchIfFalse(not_array))?;

        // later positions first, the array stays on the stack throughout
        for (index, target) in targets.iter().enumerate().rev() {
            match target {
                ListItem::Skip => {}
                ListItem::Target(target) => {
                    self.emit_fetch(index, cg)?;
                    cg.emit_call(RuntimeOp::DeepCopy)?;
                    let temp = cg.declare_temp()?;
                    cg.emit_op(OpCode::StoreTemp(temp))?;
                    cg.begin_chain(false);
                    cg.emit_prepare(target, AccessSelector::Write)?;
                    cg.emit_op(OpCode::LoadTemp(temp))?;
                    cg.emit_store(target)?;
                    cg.end_chain();
                    cg.return_temp(temp);
                }
                ListItem::Nested(items) => {
                    self.emit_fetch(index, cg)?;
                    self.emit_unpack(items, cg)?;
                }
            }
        }
        cg.emit_op(OpCode::Pop)?;
        cg.emit_op(OpCode::Branch(end))?;

        cg.mark_label(not_array)?;
        cg.emit_op(OpCode::Pop)?;
        self.emit_assign_null(targets, cg)?;

        cg.mark_label(end)
    }

    /// [array] -> [array, array[index]]
    fn emit_fetch(&self, index: usize, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        cg.emit_op(OpCode::Dup)?;
        let key = Val::integer(i64::try_from(index).unwrap_or(i64::MAX));
        let code = cg.emit_literal(&key)?;
        cg.emit_boxing(code)?;
        cg.emit_call(RuntimeOp::GetItemQuiet)?;
        Ok(())
    }

    fn emit_assign_null(&self, targets: &[ListItem], cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        for target in targets.iter().rev() {
            match target {
                ListItem::Skip => {}
                ListItem::Target(target) => {
                    cg.begin_chain(false);
                    cg.emit_prepare(target, AccessSelector::Write)?;
                    cg.emit_literal(&Val::Null)?;
                    cg.emit_store(target)?;
                    cg.end_chain();
                }
                ListItem::Nested(items) => self.emit_assign_null(items, cg)?,
            }
        }
        Ok(())
    }
}
