use super::{StmtCompiler, wrong_kind};
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::CodeGenerator;
use crate::compiler::error::CompileResult;
use crate::compiler::opcode::{Label, OpCode};
use crate::compiler::runtime::RuntimeOp;
use crate::parser::ast::{Catch, NodeKind, Stmt, StmtKind};
use tracing::debug;

/// Host exception used by the runtime to unwind a dying script. User handlers never see it.
pub const UNCATCHABLE_EXCEPTION_TYPE: &str = "ScriptDiedException";

/// Root of all host exceptions; user-level exceptions travel wrapped in it.
pub const HOST_EXCEPTION_TYPE: &str = "HostException";

#[derive(Debug, Default)]
pub struct TryCompiler;

impl TryCompiler {
    fn emit_handlers(&self, catches: &[Catch], end: Label, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        cg.sink().begin_catch(UNCATCHABLE_EXCEPTION_TYPE)?;
        cg.emit_op(OpCode::Rethrow)?;

        cg.sink().begin_catch(HOST_EXCEPTION_TYPE)?;
        cg.emit_call(RuntimeOp::WrapHostException)?;
        let exception = cg.declare_temp()?;
        cg.emit_op(OpCode::StoreTemp(exception))?;

        // first matching clause wins
        for catch in catches {
            let next = cg.define_label();
            let type_name = catch.resolved_type.as_deref().unwrap_or(&catch.type_name);
            cg.emit_op(OpCode::LoadTemp(exception))?;
            cg.emit_op(OpCode::InstanceOf(type_name.to_string()))?;
            cg.emit_op(OpCode::BranchIfFalse(next))?;
            if let Some(var) = &catch.var {
                cg.emit_op(OpCode::LoadTemp(exception))?;
                cg.emit_op(OpCode::StoreVar(var.clone()))?;
            }
            cg.emit_statements(&catch.body)?;
            cg.emit_op(OpCode::Leave(end))?;
            cg.mark_label(next)?;
        }

        cg.emit_op(OpCode::Rethrow)?;
        cg.return_temp(exception);
        Ok(())
    }

    fn emit_region(
        &self,
        body: &[Stmt],
        catches: &[Catch],
        finally: Option<&[Stmt]>,
        cg: &mut CodeGenerator<'_, '_>,
    ) -> CompileResult<()> {
        let end = cg.sink().begin_try()?;
        cg.emit_statements(body)?;
        if !catches.is_empty() {
            self.emit_handlers(catches, end, cg)?;
        }
        // a region needs at least one handler; a bare try keeps an empty finally
        let finally = finally.or(catches.is_empty().then_some(&[][..]));
        if let Some(finally) = finally {
            cg.sink().begin_finally()?;
            cg.emit_statements(finally)?;
        }
        cg.sink().end_region()?;
        Ok(())
    }
}

impl StmtCompiler for TryCompiler {
    fn analyze(&self, stmt: Stmt, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Stmt> {
        let found = stmt.node_kind();
        let Stmt { id, span, kind } = stmt;
        let StmtKind::Try { body, catches, finally } = kind else {
            return Err(wrong_kind(NodeKind::Try, found));
        };

        analyzer.enter_conditional();
        let body = analyzer.analyze_statements(body);
        analyzer.leave_conditional();
        let body = body?;

        let mut analyzed = Vec::with_capacity(catches.len());
        for catch in catches {
            let resolved = analyzer.resolve_type_name(&catch.type_name, catch.span);
            analyzer.enter_conditional();
            let body = analyzer.analyze_statements(catch.body);
            analyzer.leave_conditional();
            analyzed.push(Catch {
                body: body?,
                resolved_type: Some(resolved),
                ..catch
            });
        }

        let finally = match finally {
            Some(statements) => Some(analyzer.analyze_statements(statements)?),
            None => None,
        };

        Ok(Stmt {
            id,
            span,
            kind: StmtKind::Try {
                body,
                catches: analyzed,
                finally,
            },
        })
    }

    fn emit(&self, stmt: &Stmt, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let (body, catches, finally) = expect_kind!(
            stmt,
            NodeKind::Try,
            StmtKind::Try { body, catches, finally } => (body, catches, finally.as_deref())
        );

        if catches.is_empty() && finally.is_none() && cg.options().elide_empty_try {
            debug!(start = stmt.span.start, "try without handlers emitted as a plain block");
            return cg.emit_statements(body);
        }

        cg.enter_exception_block();
        let result = self.emit_region(body, catches, finally, cg);
        cg.leave_exception_block();
        result
    }
}
