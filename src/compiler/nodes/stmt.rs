//! Statements with straightforward lowering: expression statements, blocks, `echo`,
//! `if`, `while`, `throw`, `unset` and declarations.

use super::{StmtCompiler, wrong_kind};
use crate::compiler::access::{AccessType, ExpressionContext};
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::CodeGenerator;
use crate::compiler::error::CompileResult;
use crate::compiler::opcode::OpCode;
use crate::compiler::runtime::RuntimeOp;
use crate::compiler::type_code::PhpTypeCode;
use crate::parser::ast::{EmptyKind, FunctionDecl, NodeKind, Stmt, StmtKind};
use tracing::debug;

#[derive(Debug, Default)]
pub struct ExpressionStmtCompiler;

impl StmtCompiler for ExpressionStmtCompiler {
    fn analyze(&self, stmt: Stmt, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Stmt> {
        let found = stmt.node_kind();
        let Stmt { id, span, kind } = stmt;
        let StmtKind::Expression { expr } = kind else {
            return Err(wrong_kind(NodeKind::ExpressionStmt, found));
        };

        let evaluation = analyzer.analyze_expr(expr, ExpressionContext::NONE)?;
        if evaluation.has_value() {
            return Ok(analyzer.empty_stmt(span, EmptyKind::Skipped));
        }
        Ok(Stmt {
            id,
            span,
            kind: StmtKind::Expression {
                expr: evaluation.into_node(),
            },
        })
    }

    fn emit(&self, stmt: &Stmt, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let expr = expect_kind!(stmt, NodeKind::ExpressionStmt, StmtKind::Expression { expr } => expr);
        let code = cg.emit(expr)?;
        cg.emit_discard(code).map(|_| ())
    }
}

#[derive(Debug, Default)]
pub struct EchoCompiler;

impl StmtCompiler for EchoCompiler {
    fn analyze(&self, stmt: Stmt, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Stmt> {
        let found = stmt.node_kind();
        let Stmt { id, span, kind } = stmt;
        let StmtKind::Echo { exprs } = kind else {
            return Err(wrong_kind(NodeKind::Echo, found));
        };
        let exprs = exprs
            .into_iter()
            .map(|expr| analyzer.analyze_literalized(expr, ExpressionContext::READ))
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(Stmt {
            id,
            span,
            kind: StmtKind::Echo { exprs },
        })
    }

    fn emit(&self, stmt: &Stmt, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let exprs = expect_kind!(stmt, NodeKind::Echo, StmtKind::Echo { exprs } => exprs);
        for expr in exprs {
            cg.emit_boxed(expr)?;
            cg.emit_call(RuntimeOp::Echo)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct BlockCompiler;

impl StmtCompiler for BlockCompiler {
    fn analyze(&self, stmt: Stmt, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Stmt> {
        let found = stmt.node_kind();
        let Stmt { id, span, kind } = stmt;
        let StmtKind::Block { statements } = kind else {
            return Err(wrong_kind(NodeKind::Block, found));
        };
        let statements = analyzer.analyze_statements(statements)?;
        Ok(Stmt {
            id,
            span,
            kind: StmtKind::Block { statements },
        })
    }

    fn emit(&self, stmt: &Stmt, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let statements = expect_kind!(stmt, NodeKind::Block, StmtKind::Block { statements } => statements);
        cg.emit_statements(statements)
    }
}

#[derive(Debug, Default)]
pub struct IfCompiler;

impl StmtCompiler for IfCompiler {
    fn analyze(&self, stmt: Stmt, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Stmt> {
        let found = stmt.node_kind();
        let Stmt { id, span, kind } = stmt;
        let StmtKind::If {
            condition,
            then_block,
            else_block,
        } = kind
        else {
            return Err(wrong_kind(NodeKind::If, found));
        };

        let condition = analyzer.analyze_expr(condition, ExpressionContext::READ)?;
        let jump_target = then_block
            .iter()
            .chain(else_block.iter().flatten())
            .any(Stmt::contains_label);
        if analyzer.fold_constants()
            && !jump_target
            && let Some(truthy) = condition.value().map(|v| v.to_bool())
        {
            let (live, dead) = if truthy {
                (Some(then_block), else_block)
            } else {
                (else_block, Some(then_block))
            };
            if let Some(dead) = dead {
                analyzer.analyze_dead_statements(dead)?;
            }
            return match live {
                Some(statements) => Ok(Stmt {
                    id,
                    span,
                    kind: StmtKind::Block {
                        statements: analyzer.analyze_statements(statements)?,
                    },
                }),
                None => Ok(analyzer.empty_stmt(span, EmptyKind::Skipped)),
            };
        }

        let condition = analyzer.literalize(condition);
        let entry = analyzer.reachability();
        analyzer.enter_conditional();
        let then_block = analyzer.analyze_statements(then_block);
        analyzer.leave_conditional();
        let else_block = match else_block {
            Some(statements) => {
                analyzer.restore_reachability(entry);
                analyzer.enter_conditional();
                let analyzed = analyzer.analyze_statements(statements);
                analyzer.leave_conditional();
                Some(analyzed?)
            }
            None => None,
        };

        Ok(Stmt {
            id,
            span,
            kind: StmtKind::If {
                condition,
                then_block: then_block?,
                else_block,
            },
        })
    }

    fn emit(&self, stmt: &Stmt, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let (condition, then_block, else_block) = expect_kind!(
            stmt,
            NodeKind::If,
            StmtKind::If { condition, then_block, else_block } => (condition, then_block, else_block)
        );
        let otherwise = cg.define_label();

        cg.emit_conversion(condition, PhpTypeCode::Boolean)?;
        cg.emit_op(OpCode::BranchIfFalse(otherwise))?;
        cg.emit_statements(then_block)?;
        match else_block {
            Some(else_block) => {
                let end = cg.define_label();
                cg.emit_op(OpCode::Branch(end))?;
                cg.mark_label(otherwise)?;
                cg.emit_statements(else_block)?;
                cg.mark_label(end)
            }
            None => cg.mark_label(otherwise),
        }
    }
}

#[derive(Debug, Default)]
pub struct WhileCompiler;

impl StmtCompiler for WhileCompiler {
    fn analyze(&self, stmt: Stmt, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Stmt> {
        let found = stmt.node_kind();
        let Stmt { id, span, kind } = stmt;
        let StmtKind::While { condition, body } = kind else {
            return Err(wrong_kind(NodeKind::While, found));
        };

        let condition = analyzer.analyze_expr(condition, ExpressionContext::READ)?;
        if analyzer.fold_constants() && condition.value().is_some_and(|v| !v.to_bool()) {
            analyzer.enter_loop_body();
            let dead = analyzer.analyze_dead_statements(body);
            analyzer.leave_loop_body();
            dead?;
            return Ok(analyzer.empty_stmt(span, EmptyKind::Skipped));
        }

        let condition = analyzer.literalize(condition);
        analyzer.enter_loop_body();
        let body = analyzer.analyze_statements(body);
        analyzer.leave_loop_body();

        Ok(Stmt {
            id,
            span,
            kind: StmtKind::While { condition, body: body? },
        })
    }

    fn emit(&self, stmt: &Stmt, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let (condition, body) = expect_kind!(stmt, NodeKind::While, StmtKind::While { condition, body } => (condition, body));
        let test = cg.define_label();
        let exit = cg.define_label();

        cg.mark_label(test)?;
        if !condition.value().is_some_and(|v| v.to_bool()) {
            cg.emit_conversion(condition, PhpTypeCode::Boolean)?;
            cg.emit_op(OpCode::BranchIfFalse(exit))?;
        }
        cg.enter_loop(exit, test);
        let result = cg.emit_statements(body);
        cg.leave_loop();
        result?;
        cg.emit_op(OpCode::Branch(test))?;
        cg.mark_label(exit)
    }
}

#[derive(Debug, Default)]
pub struct ThrowCompiler;

impl StmtCompiler for ThrowCompiler {
    fn analyze(&self, stmt: Stmt, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Stmt> {
        let found = stmt.node_kind();
        let Stmt { id, span, kind } = stmt;
        let StmtKind::Throw { expr } = kind else {
            return Err(wrong_kind(NodeKind::Throw, found));
        };
        let expr = analyzer.analyze_literalized(expr, ExpressionContext::READ)?;
        analyzer.enter_unreachable();
        Ok(Stmt {
            id,
            span,
            kind: StmtKind::Throw { expr },
        })
    }

    fn emit(&self, stmt: &Stmt, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let expr = expect_kind!(stmt, NodeKind::Throw, StmtKind::Throw { expr } => expr);
        cg.emit_boxed(expr)?;
        cg.emit_op(OpCode::Throw)
    }
}

#[derive(Debug, Default)]
pub struct UnsetCompiler;

impl StmtCompiler for UnsetCompiler {
    fn analyze(&self, stmt: Stmt, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Stmt> {
        let found = stmt.node_kind();
        let Stmt { id, span, kind } = stmt;
        let StmtKind::Unset { vars } = kind else {
            return Err(wrong_kind(NodeKind::Unset, found));
        };
        let ctx = ExpressionContext::new(AccessType::Write);
        let vars = vars
            .into_iter()
            .map(|var| analyzer.analyze_literalized(var, ctx))
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(Stmt {
            id,
            span,
            kind: StmtKind::Unset { vars },
        })
    }

    fn emit(&self, stmt: &Stmt, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let vars = expect_kind!(stmt, NodeKind::Unset, StmtKind::Unset { vars } => vars);
        for var in vars {
            cg.begin_chain(true);
            let result = cg.emit_unset(var);
            cg.end_chain();
            result?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConstDeclCompiler;

impl StmtCompiler for ConstDeclCompiler {
    fn analyze(&self, stmt: Stmt, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Stmt> {
        let found = stmt.node_kind();
        let Stmt { id, span, kind } = stmt;
        let StmtKind::ConstDecl { name, value } = kind else {
            return Err(wrong_kind(NodeKind::ConstDecl, found));
        };

        let evaluation = analyzer.analyze_expr(value, ExpressionContext::READ)?;
        if let Some(value) = evaluation.value() {
            analyzer.declare_constant(&name, value.clone(), span);
        }
        let value = analyzer.literalize(evaluation);
        Ok(Stmt {
            id,
            span,
            kind: StmtKind::ConstDecl { name, value },
        })
    }

    fn emit(&self, stmt: &Stmt, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let (name, value) = expect_kind!(stmt, NodeKind::ConstDecl, StmtKind::ConstDecl { name, value } => (name, value));
        cg.emit_boxed(value)?;
        cg.emit_op(OpCode::DefineConstant(name.clone()))
    }
}

#[derive(Debug, Default)]
pub struct FunctionDeclCompiler;

impl StmtCompiler for FunctionDeclCompiler {
    fn analyze(&self, stmt: Stmt, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Stmt> {
        let found = stmt.node_kind();
        let Stmt { id, span, kind } = stmt;
        let StmtKind::FunctionDecl(decl) = kind else {
            return Err(wrong_kind(NodeKind::FunctionDecl, found));
        };

        let unreachable = analyzer.is_unreachable();
        if unreachable {
            debug!(name = %decl.name, "function declared in dead code");
        }
        analyzer.enter_routine(decl.by_ref);
        let body = analyzer.analyze_statements(decl.body);
        analyzer.leave_routine();

        Ok(Stmt {
            id,
            span,
            kind: StmtKind::FunctionDecl(FunctionDecl {
                body: body?,
                unreachable,
                ..decl
            }),
        })
    }

    fn emit(&self, stmt: &Stmt, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        let decl = expect_kind!(stmt, NodeKind::FunctionDecl, StmtKind::FunctionDecl(decl) => decl);
        cg.sink().begin_function(&decl.name, decl.by_ref, &decl.params)?;
        cg.emit_routine(&decl.body, decl.by_ref)?;
        cg.sink().end_function()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct EmptyCompiler;

impl StmtCompiler for EmptyCompiler {
    fn analyze(&self, stmt: Stmt, _analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Stmt> {
        Ok(stmt)
    }

    fn emit(&self, _stmt: &Stmt, _cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()> {
        Ok(())
    }
}
