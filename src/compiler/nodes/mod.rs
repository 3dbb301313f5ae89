//! Per-node-kind compilers.
//!
//! Each node kind implements [`ExprCompiler`] or [`StmtCompiler`]: `analyze` consumes
//! the node and returns its replacement, `emit` lowers the analyzed node. L-value kinds
//! additionally expose [`LValueCompiler`].

/// Borrow the payload of the expected variant, or fail with
/// [`InternalFault::WrongCompilerKind`].
macro_rules! expect_kind {
    ($node:expr, $expected:expr, $pat:pat => $out:expr) => {
        match &$node.kind {
            $pat => $out,
            #[allow(unreachable_patterns)]
            _ => return Err($crate::compiler::nodes::wrong_kind($expected, $node.node_kind())),
        }
    };
}

mod array;
mod assign;
mod binary;
mod call;
mod concat;
mod conditional;
mod constant;
mod inc_dec;
mod item;
mod jump;
mod list;
mod literal;
mod stmt;
mod try_catch;
mod unary;
mod variable;

pub use concat::{ConcatChunk, chunk_operands, flatten_operands};
pub use try_catch::{HOST_EXCEPTION_TYPE, UNCATCHABLE_EXCEPTION_TYPE};

use crate::compiler::access::{AccessType, ExpressionContext};
use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::{AccessSelector, CodeGenerator};
use crate::compiler::error::{CompileError, CompileResult, InternalFault};
use crate::compiler::opcode::OpCode;
use crate::compiler::evaluation::Evaluation;
use crate::compiler::registry::{ExprHandle, RegistryBuilder, StmtHandle};
use crate::compiler::type_code::PhpTypeCode;
use crate::parser::ast::{Expr, NodeKind, Stmt};
use std::sync::Arc;

pub trait ExprCompiler: Send + Sync {
    fn analyze(
        &self,
        expr: Expr,
        ctx: ExpressionContext,
        analyzer: &mut Analyzer<'_, '_>,
    ) -> CompileResult<Evaluation>;

    /// Emit the node according to its `access`, returning what was left on the stack.
    fn emit(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode>;

    fn lvalue(&self) -> Option<&dyn LValueCompiler> {
        None
    }
}

pub trait StmtCompiler: Send + Sync {
    fn analyze(&self, stmt: Stmt, analyzer: &mut Analyzer<'_, '_>) -> CompileResult<Stmt>;

    fn emit(&self, stmt: &Stmt, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()>;
}

/// Storage-designating expressions, emitted in two halves.
///
/// `emit_prepare` pushes the addressing operands (none for a variable, array and key
/// for an item) for the half selected by [`CodeGenerator::access_selector`]. Preparing
/// the same node for writing and then for reading inside one chain evaluates each
/// side-effecting operand once.
pub trait LValueCompiler: Send + Sync {
    fn emit_prepare(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()>;

    /// [prepared...] -> value
    fn emit_load(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode>;

    /// [prepared..., value] -> ()
    fn emit_store(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()>;

    /// Push a reference to the location, creating it if needed.
    fn emit_load_ref(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode>;

    /// Push the array stored at the location for in-place writes, creating it if needed.
    fn emit_array_for_write(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<PhpTypeCode>;

    fn emit_unset(&self, expr: &Expr, cg: &mut CodeGenerator<'_, '_>) -> CompileResult<()>;
}

/// `emit` of an l-value used as a plain expression.
pub(crate) fn emit_lvalue_read(
    lvalue: &dyn LValueCompiler,
    expr: &Expr,
    cg: &mut CodeGenerator<'_, '_>,
) -> CompileResult<PhpTypeCode> {
    match expr.access {
        AccessType::Read => {
            cg.emit_prepare(expr, AccessSelector::Read)?;
            lvalue.emit_load(expr, cg)
        }
        // the callee may bind by reference; a by-value parameter dereferences
        AccessType::ReadRef | AccessType::ReadUnknown => lvalue.emit_load_ref(expr, cg),
        AccessType::None => {
            cg.emit_prepare(expr, AccessSelector::Read)?;
            lvalue.emit_load(expr, cg)?;
            cg.emit_op(OpCode::Pop)?;
            Ok(PhpTypeCode::Void)
        }
        other => Err(InternalFault::UnsupportedAccess {
            kind: expr.node_kind(),
            access: format!("{:?}", other),
        }
        .into()),
    }
}

/// Every node kind the standard registry knows.
pub const ALL_KINDS: &[NodeKind] = &[
    NodeKind::Literal,
    NodeKind::Array,
    NodeKind::Concat,
    NodeKind::Binary,
    NodeKind::Unary,
    NodeKind::IncDec,
    NodeKind::Conditional,
    NodeKind::List,
    NodeKind::Variable,
    NodeKind::Item,
    NodeKind::Assign,
    NodeKind::Call,
    NodeKind::Constant,
    NodeKind::ExpressionStmt,
    NodeKind::Echo,
    NodeKind::Block,
    NodeKind::If,
    NodeKind::While,
    NodeKind::Jump,
    NodeKind::Goto,
    NodeKind::Label,
    NodeKind::Try,
    NodeKind::Throw,
    NodeKind::Unset,
    NodeKind::ConstDecl,
    NodeKind::FunctionDecl,
    NodeKind::Empty,
];

pub(crate) fn wrong_kind(kind: NodeKind, found: NodeKind) -> CompileError {
    InternalFault::WrongCompilerKind { kind, found }.into()
}

fn new_expr<C: ExprCompiler + Default + 'static>() -> ExprHandle {
    Arc::new(C::default())
}

fn new_stmt<C: StmtCompiler + Default + 'static>() -> StmtHandle {
    Arc::new(C::default())
}

/// Register the compiler of every node kind.
pub fn register_standard(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .register_expr(NodeKind::Literal, new_expr::<literal::LiteralCompiler>, true)
        .register_expr(NodeKind::Array, new_expr::<array::ArrayCompiler>, false)
        .register_expr(NodeKind::Concat, new_expr::<concat::ConcatCompiler>, true)
        .register_expr(NodeKind::Binary, new_expr::<binary::BinaryCompiler>, true)
        .register_expr(NodeKind::Unary, new_expr::<unary::UnaryCompiler>, true)
        .register_expr(NodeKind::IncDec, new_expr::<inc_dec::IncDecCompiler>, true)
        .register_expr(NodeKind::Conditional, new_expr::<conditional::ConditionalCompiler>, true)
        .register_expr(NodeKind::List, new_expr::<list::ListCompiler>, true)
        .register_expr(NodeKind::Variable, new_expr::<variable::VariableCompiler>, true)
        .register_expr(NodeKind::Item, new_expr::<item::ItemCompiler>, true)
        .register_expr(NodeKind::Assign, new_expr::<assign::AssignCompiler>, true)
        .register_expr(NodeKind::Call, new_expr::<call::CallCompiler>, true)
        .register_expr(NodeKind::Constant, new_expr::<constant::ConstantCompiler>, true)
        .register_stmt(NodeKind::ExpressionStmt, new_stmt::<stmt::ExpressionStmtCompiler>, true)
        .register_stmt(NodeKind::Echo, new_stmt::<stmt::EchoCompiler>, true)
        .register_stmt(NodeKind::Block, new_stmt::<stmt::BlockCompiler>, true)
        .register_stmt(NodeKind::If, new_stmt::<stmt::IfCompiler>, true)
        .register_stmt(NodeKind::While, new_stmt::<stmt::WhileCompiler>, true)
        .register_stmt(NodeKind::Jump, new_stmt::<jump::JumpCompiler>, true)
        .register_stmt(NodeKind::Goto, new_stmt::<jump::GotoCompiler>, true)
        .register_stmt(NodeKind::Label, new_stmt::<jump::LabelCompiler>, false)
        .register_stmt(NodeKind::Try, new_stmt::<try_catch::TryCompiler>, true)
        .register_stmt(NodeKind::Throw, new_stmt::<stmt::ThrowCompiler>, true)
        .register_stmt(NodeKind::Unset, new_stmt::<stmt::UnsetCompiler>, true)
        .register_stmt(NodeKind::ConstDecl, new_stmt::<stmt::ConstDeclCompiler>, true)
        .register_stmt(NodeKind::FunctionDecl, new_stmt::<stmt::FunctionDeclCompiler>, true)
        .register_stmt(NodeKind::Empty, new_stmt::<stmt::EmptyCompiler>, true)
}
