//! Node-kind to compiler dispatch.
//!
//! Every node kind is registered once with a factory. Kinds whose compiler carries no
//! per-node state share a single instance; the others get a fresh instance per node,
//! memoized in the unit's [`CompilerTable`] so the same object sees both passes.

use crate::compiler::error::{CompileResult, InternalFault};
use crate::compiler::nodes::{self, ExprCompiler, StmtCompiler};
use crate::parser::ast::{Expr, NodeId, NodeKind, Stmt};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Arc;

pub type ExprHandle = Arc<dyn ExprCompiler>;
pub type StmtHandle = Arc<dyn StmtCompiler>;
pub type ExprFactory = fn() -> ExprHandle;
pub type StmtFactory = fn() -> StmtHandle;

enum Entry<H> {
    Singleton(H),
    PerNode(fn() -> H),
}

impl<H> Entry<H> {
    fn is_singleton(&self) -> bool {
        matches!(self, Entry::Singleton(_))
    }
}

lazy_static! {
    static ref STANDARD: Registry = nodes::register_standard(Registry::builder()).build();
}

/// Immutable dispatch table, safe to share between units compiled concurrently.
#[derive(Default)]
pub struct Registry {
    exprs: HashMap<NodeKind, Entry<ExprHandle>>,
    stmts: HashMap<NodeKind, Entry<StmtHandle>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            registry: Registry::default(),
        }
    }

    /// Registry with the compiler of every node kind.
    pub fn standard() -> &'static Registry {
        &STANDARD
    }

    pub fn is_registered(&self, kind: NodeKind) -> bool {
        self.exprs.contains_key(&kind) || self.stmts.contains_key(&kind)
    }

    /// `Some(true)` for shared compilers, `Some(false)` for per-node ones.
    pub fn is_singleton(&self, kind: NodeKind) -> Option<bool> {
        self.exprs
            .get(&kind)
            .map(Entry::is_singleton)
            .or_else(|| self.stmts.get(&kind).map(Entry::is_singleton))
    }
}

pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    pub fn register_expr(mut self, kind: NodeKind, factory: ExprFactory, is_singleton: bool) -> Self {
        let entry = if is_singleton {
            Entry::Singleton(factory())
        } else {
            Entry::PerNode(factory)
        };
        self.registry.exprs.insert(kind, entry);
        self
    }

    pub fn register_stmt(mut self, kind: NodeKind, factory: StmtFactory, is_singleton: bool) -> Self {
        let entry = if is_singleton {
            Entry::Singleton(factory())
        } else {
            Entry::PerNode(factory)
        };
        self.registry.stmts.insert(kind, entry);
        self
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}

/// Per-unit view of a [`Registry`] holding the memoized per-node compilers.
pub struct CompilerTable<'r> {
    registry: &'r Registry,
    exprs: HashMap<NodeId, (NodeKind, ExprHandle)>,
    stmts: HashMap<NodeId, (NodeKind, StmtHandle)>,
}

impl<'r> CompilerTable<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            exprs: HashMap::new(),
            stmts: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn expr_compiler(&mut self, expr: &Expr) -> CompileResult<ExprHandle> {
        let kind = expr.node_kind();
        match self.registry.exprs.get(&kind) {
            Some(Entry::Singleton(handle)) => Ok(handle.clone()),
            Some(Entry::PerNode(factory)) => {
                let (attached, handle) = self
                    .exprs
                    .entry(expr.id)
                    .or_insert_with(|| (kind, factory()));
                if *attached != kind {
                    return Err(InternalFault::WrongCompilerKind {
                        kind: *attached,
                        found: kind,
                    }
                    .into());
                }
                Ok(handle.clone())
            }
            None => Err(unregistered(kind)),
        }
    }

    pub fn stmt_compiler(&mut self, stmt: &Stmt) -> CompileResult<StmtHandle> {
        let kind = stmt.node_kind();
        match self.registry.stmts.get(&kind) {
            Some(Entry::Singleton(handle)) => Ok(handle.clone()),
            Some(Entry::PerNode(factory)) => {
                let (attached, handle) = self
                    .stmts
                    .entry(stmt.id)
                    .or_insert_with(|| (kind, factory()));
                if *attached != kind {
                    return Err(InternalFault::WrongCompilerKind {
                        kind: *attached,
                        found: kind,
                    }
                    .into());
                }
                Ok(handle.clone())
            }
            None => Err(unregistered(kind)),
        }
    }

    /// Number of per-node compilers attached so far.
    pub fn attached(&self) -> usize {
        self.exprs.len() + self.stmts.len()
    }
}

fn unregistered(kind: NodeKind) -> crate::compiler::error::CompileError {
    tracing::error!(?kind, "no compiler registered for node kind");
    InternalFault::UnregisteredKind(kind).into()
}
