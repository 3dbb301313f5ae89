//! Function discovery ahead of the Analyze pass.

use crate::compiler::diagnostics::{DiagnosticKind, ErrorSink};
use crate::compiler::symbols::{FunctionSignature, SymbolResolver};
use crate::parser::ast::visitor::{Visitor, walk_statements, walk_stmt};
use crate::parser::ast::{CompilationUnit, FunctionDecl, Stmt, StmtKind};
use crate::parser::span::Span;
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

/// Collects every function the unit declares, nested and dead ones included, so calls
/// that precede a declaration still see its by-reference parameters.
///
/// A declaration inside an `if`, loop, `try` or function body only takes effect when
/// that code runs, so the same name may appear in several branches. Only two
/// unconditional declarations of one name, or an unconditional one shadowing a known
/// function, are redeclarations.
pub struct DeclarationCollector<'r, 'e> {
    resolver: &'r dyn SymbolResolver,
    errors: &'e mut dyn ErrorSink,
    functions: IndexMap<String, FunctionSignature>,
    unconditional: IndexSet<String>,
    conditional_depth: usize,
}

impl<'r, 'e> DeclarationCollector<'r, 'e> {
    pub fn new(resolver: &'r dyn SymbolResolver, errors: &'e mut dyn ErrorSink) -> Self {
        Self {
            resolver,
            errors,
            functions: IndexMap::new(),
            unconditional: IndexSet::new(),
            conditional_depth: 0,
        }
    }

    /// Declared functions keyed by lowercase name. The first declaration of a name wins.
    pub fn collect(mut self, unit: &CompilationUnit) -> IndexMap<String, FunctionSignature> {
        self.visit_unit(unit);
        debug!(functions = self.functions.len(), "collected declarations");
        self.functions
    }

    fn conditionally<F: FnOnce(&mut Self)>(&mut self, f: F) {
        self.conditional_depth += 1;
        f(self);
        self.conditional_depth -= 1;
    }
}

impl Visitor for DeclarationCollector<'_, '_> {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt.kind {
            StmtKind::If { .. } | StmtKind::While { .. } | StmtKind::Try { .. } => {
                self.conditionally(|this| walk_stmt(this, stmt))
            }
            _ => walk_stmt(self, stmt),
        }
    }

    fn visit_function(&mut self, decl: &FunctionDecl, span: Span) {
        let key = decl.name.to_ascii_lowercase();
        let conditional = self.conditional_depth > 0;
        let known = self.resolver.resolve_function(&decl.name).is_some();

        if !conditional && (known || self.unconditional.contains(&key)) {
            self.errors.report(
                DiagnosticKind::FunctionRedeclared {
                    name: decl.name.clone(),
                },
                span,
            );
        } else {
            if !conditional {
                self.unconditional.insert(key.clone());
            }
            if !known && !self.functions.contains_key(&key) {
                let by_ref: Vec<bool> = decl.params.iter().map(|p| p.by_ref).collect();
                let mut signature = FunctionSignature::new(&decl.name).with_params(&by_ref);
                signature.returns_ref = decl.by_ref;
                self.functions.insert(key, signature);
            } else {
                debug!(name = %decl.name, "conditional declaration of a known name");
            }
        }
        self.conditionally(|this| walk_statements(this, &decl.body));
    }
}
