//! The Analyze pass.
//!
//! Walks the unit top-down, dispatching every node to its compiler. Besides the node
//! rewrites the compilers perform, the analyzer owns the unit-wide state they consult:
//! reachability, conditional nesting, loop nesting and the per-routine label tables.

use crate::compiler::access::ExpressionContext;
use crate::compiler::diagnostics::{DiagnosticKind, ErrorSink};
use crate::compiler::error::CompileResult;
use crate::compiler::evaluation::Evaluation;
use crate::compiler::options::CompileOptions;
use crate::compiler::registry::{CompilerTable, Registry};
use crate::compiler::symbols::{FunctionSignature, SymbolResolver};
use crate::core::value::Val;
use crate::parser::ast::{EmptyKind, Expr, NodeIds, Stmt, StmtKind};
use crate::parser::span::Span;
use indexmap::IndexMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

/// Shared between the label table and the label statement's compiler.
#[derive(Debug, Default)]
pub struct LabelState {
    referenced: AtomicBool,
}

impl LabelState {
    pub fn is_referenced(&self) -> bool {
        self.referenced.load(Ordering::Relaxed)
    }

    fn mark_referenced(&self) {
        self.referenced.store(true, Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct LabelEntry {
    state: Arc<LabelState>,
    defined_at: Option<Span>,
    first_goto: Option<Span>,
}

#[derive(Debug)]
struct RoutineScope {
    returns_ref: bool,
    labels: IndexMap<String, LabelEntry>,
    saved_loop_depth: usize,
    saved_cond_level: usize,
    saved_unreachable: bool,
    saved_reported: bool,
}

impl RoutineScope {
    fn new(returns_ref: bool) -> Self {
        Self {
            returns_ref,
            labels: IndexMap::new(),
            saved_loop_depth: 0,
            saved_cond_level: 0,
            saved_unreachable: false,
            saved_reported: false,
        }
    }
}

/// Reachability snapshot, used to analyze dead branches without disturbing the
/// surrounding state.
#[derive(Debug, Clone, Copy)]
pub struct Reachability {
    unreachable: bool,
    reported: bool,
}

pub struct Analyzer<'r, 'e> {
    compilers: CompilerTable<'r>,
    ids: NodeIds,
    resolver: &'r dyn SymbolResolver,
    errors: &'e mut dyn ErrorSink,
    options: &'r CompileOptions,
    unreachable: bool,
    unreachable_reported: bool,
    cond_level: usize,
    loop_depth: usize,
    scopes: Vec<RoutineScope>,
    functions: IndexMap<String, FunctionSignature>,
    constants: IndexMap<String, (Val, Span)>,
}

impl<'r, 'e> Analyzer<'r, 'e> {
    pub fn new(
        registry: &'r Registry,
        resolver: &'r dyn SymbolResolver,
        errors: &'e mut dyn ErrorSink,
        options: &'r CompileOptions,
        ids: NodeIds,
    ) -> Self {
        Self {
            compilers: CompilerTable::new(registry),
            ids,
            resolver,
            errors,
            options,
            unreachable: false,
            unreachable_reported: false,
            cond_level: 0,
            loop_depth: 0,
            scopes: vec![RoutineScope::new(false)],
            functions: IndexMap::new(),
            constants: IndexMap::new(),
        }
    }

    /// Functions declared by the unit itself, keyed by lowercase name.
    pub fn with_declared_functions(mut self, functions: IndexMap<String, FunctionSignature>) -> Self {
        self.functions = functions;
        self
    }

    // Dispatch

    pub fn analyze_expr(&mut self, mut expr: Expr, ctx: ExpressionContext) -> CompileResult<Evaluation> {
        expr.access = ctx.access;
        let compiler = self.compilers.expr_compiler(&expr)?;
        let evaluation = compiler.analyze(expr, ctx, self)?;
        if let Some(value) = evaluation.value() {
            trace!(%value, "expression has a compile-time value");
        }
        Ok(evaluation)
    }

    /// Analyze and replace a compile-time value by a literal node.
    pub fn analyze_literalized(&mut self, expr: Expr, ctx: ExpressionContext) -> CompileResult<Expr> {
        let evaluation = self.analyze_expr(expr, ctx)?;
        Ok(self.literalize(evaluation))
    }

    pub fn analyze_stmt(&mut self, stmt: Stmt) -> CompileResult<Stmt> {
        if matches!(stmt.kind, StmtKind::Label { .. }) {
            // jump target: whatever precedes it, the label itself is reachable
            self.leave_unreachable();
        } else if self.unreachable
            && !stmt.is_declaration()
            && !stmt.is_empty()
            && !stmt.contains_label()
        {
            self.report_unreachable(stmt.span);
            return Ok(self.empty_stmt(stmt.span, EmptyKind::Unreachable));
        }

        trace!(kind = ?stmt.node_kind(), "analyze statement");
        let compiler = self.compilers.stmt_compiler(&stmt)?;
        compiler.analyze(stmt, self)
    }

    pub fn analyze_statements(&mut self, statements: Vec<Stmt>) -> CompileResult<Vec<Stmt>> {
        statements
            .into_iter()
            .map(|stmt| self.analyze_stmt(stmt))
            .collect()
    }

    /// Analyze statements whose result is discarded (a branch that can never run).
    /// Declarations inside are still seen, nothing is reported.
    pub fn analyze_dead_statements(&mut self, statements: Vec<Stmt>) -> CompileResult<()> {
        let saved = self.reachability();
        self.unreachable = true;
        self.unreachable_reported = true;
        let result = self.analyze_statements(statements);
        self.restore_reachability(saved);
        result.map(|_| ())
    }

    pub fn literalize(&mut self, evaluation: Evaluation) -> Expr {
        evaluation.literalize(&mut self.ids)
    }

    /// Fold a unary operation unless constant folding is disabled.
    pub fn evaluate<F>(&mut self, evaluation: Evaluation, fold: F) -> (Expr, Option<Val>)
    where
        F: FnOnce(&Val) -> Option<Val>,
    {
        if self.options.fold_constants {
            evaluation.evaluate(&mut self.ids, fold)
        } else {
            (self.literalize(evaluation), None)
        }
    }

    pub fn evaluate_pair<F>(&mut self, left: Evaluation, right: Evaluation, fold: F) -> (Expr, Expr, Option<Val>)
    where
        F: FnOnce(&Val, &Val) -> Option<Val>,
    {
        if self.options.fold_constants {
            Evaluation::evaluate_pair(left, right, &mut self.ids, fold)
        } else {
            let left = self.literalize(left);
            let right = self.literalize(right);
            (left, right, None)
        }
    }

    pub fn fold_constants(&self) -> bool {
        self.options.fold_constants
    }

    pub fn options(&self) -> &'r CompileOptions {
        self.options
    }

    pub fn ids(&mut self) -> &mut NodeIds {
        &mut self.ids
    }

    pub fn empty_stmt(&mut self, span: Span, kind: EmptyKind) -> Stmt {
        Stmt {
            id: self.ids.next(),
            span,
            kind: StmtKind::Empty(kind),
        }
    }

    pub fn report(&mut self, kind: DiagnosticKind, span: Span) {
        debug!(%kind, start = span.start, "diagnostic");
        self.errors.report(kind, span);
    }

    // Reachability

    pub fn is_unreachable(&self) -> bool {
        self.unreachable
    }

    pub fn enter_unreachable(&mut self) {
        if !self.unreachable {
            debug!("entering unreachable code");
            self.unreachable = true;
            self.unreachable_reported = false;
        }
    }

    pub fn leave_unreachable(&mut self) {
        if self.unreachable {
            debug!("leaving unreachable code");
        }
        self.unreachable = false;
        self.unreachable_reported = false;
    }

    fn report_unreachable(&mut self, span: Span) {
        if !self.unreachable_reported {
            self.unreachable_reported = true;
            if self.options.report_unreachable {
                self.report(DiagnosticKind::UnreachableCode, span);
            }
        }
    }

    pub fn reachability(&self) -> Reachability {
        Reachability {
            unreachable: self.unreachable,
            reported: self.unreachable_reported,
        }
    }

    pub fn restore_reachability(&mut self, saved: Reachability) {
        self.unreachable = saved.unreachable;
        self.unreachable_reported = saved.reported;
    }

    pub fn cond_level(&self) -> usize {
        self.cond_level
    }

    pub fn enter_conditional(&mut self) {
        self.cond_level += 1;
    }

    /// Leaving a conditional branch also ends any dead region inside it: the code
    /// after the branch is reachable through the other path.
    pub fn leave_conditional(&mut self) {
        debug_assert!(self.cond_level > 0, "unbalanced conditional code");
        self.cond_level = self.cond_level.saturating_sub(1);
        self.leave_unreachable();
    }

    pub fn loop_depth(&self) -> usize {
        self.loop_depth
    }

    pub fn enter_loop_body(&mut self) {
        self.loop_depth += 1;
        self.enter_conditional();
    }

    pub fn leave_loop_body(&mut self) {
        debug_assert!(self.loop_depth > 0, "unbalanced loop body");
        self.loop_depth = self.loop_depth.saturating_sub(1);
        self.leave_conditional();
    }

    // Routines and labels

    pub fn enter_routine(&mut self, returns_ref: bool) {
        let mut scope = RoutineScope::new(returns_ref);
        scope.saved_loop_depth = std::mem::take(&mut self.loop_depth);
        scope.saved_cond_level = std::mem::take(&mut self.cond_level);
        scope.saved_unreachable = std::mem::take(&mut self.unreachable);
        scope.saved_reported = std::mem::take(&mut self.unreachable_reported);
        self.scopes.push(scope);
    }

    pub fn leave_routine(&mut self) {
        if self.scopes.len() <= 1 {
            debug_assert!(false, "leave_routine without enter_routine");
            return;
        }
        if let Some(scope) = self.scopes.pop() {
            self.finalize_labels(&scope);
            self.loop_depth = scope.saved_loop_depth;
            self.cond_level = scope.saved_cond_level;
            self.unreachable = scope.saved_unreachable;
            self.unreachable_reported = scope.saved_reported;
        }
    }

    pub fn routine_returns_ref(&self) -> bool {
        self.scopes.last().is_some_and(|s| s.returns_ref)
    }

    fn labels(&mut self) -> &mut IndexMap<String, LabelEntry> {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last].labels
    }

    /// Record a `goto`; the label may be defined later.
    pub fn goto_label(&mut self, name: &str, span: Span) {
        let entry = self
            .labels()
            .entry(name.to_string())
            .or_insert_with(|| LabelEntry {
                state: Arc::new(LabelState::default()),
                defined_at: None,
                first_goto: Some(span),
            });
        entry.state.mark_referenced();
        if entry.defined_at.is_none() {
            debug!(label = name, "forward goto, label pending");
        }
    }

    /// Define a label. Returns `None` (after reporting) if the name is already defined
    /// in this routine.
    pub fn define_label(&mut self, name: &str, span: Span) -> Option<Arc<LabelState>> {
        let entry = self
            .labels()
            .entry(name.to_string())
            .or_insert_with(|| LabelEntry {
                state: Arc::new(LabelState::default()),
                defined_at: None,
                first_goto: None,
            });
        match entry.defined_at {
            Some(original) => {
                self.report(
                    DiagnosticKind::LabelRedeclared {
                        name: name.to_string(),
                    },
                    span,
                );
                self.report(DiagnosticKind::RelatedLocation, original);
                None
            }
            None => {
                entry.defined_at = Some(span);
                debug!(label = name, "label defined");
                Some(entry.state.clone())
            }
        }
    }

    fn finalize_labels(&mut self, scope: &RoutineScope) {
        for (name, entry) in &scope.labels {
            if entry.defined_at.is_none() {
                let span = entry.first_goto.unwrap_or_default();
                self.report(DiagnosticKind::UndefinedLabel { name: name.clone() }, span);
            }
        }
    }

    /// Validate the top-level label table. Call once after the unit's statements.
    pub fn finish(mut self) -> (CompilerTable<'r>, NodeIds) {
        while self.scopes.len() > 1 {
            self.leave_routine();
        }
        if let Some(scope) = self.scopes.pop() {
            self.finalize_labels(&scope);
        }
        (self.compilers, self.ids)
    }

    // Symbols

    pub fn resolver(&self) -> &'r dyn SymbolResolver {
        self.resolver
    }

    pub fn resolve_function(&self, name: &str) -> Option<FunctionSignature> {
        let name = name.strip_prefix('\\').unwrap_or(name);
        self.functions
            .get(&name.to_ascii_lowercase())
            .cloned()
            .or_else(|| self.resolver.resolve_function(name))
    }

    pub fn resolve_constant(&self, name: &str) -> Option<Val> {
        match self.constants.get(name) {
            Some((value, _)) => Some(value.clone()),
            None => self.resolver.resolve_constant(name),
        }
    }

    /// Canonical type name, or the spelled name with a warning if unknown.
    pub fn resolve_type_name(&mut self, name: &str, span: Span) -> String {
        match self.resolver.resolve_type_name(name) {
            Some(resolved) => resolved,
            None => {
                self.report(
                    DiagnosticKind::UnknownType {
                        name: name.to_string(),
                    },
                    span,
                );
                name.strip_prefix('\\').unwrap_or(name).to_string()
            }
        }
    }

    /// Record a global constant. Reports and returns `false` on redeclaration.
    pub fn declare_constant(&mut self, name: &str, value: Val, span: Span) -> bool {
        let known = self.constants.contains_key(name) || self.resolver.resolve_constant(name).is_some();
        if known {
            self.report(
                DiagnosticKind::ConstantRedeclared {
                    name: name.to_string(),
                },
                span,
            );
            return false;
        }
        self.constants.insert(name.to_string(), (value, span));
        true
    }
}
