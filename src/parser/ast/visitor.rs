use super::*;

/// Read-only traversal over the owned AST.
pub trait Visitor {
    fn visit_unit(&mut self, unit: &CompilationUnit) {
        walk_unit(self, unit);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_catch(&mut self, catch: &Catch) {
        walk_statements(self, &catch.body);
    }

    fn visit_function(&mut self, decl: &FunctionDecl, _span: Span) {
        walk_statements(self, &decl.body);
    }

    fn visit_list_item(&mut self, item: &ListItem) {
        walk_list_item(self, item);
    }
}

pub fn walk_unit<V: Visitor + ?Sized>(visitor: &mut V, unit: &CompilationUnit) {
    walk_statements(visitor, &unit.statements);
}

pub fn walk_statements<V: Visitor + ?Sized>(visitor: &mut V, statements: &[Stmt]) {
    for stmt in statements {
        visitor.visit_stmt(stmt);
    }
}

fn walk_exprs<V: Visitor + ?Sized>(visitor: &mut V, exprs: &[Expr]) {
    for expr in exprs {
        visitor.visit_expr(expr);
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Expression { expr } | StmtKind::Throw { expr } => visitor.visit_expr(expr),
        StmtKind::Echo { exprs } | StmtKind::Unset { vars: exprs } => walk_exprs(visitor, exprs),
        StmtKind::Block { statements } => walk_statements(visitor, statements),
        StmtKind::If {
            condition,
            then_block,
            else_block,
        } => {
            visitor.visit_expr(condition);
            walk_statements(visitor, then_block);
            if let Some(else_block) = else_block {
                walk_statements(visitor, else_block);
            }
        }
        StmtKind::While { condition, body } => {
            visitor.visit_expr(condition);
            walk_statements(visitor, body);
        }
        StmtKind::Jump { expr, .. } => {
            if let Some(expr) = expr {
                visitor.visit_expr(expr);
            }
        }
        StmtKind::Try {
            body,
            catches,
            finally,
        } => {
            walk_statements(visitor, body);
            for catch in catches {
                visitor.visit_catch(catch);
            }
            if let Some(finally) = finally {
                walk_statements(visitor, finally);
            }
        }
        StmtKind::ConstDecl { value, .. } => visitor.visit_expr(value),
        StmtKind::FunctionDecl(decl) => visitor.visit_function(decl, stmt.span),
        StmtKind::Goto { .. } | StmtKind::Label { .. } | StmtKind::Empty(_) => {}
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Variable { .. } | ExprKind::Constant { .. } => {}
        ExprKind::Array { items } => {
            for item in items {
                if let Some(key) = &item.key {
                    visitor.visit_expr(key);
                }
                visitor.visit_expr(&item.value);
            }
        }
        ExprKind::Concat { operands } => walk_exprs(visitor, operands),
        ExprKind::Call { args, .. } => walk_exprs(visitor, args),
        ExprKind::Binary { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        ExprKind::Unary { expr, .. } => visitor.visit_expr(expr),
        ExprKind::IncDec { target, .. } => visitor.visit_expr(target),
        ExprKind::Conditional {
            condition,
            if_true,
            if_false,
        } => {
            visitor.visit_expr(condition);
            if let Some(if_true) = if_true {
                visitor.visit_expr(if_true);
            }
            visitor.visit_expr(if_false);
        }
        ExprKind::List { targets, value } => {
            for item in targets {
                visitor.visit_list_item(item);
            }
            visitor.visit_expr(value);
        }
        ExprKind::Item { array, index } => {
            visitor.visit_expr(array);
            if let Some(index) = index {
                visitor.visit_expr(index);
            }
        }
        ExprKind::Assign { target, value } => {
            visitor.visit_expr(target);
            visitor.visit_expr(value);
        }
    }
}

pub fn walk_list_item<V: Visitor + ?Sized>(visitor: &mut V, item: &ListItem) {
    match item {
        ListItem::Skip => {}
        ListItem::Target(expr) => visitor.visit_expr(expr),
        ListItem::Nested(items) => {
            for item in items {
                visitor.visit_list_item(item);
            }
        }
    }
}
