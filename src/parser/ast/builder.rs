//! Programmatic AST construction.
//!
//! Parsers hand the compiler a finished [`CompilationUnit`]; the builder gives every node
//! a fresh [`NodeId`] and, unless a span is set explicitly with [`Expr::at`] /
//! [`Stmt::at`], a distinct synthetic one-byte span.

use super::*;

#[derive(Debug, Default)]
pub struct AstBuilder {
    ids: NodeIds,
    cursor: usize,
}

impl Expr {
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl Stmt {
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_span(&mut self) -> Span {
        let span = Span::new(self.cursor, self.cursor + 1);
        self.cursor += 1;
        span
    }

    pub fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.ids.next(),
            span: self.next_span(),
            access: AccessType::None,
            kind,
        }
    }

    pub fn stmt(&mut self, kind: StmtKind) -> Stmt {
        Stmt {
            id: self.ids.next(),
            span: self.next_span(),
            kind,
        }
    }

    pub fn finish(self, name: &str, statements: Vec<Stmt>) -> CompilationUnit {
        CompilationUnit {
            name: name.to_string(),
            statements,
            ids: self.ids,
            span: Span::new(0, self.cursor),
        }
    }

    // Expressions

    pub fn lit(&mut self, value: Val) -> Expr {
        self.expr(ExprKind::Literal(value))
    }

    pub fn null(&mut self) -> Expr {
        self.lit(Val::Null)
    }

    pub fn bool(&mut self, value: bool) -> Expr {
        self.lit(Val::Bool(value))
    }

    pub fn int(&mut self, value: i64) -> Expr {
        self.lit(Val::integer(value))
    }

    pub fn double(&mut self, value: f64) -> Expr {
        self.lit(Val::Double(value))
    }

    pub fn string(&mut self, value: &str) -> Expr {
        self.lit(Val::String(value.to_string()))
    }

    pub fn bytes(&mut self, value: &[u8]) -> Expr {
        self.lit(Val::Bytes(value.to_vec()))
    }

    pub fn var(&mut self, name: &str) -> Expr {
        self.expr(ExprKind::Variable {
            name: name.to_string(),
        })
    }

    pub fn item(&mut self, array: Expr, index: Expr) -> Expr {
        self.expr(ExprKind::Item {
            array: Box::new(array),
            index: Some(Box::new(index)),
        })
    }

    /// `$array[]`
    pub fn append(&mut self, array: Expr) -> Expr {
        self.expr(ExprKind::Item {
            array: Box::new(array),
            index: None,
        })
    }

    pub fn array(&mut self, items: Vec<(Option<Expr>, Expr)>) -> Expr {
        let items = items
            .into_iter()
            .map(|(key, value)| {
                let span = match &key {
                    Some(key) => key.span.merge(value.span),
                    None => value.span,
                };
                ArrayItem { key, value, span }
            })
            .collect();
        self.expr(ExprKind::Array { items })
    }

    /// Array of values with implicit keys.
    pub fn list_array(&mut self, values: Vec<Expr>) -> Expr {
        self.array(values.into_iter().map(|value| (None, value)).collect())
    }

    pub fn concat(&mut self, operands: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Concat { operands })
    }

    pub fn binary(&mut self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unary(&mut self, op: UnaryOp, expr: Expr) -> Expr {
        self.expr(ExprKind::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn inc_dec(&mut self, inc: bool, post: bool, target: Expr) -> Expr {
        self.expr(ExprKind::IncDec {
            inc,
            post,
            target: Box::new(target),
        })
    }

    pub fn pre_inc(&mut self, target: Expr) -> Expr {
        self.inc_dec(true, false, target)
    }

    pub fn post_inc(&mut self, target: Expr) -> Expr {
        self.inc_dec(true, true, target)
    }

    pub fn pre_dec(&mut self, target: Expr) -> Expr {
        self.inc_dec(false, false, target)
    }

    pub fn post_dec(&mut self, target: Expr) -> Expr {
        self.inc_dec(false, true, target)
    }

    pub fn ternary(&mut self, condition: Expr, if_true: Expr, if_false: Expr) -> Expr {
        self.expr(ExprKind::Conditional {
            condition: Box::new(condition),
            if_true: Some(Box::new(if_true)),
            if_false: Box::new(if_false),
        })
    }

    /// `condition ?: if_false`
    pub fn shortcut(&mut self, condition: Expr, if_false: Expr) -> Expr {
        self.expr(ExprKind::Conditional {
            condition: Box::new(condition),
            if_true: None,
            if_false: Box::new(if_false),
        })
    }

    pub fn list(&mut self, targets: Vec<ListItem>, value: Expr) -> Expr {
        self.expr(ExprKind::List {
            targets,
            value: Box::new(value),
        })
    }

    pub fn assign(&mut self, target: Expr, value: Expr) -> Expr {
        self.expr(ExprKind::Assign {
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub fn call(&mut self, name: &str, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            name: name.to_string(),
            args,
        })
    }

    pub fn constant(&mut self, name: &str) -> Expr {
        self.expr(ExprKind::Constant {
            name: name.to_string(),
        })
    }

    // Statements

    pub fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expression { expr })
    }

    pub fn echo(&mut self, exprs: Vec<Expr>) -> Stmt {
        self.stmt(StmtKind::Echo { exprs })
    }

    pub fn block(&mut self, statements: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::Block { statements })
    }

    pub fn if_(&mut self, condition: Expr, then_block: Vec<Stmt>, else_block: Option<Vec<Stmt>>) -> Stmt {
        self.stmt(StmtKind::If {
            condition,
            then_block,
            else_block,
        })
    }

    pub fn while_(&mut self, condition: Expr, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::While { condition, body })
    }

    pub fn break_(&mut self, level: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Jump {
            kind: JumpKind::Break,
            expr: level,
        })
    }

    pub fn continue_(&mut self, level: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Jump {
            kind: JumpKind::Continue,
            expr: level,
        })
    }

    pub fn ret(&mut self, expr: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Jump {
            kind: JumpKind::Return,
            expr,
        })
    }

    pub fn goto(&mut self, label: &str) -> Stmt {
        self.stmt(StmtKind::Goto {
            label: label.to_string(),
        })
    }

    pub fn label(&mut self, name: &str) -> Stmt {
        self.stmt(StmtKind::Label {
            name: name.to_string(),
        })
    }

    pub fn try_(&mut self, body: Vec<Stmt>, catches: Vec<Catch>, finally: Option<Vec<Stmt>>) -> Stmt {
        self.stmt(StmtKind::Try {
            body,
            catches,
            finally,
        })
    }

    pub fn catch(&mut self, type_name: &str, var: Option<&str>, body: Vec<Stmt>) -> Catch {
        Catch {
            type_name: type_name.to_string(),
            var: var.map(str::to_string),
            body,
            span: self.next_span(),
            resolved_type: None,
        }
    }

    pub fn throw(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Throw { expr })
    }

    pub fn unset(&mut self, vars: Vec<Expr>) -> Stmt {
        self.stmt(StmtKind::Unset { vars })
    }

    pub fn const_decl(&mut self, name: &str, value: Expr) -> Stmt {
        self.stmt(StmtKind::ConstDecl {
            name: name.to_string(),
            value,
        })
    }

    pub fn function(&mut self, name: &str, by_ref: bool, params: Vec<Param>, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::FunctionDecl(FunctionDecl {
            name: name.to_string(),
            by_ref,
            params,
            body,
            unreachable: false,
        }))
    }

    pub fn param(name: &str, by_ref: bool) -> Param {
        Param {
            name: name.to_string(),
            by_ref,
        }
    }

    pub fn empty(&mut self) -> Stmt {
        self.stmt(StmtKind::Empty(EmptyKind::Source))
    }
}
