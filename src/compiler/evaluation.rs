use crate::core::value::Val;
use crate::parser::ast::{Expr, ExprKind, NodeIds};

/// Result of analyzing an expression.
///
/// Either the expression has a compile-time value (`Value`, which still carries the
/// analyzed node so a parent that cannot fold can fall back to it) or it is a
/// residual node that must be emitted.
#[derive(Debug, Clone)]
pub enum Evaluation {
    Value { value: Val, node: Expr },
    Residual(Expr),
}

impl Evaluation {
    pub fn residual(node: Expr) -> Self {
        Evaluation::Residual(node)
    }

    pub fn with_value(node: Expr, value: Val) -> Self {
        Evaluation::Value { value, node }
    }

    /// `Value` when `value` is present, `Residual` otherwise.
    pub fn from_parts(node: Expr, value: Option<Val>) -> Self {
        match value {
            Some(value) => Evaluation::Value { value, node },
            None => Evaluation::Residual(node),
        }
    }

    pub fn has_value(&self) -> bool {
        matches!(self, Evaluation::Value { .. })
    }

    pub fn value(&self) -> Option<&Val> {
        match self {
            Evaluation::Value { value, .. } => Some(value),
            Evaluation::Residual(_) => None,
        }
    }

    pub fn node(&self) -> &Expr {
        match self {
            Evaluation::Value { node, .. } | Evaluation::Residual(node) => node,
        }
    }

    /// The analyzed node, without literal replacement.
    pub fn into_node(self) -> Expr {
        match self {
            Evaluation::Value { node, .. } | Evaluation::Residual(node) => node,
        }
    }

    /// Turn a compile-time value into a literal node, reusing the span and access
    /// of the analyzed node. Used when the parent cannot continue folding.
    pub fn literalize(self, ids: &mut NodeIds) -> Expr {
        match self {
            Evaluation::Value { value, node } => {
                if matches!(node.kind, ExprKind::Literal(_)) {
                    return node;
                }
                Expr {
                    id: ids.next(),
                    span: node.span,
                    access: node.access,
                    kind: ExprKind::Literal(value),
                }
            }
            Evaluation::Residual(node) => node,
        }
    }

    /// Fold a unary operation. Returns the child to keep in the parent (literalized if
    /// folding is not possible) and the parent's folded value, if any.
    pub fn evaluate<F>(self, ids: &mut NodeIds, fold: F) -> (Expr, Option<Val>)
    where
        F: FnOnce(&Val) -> Option<Val>,
    {
        match self {
            Evaluation::Value { value, node } => match fold(&value) {
                Some(result) => (node, Some(result)),
                None => (Evaluation::Value { value, node }.literalize(ids), None),
            },
            Evaluation::Residual(node) => (node, None),
        }
    }

    /// Fold a binary operation over two evaluations.
    pub fn evaluate_pair<F>(
        left: Evaluation,
        right: Evaluation,
        ids: &mut NodeIds,
        fold: F,
    ) -> (Expr, Expr, Option<Val>)
    where
        F: FnOnce(&Val, &Val) -> Option<Val>,
    {
        let folded = match (left.value(), right.value()) {
            (Some(l), Some(r)) => fold(l, r),
            _ => None,
        };
        match folded {
            Some(result) => (left.into_node(), right.into_node(), Some(result)),
            None => (left.literalize(ids), right.literalize(ids), None),
        }
    }

    /// Fold without replacing the child: the parent keeps the analyzed node as is.
    pub fn read_only_evaluate<F>(&self, fold: F) -> Option<Val>
    where
        F: FnOnce(&Val) -> Option<Val>,
    {
        self.value().and_then(fold)
    }
}
