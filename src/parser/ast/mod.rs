use crate::compiler::access::AccessType;
use crate::core::value::Val;
use crate::parser::span::Span;
use serde::Serialize;

pub mod builder;
pub mod visitor;

/// Stable identifier of a node within one compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub u32);

/// Allocator for [`NodeId`]s. Owned by the unit; the analyzer keeps allocating
/// from it for replacement nodes.
#[derive(Debug, Default, Clone)]
pub struct NodeIds {
    next: u32,
}

impl NodeIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    pub fn allocated(&self) -> usize {
        self.next as usize
    }
}

/// Root handed over by the parser.
#[derive(Debug, Serialize)]
pub struct CompilationUnit {
    pub name: String,
    pub statements: Vec<Stmt>,
    #[serde(skip)]
    pub ids: NodeIds,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    /// Set by the analyzer from the parent's context, read by emission.
    pub access: AccessType,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, Serialize)]
pub enum ExprKind {
    Literal(Val),
    Array {
        items: Vec<ArrayItem>,
    },
    /// N-ary `.`; nested concatenations are flattened into one operand list.
    Concat {
        operands: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    IncDec {
        inc: bool,
        post: bool,
        target: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        if_true: Option<Box<Expr>>, // None for `?:`
        if_false: Box<Expr>,
    },
    List {
        targets: Vec<ListItem>,
        value: Box<Expr>,
    },
    Variable {
        name: String,
    },
    Item {
        array: Box<Expr>,
        index: Option<Box<Expr>>, // None for `$a[]`
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Constant {
        name: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ArrayItem {
    pub key: Option<Expr>,
    pub value: Expr,
    pub span: Span,
}

/// One position of a `list(...)` target.
#[derive(Debug, Clone, Serialize)]
pub enum ListItem {
    Skip,
    Target(Expr),
    Nested(Vec<ListItem>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Identical,
    NotIdentical,
    LessThan,
    GreaterThan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Plus,
    Minus,
    LogicNot,
    BitNot,
    Silence, // @
    Print,
    Clone,
    IntCast,
    DoubleCast,
    StringCast,
    BinaryCast,
    BoolCast,
    UnsetCast,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, Serialize)]
pub enum StmtKind {
    Expression {
        expr: Expr,
    },
    Echo {
        exprs: Vec<Expr>,
    },
    Block {
        statements: Vec<Stmt>,
    },
    If {
        condition: Expr,
        then_block: Vec<Stmt>,
        else_block: Option<Vec<Stmt>>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    Jump {
        kind: JumpKind,
        expr: Option<Expr>,
    },
    Goto {
        label: String,
    },
    Label {
        name: String,
    },
    Try {
        body: Vec<Stmt>,
        catches: Vec<Catch>,
        finally: Option<Vec<Stmt>>,
    },
    Throw {
        expr: Expr,
    },
    Unset {
        vars: Vec<Expr>,
    },
    ConstDecl {
        name: String,
        value: Expr,
    },
    FunctionDecl(FunctionDecl),
    Empty(EmptyKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JumpKind {
    Break,
    Continue,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmptyKind {
    /// Replaces a statement found in dead code.
    Unreachable,
    /// Replaces a statement with no runtime effect.
    Skipped,
    /// A `;` in the source.
    Source,
}

#[derive(Debug, Clone, Serialize)]
pub struct Catch {
    pub type_name: String,
    pub var: Option<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
    /// Canonical class name, filled in by analysis.
    pub resolved_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDecl {
    pub name: String,
    pub by_ref: bool,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    /// Set by analysis when the declaration sits in dead code.
    pub unreachable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Param {
    pub name: String,
    pub by_ref: bool,
}

/// Discriminant used to look up a node's compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Literal,
    Array,
    Concat,
    Binary,
    Unary,
    IncDec,
    Conditional,
    List,
    Variable,
    Item,
    Assign,
    Call,
    Constant,
    ExpressionStmt,
    Echo,
    Block,
    If,
    While,
    Jump,
    Goto,
    Label,
    Try,
    Throw,
    Unset,
    ConstDecl,
    FunctionDecl,
    Empty,
}

impl Expr {
    pub fn node_kind(&self) -> NodeKind {
        match self.kind {
            ExprKind::Literal(_) => NodeKind::Literal,
            ExprKind::Array { .. } => NodeKind::Array,
            ExprKind::Concat { .. } => NodeKind::Concat,
            ExprKind::Binary { .. } => NodeKind::Binary,
            ExprKind::Unary { .. } => NodeKind::Unary,
            ExprKind::IncDec { .. } => NodeKind::IncDec,
            ExprKind::Conditional { .. } => NodeKind::Conditional,
            ExprKind::List { .. } => NodeKind::List,
            ExprKind::Variable { .. } => NodeKind::Variable,
            ExprKind::Item { .. } => NodeKind::Item,
            ExprKind::Assign { .. } => NodeKind::Assign,
            ExprKind::Call { .. } => NodeKind::Call,
            ExprKind::Constant { .. } => NodeKind::Constant,
        }
    }

    /// Literal value carried by the node, if it is a literal.
    pub fn value(&self) -> Option<&Val> {
        match &self.kind {
            ExprKind::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Variables and array items: nodes that designate a storage location.
    pub fn is_var_like(&self) -> bool {
        matches!(self.kind, ExprKind::Variable { .. } | ExprKind::Item { .. })
    }
}

impl Stmt {
    pub fn node_kind(&self) -> NodeKind {
        match self.kind {
            StmtKind::Expression { .. } => NodeKind::ExpressionStmt,
            StmtKind::Echo { .. } => NodeKind::Echo,
            StmtKind::Block { .. } => NodeKind::Block,
            StmtKind::If { .. } => NodeKind::If,
            StmtKind::While { .. } => NodeKind::While,
            StmtKind::Jump { .. } => NodeKind::Jump,
            StmtKind::Goto { .. } => NodeKind::Goto,
            StmtKind::Label { .. } => NodeKind::Label,
            StmtKind::Try { .. } => NodeKind::Try,
            StmtKind::Throw { .. } => NodeKind::Throw,
            StmtKind::Unset { .. } => NodeKind::Unset,
            StmtKind::ConstDecl { .. } => NodeKind::ConstDecl,
            StmtKind::FunctionDecl(_) => NodeKind::FunctionDecl,
            StmtKind::Empty(_) => NodeKind::Empty,
        }
    }

    /// Declarations are analyzed even in dead code so forward references resolve.
    pub fn is_declaration(&self) -> bool {
        matches!(self.kind, StmtKind::FunctionDecl(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, StmtKind::Empty(_))
    }

    /// Whether a `goto` can enter this statement: it is a label, or a block or `if`
    /// branch holds one. Loop and `try` bodies cannot be jumped into.
    pub fn contains_label(&self) -> bool {
        match &self.kind {
            StmtKind::Label { .. } => true,
            StmtKind::Block { statements } => statements.iter().any(Stmt::contains_label),
            StmtKind::If {
                then_block,
                else_block,
                ..
            } => then_block
                .iter()
                .chain(else_block.iter().flatten())
                .any(Stmt::contains_label),
            _ => false,
        }
    }
}
