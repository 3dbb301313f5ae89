use crate::parser::ast::NodeKind;
use crate::parser::span::Span;
use thiserror::Error;

/// Failure that aborts compilation of a unit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("internal compiler error: {0}")]
    Internal(#[from] InternalFault),
    #[error("code generation failed: {0}")]
    Backend(#[from] SinkError),
    /// Already surfaced as a diagnostic at `span`.
    #[error("compilation aborted at {}..{}: {source}", .span.start, .span.end)]
    Reported {
        span: Span,
        #[source]
        source: Box<CompileError>,
    },
}

impl CompileError {
    pub fn is_reported(&self) -> bool {
        matches!(self, CompileError::Reported { .. })
    }

    /// The innermost fault.
    pub fn root(&self) -> &CompileError {
        match self {
            CompileError::Reported { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Violated compiler invariant. Never caused by user code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalFault {
    #[error("no compiler registered for {0:?} nodes")]
    UnregisteredKind(NodeKind),
    #[error("{kind:?} node does not support {access} access")]
    UnsupportedAccess { kind: NodeKind, access: String },
    #[error("unexpected type code {found} (expected {expected})")]
    UnexpectedTypeCode { expected: String, found: String },
    #[error("{0:?} node is not an l-value")]
    NotAnLValue(NodeKind),
    #[error("break/continue to level {level} with only {depth} enclosing loops")]
    BranchOutsideLoop { level: usize, depth: usize },
    #[error("label `{0}` was never defined")]
    UndefinedLabel(String),
    #[error("compiler for {kind:?} was invoked on a {found:?} node")]
    WrongCompilerKind { kind: NodeKind, found: NodeKind },
}

/// Failure reported by an [`InstructionSink`](crate::compiler::sink::InstructionSink).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("backend resource exhausted: {0}")]
    ResourceExhausted(&'static str),
    #[error("label {0} is not defined in this routine")]
    InvalidLabel(u32),
    #[error("unbalanced exception region: {0}")]
    UnbalancedRegion(&'static str),
    #[error("{0}")]
    Other(String),
}

pub type CompileResult<T> = Result<T, CompileError>;
