use crate::parser::ast::NodeId;
use serde::{Deserialize, Serialize};

/// How a parent uses the value of a child expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AccessType {
    /// Value is discarded.
    #[default]
    None,
    Read,
    Write,
    /// Compound assignment, increment and decrement.
    ReadAndWrite,
    ReadRef,
    WriteRef,
    /// Argument of a call whose signature is not known statically.
    ReadUnknown,
    WriteAndReadRef,
    WriteAndReadUnknown,
    ReadAndWriteAndReadRef,
    ReadAndWriteAndReadUnknown,
}

impl AccessType {
    pub fn is_read(self) -> bool {
        !matches!(self, AccessType::None | AccessType::Write | AccessType::WriteRef)
    }

    /// Any member of the write family. Only l-value kinds may receive these.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            AccessType::Write
                | AccessType::ReadAndWrite
                | AccessType::WriteRef
                | AccessType::WriteAndReadRef
                | AccessType::WriteAndReadUnknown
                | AccessType::ReadAndWriteAndReadRef
                | AccessType::ReadAndWriteAndReadUnknown
        )
    }

    pub fn is_read_ref(self) -> bool {
        matches!(
            self,
            AccessType::ReadRef | AccessType::WriteAndReadRef | AccessType::ReadAndWriteAndReadRef
        )
    }

    pub fn is_unknown(self) -> bool {
        matches!(
            self,
            AccessType::ReadUnknown
                | AccessType::WriteAndReadUnknown
                | AccessType::ReadAndWriteAndReadUnknown
        )
    }

    /// Access a member-access chain imposes on its container: anything written through
    /// `$a[..]` needs `$a` both read and written.
    pub fn container_access(self) -> AccessType {
        if self.is_write() || self.is_read_ref() {
            AccessType::ReadAndWrite
        } else if self == AccessType::None {
            AccessType::None
        } else {
            AccessType::Read
        }
    }
}

/// What a parent asks of a child during analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpressionContext {
    pub access: AccessType,
    /// The requesting node, for the few kinds that special-case their parent.
    pub parent: Option<NodeId>,
}

impl Default for ExpressionContext {
    fn default() -> Self {
        Self::READ
    }
}

impl ExpressionContext {
    pub const READ: ExpressionContext = ExpressionContext {
        access: AccessType::Read,
        parent: None,
    };

    pub const NONE: ExpressionContext = ExpressionContext {
        access: AccessType::None,
        parent: None,
    };

    pub fn new(access: AccessType) -> Self {
        Self {
            access,
            parent: None,
        }
    }

    pub fn with_access(self, access: AccessType) -> Self {
        Self { access, ..self }
    }

    pub fn with_parent(self, parent: NodeId) -> Self {
        Self {
            parent: Some(parent),
            ..self
        }
    }
}
