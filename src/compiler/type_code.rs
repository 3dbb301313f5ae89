use crate::core::value::Val;
use serde::Serialize;
use std::fmt;

/// Category of the value left on the operand stack by an emitted sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PhpTypeCode {
    Void,
    /// Boxed, generic representation.
    Object,
    String,
    Bytes,
    Integer,
    LongInteger,
    Double,
    Boolean,
    ArrayHandle,
    ReferenceCell,
    Unknown,
}

impl PhpTypeCode {
    pub fn of_literal(value: &Val) -> PhpTypeCode {
        match value {
            Val::Null => PhpTypeCode::Object,
            Val::Bool(_) => PhpTypeCode::Boolean,
            Val::Int(_) => PhpTypeCode::Integer,
            Val::Long(_) => PhpTypeCode::LongInteger,
            Val::Double(_) => PhpTypeCode::Double,
            Val::String(_) => PhpTypeCode::String,
            Val::Bytes(_) => PhpTypeCode::Bytes,
        }
    }

    /// Unboxed primitives that need a boxing instruction before generic use.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            PhpTypeCode::Boolean | PhpTypeCode::Integer | PhpTypeCode::LongInteger | PhpTypeCode::Double
        )
    }

    /// Whether something is left on the stack.
    pub fn is_value(self) -> bool {
        !matches!(self, PhpTypeCode::Void | PhpTypeCode::Unknown)
    }

    /// Values that may hold an array at runtime and so are subject to the copy policy.
    pub fn may_be_array(self) -> bool {
        matches!(
            self,
            PhpTypeCode::Object | PhpTypeCode::ArrayHandle | PhpTypeCode::Unknown
        )
    }
}

impl fmt::Display for PhpTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhpTypeCode::Void => "void",
            PhpTypeCode::Object => "object",
            PhpTypeCode::String => "string",
            PhpTypeCode::Bytes => "bytes",
            PhpTypeCode::Integer => "int32",
            PhpTypeCode::LongInteger => "int64",
            PhpTypeCode::Double => "double",
            PhpTypeCode::Boolean => "bool",
            PhpTypeCode::ArrayHandle => "array",
            PhpTypeCode::ReferenceCell => "reference",
            PhpTypeCode::Unknown => "unknown",
        };
        f.write_str(name)
    }
}
