//! Value-semantics primitives emitted code calls into.
//!
//! The compiler only emits calls; a backend binds every [`RuntimeOp`] to its runtime
//! library. Each op pops [`RuntimeOp::arity`] operands and pushes a value of
//! [`RuntimeOp::result`] (nothing for `Void`).

use crate::compiler::type_code::PhpTypeCode;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RuntimeOp {
    // Concatenation, specialised on the operand representation
    ConcatStrStr,
    ConcatStrObj,
    ConcatObjStr,
    ConcatObjObj,
    ConcatBytesBytes,
    ConcatBytesObj,
    ConcatObjBytes,
    /// Concatenate every element of a value array.
    ConcatN,

    // Conversions
    ToString,
    ToBytes,
    ToBool,
    ToLong,
    ToDouble,

    // Copy policy and value operators
    DeepCopy,
    Increment,
    Decrement,
    Clone,
    Plus,
    Negate,
    BitNot,
    LogicNot,
    Add,
    Sub,
    Mul,
    Identical,
    NotIdentical,
    LessThan,
    GreaterThan,

    // Arrays: [array, key] operands
    GetItem,
    GetItemQuiet,
    /// Fetch a nested array for writing, creating it when missing.
    GetItemForWrite,
    GetItemRef,
    /// Append a fresh array to [array] and push it for writing.
    AppendArray,
    /// Append a fresh slot to [array] and push a reference to it.
    AppendReference,
    /// [array, key, value]
    SetItem,
    /// [array, value]
    Append,
    UnsetItem,
    IsArrayLike,
    IsBytes,

    // References
    Dereference,
    NewReference,
    NewReferenceEmpty,
    /// Flags a returned array so the caller takes it over instead of copying it.
    MarkInplaceCopyOnReturn,

    // Exceptions and misc
    /// Unwrap a caught host exception into the user-visible exception object.
    WrapHostException,
    ThrowInvalidBreakLevel,
    Echo,
    Print,
    BeginSilence,
    EndSilence,
}

impl RuntimeOp {
    pub fn arity(self) -> usize {
        use RuntimeOp::*;
        match self {
            NewReferenceEmpty | BeginSilence | EndSilence => 0,
            ConcatN | ToString | ToBytes | ToBool | ToLong | ToDouble | DeepCopy | Increment
            | Decrement | Clone | Plus | Negate | BitNot | LogicNot | IsArrayLike | IsBytes
            | Dereference | NewReference | MarkInplaceCopyOnReturn | AppendArray
            | AppendReference | WrapHostException
            | ThrowInvalidBreakLevel | Echo | Print => 1,
            ConcatStrStr | ConcatStrObj | ConcatObjStr | ConcatObjObj | ConcatBytesBytes
            | ConcatBytesObj | ConcatObjBytes | Add | Sub | Mul | Identical | NotIdentical
            | LessThan | GreaterThan | GetItem | GetItemQuiet | GetItemForWrite | GetItemRef
            | Append | UnsetItem => 2,
            SetItem => 3,
        }
    }

    pub fn result(self) -> PhpTypeCode {
        use RuntimeOp::*;
        match self {
            ConcatStrStr | ToString => PhpTypeCode::String,
            ConcatBytesBytes | ConcatBytesObj | ConcatObjBytes | ToBytes => PhpTypeCode::Bytes,
            ConcatStrObj | ConcatObjStr | ConcatObjObj | ConcatN => PhpTypeCode::Object,
            ToBool | LogicNot | Identical | NotIdentical | LessThan | GreaterThan
            | IsArrayLike | IsBytes => PhpTypeCode::Boolean,
            ToLong => PhpTypeCode::LongInteger,
            ToDouble => PhpTypeCode::Double,
            Print => PhpTypeCode::Integer,
            DeepCopy | Increment | Decrement | Clone | Plus | Negate | BitNot | Add | Sub | Mul
            | GetItem | GetItemQuiet | Dereference | WrapHostException => PhpTypeCode::Object,
            GetItemForWrite | AppendArray => PhpTypeCode::ArrayHandle,
            GetItemRef | AppendReference | NewReference | NewReferenceEmpty => PhpTypeCode::ReferenceCell,
            SetItem | Append | UnsetItem | MarkInplaceCopyOnReturn | ThrowInvalidBreakLevel
            | Echo | BeginSilence | EndSilence => PhpTypeCode::Void,
        }
    }

    pub fn name(self) -> &'static str {
        use RuntimeOp::*;
        match self {
            ConcatStrStr => "concat_str_str",
            ConcatStrObj => "concat_str_obj",
            ConcatObjStr => "concat_obj_str",
            ConcatObjObj => "concat_obj_obj",
            ConcatBytesBytes => "concat_bytes_bytes",
            ConcatBytesObj => "concat_bytes_obj",
            ConcatObjBytes => "concat_obj_bytes",
            ConcatN => "concat_n",
            ToString => "to_string",
            ToBytes => "to_bytes",
            ToBool => "to_bool",
            ToLong => "to_long",
            ToDouble => "to_double",
            DeepCopy => "deep_copy",
            Increment => "increment",
            Decrement => "decrement",
            Clone => "clone",
            Plus => "plus",
            Negate => "negate",
            BitNot => "bit_not",
            LogicNot => "logic_not",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Identical => "identical",
            NotIdentical => "not_identical",
            LessThan => "less_than",
            GreaterThan => "greater_than",
            GetItem => "get_item",
            GetItemQuiet => "get_item_quiet",
            GetItemForWrite => "get_item_for_write",
            GetItemRef => "get_item_ref",
            AppendArray => "append_array",
            AppendReference => "append_reference",
            SetItem => "set_item",
            Append => "append",
            UnsetItem => "unset_item",
            IsArrayLike => "is_array_like",
            IsBytes => "is_bytes",
            Dereference => "dereference",
            NewReference => "new_reference",
            NewReferenceEmpty => "new_reference_empty",
            MarkInplaceCopyOnReturn => "mark_inplace_copy_on_return",
            WrapHostException => "wrap_host_exception",
            ThrowInvalidBreakLevel => "throw_invalid_break_level",
            Echo => "echo",
            Print => "print",
            BeginSilence => "begin_silence",
            EndSilence => "end_silence",
        }
    }
}
