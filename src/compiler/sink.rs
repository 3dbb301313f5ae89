use crate::compiler::error::SinkError;
use crate::compiler::opcode::{Label, OpCode, Temp};
use crate::core::value::Val;
use crate::parser::ast::Param;
use crate::parser::span::Span;

/// Target backend driven by the code generator.
///
/// Exception regions follow the host model: `begin_try` opens a guarded block and
/// returns the label that follows the whole region; every `begin_catch` /
/// `begin_finally` closes the previous block with an implicit leave to that label;
/// `end_region` closes the last block and marks the label.
pub trait InstructionSink {
    fn emit(&mut self, op: OpCode) -> Result<(), SinkError>;

    /// Intern a literal, returning its index for [`OpCode::Const`].
    fn add_constant(&mut self, value: Val) -> Result<u16, SinkError>;

    fn define_label(&mut self) -> Label;
    fn mark_label(&mut self, label: Label) -> Result<(), SinkError>;

    fn declare_temp(&mut self) -> Result<Temp, SinkError>;
    fn return_temp(&mut self, temp: Temp);

    fn begin_try(&mut self) -> Result<Label, SinkError>;
    /// Start a handler for exceptions of the host type `type_name`. The caught
    /// exception is on the stack when the handler starts.
    fn begin_catch(&mut self, type_name: &str) -> Result<(), SinkError>;
    fn begin_finally(&mut self) -> Result<(), SinkError>;
    fn end_region(&mut self) -> Result<(), SinkError>;

    /// Attribute the following instructions to `span`.
    fn mark_sequence_point(&mut self, span: Span);

    /// Open a nested routine body. Labels and temps are routine-local.
    fn begin_function(&mut self, name: &str, returns_ref: bool, params: &[Param]) -> Result<(), SinkError>;
    fn end_function(&mut self) -> Result<(), SinkError>;
}
