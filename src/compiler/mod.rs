pub mod access;
pub mod analyzer;
pub mod chunk;
pub mod codegen;
pub mod declarations;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod evaluation;
pub mod nodes;
pub mod opcode;
pub mod options;
pub mod registry;
pub mod runtime;
pub mod sink;
pub mod symbols;
pub mod type_code;

pub use access::{AccessType, ExpressionContext};
pub use chunk::CodeChunk;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, ErrorSink, Severity};
pub use driver::{AnalyzedUnit, CompiledUnit, Compiler, compile_unit};
pub use error::{CompileError, CompileResult, InternalFault, SinkError};
pub use evaluation::Evaluation;
pub use options::CompileOptions;
pub use registry::Registry;
pub use sink::InstructionSink;
pub use symbols::{FunctionSignature, StaticSymbols, SymbolResolver};
pub use type_code::PhpTypeCode;
