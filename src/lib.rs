//! Semantic analysis and code generation core of a PHP compiler.
//!
//! The upstream parser hands over a [`CompilationUnit`](parser::ast::CompilationUnit);
//! [`compile_unit`](compiler::compile_unit) analyzes it and drives an
//! [`InstructionSink`](compiler::InstructionSink) with the lowered routine.

pub mod compiler;
pub mod core;
pub mod parser;
