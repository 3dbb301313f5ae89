//! Unit-level driver: declaration discovery, Analyze, then Emit.

use crate::compiler::analyzer::Analyzer;
use crate::compiler::codegen::CodeGenerator;
use crate::compiler::declarations::DeclarationCollector;
use crate::compiler::diagnostics::{DiagnosticKind, ErrorSink, Severity};
use crate::compiler::error::CompileResult;
use crate::compiler::options::CompileOptions;
use crate::compiler::registry::{CompilerTable, Registry};
use crate::compiler::sink::InstructionSink;
use crate::compiler::symbols::SymbolResolver;
use crate::parser::ast::{CompilationUnit, Stmt};
use crate::parser::span::Span;
use tracing::{debug, info, instrument};

/// Forwards to another sink, counting error-severity diagnostics.
struct CountingSink<'e> {
    inner: &'e mut dyn ErrorSink,
    errors: usize,
}

impl ErrorSink for CountingSink<'_> {
    fn report(&mut self, kind: DiagnosticKind, span: Span) {
        if kind.severity() == Severity::Error {
            self.errors += 1;
        }
        self.inner.report(kind, span);
    }
}

/// Compiles units against one registry and one set of options.
#[derive(Clone, Copy)]
pub struct Compiler<'r> {
    registry: &'r Registry,
    options: &'r CompileOptions,
}

impl<'r> Compiler<'r> {
    /// Compiler using the process-wide standard registry.
    pub fn new(options: &'r CompileOptions) -> Self {
        Self::with_registry(Registry::standard(), options)
    }

    pub fn with_registry(registry: &'r Registry, options: &'r CompileOptions) -> Self {
        Self { registry, options }
    }

    /// Run declaration discovery and the Analyze pass.
    pub fn analyze<'a>(
        &self,
        unit: CompilationUnit,
        resolver: &'a dyn SymbolResolver,
        errors: &mut dyn ErrorSink,
    ) -> CompileResult<AnalyzedUnit<'a>>
    where
        'r: 'a,
    {
        let mut counting = CountingSink { inner: errors, errors: 0 };
        let functions = DeclarationCollector::new(resolver, &mut counting).collect(&unit);

        let CompilationUnit {
            name,
            statements,
            ids,
            ..
        } = unit;
        let mut analyzer = Analyzer::new(self.registry, resolver, &mut counting, self.options, ids)
            .with_declared_functions(functions);
        let statements = analyzer.analyze_statements(statements)?;
        let (compilers, ids) = analyzer.finish();

        debug!(
            errors = counting.errors,
            attached = compilers.attached(),
            nodes = ids.allocated(),
            "analysis finished"
        );
        Ok(AnalyzedUnit {
            name,
            statements,
            compilers,
            options: self.options,
            error_count: counting.errors,
        })
    }

    /// Analyze, then emit into `sink` unless analysis reported errors.
    pub fn compile(
        &self,
        unit: CompilationUnit,
        resolver: &dyn SymbolResolver,
        sink: &mut dyn InstructionSink,
        errors: &mut dyn ErrorSink,
    ) -> CompileResult<CompiledUnit> {
        let analyzed = self.analyze(unit, resolver, errors)?;
        if analyzed.has_errors() {
            info!(
                unit = %analyzed.name,
                errors = analyzed.error_count,
                "emission skipped"
            );
            return Ok(analyzed.skip_emission());
        }
        analyzed.emit(sink, errors)
    }
}

/// Output of the Analyze pass, ready for emission.
pub struct AnalyzedUnit<'r> {
    name: String,
    statements: Vec<Stmt>,
    compilers: CompilerTable<'r>,
    options: &'r CompileOptions,
    error_count: usize,
}

impl<'r> AnalyzedUnit<'r> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn statements(&self) -> &[Stmt] {
        &self.statements
    }

    /// Whether analysis reported any error-severity diagnostic.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Emit the unit's top-level routine, regardless of analysis errors.
    pub fn emit(self, sink: &mut dyn InstructionSink, errors: &mut dyn ErrorSink) -> CompileResult<CompiledUnit> {
        let mut cg = CodeGenerator::new(sink, self.compilers, errors, self.options);
        cg.emit_routine(&self.statements, false)?;
        Ok(CompiledUnit {
            name: self.name,
            statements: self.statements,
            emitted: true,
        })
    }

    fn skip_emission(self) -> CompiledUnit {
        CompiledUnit {
            name: self.name,
            statements: self.statements,
            emitted: false,
        }
    }
}

/// A unit that went through the pipeline.
#[derive(Debug)]
pub struct CompiledUnit {
    pub name: String,
    /// The analyzed tree.
    pub statements: Vec<Stmt>,
    /// `false` when analysis errors suppressed emission.
    pub emitted: bool,
}

/// Compile one unit with the standard registry.
///
/// Units are independent: several may be compiled concurrently as long as each has its
/// own sink and error sink.
#[instrument(skip_all, name = "compile_unit", fields(unit = %unit.name, statements = unit.statements.len()))]
pub fn compile_unit(
    unit: CompilationUnit,
    resolver: &dyn SymbolResolver,
    sink: &mut dyn InstructionSink,
    errors: &mut dyn ErrorSink,
    options: &CompileOptions,
) -> CompileResult<CompiledUnit> {
    Compiler::new(options).compile(unit, resolver, sink, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::chunk::CodeChunk;
    use crate::compiler::diagnostics::Diagnostics;
    use crate::compiler::opcode::OpCode;
    use crate::compiler::symbols::StaticSymbols;
    use crate::parser::ast::EmptyKind;
    use crate::parser::ast::StmtKind;
    use crate::parser::ast::builder::AstBuilder;

    #[test]
    fn empty_unit_returns_null() {
        let unit = AstBuilder::new().finish("empty.php", vec![]);
        let mut chunk = CodeChunk::new("main");
        let mut errors = Diagnostics::new();
        let compiled = compile_unit(
            unit,
            &StaticSymbols::new(),
            &mut chunk,
            &mut errors,
            &CompileOptions::default(),
        )
        .unwrap();

        assert!(compiled.emitted);
        assert!(errors.is_empty());
        assert!(matches!(chunk.code[..], [OpCode::Const(_), OpCode::Return]));
    }

    #[test]
    fn analysis_errors_suppress_emission() {
        let mut b = AstBuilder::new();
        let brk = b.break_(None);
        let unit = b.finish("t.php", vec![brk]);
        let mut chunk = CodeChunk::new("main");
        let mut errors = Diagnostics::new();
        let compiled = compile_unit(
            unit,
            &StaticSymbols::new(),
            &mut chunk,
            &mut errors,
            &CompileOptions::default(),
        )
        .unwrap();

        assert!(!compiled.emitted);
        assert!(chunk.is_empty());
        assert_eq!(
            errors.kinds(),
            vec![&DiagnosticKind::InvalidBreakLevel { level: 1 }]
        );
    }

    #[test]
    fn forced_emission_after_warnings_only() {
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let stmt = b.expr_stmt(one);
        let unit = b.finish("t.php", vec![stmt]);
        let options = CompileOptions::default();
        let symbols = StaticSymbols::new();
        let mut errors = Diagnostics::new();

        let analyzed = Compiler::new(&options)
            .analyze(unit, &symbols, &mut errors)
            .unwrap();
        assert!(!analyzed.has_errors());
        assert!(matches!(
            analyzed.statements()[0].kind,
            StmtKind::Empty(EmptyKind::Skipped)
        ));

        let mut chunk = CodeChunk::new("main");
        let compiled = analyzed.emit(&mut chunk, &mut errors).unwrap();
        assert!(compiled.emitted);
    }
}
