use super::CodeGenerator;
use crate::compiler::error::CompileResult;
use crate::compiler::opcode::{OpCode, Temp};
use crate::compiler::type_code::PhpTypeCode;
use crate::parser::ast::{Expr, ExprKind, NodeId};
use std::collections::HashMap;

/// State of one member-access chain (`$a[f()][g()] = ...`).
///
/// An l-value may be prepared twice, once for reading and once for writing. Operands
/// with side effects are evaluated on the first pass only and kept in temporaries.
#[derive(Debug, Default)]
pub struct ChainBuilder {
    quiet: bool,
    cache: HashMap<NodeId, (Temp, PhpTypeCode)>,
}

impl ChainBuilder {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            cache: HashMap::new(),
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}

/// Operands that can be re-emitted without observable effect.
fn is_pure_operand(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Literal(_) | ExprKind::Variable { .. })
}

impl CodeGenerator<'_, '_> {
    pub fn begin_chain(&mut self, quiet: bool) {
        self.chains.push(ChainBuilder::new(quiet));
    }

    pub fn end_chain(&mut self) {
        if let Some(chain) = self.chains.pop() {
            for (temp, _) in chain.cache.into_values() {
                self.return_temp(temp);
            }
        }
    }

    /// Missing items are read without a notice (`unset`, `list`).
    pub fn chain_is_quiet(&self) -> bool {
        self.chains.last().is_some_and(ChainBuilder::is_quiet)
    }

    /// Emit an index or container operand of the current chain, boxed.
    pub fn emit_chain_operand(&mut self, expr: &Expr) -> CompileResult<PhpTypeCode> {
        if is_pure_operand(expr) || self.chains.is_empty() {
            return self.emit_boxed(expr);
        }

        let cached = self.chains.last().and_then(|c| c.cache.get(&expr.id).copied());
        if let Some((temp, code)) = cached {
            self.emit_op(OpCode::LoadTemp(temp))?;
            return Ok(code);
        }

        let code = self.emit_boxed(expr)?;
        let temp = self.declare_temp()?;
        self.emit_op(OpCode::Dup)?;
        self.emit_op(OpCode::StoreTemp(temp))?;
        if let Some(chain) = self.chains.last_mut() {
            chain.cache.insert(expr.id, (temp, code));
        }
        Ok(code)
    }
}
