use crate::compiler::error::SinkError;
use crate::compiler::opcode::{Label, OpCode, Temp};
use crate::compiler::sink::InstructionSink;
use crate::core::value::Val;
use crate::parser::ast::Param;
use crate::parser::span::Span;
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HandlerKind {
    Catch(String),
    Finally,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handler {
    pub kind: HandlerKind,
    pub start: u32,
    pub end: u32, // exclusive
}

/// A closed exception region. Regions are stored innermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionRegion {
    pub try_start: u32,
    pub try_end: u32,
    pub handlers: Vec<Handler>,
    pub end: u32,
}

impl ExceptionRegion {
    pub fn finally(&self) -> Option<&Handler> {
        self.handlers
            .iter()
            .find(|h| h.kind == HandlerKind::Finally)
    }

    pub fn covers(&self, pc: u32) -> bool {
        pc >= self.try_start && pc < self.end
    }
}

#[derive(Debug, Clone)]
enum Block {
    Try,
    Catch(String),
    Finally,
}

#[derive(Debug, Clone)]
struct OpenRegion {
    try_start: u32,
    try_end: Option<u32>,
    handlers: Vec<Handler>,
    block: Block,
    block_start: u32,
    end_label: Label,
}

/// Recording [`InstructionSink`]: the emitted routine plus its nested functions.
#[derive(Debug, Default, Clone)]
pub struct CodeChunk {
    pub name: String,
    pub file_path: Option<String>,
    pub returns_ref: bool,
    pub params: Vec<Param>,
    pub code: Vec<OpCode>,
    pub constants: Vec<Val>,
    pub spans: Vec<Span>, // Source span per instruction
    pub labels: Vec<Option<u32>>,
    pub regions: Vec<ExceptionRegion>,
    pub functions: Vec<CodeChunk>,
    pub temp_count: u16,
    temp_limit: Option<u16>,
    free_temps: Vec<Temp>,
    current_span: Span,
    open_regions: Vec<OpenRegion>,
    pending: Vec<CodeChunk>,
}

impl CodeChunk {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Fail `declare_temp` once `limit` slots are in use.
    pub fn with_temp_limit(mut self, limit: u16) -> Self {
        self.temp_limit = Some(limit);
        self
    }

    pub fn label_position(&self, label: Label) -> Option<u32> {
        self.labels.get(label.0 as usize).copied().flatten()
    }

    pub fn function(&self, name: &str) -> Option<&CodeChunk> {
        self.functions
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Whether any instruction was emitted.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    fn active(&mut self) -> &mut CodeChunk {
        if self.pending.is_empty() {
            self
        } else {
            let last = self.pending.len() - 1;
            &mut self.pending[last]
        }
    }

    fn pc(&self) -> u32 {
        self.code.len() as u32
    }

    fn close_block(&mut self) -> Result<(), SinkError> {
        let pc = self.pc();
        let Some(region) = self.open_regions.last_mut() else {
            return Err(SinkError::UnbalancedRegion("no open region"));
        };
        match std::mem::replace(&mut region.block, Block::Try) {
            Block::Try => region.try_end = Some(pc),
            Block::Catch(ty) => region.handlers.push(Handler {
                kind: HandlerKind::Catch(ty),
                start: region.block_start,
                end: pc,
            }),
            Block::Finally => region.handlers.push(Handler {
                kind: HandlerKind::Finally,
                start: region.block_start,
                end: pc,
            }),
        }
        Ok(())
    }

    fn push(&mut self, op: OpCode) {
        self.code.push(op);
        self.spans.push(self.current_span);
    }

    fn open_block(&mut self, block: Block) -> Result<(), SinkError> {
        let in_finally = matches!(
            self.open_regions.last().map(|r| &r.block),
            Some(Block::Finally)
        );
        if in_finally {
            return Err(SinkError::UnbalancedRegion("handler after finally"));
        }
        let Some(end_label) = self.open_regions.last().map(|r| r.end_label) else {
            return Err(SinkError::UnbalancedRegion("handler outside of a try block"));
        };
        self.push(OpCode::Leave(end_label));
        self.close_block()?;
        let pc = self.pc();
        if let Some(region) = self.open_regions.last_mut() {
            region.block = block;
            region.block_start = pc;
        }
        Ok(())
    }

    /// Human-readable listing, one instruction per line with labels and regions.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        self.disassemble_into(&mut out);
        for function in &self.functions {
            out.push('\n');
            let _ = writeln!(
                out,
                "function {}{}({}):",
                if function.returns_ref { "&" } else { "" },
                function.name,
                function
                    .params
                    .iter()
                    .map(|p| format!("{}${}", if p.by_ref { "&" } else { "" }, p.name))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            function.disassemble_into(&mut out);
        }
        out
    }

    fn disassemble_into(&self, out: &mut String) {
        for pc in 0..=self.code.len() {
            for (label, position) in self.labels.iter().enumerate() {
                if *position == Some(pc as u32) {
                    let _ = writeln!(out, "L{}:", label);
                }
            }
            let Some(op) = self.code.get(pc) else {
                break;
            };
            match op {
                OpCode::Const(idx) => match self.constants.get(*idx as usize) {
                    Some(value) => {
                        let _ = writeln!(out, "  {:04} const {}", pc, value);
                    }
                    None => {
                        let _ = writeln!(out, "  {:04} {}", pc, op);
                    }
                },
                op => {
                    let _ = writeln!(out, "  {:04} {}", pc, op);
                }
            }
        }
        for region in &self.regions {
            let _ = write!(out, "try {}..{}", region.try_start, region.try_end);
            for handler in &region.handlers {
                match &handler.kind {
                    HandlerKind::Catch(ty) => {
                        let _ = write!(out, " catch({}) {}..{}", ty, handler.start, handler.end);
                    }
                    HandlerKind::Finally => {
                        let _ = write!(out, " finally {}..{}", handler.start, handler.end);
                    }
                }
            }
            let _ = writeln!(out, " end {}", region.end);
        }
    }
}

impl InstructionSink for CodeChunk {
    fn emit(&mut self, op: OpCode) -> Result<(), SinkError> {
        let chunk = self.active();
        if let Some(label) = op.branch_target()
            && label.0 as usize >= chunk.labels.len()
        {
            return Err(SinkError::InvalidLabel(label.0));
        }
        chunk.push(op);
        Ok(())
    }

    fn add_constant(&mut self, value: Val) -> Result<u16, SinkError> {
        let chunk = self.active();
        if let Some(idx) = chunk.constants.iter().position(|c| c == &value) {
            return Ok(idx as u16);
        }
        let idx = u16::try_from(chunk.constants.len())
            .map_err(|_| SinkError::ResourceExhausted("constant pool"))?;
        chunk.constants.push(value);
        Ok(idx)
    }

    fn define_label(&mut self) -> Label {
        let chunk = self.active();
        chunk.labels.push(None);
        Label(chunk.labels.len() as u32 - 1)
    }

    fn mark_label(&mut self, label: Label) -> Result<(), SinkError> {
        let chunk = self.active();
        let pc = chunk.pc();
        match chunk.labels.get_mut(label.0 as usize) {
            Some(slot) if slot.is_none() => {
                *slot = Some(pc);
                Ok(())
            }
            _ => Err(SinkError::InvalidLabel(label.0)),
        }
    }

    fn declare_temp(&mut self) -> Result<Temp, SinkError> {
        let chunk = self.active();
        if let Some(temp) = chunk.free_temps.pop() {
            return Ok(temp);
        }
        if chunk.temp_limit.is_some_and(|limit| chunk.temp_count >= limit)
            || chunk.temp_count == u16::MAX
        {
            return Err(SinkError::ResourceExhausted("temporaries"));
        }
        let temp = Temp(chunk.temp_count);
        chunk.temp_count += 1;
        Ok(temp)
    }

    fn return_temp(&mut self, temp: Temp) {
        let chunk = self.active();
        if !chunk.free_temps.contains(&temp) {
            chunk.free_temps.push(temp);
        }
    }

    fn begin_try(&mut self) -> Result<Label, SinkError> {
        let end_label = self.define_label();
        let chunk = self.active();
        let pc = chunk.pc();
        chunk.open_regions.push(OpenRegion {
            try_start: pc,
            try_end: None,
            handlers: Vec::new(),
            block: Block::Try,
            block_start: pc,
            end_label,
        });
        Ok(end_label)
    }

    fn begin_catch(&mut self, type_name: &str) -> Result<(), SinkError> {
        self.active().open_block(Block::Catch(type_name.to_string()))
    }

    fn begin_finally(&mut self) -> Result<(), SinkError> {
        self.active().open_block(Block::Finally)
    }

    fn end_region(&mut self) -> Result<(), SinkError> {
        let chunk = self.active();
        let Some(region) = chunk.open_regions.last() else {
            return Err(SinkError::UnbalancedRegion("no open region"));
        };
        let closing = match region.block {
            Block::Finally => OpCode::EndFinally,
            _ => OpCode::Leave(region.end_label),
        };
        if matches!(region.block, Block::Try) {
            return Err(SinkError::UnbalancedRegion("try block without handlers"));
        }
        chunk.push(closing);
        chunk.close_block()?;

        let Some(region) = chunk.open_regions.pop() else {
            return Err(SinkError::UnbalancedRegion("no open region"));
        };
        let end = chunk.pc();
        chunk.regions.push(ExceptionRegion {
            try_start: region.try_start,
            try_end: region.try_end.unwrap_or(end),
            handlers: region.handlers,
            end,
        });
        self.mark_label(region.end_label)
    }

    fn mark_sequence_point(&mut self, span: Span) {
        self.active().current_span = span;
    }

    fn begin_function(&mut self, name: &str, returns_ref: bool, params: &[Param]) -> Result<(), SinkError> {
        let mut function = CodeChunk::new(name);
        function.file_path = self.file_path.clone();
        function.returns_ref = returns_ref;
        function.params = params.to_vec();
        function.temp_limit = self.temp_limit;
        self.pending.push(function);
        Ok(())
    }

    fn end_function(&mut self) -> Result<(), SinkError> {
        let Some(function) = self.pending.pop() else {
            return Err(SinkError::Other("end_function without begin_function".into()));
        };
        if !function.open_regions.is_empty() {
            return Err(SinkError::UnbalancedRegion("routine ended inside a region"));
        }
        self.functions.push(function);
        Ok(())
    }
}
