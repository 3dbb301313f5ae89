//! Common test helpers for compiler tests
//!
//! Compiles builder-made units into a recorded `CodeChunk` and runs it on a small
//! stack machine, so tests can assert on runtime-observable behavior as well as on
//! the emitted instructions.

#![allow(dead_code)]

use indexmap::IndexMap;
use php_rs_compiler::compiler::chunk::HandlerKind;
use php_rs_compiler::compiler::opcode::{Label, OpCode};
use php_rs_compiler::compiler::runtime::RuntimeOp as R;
use php_rs_compiler::compiler::{
    CodeChunk, CompileOptions, CompileResult, CompiledUnit, Diagnostics, FunctionSignature, StaticSymbols,
    compile_unit,
};
use php_rs_compiler::compiler::nodes::{HOST_EXCEPTION_TYPE, UNCATCHABLE_EXCEPTION_TYPE};
use php_rs_compiler::core::value::Val;
use php_rs_compiler::parser::ast::CompilationUnit;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

// ============================================================================
// Compilation
// ============================================================================

pub struct Compiled {
    pub chunk: CodeChunk,
    pub diagnostics: Diagnostics,
    pub result: CompileResult<CompiledUnit>,
}

impl Compiled {
    /// Panics unless the unit compiled and was emitted.
    pub fn emitted(&self) -> &CodeChunk {
        match &self.result {
            Ok(unit) if unit.emitted => &self.chunk,
            Ok(_) => panic!("emission skipped: {:?}", self.diagnostics.kinds()),
            Err(err) => panic!("compilation failed: {err}"),
        }
    }
}

/// Builtins plus the host functions the test machine provides.
pub fn symbols() -> StaticSymbols {
    StaticSymbols::with_builtins()
        .with_function(FunctionSignature::new("id").with_params(&[false]))
        .with_function(FunctionSignature::new("key"))
        .with_function(FunctionSignature::new("make_exception").with_params(&[false, false]))
        .with_function(FunctionSignature::new("die"))
        .with_function(FunctionSignature::new("set_to_ten").with_params(&[true]))
        .with_type("MyException")
}

pub fn compile(unit: CompilationUnit) -> Compiled {
    compile_with(unit, &CompileOptions::default())
}

pub fn compile_with(unit: CompilationUnit, options: &CompileOptions) -> Compiled {
    let mut chunk = CodeChunk::new("main");
    let mut diagnostics = Diagnostics::new();
    let result = compile_unit(unit, &symbols(), &mut chunk, &mut diagnostics, options);
    Compiled {
        chunk,
        diagnostics,
        result,
    }
}

/// Compile and run, panicking on compile errors or an uncaught exception.
pub fn run_unit(unit: CompilationUnit) -> (Value, Machine) {
    let compiled = compile(unit);
    let chunk = compiled.emitted().clone();
    let mut machine = Machine::new();
    let value = machine
        .run(&chunk)
        .unwrap_or_else(|thrown| panic!("uncaught {:?}", thrown));
    (value, machine)
}

// ============================================================================
// Values
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(String),
}

pub type ArrayRef = Rc<RefCell<IndexMap<Key, Value>>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    Array(ArrayRef),
    Ref(Rc<RefCell<Value>>),
    /// Operand list for `concat_n`.
    Values(Vec<Value>),
    Exception { class: String, message: String },
    /// A user exception as the host runtime sees it.
    Host(Box<Value>),
    Died,
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(s.to_string())
    }

    pub fn array(entries: Vec<(Key, Value)>) -> Value {
        Value::Array(Rc::new(RefCell::new(entries.into_iter().collect())))
    }

    pub fn list(values: Vec<Value>) -> Value {
        Value::array(
            values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Key::Int(i as i64), v))
                .collect(),
        )
    }

    fn from_val(val: &Val) -> Value {
        match val {
            Val::Null => Value::Null,
            Val::Bool(b) => Value::Bool(*b),
            Val::Int(i) => Value::Int(*i as i64),
            Val::Long(i) => Value::Int(*i),
            Val::Double(d) => Value::Double(*d),
            Val::String(s) => Value::Str(s.clone()),
            Val::Bytes(b) => Value::Bytes(b.clone()),
        }
    }

    pub fn unref(&self) -> Value {
        match self {
            Value::Ref(cell) => cell.borrow().unref(),
            other => other.clone(),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null | Value::Died => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Double(d) => *d != 0.0,
            Value::Str(s) => !s.is_empty() && s != "0",
            Value::Bytes(b) => !b.is_empty() && b.as_slice() != b"0",
            Value::Array(a) => !a.borrow().is_empty(),
            Value::Ref(cell) => cell.borrow().truthy(),
            Value::Values(_) | Value::Exception { .. } | Value::Host(_) => true,
        }
    }

    pub fn to_long(&self) -> i64 {
        match self {
            Value::Bool(b) => *b as i64,
            Value::Int(i) => *i,
            Value::Double(d) => *d as i64,
            Value::Str(s) => s.trim().parse().unwrap_or(0),
            Value::Ref(cell) => cell.borrow().to_long(),
            _ => 0,
        }
    }

    pub fn to_double(&self) -> f64 {
        match self {
            Value::Double(d) => *d,
            Value::Str(s) => s.trim().parse().unwrap_or(0.0),
            Value::Ref(cell) => cell.borrow().to_double(),
            other => other.to_long() as f64,
        }
    }

    pub fn to_php_string(&self) -> String {
        match self {
            Value::Null | Value::Bool(false) => String::new(),
            Value::Bool(true) => "1".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Double(d) if d.fract() == 0.0 && d.is_finite() => format!("{:.0}", d),
            Value::Double(d) => d.to_string(),
            Value::Str(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Array(_) => "Array".to_string(),
            Value::Ref(cell) => cell.borrow().to_php_string(),
            Value::Exception { message, .. } => message.clone(),
            other => format!("{:?}", other),
        }
    }

    fn to_key(&self) -> Key {
        match self.unref() {
            Value::Int(i) => Key::Int(i),
            Value::Bool(b) => Key::Int(b as i64),
            Value::Double(d) => Key::Int(d as i64),
            Value::Str(s) => match s.parse::<i64>() {
                Ok(i) if i.to_string() == s => Key::Int(i),
                _ => Key::Str(s),
            },
            other => Key::Str(other.to_php_string()),
        }
    }

    fn deep_copy(&self) -> Value {
        match self {
            Value::Array(array) => {
                let copied = array
                    .borrow()
                    .iter()
                    .map(|(k, v)| {
                        // reference slots stay shared
                        let v = match v {
                            Value::Ref(_) => v.clone(),
                            other => other.deep_copy(),
                        };
                        (k.clone(), v)
                    })
                    .collect();
                Value::Array(Rc::new(RefCell::new(copied)))
            }
            other => other.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Thrown {
    User(Value),
    Died,
}

impl Thrown {
    fn error(message: &str) -> Thrown {
        Thrown::User(Value::Exception {
            class: "Error".to_string(),
            message: message.to_string(),
        })
    }

    fn caught_by(&self, host_type: &str) -> bool {
        match self {
            Thrown::Died => host_type == UNCATCHABLE_EXCEPTION_TYPE,
            Thrown::User(_) => host_type == HOST_EXCEPTION_TYPE,
        }
    }

    fn host_value(&self) -> Value {
        match self {
            Thrown::Died => Value::Died,
            Thrown::User(v) => Value::Host(Box::new(v.clone())),
        }
    }
}

fn is_subclass(class: &str, of: &str) -> bool {
    let mut current = Some(class);
    while let Some(name) = current {
        if name.eq_ignore_ascii_case(of) {
            return true;
        }
        current = match name {
            "RuntimeException" | "LogicException" | "ErrorException" | "MyException" => Some("Exception"),
            "InvalidArgumentException" => Some("LogicException"),
            "TypeError" => Some("Error"),
            "Exception" | "Error" => Some("Throwable"),
            _ => None,
        };
    }
    false
}

// ============================================================================
// Machine
// ============================================================================

type HostFn = fn(&mut Machine, &[Value]) -> Result<Value, Thrown>;

#[derive(Debug)]
enum Completion {
    Throw(Thrown),
    Jump(Label),
}

#[derive(Debug, Default)]
struct Frame {
    pc: usize,
    stack: Vec<Value>,
    vars: HashMap<String, Value>,
    temps: Vec<Value>,
    pending: Vec<Completion>,
    handling: Vec<Thrown>,
}

impl Frame {
    fn pop(&mut self) -> Value {
        self.stack.pop().expect("operand stack underflow")
    }

    fn pop_n(&mut self, n: usize) -> Vec<Value> {
        let at = self.stack.len().checked_sub(n).expect("operand stack underflow");
        self.stack.split_off(at)
    }
}

enum Flow {
    Next,
    Return(Value),
}

pub struct Machine {
    pub output: String,
    pub notices: Vec<String>,
    /// Host function calls, in order.
    pub calls: Vec<String>,
    /// Top-level variables after the run.
    pub globals: HashMap<String, Value>,
    pub constants: HashMap<String, Value>,
    /// Arrays returned without a copy.
    pub inplace_returns: usize,
    host: HashMap<&'static str, HostFn>,
    silence: usize,
}

impl Machine {
    pub fn new() -> Self {
        let mut host: HashMap<&'static str, HostFn> = HashMap::new();
        host.insert("id", |_, args| Ok(args.first().map(Value::unref).unwrap_or(Value::Null)));
        host.insert("key", |_, _| Ok(Value::str("k")));
        host.insert("die", |_, _| Err(Thrown::Died));
        host.insert("make_exception", |_, args| {
            Ok(Value::Exception {
                class: args.first().map(Value::to_php_string).unwrap_or_default(),
                message: args.get(1).map(Value::to_php_string).unwrap_or_default(),
            })
        });
        host.insert("set_to_ten", |_, args| {
            if let Some(Value::Ref(cell)) = args.first() {
                *cell.borrow_mut() = Value::Int(10);
            }
            Ok(Value::Null)
        });
        // resolved only at runtime: absent from `symbols()`
        host.insert("increment_ref", |_, args| {
            if let Some(Value::Ref(cell)) = args.first() {
                let next = cell.borrow().to_long() + 1;
                *cell.borrow_mut() = Value::Int(next);
            }
            Ok(Value::Null)
        });
        host.insert("id_unknown", |_, args| Ok(args.first().map(Value::unref).unwrap_or(Value::Null)));
        host.insert("strlen", |_, args| {
            Ok(Value::Int(
                args.first().map(|v| v.to_php_string().len()).unwrap_or(0) as i64,
            ))
        });
        Self {
            output: String::new(),
            notices: Vec::new(),
            calls: Vec::new(),
            globals: HashMap::new(),
            constants: HashMap::new(),
            inplace_returns: 0,
            host,
            silence: 0,
        }
    }

    /// Dereferenced value of a top-level variable.
    pub fn var(&self, name: &str) -> Value {
        self.globals.get(name).map(Value::unref).unwrap_or(Value::Null)
    }

    pub fn calls_to(&self, name: &str) -> usize {
        self.calls.iter().filter(|c| *c == name).count()
    }

    pub fn run(&mut self, chunk: &CodeChunk) -> Result<Value, Thrown> {
        let mut frame = Frame {
            temps: vec![Value::Null; chunk.temp_count as usize],
            ..Frame::default()
        };
        let result = self.run_frame(chunk, chunk, &mut frame);
        self.globals = frame.vars;
        result
    }

    fn call(&mut self, root: &CodeChunk, name: &str, args: Vec<Value>) -> Result<Value, Thrown> {
        if let Some(function) = root.function(name) {
            let mut frame = Frame {
                temps: vec![Value::Null; function.temp_count as usize],
                ..Frame::default()
            };
            for (param, arg) in function.params.iter().zip(args) {
                let bound = if param.by_ref { arg } else { arg.unref() };
                frame.vars.insert(param.name.clone(), bound);
            }
            return self.run_frame(root, function, &mut frame);
        }
        match self.host.get(name.to_ascii_lowercase().as_str()).copied() {
            Some(host) => {
                self.calls.push(name.to_string());
                host(self, &args)
            }
            None => Err(Thrown::error(&format!("Call to undefined function {}()", name))),
        }
    }

    fn run_frame(&mut self, root: &CodeChunk, chunk: &CodeChunk, frame: &mut Frame) -> Result<Value, Thrown> {
        loop {
            let op_pc = frame.pc;
            let Some(op) = chunk.code.get(op_pc) else {
                return Ok(Value::Null);
            };
            frame.pc += 1;
            match self.step(root, chunk, frame, op, op_pc) {
                Ok(Flow::Next) => {}
                Ok(Flow::Return(value)) => return Ok(value),
                Err(thrown) => unwind(chunk, frame, op_pc, thrown)?,
            }
        }
    }

    fn step(
        &mut self,
        root: &CodeChunk,
        chunk: &CodeChunk,
        frame: &mut Frame,
        op: &OpCode,
        op_pc: usize,
    ) -> Result<Flow, Thrown> {
        match op {
            OpCode::Nop | OpCode::Box(_) => {}
            OpCode::Const(idx) => frame.stack.push(Value::from_val(&chunk.constants[*idx as usize])),
            OpCode::Pop => {
                frame.pop();
            }
            OpCode::Dup => {
                let top = frame.stack.last().cloned().expect("operand stack underflow");
                frame.stack.push(top);
            }
            OpCode::LoadTemp(t) => frame.stack.push(frame.temps[t.0 as usize].clone()),
            OpCode::StoreTemp(t) => {
                let value = frame.pop();
                frame.temps[t.0 as usize] = value;
            }
            OpCode::LoadVar(name) => {
                let value = frame.vars.get(name).map(Value::unref).unwrap_or(Value::Null);
                frame.stack.push(value);
            }
            OpCode::LoadVarRef(name) => {
                let slot = frame.vars.entry(name.clone()).or_insert(Value::Null);
                if !matches!(slot, Value::Ref(_)) {
                    *slot = Value::Ref(Rc::new(RefCell::new(slot.clone())));
                }
                let cell = slot.clone();
                frame.stack.push(cell);
            }
            OpCode::LoadVarArray(name) => {
                let slot = frame.vars.entry(name.clone()).or_insert(Value::Null);
                frame.stack.push(array_for_write(slot));
            }
            OpCode::StoreVar(name) => {
                let value = frame.pop().unref();
                match frame.vars.get(name) {
                    Some(Value::Ref(cell)) => *cell.borrow_mut() = value,
                    _ => {
                        frame.vars.insert(name.clone(), value);
                    }
                }
            }
            OpCode::UnsetVar(name) => {
                frame.vars.remove(name);
            }
            OpCode::LoadConstant(name) => {
                let value = self.constants.get(name).cloned().unwrap_or_else(|| Value::str(name));
                frame.stack.push(value);
            }
            OpCode::DefineConstant(name) => {
                let value = frame.pop();
                self.constants.insert(name.clone(), value);
            }
            OpCode::Call(runtime) => self.call_runtime(*runtime, frame)?,
            OpCode::CallFunction { name, argc } => {
                let args = frame.pop_n(*argc as usize);
                let result = self.call(root, name, args)?;
                frame.stack.push(result.unref());
            }
            OpCode::NewArray { .. } => frame.stack.push(Value::array(vec![])),
            OpCode::NewValueArray(n) => {
                let values = frame.pop_n(*n as usize);
                frame.stack.push(Value::Values(values));
            }
            OpCode::Branch(label) => frame.pc = position(chunk, *label),
            OpCode::BranchIfTrue(label) => {
                if frame.pop().truthy() {
                    frame.pc = position(chunk, *label);
                }
            }
            OpCode::BranchIfFalse(label) => {
                if !frame.pop().truthy() {
                    frame.pc = position(chunk, *label);
                }
            }
            OpCode::Leave(label) => leave(chunk, frame, op_pc, *label),
            OpCode::Switch(labels) => {
                let index = frame.pop().to_long();
                if let Some(label) = usize::try_from(index).ok().and_then(|i| labels.get(i)) {
                    frame.pc = position(chunk, *label);
                }
            }
            OpCode::Return => return Ok(Flow::Return(frame.pop())),
            OpCode::InstanceOf(class) => {
                let matches = match frame.pop().unref() {
                    Value::Exception { class: actual, .. } => is_subclass(&actual, class),
                    _ => false,
                };
                frame.stack.push(Value::Bool(matches));
            }
            OpCode::Throw => return Err(Thrown::User(frame.pop().unref())),
            OpCode::Rethrow => {
                let thrown = frame.handling.pop().expect("rethrow outside a handler");
                return Err(thrown);
            }
            OpCode::EndFinally => match frame.pending.pop() {
                None => {}
                Some(Completion::Throw(thrown)) => return Err(thrown),
                Some(Completion::Jump(label)) => leave(chunk, frame, op_pc, label),
            },
        }
        Ok(Flow::Next)
    }

    fn call_runtime(&mut self, op: R, frame: &mut Frame) -> Result<(), Thrown> {
        let args = frame.pop_n(op.arity());
        let result = match (op, args.as_slice()) {
            (
                R::ConcatStrStr | R::ConcatStrObj | R::ConcatObjStr | R::ConcatObjObj | R::ConcatBytesBytes | R::ConcatBytesObj
                | R::ConcatObjBytes,
                [a, b],
            ) => Some(concat(&[a.clone(), b.clone()])),
            (R::ConcatN, [Value::Values(values)]) => Some(concat(values)),
            (R::ToString, [v]) => Some(Value::Str(v.to_php_string())),
            (R::ToBytes, [v]) => Some(Value::Bytes(v.to_php_string().into_bytes())),
            (R::ToBool, [v]) => Some(Value::Bool(v.truthy())),
            (R::ToLong, [v]) => Some(Value::Int(v.to_long())),
            (R::ToDouble, [v]) => Some(Value::Double(v.to_double())),
            (R::DeepCopy, [v]) => Some(v.unref().deep_copy()),
            (R::Clone, [v]) => Some(v.unref()),
            (R::Increment, [v]) => Some(match v.unref() {
                Value::Null => Value::Int(1),
                Value::Double(d) => Value::Double(d + 1.0),
                other => Value::Int(other.to_long() + 1),
            }),
            (R::Decrement, [v]) => Some(match v.unref() {
                Value::Null => Value::Null,
                Value::Double(d) => Value::Double(d - 1.0),
                other => Value::Int(other.to_long() - 1),
            }),
            (R::Plus, [v]) => Some(arith(&Value::Int(0), v, |a, b| a + b, |a, b| a + b)),
            (R::Negate, [v]) => Some(arith(&Value::Int(0), v, |a, b| a - b, |a, b| a - b)),
            (R::BitNot, [v]) => Some(Value::Int(!v.to_long())),
            (R::LogicNot, [v]) => Some(Value::Bool(!v.truthy())),
            (R::Add, [a, b]) => Some(arith(a, b, |a, b| a + b, |a, b| a + b)),
            (R::Sub, [a, b]) => Some(arith(a, b, |a, b| a - b, |a, b| a - b)),
            (R::Mul, [a, b]) => Some(arith(a, b, |a, b| a * b, |a, b| a * b)),
            (R::Identical, [a, b]) => Some(Value::Bool(a.unref() == b.unref())),
            (R::NotIdentical, [a, b]) => Some(Value::Bool(a.unref() != b.unref())),
            (R::LessThan, [a, b]) => Some(Value::Bool(a.to_double() < b.to_double())),
            (R::GreaterThan, [a, b]) => Some(Value::Bool(a.to_double() > b.to_double())),
            (R::GetItem | R::GetItemQuiet, [container, key]) => {
                let found = match container.unref() {
                    Value::Array(array) => array.borrow().get(&key.to_key()).map(Value::unref),
                    _ => None,
                };
                if found.is_none() && op == R::GetItem && self.silence == 0 {
                    self.notices
                        .push(format!("Undefined array key \"{}\"", key.to_php_string()));
                }
                Some(found.unwrap_or(Value::Null))
            }
            (R::GetItemForWrite, [container, key]) => Some(match container {
                Value::Array(array) => {
                    let mut array = array.borrow_mut();
                    let slot = array.entry(key.to_key()).or_insert(Value::Null);
                    array_for_write(slot)
                }
                _ => Value::array(vec![]),
            }),
            (R::GetItemRef, [container, key]) => Some(match container {
                Value::Array(array) => {
                    let mut array = array.borrow_mut();
                    let slot = array.entry(key.to_key()).or_insert(Value::Null);
                    if !matches!(slot, Value::Ref(_)) {
                        *slot = Value::Ref(Rc::new(RefCell::new(slot.clone())));
                    }
                    slot.clone()
                }
                _ => Value::Ref(Rc::new(RefCell::new(Value::Null))),
            }),
            (R::AppendArray, [container]) => {
                let fresh = Value::array(vec![]);
                append(container, fresh.clone());
                Some(fresh)
            }
            (R::AppendReference, [container]) => {
                let cell = Value::Ref(Rc::new(RefCell::new(Value::Null)));
                append(container, cell.clone());
                Some(cell)
            }
            (R::SetItem, [container, key, value]) => {
                if let Value::Array(array) = container {
                    let mut array = array.borrow_mut();
                    let value = value.unref();
                    match array.get(&key.to_key()) {
                        Some(Value::Ref(cell)) => *cell.borrow_mut() = value,
                        _ => {
                            array.insert(key.to_key(), value);
                        }
                    }
                }
                None
            }
            (R::Append, [container, value]) => {
                append(container, value.unref());
                None
            }
            (R::UnsetItem, [container, key]) => {
                if let Value::Array(array) = container.unref() {
                    array.borrow_mut().shift_remove(&key.to_key());
                }
                None
            }
            (R::IsArrayLike, [v]) => Some(Value::Bool(matches!(v.unref(), Value::Array(_)))),
            (R::IsBytes, [v]) => Some(Value::Bool(matches!(v.unref(), Value::Bytes(_)))),
            (R::Dereference, [v]) => Some(v.unref()),
            (R::NewReference, [v]) => Some(Value::Ref(Rc::new(RefCell::new(v.unref())))),
            (R::NewReferenceEmpty, []) => Some(Value::Ref(Rc::new(RefCell::new(Value::Null)))),
            (R::MarkInplaceCopyOnReturn, [_]) => {
                self.inplace_returns += 1;
                None
            }
            (R::WrapHostException, [Value::Host(inner)]) => Some((**inner).clone()),
            (R::ThrowInvalidBreakLevel, [level]) => {
                return Err(Thrown::error(&format!(
                    "Cannot break/continue {} level(s)",
                    level.to_long()
                )));
            }
            (R::Echo, [v]) => {
                self.output.push_str(&v.to_php_string());
                None
            }
            (R::Print, [v]) => {
                self.output.push_str(&v.to_php_string());
                Some(Value::Int(1))
            }
            (R::BeginSilence, []) => {
                self.silence += 1;
                None
            }
            (R::EndSilence, []) => {
                self.silence -= 1;
                None
            }
            (op, args) => panic!("bad operands for {}: {:?}", op.name(), args),
        };
        if let Some(value) = result {
            frame.stack.push(value);
        }
        Ok(())
    }
}

fn position(chunk: &CodeChunk, label: Label) -> usize {
    chunk.label_position(label).expect("branch to an unmarked label") as usize
}

/// Array handle held by `slot`, turning null into a fresh array.
fn array_for_write(slot: &mut Value) -> Value {
    match slot {
        Value::Array(_) => slot.clone(),
        Value::Ref(cell) => array_for_write(&mut cell.borrow_mut()),
        Value::Null => {
            *slot = Value::array(vec![]);
            slot.clone()
        }
        _ => Value::array(vec![]),
    }
}

fn append(container: &Value, value: Value) {
    if let Value::Array(array) = container {
        let mut array = array.borrow_mut();
        let next = array
            .keys()
            .filter_map(|k| match k {
                Key::Int(i) => Some(*i + 1),
                Key::Str(_) => None,
            })
            .max()
            .unwrap_or(0);
        array.insert(Key::Int(next), value);
    }
}

fn concat(values: &[Value]) -> Value {
    let binary = values.iter().any(|v| matches!(v.unref(), Value::Bytes(_)));
    let text: String = values.iter().map(Value::to_php_string).collect();
    if binary {
        Value::Bytes(text.into_bytes())
    } else {
        Value::Str(text)
    }
}

fn arith(a: &Value, b: &Value, int: fn(i64, i64) -> i64, float: fn(f64, f64) -> f64) -> Value {
    match (a.unref(), b.unref()) {
        (Value::Double(_), _) | (_, Value::Double(_)) => Value::Double(float(a.to_double(), b.to_double())),
        _ => Value::Int(int(a.to_long(), b.to_long())),
    }
}

/// Transfer control to a handler for `thrown`, or hand it back to the caller.
fn unwind(chunk: &CodeChunk, frame: &mut Frame, pc: usize, thrown: Thrown) -> Result<(), Thrown> {
    let pc = pc as u32;
    for region in &chunk.regions {
        if !region.covers(pc) {
            continue;
        }
        if pc >= region.try_start && pc < region.try_end {
            let handler = region.handlers.iter().find(|h| match &h.kind {
                HandlerKind::Catch(ty) => thrown.caught_by(ty),
                HandlerKind::Finally => false,
            });
            if let Some(handler) = handler {
                frame.stack.clear();
                frame.stack.push(thrown.host_value());
                frame.handling.push(thrown);
                frame.pc = handler.start as usize;
                return Ok(());
            }
        }
        if let Some(finally) = region.finally()
            && !(pc >= finally.start && pc < finally.end)
        {
            frame.stack.clear();
            frame.pending.push(Completion::Throw(thrown));
            frame.pc = finally.start as usize;
            return Ok(());
        }
    }
    Err(thrown)
}

/// Jump to `label`, running the finally blocks of the regions left on the way.
fn leave(chunk: &CodeChunk, frame: &mut Frame, pc: usize, label: Label) {
    let target = chunk.label_position(label).expect("leave to an unmarked label");
    let pc = pc as u32;
    for region in &chunk.regions {
        if !region.covers(pc) || region.covers(target) {
            continue;
        }
        let in_catch = region
            .handlers
            .iter()
            .any(|h| matches!(h.kind, HandlerKind::Catch(_)) && pc >= h.start && pc < h.end);
        if in_catch {
            frame.handling.pop();
        }
        if let Some(finally) = region.finally()
            && !(pc >= finally.start && pc < finally.end)
        {
            frame.pending.push(Completion::Jump(label));
            frame.pc = finally.start as usize;
            return;
        }
    }
    frame.pc = target as usize;
}
