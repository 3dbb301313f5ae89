use crate::compiler::runtime::RuntimeOp;
use crate::compiler::type_code::PhpTypeCode;
use serde::Serialize;
use std::fmt;

/// Branch target within the routine being emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Label(pub u32);

/// Temporary local slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Temp(pub u16);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OpCode {
    // Stack Ops
    Nop,
    Const(u16), // Push constant from table
    Pop,
    Dup,

    // Locals
    LoadTemp(Temp),
    StoreTemp(Temp), // Pop value into temp

    // Variables
    LoadVar(String),      // Push variable value
    LoadVarRef(String),   // Turn variable into a reference, push the cell
    LoadVarArray(String), // Push the variable's array, creating one if it isn't
    StoreVar(String),     // Pop value, store in variable
    UnsetVar(String),

    // Constants
    LoadConstant(String),
    DefineConstant(String), // Pop value

    Box(PhpTypeCode),
    Call(RuntimeOp),
    CallFunction { name: String, argc: u8 },

    // Arrays
    NewArray { int_capacity: u32, string_capacity: u32 },
    NewValueArray(u16), // Pop N values into a value array

    // Control Flow
    Branch(Label),
    BranchIfTrue(Label),
    BranchIfFalse(Label),
    /// Branch out of one or more exception regions, running their finally blocks.
    Leave(Label),
    /// Pop an integer index, branch to the matching label or fall through.
    Switch(Vec<Label>),
    Return,

    // Exceptions
    InstanceOf(String),
    Throw,
    Rethrow,
    EndFinally,
}

impl OpCode {
    pub fn branch_target(&self) -> Option<Label> {
        match self {
            OpCode::Branch(l) | OpCode::BranchIfTrue(l) | OpCode::BranchIfFalse(l) | OpCode::Leave(l) => {
                Some(*l)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpCode::Nop => f.write_str("nop"),
            OpCode::Const(idx) => write!(f, "const #{}", idx),
            OpCode::Pop => f.write_str("pop"),
            OpCode::Dup => f.write_str("dup"),
            OpCode::LoadTemp(t) => write!(f, "load_temp {}", t),
            OpCode::StoreTemp(t) => write!(f, "store_temp {}", t),
            OpCode::LoadVar(name) => write!(f, "load_var ${}", name),
            OpCode::LoadVarRef(name) => write!(f, "load_var_ref ${}", name),
            OpCode::LoadVarArray(name) => write!(f, "load_var_array ${}", name),
            OpCode::StoreVar(name) => write!(f, "store_var ${}", name),
            OpCode::UnsetVar(name) => write!(f, "unset_var ${}", name),
            OpCode::LoadConstant(name) => write!(f, "load_constant {}", name),
            OpCode::DefineConstant(name) => write!(f, "define_constant {}", name),
            OpCode::Box(code) => write!(f, "box {}", code),
            OpCode::Call(op) => write!(f, "call {}", op.name()),
            OpCode::CallFunction { name, argc } => write!(f, "call_function {}/{}", name, argc),
            OpCode::NewArray {
                int_capacity,
                string_capacity,
            } => write!(f, "new_array int={} str={}", int_capacity, string_capacity),
            OpCode::NewValueArray(n) => write!(f, "new_value_array {}", n),
            OpCode::Branch(l) => write!(f, "br {}", l),
            OpCode::BranchIfTrue(l) => write!(f, "br_true {}", l),
            OpCode::BranchIfFalse(l) => write!(f, "br_false {}", l),
            OpCode::Leave(l) => write!(f, "leave {}", l),
            OpCode::Switch(labels) => {
                f.write_str("switch [")?;
                for (i, label) in labels.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", label)?;
                }
                f.write_str("]")
            }
            OpCode::Return => f.write_str("ret"),
            OpCode::InstanceOf(ty) => write!(f, "instance_of {}", ty),
            OpCode::Throw => f.write_str("throw"),
            OpCode::Rethrow => f.write_str("rethrow"),
            OpCode::EndFinally => f.write_str("end_finally"),
        }
    }
}
