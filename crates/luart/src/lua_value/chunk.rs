use std::rc::Rc;

use super::LuaValue;
use crate::lua_vm::Instruction;

/// Upvalue descriptor: where a closure finds each captured variable when it
/// is instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueDesc {
    pub is_local: bool, // true: enclosing function's register, false: enclosing function's upvalue
    pub index: u32,     // register slot or upvalue position in the enclosing function
}

impl UpvalueDesc {
    pub fn local(slot: u32) -> Self {
        UpvalueDesc {
            is_local: true,
            index: slot,
        }
    }

    pub fn upvalue(index: u32) -> Self {
        UpvalueDesc {
            is_local: false,
            index,
        }
    }
}

/// Local variable debug record: name plus the pc range where it is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocVar {
    pub name: String,
    pub start_pc: u32,
    pub end_pc: u32,
}

/// Compiled function prototype (bytecode + metadata)
///
/// Produced by an external compiler or loader and consumed as-is.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub source_name: Option<String>,
    pub linedefined: usize,
    pub lastlinedefined: usize,
    pub param_count: usize,
    pub is_vararg: bool,
    pub max_stack_size: usize,
    pub code: Vec<Instruction>,
    pub constants: Vec<LuaValue>,
    pub upvalue_descs: Vec<UpvalueDesc>,
    pub child_protos: Vec<Rc<Chunk>>,
    pub line_info: Vec<u32>, // one entry per instruction, may be empty
    pub locals: Vec<LocVar>,
    pub upvalue_names: Vec<String>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upvalue_count(&self) -> usize {
        self.upvalue_descs.len()
    }

    /// Source line of the instruction at `pc`, if line info was kept.
    pub fn line_at(&self, pc: usize) -> Option<u32> {
        self.line_info.get(pc).copied()
    }

    /// `source:line:` prefix used for runtime error messages.
    pub fn location(&self, pc: usize) -> Option<String> {
        let line = self.line_at(pc)?;
        let source = self.source_name.as_deref().unwrap_or("?");
        let source = source
            .strip_prefix('@')
            .or_else(|| source.strip_prefix('='))
            .unwrap_or(source);
        Some(format!("{}:{}:", source, line))
    }
}
