/*----------------------------------------------------------------------
  Lua 5.3 VM dispatch loop

  One loop runs every bytecode frame above its stop depth: CALL pushes the
  callee's frame and the loop simply continues in it, RETURN pops it and
  stores the results through the caller's call site. Native callees run to
  completion inside CALL, except pcall/xpcall of a bytecode function, whose
  native frame stays below the callee and catches its errors. The loop
  returns when the frames down to its stop depth are done, or with an error
  no protected frame above that depth catches. On a yield the frames stay
  in place and the next resume re-enters the loop.

  Registers of the running frame are stack indices `r + 1` of the API;
  anything above the registers is the transient area where variable
  result lists are left, followed by an integer recording the register
  the list belongs to.
----------------------------------------------------------------------*/

mod arithmetic_instructions;
mod call_instructions;
mod control_instructions;
pub(crate) mod helper;
mod load_instructions;
mod loop_instructions;
mod table_instructions;
mod upvalue_instructions;

use std::rc::Rc;

use arithmetic_instructions::*;
use call_instructions::*;
use control_instructions::*;
use load_instructions::*;
use loop_instructions::*;
use table_instructions::*;
use upvalue_instructions::*;

use crate::lua_value::{LuaUpvalue, LuaValue};
use crate::lua_vm::{ArithOp, Instruction, LuaError, LuaResult, LuaState, OpCode};

impl LuaState {
    /// Runs bytecode until the frames above `stop` have returned.
    pub(crate) fn execute(&mut self, stop: usize) -> LuaResult<()> {
        self.execute_from(stop, Ok(false))
    }

    /// Drives the loop from the outcome of the last completed step: `true`
    /// once done, `false` to keep dispatching, or the error raised.
    pub(crate) fn execute_from(
        &mut self,
        stop: usize,
        mut outcome: LuaResult<bool>,
    ) -> LuaResult<()> {
        loop {
            outcome = match outcome {
                Ok(true) => return Ok(()),
                Ok(false) => self.run(stop).map(|()| true),
                Err(LuaError::Yield) => return Err(LuaError::Yield),
                Err(err) => {
                    let Some(idx) = self.protected_frame(stop) else {
                        return Err(err);
                    };
                    let site = self.recover(idx, err);
                    self.finish_call(site, stop)
                }
            };
        }
    }

    fn run(&mut self, stop: usize) -> LuaResult<()> {
        loop {
            let instr = self.fetch()?;
            let Some(op) = instr.get_opcode() else {
                return Err(self.rt_error(LuaError::TypeError(format!(
                    "invalid opcode {}",
                    instr.opcode_raw()
                ))));
            };
            match op {
                OpCode::Move => exec_move(self, instr),
                OpCode::LoadK => exec_loadk(self, instr),
                OpCode::LoadKX => exec_loadkx(self, instr),
                OpCode::LoadBool => exec_loadbool(self, instr),
                OpCode::LoadNil => exec_loadnil(self, instr),
                OpCode::GetUpval => exec_getupval(self, instr),
                OpCode::GetTabUp => exec_gettabup(self, instr),
                OpCode::GetTable => exec_gettable(self, instr),
                OpCode::SetTabUp => exec_settabup(self, instr),
                OpCode::SetUpval => exec_setupval(self, instr),
                OpCode::SetTable => exec_settable(self, instr),
                OpCode::NewTable => exec_newtable(self, instr),
                OpCode::Self_ => exec_self(self, instr),
                OpCode::Add => exec_arith(self, instr, ArithOp::Add),
                OpCode::Sub => exec_arith(self, instr, ArithOp::Sub),
                OpCode::Mul => exec_arith(self, instr, ArithOp::Mul),
                OpCode::Mod => exec_arith(self, instr, ArithOp::Mod),
                OpCode::Pow => exec_arith(self, instr, ArithOp::Pow),
                OpCode::Div => exec_arith(self, instr, ArithOp::Div),
                OpCode::IDiv => exec_arith(self, instr, ArithOp::IDiv),
                OpCode::BAnd => exec_arith(self, instr, ArithOp::BAnd),
                OpCode::BOr => exec_arith(self, instr, ArithOp::BOr),
                OpCode::BXor => exec_arith(self, instr, ArithOp::BXor),
                OpCode::Shl => exec_arith(self, instr, ArithOp::Shl),
                OpCode::Shr => exec_arith(self, instr, ArithOp::Shr),
                OpCode::Unm => exec_unary(self, instr, ArithOp::Unm),
                OpCode::BNot => exec_unary(self, instr, ArithOp::BNot),
                OpCode::Not => exec_not(self, instr),
                OpCode::Len => exec_len(self, instr),
                OpCode::Concat => exec_concat(self, instr),
                OpCode::Jmp => exec_jmp(self, instr),
                OpCode::Eq => exec_eq(self, instr),
                OpCode::Lt => exec_lt(self, instr),
                OpCode::Le => exec_le(self, instr),
                OpCode::Test => exec_test(self, instr),
                OpCode::TestSet => exec_testset(self, instr),
                OpCode::Call => exec_call(self, instr),
                OpCode::TailCall => exec_tailcall(self, instr),
                OpCode::Return => {
                    if exec_return(self, instr, stop)? {
                        return Ok(());
                    }
                    Ok(())
                }
                OpCode::ForLoop => exec_forloop(self, instr),
                OpCode::ForPrep => exec_forprep(self, instr),
                OpCode::TForCall => exec_tforcall(self, instr),
                OpCode::TForLoop => exec_tforloop(self, instr),
                OpCode::SetList => exec_setlist(self, instr),
                OpCode::Closure => exec_closure(self, instr),
                OpCode::Vararg => exec_vararg(self, instr),
                OpCode::ExtraArg => Err(self.rt_error(LuaError::TypeError(
                    "unexpected EXTRAARG".to_string(),
                ))),
            }?;
        }
    }

    /// Completes the instruction that called a metamethod which has since
    /// returned, its result on top of the stack.
    pub(crate) fn finish_op(&mut self) -> LuaResult<()> {
        let pc = self.frame().pc;
        let instr = self
            .frame()
            .chunk()
            .and_then(|chunk| pc.checked_sub(1).and_then(|i| chunk.code.get(i).copied()));
        let Some(instr) = instr else {
            return Ok(());
        };
        let Some(op) = instr.get_opcode() else {
            return Ok(());
        };
        match op {
            OpCode::Eq | OpCode::Lt | OpCode::Le => {
                let mut res = self.pop_value().to_boolean();
                if std::mem::take(&mut self.frame_mut().negate_result) {
                    res = !res;
                }
                if res != (instr.get_a() != 0) {
                    self.jump(1);
                }
            }
            OpCode::Concat => {
                let r = self.frame().concat_at;
                let value = self.pop_value();
                self.set_reg(r, value);
                concat_from(self, instr.get_a(), instr.get_b(), r)?;
            }
            OpCode::GetTabUp
            | OpCode::GetTable
            | OpCode::Self_
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Mod
            | OpCode::Pow
            | OpCode::Div
            | OpCode::IDiv
            | OpCode::BAnd
            | OpCode::BOr
            | OpCode::BXor
            | OpCode::Shl
            | OpCode::Shr
            | OpCode::Unm
            | OpCode::BNot
            | OpCode::Len => {
                let value = self.pop_value();
                self.set_reg(instr.get_a(), value);
            }
            // __newindex results are discarded
            _ => {}
        }
        Ok(())
    }

    /// Next instruction of the running frame; advances its pc.
    pub(crate) fn fetch(&mut self) -> LuaResult<Instruction> {
        let frame = self.frame_mut();
        let instr = frame
            .closure
            .as_ref()
            .and_then(|c| c.chunk())
            .and_then(|chunk| chunk.code.get(frame.pc).copied());
        match instr {
            Some(i) => {
                frame.pc += 1;
                Ok(i)
            }
            None => Err(LuaError::Runtime(LuaValue::from(
                "program counter out of range",
            ))),
        }
    }

    // ===== operand access =====

    #[inline]
    pub(crate) fn reg(&self, r: u32) -> LuaValue {
        self.frame().slot(r as usize)
    }

    #[inline]
    pub(crate) fn set_reg(&self, r: u32, value: LuaValue) {
        self.frame().set_slot(r as usize, value);
    }

    pub(crate) fn constant(&self, idx: u32) -> LuaValue {
        self.frame()
            .closure
            .as_ref()
            .and_then(|c| c.chunk())
            .and_then(|chunk| chunk.constants.get(idx as usize).cloned())
            .unwrap_or_default()
    }

    /// Register or constant operand.
    #[inline]
    pub(crate) fn rk(&self, arg: u32) -> LuaValue {
        if Instruction::is_k(arg) {
            self.constant(Instruction::index_k(arg))
        } else {
            self.reg(arg)
        }
    }

    pub(crate) fn upvalue_ref(&self, idx: u32) -> LuaResult<Rc<LuaUpvalue>> {
        self.frame()
            .closure
            .as_ref()
            .and_then(|c| c.upvalue(idx as usize).cloned())
            .ok_or_else(|| {
                self.rt_error(LuaError::IndexError(format!("invalid upvalue index {}", idx)))
            })
    }

    /// Register count of the running bytecode function.
    pub(crate) fn n_regs(&self) -> usize {
        self.frame().chunk().map_or(0, |c| c.max_stack_size)
    }

    #[inline]
    pub(crate) fn jump(&mut self, sbx: i32) {
        let frame = self.frame_mut();
        frame.pc = (frame.pc as i64 + sbx as i64).max(0) as usize;
    }
}
