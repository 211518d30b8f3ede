// Loading chunks and calling functions (lua_load / lua_call / lua_pcall)
// together with the frame push/pop protocol shared with the dispatch loop.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::lua_value::{Chunk, ClosureKind, LuaClosure, LuaUpvalue, LuaValue};
use crate::lua_vm::lua_call_frame::{CallSite, LuaCallFrame, ProtectedCall};
use crate::lua_vm::lua_limits::{LUA_MINSTACK, LUA_MULTRET, MAXTAGLOOP};
use crate::lua_vm::lua_state::PendingCall;
use crate::lua_vm::{CFunction, LuaError, LuaResult, LuaState, LuaStatus, TmKind};

impl LuaState {
    /// Pushes a closure over `chunk`. Its first upvalue (`_ENV`) is the
    /// globals table, the others start closed over nil.
    pub fn load(&mut self, chunk: Rc<Chunk>) -> LuaStatus {
        let upvalues: Vec<Rc<LuaUpvalue>> = (0..chunk.upvalue_count())
            .map(|_| Rc::new(LuaUpvalue::new_closed(LuaValue::Nil)))
            .collect();
        if let Some(env) = upvalues.first() {
            env.set_value(self.vm.globals());
        }
        debug!(
            source = chunk.source_name.as_deref().unwrap_or("?"),
            upvalues = upvalues.len(),
            "chunk loaded"
        );
        let closure = LuaClosure::new_lua(chunk, upvalues);
        self.push(LuaValue::Function(Rc::new(closure)));
        LuaStatus::Ok
    }

    /// Calls the function below the top `nargs` values, replacing function
    /// and arguments with `nresults` results (all of them for `LUA_MULTRET`).
    pub fn call(&mut self, nargs: usize, nresults: i32) -> LuaResult<()> {
        if self.n_ccalls >= self.vm.options.max_c_calls {
            return Err(self.rt_error(LuaError::StackOverflow(
                "C stack overflow".to_string(),
            )));
        }
        let depth = self.frames.len();
        self.nny += 1;
        self.n_ccalls += 1;
        let result = match self.precall(nargs, nresults, CallSite::Host) {
            Ok(true) => self.execute(depth),
            Ok(false) => Ok(()),
            Err(e) => Err(e),
        };
        self.nny -= 1;
        self.n_ccalls -= 1;
        if result.is_err() {
            self.unwind_to(depth);
        }
        result
    }

    /// Protected `call`. On failure the function and arguments are replaced
    /// by the error object (or by what the handler at `msgh` makes of it)
    /// and the error status is returned.
    pub fn pcall(&mut self, nargs: usize, nresults: i32, msgh: i32) -> LuaStatus {
        let handler = (msgh != 0).then(|| self.index_to_value(msgh));
        let depth = self.frames.len();
        let func_slot = self.frame().top.saturating_sub(nargs + 1);
        let (nny, n_ccalls) = (self.nny, self.n_ccalls);

        let err = match self.call(nargs, nresults) {
            Ok(()) => return LuaStatus::Ok,
            Err(e) => e,
        };
        self.unwind_to(depth);
        self.nny = nny;
        self.n_ccalls = n_ccalls;

        let mut status = err.status();
        let mut value = err.into_value();
        if let Some(handler) = handler {
            self.frame_mut().set_top(func_slot);
            value = match self.run_handler(handler, value) {
                Some(v) => v,
                None => {
                    status = LuaStatus::ErrorInErrorHandling;
                    LuaError::ErrorInErrorHandling.into_value()
                }
            };
        }
        debug!(?status, error = %value, "protected call failed");
        self.frame_mut().set_top(func_slot);
        self.push(value);
        status
    }

    /// Passes an error value through a message handler; `None` when the
    /// handler fails too.
    fn run_handler(&mut self, handler: LuaValue, value: LuaValue) -> Option<LuaValue> {
        self.push(handler);
        self.push(value);
        match self.call(1, 1) {
            Ok(()) => Some(self.pop_value()),
            Err(_) => None,
        }
    }

    /// Calls the function at index 1 of the running native frame, with the
    /// values above it as arguments, in protected mode (`pcall`/`xpcall`).
    ///
    /// The native frame becomes the boundary that catches the callee's
    /// errors. A bytecode callee is left to the dispatch loop, which
    /// completes the native call when the callee returns or fails; the
    /// returned count is then ignored. Otherwise the frame already holds
    /// `true` and the results, or `false` and the error object.
    pub(crate) fn protected_call(&mut self, handler: Option<LuaValue>) -> LuaResult<usize> {
        let level = self.frames.len();
        let nargs = self.frame().top.saturating_sub(1);
        self.frame_mut().protect = Some(ProtectedCall { handler });
        match self.precall(nargs, LUA_MULTRET, CallSite::Protected) {
            Ok(true) => Ok(0),
            Ok(false) => {
                self.frame_mut().protect = None;
                self.push(LuaValue::Boolean(true));
                self.insert(1);
                Ok(self.frame().top)
            }
            Err(LuaError::Yield) => Err(LuaError::Yield),
            Err(err) => {
                self.frames.truncate(level);
                let handler = self.frame_mut().protect.take().and_then(|p| p.handler);
                let value = self.caught_error(handler, err);
                self.frame_mut().set_top(0);
                self.push(LuaValue::Boolean(false));
                self.push(value);
                Ok(2)
            }
        }
    }

    /// Error object reported by a protected call, after its handler.
    fn caught_error(&mut self, handler: Option<LuaValue>, err: LuaError) -> LuaValue {
        let value = err.into_value();
        match handler {
            Some(h) => self
                .run_handler(h, value)
                .unwrap_or_else(|| LuaError::ErrorInErrorHandling.into_value()),
            None => value,
        }
    }

    /// Innermost protected native frame at or above `stop`.
    pub(crate) fn protected_frame(&self, stop: usize) -> Option<usize> {
        (stop..self.frames.len())
            .rev()
            .find(|&i| self.frames[i].protect.is_some())
    }

    /// Drops every frame above the protected frame at `idx` and makes
    /// `false` and the error object its results. Returns the call site
    /// receiving them.
    pub(crate) fn recover(&mut self, idx: usize, err: LuaError) -> CallSite {
        self.unwind_to(idx + 1);
        let handler = self.frame_mut().protect.take().and_then(|p| p.handler);
        self.frame_mut().set_top(0);
        let value = self.caught_error(handler, err);
        debug!(error = %value, "error caught by protected call");
        self.push(LuaValue::Boolean(false));
        self.push(value);
        match self.frames.pop() {
            Some(frame) => self.post_call(frame, 0),
            None => CallSite::Host,
        }
    }

    /// Completes a protected call whose callee returned: the results left
    /// on the native frame, after a leading `true`, become its results.
    fn finish_protected(&mut self) -> CallSite {
        let Some(mut frame) = self.frames.pop() else {
            return CallSite::Host;
        };
        frame.protect = None;
        let n = frame.top;
        let mut results = frame.pop_n(n);
        results.insert(0, LuaValue::Boolean(true));
        frame.push_n(results, -1);
        self.post_call(frame, 0)
    }

    /// Calls a metamethod on behalf of the running bytecode instruction.
    /// The callee may yield: its frame then completes the instruction when
    /// it returns after the next resume.
    pub(crate) fn call_yieldable(&mut self, nargs: usize, nresults: i32) -> LuaResult<()> {
        if self.n_ccalls >= self.vm.options.max_c_calls {
            return Err(self.rt_error(LuaError::StackOverflow(
                "C stack overflow".to_string(),
            )));
        }
        let depth = self.frames.len();
        self.n_ccalls += 1;
        let result = match self.precall(nargs, nresults, CallSite::Meta) {
            Ok(true) => self.execute(depth),
            Ok(false) => Ok(()),
            Err(e) => Err(e),
        };
        self.n_ccalls -= 1;
        result
    }

    // ===== frame protocol =====

    /// Pops the callee and its `nargs` arguments off the current frame and
    /// starts it. Returns true when frames were pushed that the dispatch
    /// loop must run (a bytecode callee, or a protected call of one); native
    /// callees have already completed (their results pushed) when this
    /// returns false.
    pub(crate) fn precall(
        &mut self,
        nargs: usize,
        nresults: i32,
        site: CallSite,
    ) -> LuaResult<bool> {
        let mut args = self.frame_mut().pop_n(nargs);
        let mut callee = self.pop_value();
        let mut chain = 0;
        let closure = loop {
            match callee {
                LuaValue::Function(f) => break f,
                other => {
                    let tm = self.get_metamethod(&other, TmKind::Call);
                    if tm.is_nil() || chain >= MAXTAGLOOP {
                        return Err(self.type_error("call", &other));
                    }
                    chain += 1;
                    args.insert(0, other);
                    callee = tm;
                }
            }
        };
        if self.frames.len() > self.vm.options.max_call_depth {
            return Err(self.rt_error(LuaError::StackOverflow("stack overflow".to_string())));
        }
        match closure.kind() {
            ClosureKind::Lua(chunk) => {
                let chunk = chunk.clone();
                self.push_lua_frame(closure, &chunk, args, nresults, site)?;
                Ok(true)
            }
            ClosureKind::Native(f) => {
                let f = *f;
                self.call_native(closure, f, args, nresults, site)
            }
        }
    }

    fn push_lua_frame(
        &mut self,
        closure: Rc<LuaClosure>,
        chunk: &Chunk,
        mut args: Vec<LuaValue>,
        nresults: i32,
        site: CallSite,
    ) -> LuaResult<()> {
        let n_regs = chunk.max_stack_size;
        let size = n_regs + LUA_MINSTACK;
        if size > self.vm.options.max_stack_size {
            return Err(self.rt_error(LuaError::StackOverflow("stack overflow".to_string())));
        }
        let mut frame = LuaCallFrame::new(size, Some(closure));
        let nparams = chunk.param_count;
        if chunk.is_vararg && args.len() > nparams {
            frame.varargs = args.split_off(nparams);
        }
        frame.push_n(args, nparams as i32);
        frame.set_top(n_regs);
        frame.call_site = site;
        frame.n_results = nresults;
        self.frames.push(frame);
        trace!(depth = self.frames.len() - 1, "lua frame pushed");
        Ok(())
    }

    /// Runs a native function in a fresh frame and hands its top results to
    /// the caller. A yield leaves the call pending until the next resume.
    /// Returns true when the native frame stays behind as the boundary of a
    /// protected call running in the dispatch loop.
    fn call_native(
        &mut self,
        closure: Rc<LuaClosure>,
        f: CFunction,
        args: Vec<LuaValue>,
        nresults: i32,
        site: CallSite,
    ) -> LuaResult<bool> {
        let mut frame = LuaCallFrame::new(args.len() + LUA_MINSTACK, Some(closure));
        frame.push_n(args, -1);
        frame.call_site = site;
        frame.n_results = nresults;
        self.frames.push(frame);
        let depth = self.frames.len();
        trace!(depth = depth - 1, "native frame pushed");

        let result = f(self);
        let protected = self
            .frames
            .get(depth - 1)
            .is_some_and(|frame| frame.protect.is_some());
        let results = match result {
            Ok(_) if protected && self.frames.len() > depth => return Ok(true),
            Ok(n) => {
                self.frames.truncate(depth);
                match self.frames.pop() {
                    Some(mut frame) => frame.pop_n(n),
                    None => Vec::new(),
                }
            }
            Err(LuaError::Yield) if protected => {
                self.frames.truncate(depth);
                return Err(LuaError::Yield);
            }
            Err(e) => {
                self.frames.truncate(depth - 1);
                if matches!(e, LuaError::Yield) && self.pending.is_none() {
                    self.pending = Some(PendingCall {
                        site,
                        n_results: nresults,
                        base: self.frame().top,
                    });
                }
                return Err(e);
            }
        };
        self.frame_mut().push_n(results, nresults);
        Ok(false)
    }

    /// Hands the results a finished call left on top of the current frame
    /// to its call site. Returns true once the frames down to `stop` are
    /// done, ending the dispatch loop that runs to `stop`.
    pub(crate) fn finish_call(&mut self, mut site: CallSite, stop: usize) -> LuaResult<bool> {
        loop {
            if self.frames.len() <= stop {
                return Ok(true);
            }
            match site {
                CallSite::Host => return Ok(true),
                CallSite::Call { a, c } => {
                    self.pop_results(a as i32 + 1, c as i32);
                    return Ok(false);
                }
                CallSite::TForCall { a, c } => {
                    self.pop_results(a as i32 + 4, c as i32 + 1);
                    return Ok(false);
                }
                CallSite::Meta => {
                    self.finish_op()?;
                    return Ok(false);
                }
                CallSite::Protected => site = self.finish_protected(),
            }
        }
    }

    /// Moves `c - 1` values from the top into stack indices `a..`; with
    /// `c == 0` they stay on top followed by the index `a` they belong to.
    pub(crate) fn pop_results(&mut self, a: i32, c: i32) {
        if c == 1 {
            // no results wanted
        } else if c > 1 {
            for i in (a..=a + c - 2).rev() {
                self.replace(i);
            }
        } else {
            self.frame_mut().ensure(1);
            self.push_integer(a as i64);
        }
    }

    /// Turns `[results.., a_marker]` above the registers into
    /// `[R(a-1).., results..]`, ready to be used as a variable-length list.
    pub(crate) fn fix_stack(&mut self, a: i32) {
        let x = self.to_integer(-1) as i32;
        self.pop(1);
        let n_regs = self.frame().chunk().map_or(0, |c| c.max_stack_size) as i32;
        self.frame_mut().ensure((x - a).max(0) as usize);
        for i in a..x {
            self.push_value(i);
        }
        self.rotate(n_regs + 1, x - a);
    }

    /// Delivers the values of a finished frame to its caller, returning the
    /// call site to complete.
    pub(crate) fn post_call(&mut self, mut frame: LuaCallFrame, first_result: usize) -> CallSite {
        let n = frame.top.saturating_sub(first_result);
        let results = frame.pop_n(n);
        let site = frame.call_site;
        let nresults = frame.n_results;
        drop(frame);
        trace!(depth = self.frames.len(), "frame popped");
        self.frame_mut().push_n(results, nresults);
        site
    }
}
