// Threads: creation, resume/yield hand-off and status queries

use std::rc::Rc;

use tracing::debug;

use crate::lua_value::{CoroutineStatus, LuaThread, LuaValue};
use crate::lua_vm::lua_call_frame::CallSite;
use crate::lua_vm::lua_limits::LUA_MULTRET;
use crate::lua_vm::{LuaError, LuaResult, LuaState, LuaStatus};

impl LuaState {
    /// Pushes a new thread sharing this state's registry and globals, and
    /// returns its handle. The new thread starts with an empty stack.
    pub fn new_thread(&mut self) -> Rc<LuaThread> {
        let vm = self.vm.clone();
        let thread = Rc::new_cyclic(|handle| {
            LuaThread::new_coroutine(LuaState::with_vm(vm, handle.clone()))
        });
        debug!("coroutine created");
        self.push(LuaValue::Thread(thread.clone()));
        thread
    }

    /// Starts or continues this coroutine.
    ///
    /// To start it, push the body and `nargs` arguments. To continue it
    /// after a yield, push the `nargs` values the pending `yield` returns.
    /// Returns the status and the number of values left on top: the yielded
    /// values, the body's results, or the error object.
    pub fn resume(&mut self, from: Option<&LuaState>, nargs: usize) -> (LuaStatus, usize) {
        let thread = self.thread();
        if thread.as_ref().is_some_and(|t| t.status() == CoroutineStatus::Dead) {
            return self.resume_error("cannot resume dead coroutine", nargs);
        }
        let resuming = self.status == LuaStatus::Yield;
        if !resuming && (self.frames.len() > 1 || self.frame().top < nargs + 1) {
            let msg = if self.frames.len() > 1 {
                "cannot resume non-suspended coroutine"
            } else {
                "cannot resume dead coroutine"
            };
            return self.resume_error(msg, nargs);
        }

        self.n_ccalls = from.map_or(0, |f| f.n_ccalls) + 1;
        if self.n_ccalls >= self.vm.options.max_c_calls {
            return self.resume_error("C stack overflow", nargs);
        }
        let from_thread = from.and_then(|f| f.thread());
        if let Some(t) = &from_thread {
            t.set_status(CoroutineStatus::Normal);
        }
        if let Some(t) = &thread {
            t.set_status(CoroutineStatus::Running);
        }
        debug!(nargs, resuming, "coroutine resume");

        self.nny = 0;
        self.status = LuaStatus::Ok;
        let result = if resuming {
            self.continue_pending(nargs)
        } else {
            self.start_body(nargs)
        };

        let outcome = match result {
            Ok(()) => {
                debug!(results = self.frame().top, "coroutine finished");
                if let Some(t) = &thread {
                    t.set_status(CoroutineStatus::Dead);
                }
                (LuaStatus::Ok, self.frame().top)
            }
            Err(LuaError::Yield) => {
                self.status = LuaStatus::Yield;
                let values = std::mem::take(&mut self.transfer);
                let n = values.len();
                self.frame_mut().push_n(values, -1);
                if let Some(t) = &thread {
                    t.set_status(CoroutineStatus::Suspended);
                }
                (LuaStatus::Yield, n)
            }
            Err(e) => {
                let status = e.status();
                self.status = status;
                let value = e.into_value();
                debug!(?status, error = %value, "coroutine died");
                self.unwind_to(1);
                self.pending = None;
                self.frame_mut().set_top(0);
                self.push(value);
                if let Some(t) = &thread {
                    t.set_status(CoroutineStatus::Dead);
                }
                (status, 1)
            }
        };
        if let Some(t) = &from_thread {
            t.set_status(CoroutineStatus::Running);
        }
        outcome
    }

    fn resume_error(&mut self, msg: &str, nargs: usize) -> (LuaStatus, usize) {
        self.pop(nargs);
        self.push(LuaValue::from(msg));
        (LuaStatus::RuntimeError, 1)
    }

    fn start_body(&mut self, nargs: usize) -> LuaResult<()> {
        if self.precall(nargs, LUA_MULTRET, CallSite::Host)? {
            self.execute(1)?;
        }
        Ok(())
    }

    fn continue_pending(&mut self, nargs: usize) -> LuaResult<()> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let args = self.frame_mut().pop_n(nargs);
        let frame = self.frame_mut();
        frame.set_top(pending.base);
        frame.push_n(args, pending.n_results);
        let outcome = self.finish_call(pending.site, 1);
        self.execute_from(1, outcome)
    }

    /// Suspends the running coroutine, handing the top `nresults` values to
    /// the resumer. Native functions return the result as their error:
    /// `return Err(state.yield_(n))`.
    pub fn yield_(&mut self, nresults: usize) -> LuaError {
        if self.is_main_thread() {
            return LuaError::Runtime(LuaValue::from(
                "attempt to yield from outside a coroutine",
            ));
        }
        if self.nny > 0 {
            return LuaError::Runtime(LuaValue::from(
                "attempt to yield across a C-call boundary",
            ));
        }
        self.transfer = self.frame_mut().pop_n(nresults);
        debug!(values = nresults, "coroutine yield");
        LuaError::Yield
    }

    /// `Yield` while suspended, `Ok` otherwise, an error status once dead
    /// by an error.
    pub fn status(&self) -> LuaStatus {
        self.status
    }

    pub fn is_yieldable(&self) -> bool {
        !self.is_main_thread() && self.nny == 0
    }

    /// Whether a function is active at `level` (0 is the running one).
    pub fn get_stack(&self, level: usize) -> bool {
        level < self.call_depth()
    }
}
