use crate::lua_vm::LuaState;
use crate::lua_vm::lua_limits::LUA_REGISTRYINDEX;

impl LuaState {
    /// Converts a relative index into an absolute one (lua_absindex).
    pub fn abs_index(&self, idx: i32) -> i32 {
        if idx >= 0 || idx <= LUA_REGISTRYINDEX {
            idx
        } else {
            self.frame().top as i32 + idx + 1
        }
    }

    /// Index of the top element, i.e. the number of values in the window.
    pub fn get_top(&self) -> i32 {
        self.frame().top as i32
    }

    /// Makes room for `n` more values; false if that would exceed the
    /// window limit.
    pub fn check_stack(&mut self, n: usize) -> bool {
        let limit = self.vm.options.max_stack_size;
        let frame = self.frame_mut();
        if frame.top + n > limit {
            return false;
        }
        frame.ensure(n);
        true
    }

    pub fn pop(&mut self, n: usize) {
        let top = self.frame().top;
        self.frame_mut().set_top(top.saturating_sub(n));
    }

    pub fn copy(&mut self, from: i32, to: i32) {
        let value = self.index_to_value(from);
        self.set_index_value(to, value);
    }

    /// Pushes a copy of the value at `idx`.
    pub fn push_value(&mut self, idx: i32) {
        let value = self.index_to_value(idx);
        self.push(value);
    }

    /// Pops the top value into `idx`.
    pub fn replace(&mut self, idx: i32) {
        let idx = self.abs_index(idx);
        let value = self.pop_value();
        self.set_index_value(idx, value);
    }

    /// Moves the top value into `idx`, shifting up the values above it.
    pub fn insert(&mut self, idx: i32) {
        self.rotate(idx, 1);
    }

    /// Removes the value at `idx`, shifting down the values above it.
    pub fn remove(&mut self, idx: i32) {
        self.rotate(idx, -1);
        self.pop(1);
    }

    /// Rotates the values between `idx` and the top `n` positions towards
    /// the top (towards the bottom when `n` is negative).
    pub fn rotate(&mut self, idx: i32, n: i32) {
        let top = self.frame().top as i64;
        let start = self.abs_index(idx) as i64 - 1;
        let end = top - 1;
        if start < 0 || start > end {
            return;
        }
        let len = end - start + 1;
        let n = n as i64 % len;
        if n == 0 {
            return;
        }
        let m = if n >= 0 { end - n } else { start - n - 1 };
        let frame = self.frame();
        frame.reverse(start as usize, m as usize);
        frame.reverse(m as usize + 1, end as usize);
        frame.reverse(start as usize, end as usize);
    }

    /// Sets the top to `idx`: new slots are nil, dropped slots are cleared.
    pub fn set_top(&mut self, idx: i32) {
        let new_top = if idx >= 0 {
            idx as i64
        } else {
            self.frame().top as i64 + idx as i64 + 1
        };
        self.frame_mut().set_top(new_top.max(0) as usize);
    }

    /// Pops `n` values from this state and pushes them onto `to`.
    pub fn xmove(&mut self, to: &mut LuaState, n: usize) {
        let values = self.frame_mut().pop_n(n);
        to.frame_mut().push_n(values, -1);
    }
}
