//! The free-register bitmask/array, matching §4.7's "fixed array of
//! general-purpose registers... `alloc_register` returns the lowest-index
//! free register; if none are free, it spills the oldest register".
//!
//! Four caller-saved scratch registers are reserved for expression
//! evaluation; `%rax`/`%rdi`../`%rcx` are left free for call argument
//! passing and `cqto`/shift-count duty.

const NAMES64: [&str; RegisterFile::COUNT] = ["%r10", "%r11", "%r12", "%r13"];
const NAMES32: [&str; RegisterFile::COUNT] = ["%r10d", "%r11d", "%r12d", "%r13d"];
const NAMES8: [&str; RegisterFile::COUNT] = ["%r10b", "%r11b", "%r12b", "%r13b"];

pub struct RegisterFile {
    free: [bool; Self::COUNT],
    /// Allocation order, oldest first, for spill-victim selection.
    order: Vec<usize>,
}

impl RegisterFile {
    pub const COUNT: usize = 4;

    pub fn new() -> Self {
        RegisterFile {
            free: [true; Self::COUNT],
            order: Vec::new(),
        }
    }

    pub fn alloc(&mut self) -> Option<usize> {
        let idx = self.free.iter().position(|&f| f)?;
        self.free[idx] = false;
        self.order.push(idx);
        Some(idx)
    }

    pub fn free(&mut self, r: usize) {
        self.free[r] = true;
        self.order.retain(|&x| x != r);
    }

    pub fn free_all(&mut self, keep: Option<usize>) {
        for i in 0..Self::COUNT {
            if Some(i) != keep {
                self.free[i] = true;
            }
        }
        self.order.retain(|&x| Some(x) == keep);
    }

    pub fn is_free(&self, r: usize) -> bool {
        self.free[r]
    }

    /// The register that has been in continuous use the longest; the
    /// spill victim when every register is busy.
    pub fn oldest_in_use(&self) -> usize {
        *self.order.first().unwrap_or(&0)
    }

    /// Mark a spilled register as available again; its value now lives on
    /// the stack and will be reloaded by whoever needs it next.
    pub fn mark_spilled(&mut self, r: usize) {
        self.free(r);
        let _ = self.alloc_specific(r);
    }

    fn alloc_specific(&mut self, r: usize) -> usize {
        self.free[r] = false;
        self.order.push(r);
        r
    }

    pub fn name64(r: usize) -> &'static str {
        NAMES64[r]
    }

    pub fn name32(r: usize) -> &'static str {
        NAMES32[r]
    }

    pub fn name8(r: usize) -> &'static str {
        NAMES8[r]
    }

    pub fn name(r: usize, width_suffix: &str) -> &'static str {
        match width_suffix {
            "b" => NAMES8[r],
            "l" => NAMES32[r],
            _ => NAMES64[r],
        }
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_lowest_index_first() {
        let mut regs = RegisterFile::new();
        assert_eq!(regs.alloc(), Some(0));
        assert_eq!(regs.alloc(), Some(1));
    }

    #[test]
    fn freeing_makes_a_register_available_again() {
        let mut regs = RegisterFile::new();
        let r = regs.alloc().unwrap();
        regs.free(r);
        assert!(regs.is_free(r));
    }

    #[test]
    fn oldest_in_use_is_the_first_allocated() {
        let mut regs = RegisterFile::new();
        regs.alloc();
        let second = regs.alloc().unwrap();
        assert_eq!(regs.oldest_in_use(), 0);
        regs.free(0);
        assert_eq!(regs.oldest_in_use(), second);
    }
}
