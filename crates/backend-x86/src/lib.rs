//! x86-64 target back-end.
//!
//! Implements `cwjc::backend::Backend` (the generic code generator's
//! instruction interface) by emitting AT&T-syntax assembly text into an
//! in-memory buffer. Register allocation is a small free-list with
//! spilling to scratch frame slots, matching §4.7's "fixed array of
//! general-purpose registers... spills the oldest register to a scratch
//! frame slot".

mod regs;

use cwjc::ast::AstOp;
use cwjc::backend::{Backend, Reg};
use cwjc::error::CResult;
use cwjc::symtab::{StorageClass, SymId, SymbolTable};
use cwjc::types::PrimType;

use regs::RegisterFile;

/// Generated assembly text plus the register allocator state for one
/// translation unit.
pub struct X86Backend {
    asm: String,
    regs: RegisterFile,
    /// Scratch stack slots used when all general registers are busy,
    /// indexed by register number.
    spill_offset: Vec<i64>,
    next_spill_slot: i64,
}

impl X86Backend {
    pub fn new() -> Self {
        X86Backend {
            asm: String::new(),
            regs: RegisterFile::new(),
            spill_offset: vec![0; RegisterFile::COUNT],
            next_spill_slot: 0,
        }
    }

    pub fn into_assembly(self) -> String {
        self.asm
    }

    fn emit(&mut self, line: impl AsRef<str>) {
        self.asm.push('\t');
        self.asm.push_str(line.as_ref());
        self.asm.push('\n');
    }

    fn width_suffix(ty: PrimType) -> &'static str {
        if ty.is_ptr() {
            return "q";
        }
        match ty {
            PrimType::CHAR => "b",
            PrimType::INT => "l",
            _ => "q",
        }
    }

    fn sym_operand(sym: SymId, symtab: &SymbolTable) -> String {
        let s = symtab.get(sym);
        match s.class {
            StorageClass::Local | StorageClass::Param => format!("{}(%rbp)", s.posn),
            _ => format!("{}(%rip)", s.name),
        }
    }
}

impl Default for X86Backend {
    fn default() -> Self {
        X86Backend::new()
    }
}

impl Backend for X86Backend {
    fn alloc_register(&mut self) -> CResult<Reg> {
        if let Some(r) = self.regs.alloc() {
            return Ok(r);
        }
        // Spill: evict the oldest in-use register to its scratch slot.
        let victim = self.regs.oldest_in_use();
        self.next_spill_slot -= 8;
        self.spill_offset[victim] = self.next_spill_slot;
        self.emit(format!("movq {}, {}(%rbp)", RegisterFile::name64(victim), self.next_spill_slot));
        self.regs.mark_spilled(victim);
        Ok(victim)
    }

    fn free_all_registers(&mut self, keep: Option<Reg>) {
        self.regs.free_all(keep);
    }

    fn load_int(&mut self, value: i64, ty: PrimType) -> CResult<Reg> {
        let r = self.alloc_register()?;
        self.emit(format!("movq ${value}, {}", RegisterFile::name64(r)));
        let _ = ty;
        Ok(r)
    }

    fn load_global(&mut self, sym: SymId, symtab: &SymbolTable) -> CResult<Reg> {
        let r = self.alloc_register()?;
        let suf = Self::width_suffix(symtab.get(sym).ty);
        self.emit(format!("mov{suf} {}, {}", Self::sym_operand(sym, symtab), RegisterFile::name(r, suf)));
        Ok(r)
    }

    fn load_local(&mut self, sym: SymId, symtab: &SymbolTable) -> CResult<Reg> {
        self.load_global(sym, symtab)
    }

    fn load_addr(&mut self, sym: SymId, symtab: &SymbolTable) -> CResult<Reg> {
        let r = self.alloc_register()?;
        self.emit(format!("leaq {}, {}", Self::sym_operand(sym, symtab), RegisterFile::name64(r)));
        Ok(r)
    }

    fn load_string(&mut self, label: usize) -> CResult<Reg> {
        let r = self.alloc_register()?;
        self.emit(format!("leaq L{label}(%rip), {}", RegisterFile::name64(r)));
        Ok(r)
    }

    fn add(&mut self, l: Reg, r: Reg) -> CResult<Reg> {
        self.emit(format!("addq {}, {}", RegisterFile::name64(r), RegisterFile::name64(l)));
        self.regs.free(r);
        Ok(l)
    }

    fn sub(&mut self, l: Reg, r: Reg) -> CResult<Reg> {
        self.emit(format!("subq {}, {}", RegisterFile::name64(r), RegisterFile::name64(l)));
        self.regs.free(r);
        Ok(l)
    }

    fn mul(&mut self, l: Reg, r: Reg) -> CResult<Reg> {
        self.emit(format!("imulq {}, {}", RegisterFile::name64(r), RegisterFile::name64(l)));
        self.regs.free(r);
        Ok(l)
    }

    fn div(&mut self, l: Reg, r: Reg) -> CResult<Reg> {
        self.emit(format!("movq {}, %rax", RegisterFile::name64(l)));
        self.emit("cqto");
        self.emit(format!("idivq {}", RegisterFile::name64(r)));
        self.emit(format!("movq %rax, {}", RegisterFile::name64(l)));
        self.regs.free(r);
        Ok(l)
    }

    fn bitand(&mut self, l: Reg, r: Reg) -> CResult<Reg> {
        self.emit(format!("andq {}, {}", RegisterFile::name64(r), RegisterFile::name64(l)));
        self.regs.free(r);
        Ok(l)
    }

    fn bitor(&mut self, l: Reg, r: Reg) -> CResult<Reg> {
        self.emit(format!("orq {}, {}", RegisterFile::name64(r), RegisterFile::name64(l)));
        self.regs.free(r);
        Ok(l)
    }

    fn bitxor(&mut self, l: Reg, r: Reg) -> CResult<Reg> {
        self.emit(format!("xorq {}, {}", RegisterFile::name64(r), RegisterFile::name64(l)));
        self.regs.free(r);
        Ok(l)
    }

    fn shl(&mut self, l: Reg, r: Reg) -> CResult<Reg> {
        self.emit(format!("movq {}, %rcx", RegisterFile::name64(r)));
        self.emit(format!("shlq %cl, {}", RegisterFile::name64(l)));
        self.regs.free(r);
        Ok(l)
    }

    fn shr(&mut self, l: Reg, r: Reg) -> CResult<Reg> {
        self.emit(format!("movq {}, %rcx", RegisterFile::name64(r)));
        self.emit(format!("sarq %cl, {}", RegisterFile::name64(l)));
        self.regs.free(r);
        Ok(l)
    }

    fn negate(&mut self, r: Reg) -> CResult<Reg> {
        self.emit(format!("negq {}", RegisterFile::name64(r)));
        Ok(r)
    }

    fn invert(&mut self, r: Reg) -> CResult<Reg> {
        self.emit(format!("notq {}", RegisterFile::name64(r)));
        Ok(r)
    }

    fn lognot(&mut self, r: Reg) -> CResult<Reg> {
        self.emit(format!("cmpq $0, {}", RegisterFile::name64(r)));
        self.emit(format!("sete {}", RegisterFile::name8(r)));
        self.emit(format!("movzbq {}, {}", RegisterFile::name8(r), RegisterFile::name64(r)));
        Ok(r)
    }

    fn to_bool(&mut self, r: Reg, jump_false: Option<usize>) -> CResult<Reg> {
        // Always normalise to a real 0/1 first: callers like `gen_logical`
        // feed the result straight into `bitand`/`bitor` against another
        // normalised value, so leaving it as a raw comparison flag (only
        // valid for an immediately-following `je`) would corrupt anything
        // downstream that isn't itself a conditional jump.
        self.emit(format!("cmpq $0, {}", RegisterFile::name64(r)));
        self.emit(format!("setne {}", RegisterFile::name8(r)));
        self.emit(format!("movzbq {}, {}", RegisterFile::name8(r), RegisterFile::name64(r)));
        if let Some(label) = jump_false {
            self.emit(format!("cmpq $0, {}", RegisterFile::name64(r)));
            self.emit(format!("je L{label}"));
        }
        Ok(r)
    }

    fn compare_and_set(&mut self, op: AstOp, l: Reg, r: Reg) -> CResult<Reg> {
        self.emit(format!("cmpq {}, {}", RegisterFile::name64(r), RegisterFile::name64(l)));
        self.emit(format!("{} {}", set_suffix(op), RegisterFile::name8(l)));
        self.emit(format!("movzbq {}, {}", RegisterFile::name8(l), RegisterFile::name64(l)));
        self.regs.free(r);
        Ok(l)
    }

    fn compare_and_jump(&mut self, op: AstOp, l: Reg, r: Reg, label: usize) -> CResult<()> {
        self.emit(format!("cmpq {}, {}", RegisterFile::name64(r), RegisterFile::name64(l)));
        self.emit(format!("{} L{label}", jump_false_suffix(op)));
        self.regs.free(l);
        self.regs.free(r);
        Ok(())
    }

    fn scale(&mut self, r: Reg, scale: i64) -> CResult<Reg> {
        match scale {
            2 | 4 | 8 => {
                let shift = scale.trailing_zeros();
                self.emit(format!("shlq ${shift}, {}", RegisterFile::name64(r)));
            }
            _ => {
                self.emit(format!("imulq ${scale}, {}", RegisterFile::name64(r)));
            }
        }
        Ok(r)
    }

    fn widen(&mut self, r: Reg, from: PrimType, to: PrimType) -> CResult<Reg> {
        if from == PrimType::CHAR && (to == PrimType::INT || to == PrimType::LONG) {
            self.emit(format!("movsbq {}, {}", RegisterFile::name8(r), RegisterFile::name64(r)));
        } else if from == PrimType::INT && to == PrimType::LONG {
            self.emit(format!("movslq {}, {}", RegisterFile::name32(r), RegisterFile::name64(r)));
        }
        Ok(r)
    }

    fn store_global(&mut self, r: Reg, sym: SymId, symtab: &SymbolTable) -> CResult<Reg> {
        let suf = Self::width_suffix(symtab.get(sym).ty);
        self.emit(format!("mov{suf} {}, {}", RegisterFile::name(r, suf), Self::sym_operand(sym, symtab)));
        Ok(r)
    }

    fn store_local(&mut self, r: Reg, sym: SymId, symtab: &SymbolTable) -> CResult<Reg> {
        self.store_global(r, sym, symtab)
    }

    fn store_deref(&mut self, value: Reg, addr: Reg, ty: PrimType) -> CResult<Reg> {
        let suf = Self::width_suffix(ty);
        self.emit(format!("mov{suf} {}, ({})", RegisterFile::name(value, suf), RegisterFile::name64(addr)));
        self.regs.free(addr);
        Ok(value)
    }

    fn deref(&mut self, addr: Reg, ty: PrimType) -> CResult<Reg> {
        let suf = Self::width_suffix(ty);
        self.emit(format!("mov{suf} ({}), {}", RegisterFile::name64(addr), RegisterFile::name(addr, suf)));
        Ok(addr)
    }

    fn emit_label(&mut self, label: usize) {
        self.asm.push_str(&format!("L{label}:\n"));
    }

    fn jump(&mut self, label: usize) {
        self.emit(format!("jmp L{label}"));
    }

    fn func_preamble(&mut self, sym: SymId, symtab: &SymbolTable) {
        let name = &symtab.get(sym).name;
        self.asm.push_str(&format!("\t.text\n\t.globl {name}\n{name}:\n"));
        self.emit("pushq %rbp");
        self.emit("movq %rsp, %rbp");
        self.emit("subq $256, %rsp");
        let abi = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];
        for (i, param) in symtab.get(sym).member.iter().enumerate().take(abi.len()) {
            let offset = symtab.get(*param).posn;
            self.emit(format!("movq {}, {offset}(%rbp)", abi[i]));
        }
    }

    fn func_postamble(&mut self, sym: SymId, symtab: &SymbolTable) {
        self.asm.push_str(&format!("{}:\n", end_label(sym)));
        self.emit("movq %rbp, %rsp");
        self.emit("popq %rbp");
        self.emit("ret");
        let _ = symtab;
    }

    fn return_value(&mut self, r: Option<Reg>, sym: SymId, _symtab: &SymbolTable) {
        if let Some(r) = r {
            self.emit(format!("movq {}, %rax", RegisterFile::name64(r)));
        }
        self.emit(format!("jmp {}", end_label(sym)));
    }

    fn copy_arg(&mut self, r: Reg, index: usize) -> CResult<()> {
        let abi = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];
        if index < abi.len() {
            self.emit(format!("movq {}, {}", RegisterFile::name64(r), abi[index]));
        } else {
            self.emit(format!("pushq {}", RegisterFile::name64(r)));
        }
        self.regs.free(r);
        Ok(())
    }

    fn call(&mut self, sym: SymId, symtab: &SymbolTable, numargs: usize) -> CResult<Reg> {
        self.emit(format!("call {}", symtab.get(sym).name));
        if numargs > 6 {
            self.emit(format!("addq ${}, %rsp", (numargs - 6) * 8));
        }
        let r = self.alloc_register()?;
        self.emit(format!("movq %rax, {}", RegisterFile::name64(r)));
        Ok(r)
    }

    fn glob_str(&mut self, label: usize, text: &str, append: bool) {
        if !append {
            self.asm.push_str(&format!("\t.data\nL{label}:\n"));
        }
        for byte in text.bytes() {
            self.emit(format!(".byte {byte}"));
        }
    }

    fn glob_str_end(&mut self, _label: usize) {
        self.emit(".byte 0");
    }

    fn switch(&mut self, selector: Reg, cases: &[(i64, usize)], default_label: usize) -> CResult<()> {
        for (value, label) in cases {
            self.emit(format!("cmpq ${value}, {}", RegisterFile::name64(selector)));
            self.emit(format!("je L{label}"));
        }
        self.emit(format!("jmp L{default_label}"));
        self.regs.free(selector);
        Ok(())
    }

    fn assembly(&self) -> &str {
        &self.asm
    }
}

fn end_label(sym: SymId) -> String {
    format!("end_{}", sym.0)
}

fn set_suffix(op: AstOp) -> &'static str {
    match op {
        AstOp::Eq => "sete",
        AstOp::Ne => "setne",
        AstOp::Lt => "setl",
        AstOp::Gt => "setg",
        AstOp::Le => "setle",
        AstOp::Ge => "setge",
        _ => unreachable!("not a comparison operator"),
    }
}

fn jump_false_suffix(op: AstOp) -> &'static str {
    match op {
        AstOp::Eq => "jne",
        AstOp::Ne => "je",
        AstOp::Lt => "jge",
        AstOp::Gt => "jle",
        AstOp::Le => "jg",
        AstOp::Ge => "jl",
        _ => unreachable!("not a comparison operator"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwjc::symtab::StructuralType;

    #[test]
    fn load_int_allocates_a_register_and_emits_a_move() {
        let mut be = X86Backend::new();
        let r = be.load_int(42, PrimType::INT).unwrap();
        assert!(be.into_assembly().contains("$42"));
        assert_eq!(r, 0);
    }

    #[test]
    fn add_frees_the_right_operand_register() {
        let mut be = X86Backend::new();
        let a = be.load_int(1, PrimType::INT).unwrap();
        let b = be.load_int(2, PrimType::INT).unwrap();
        be.add(a, b).unwrap();
        assert!(be.regs.is_free(b));
    }

    #[test]
    fn global_symbol_lowers_to_rip_relative_operand() {
        let mut symtab = SymbolTable::new();
        let g = symtab.add_global("counter", PrimType::INT, None, StructuralType::Variable, StorageClass::Global);
        let mut be = X86Backend::new();
        be.load_global(g, &symtab).unwrap();
        assert!(be.into_assembly().contains("counter(%rip)"));
    }

    #[test]
    fn exhausting_registers_spills_to_a_frame_slot() {
        let mut be = X86Backend::new();
        let mut held = Vec::new();
        for i in 0..RegisterFile::COUNT + 1 {
            held.push(be.load_int(i as i64, PrimType::INT).unwrap());
        }
        assert!(be.into_assembly().contains("(%rbp)"));
    }
}
