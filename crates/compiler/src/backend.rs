//! The generic-codegen/target-backend seam.
//!
//! `genAST` in `codegen.rs` only ever calls through this trait; it never
//! knows it is talking to x86-64. A new target back-end is a new impl of
//! `Backend`, matching §4.7's "fixed set of primitive operations".

use crate::ast::AstOp;
use crate::error::CResult;
use crate::symtab::{SymId, SymbolTable};
use crate::types::PrimType;

/// A back-end register handle. Concretely a small integer index; what it
/// indexes is entirely the back-end's business.
pub type Reg = usize;

pub trait Backend {
    fn alloc_register(&mut self) -> CResult<Reg>;
    fn free_all_registers(&mut self, keep: Option<Reg>);

    fn load_int(&mut self, value: i64, ty: PrimType) -> CResult<Reg>;
    fn load_global(&mut self, sym: SymId, symtab: &SymbolTable) -> CResult<Reg>;
    fn load_local(&mut self, sym: SymId, symtab: &SymbolTable) -> CResult<Reg>;
    fn load_addr(&mut self, sym: SymId, symtab: &SymbolTable) -> CResult<Reg>;
    /// Load the address of a previously emitted string-literal label.
    fn load_string(&mut self, label: usize) -> CResult<Reg>;

    fn add(&mut self, l: Reg, r: Reg) -> CResult<Reg>;
    fn sub(&mut self, l: Reg, r: Reg) -> CResult<Reg>;
    fn mul(&mut self, l: Reg, r: Reg) -> CResult<Reg>;
    fn div(&mut self, l: Reg, r: Reg) -> CResult<Reg>;
    fn bitand(&mut self, l: Reg, r: Reg) -> CResult<Reg>;
    fn bitor(&mut self, l: Reg, r: Reg) -> CResult<Reg>;
    fn bitxor(&mut self, l: Reg, r: Reg) -> CResult<Reg>;
    fn shl(&mut self, l: Reg, r: Reg) -> CResult<Reg>;
    fn shr(&mut self, l: Reg, r: Reg) -> CResult<Reg>;
    fn negate(&mut self, r: Reg) -> CResult<Reg>;
    fn invert(&mut self, r: Reg) -> CResult<Reg>;
    fn lognot(&mut self, r: Reg) -> CResult<Reg>;
    fn to_bool(&mut self, r: Reg, jump_false: Option<usize>) -> CResult<Reg>;

    /// A comparison used in a value context (`a == b` as an expression).
    fn compare_and_set(&mut self, op: AstOp, l: Reg, r: Reg) -> CResult<Reg>;
    /// A comparison used in a control-flow condition: jump to `label` if
    /// the comparison is false.
    fn compare_and_jump(&mut self, op: AstOp, l: Reg, r: Reg, label: usize) -> CResult<()>;

    /// Multiply `r` by `scale` (power-of-two scales lower to a shift).
    fn scale(&mut self, r: Reg, scale: i64) -> CResult<Reg>;
    fn widen(&mut self, r: Reg, from: PrimType, to: PrimType) -> CResult<Reg>;

    fn store_global(&mut self, r: Reg, sym: SymId, symtab: &SymbolTable) -> CResult<Reg>;
    fn store_local(&mut self, r: Reg, sym: SymId, symtab: &SymbolTable) -> CResult<Reg>;
    /// `STORDEREF`: store `value` through the pointer held in `addr`.
    fn store_deref(&mut self, value: Reg, addr: Reg, ty: PrimType) -> CResult<Reg>;
    /// Load through a pointer register.
    fn deref(&mut self, addr: Reg, ty: PrimType) -> CResult<Reg>;

    fn emit_label(&mut self, label: usize);
    fn jump(&mut self, label: usize);

    fn func_preamble(&mut self, sym: SymId, symtab: &SymbolTable);
    fn func_postamble(&mut self, sym: SymId, symtab: &SymbolTable);
    fn return_value(&mut self, r: Option<Reg>, sym: SymId, symtab: &SymbolTable);

    /// Place argument `r` into the ABI slot for position `index` (0-based).
    fn copy_arg(&mut self, r: Reg, index: usize) -> CResult<()>;
    fn call(&mut self, sym: SymId, symtab: &SymbolTable, numargs: usize) -> CResult<Reg>;

    fn glob_str(&mut self, label: usize, text: &str, append: bool);
    fn glob_str_end(&mut self, label: usize);

    /// Emit a jump table: `selector` is tested against each `(value,
    /// label)` pair in `cases`, falling through to `default_label`.
    fn switch(&mut self, selector: Reg, cases: &[(i64, usize)], default_label: usize) -> CResult<()>;

    /// The target-specific text produced so far, for the driver to write
    /// to the `.s` file it hands to the assembler.
    fn assembly(&self) -> &str;
}
