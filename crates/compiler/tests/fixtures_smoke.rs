//! Compile-only smoke tests for the literal programs in `tests/fixtures/`,
//! ported from the end-to-end scenarios the harness can't run to a real
//! executable (no `cpp`/`as`/`cc` collaborators here). Each fixture only
//! needs to make it through `compile_to_assembly` without error; a no-op
//! backend stands in for x86-64 the same way `driver`'s own unit tests do.

use cwjc::ast::AstOp;
use cwjc::backend::{Backend, Reg};
use cwjc::symtab::{SymId, SymbolTable};
use cwjc::types::PrimType;
use cwjc::{compile_to_assembly, CResult, CompilerConfig};

#[derive(Default)]
struct NullBackend {
    next_reg: Reg,
}

impl Backend for NullBackend {
    fn alloc_register(&mut self) -> CResult<Reg> {
        let r = self.next_reg;
        self.next_reg += 1;
        Ok(r)
    }
    fn free_all_registers(&mut self, _keep: Option<Reg>) {
        self.next_reg = 0;
    }
    fn load_int(&mut self, _value: i64, _ty: PrimType) -> CResult<Reg> {
        self.alloc_register()
    }
    fn load_global(&mut self, _sym: SymId, _symtab: &SymbolTable) -> CResult<Reg> {
        self.alloc_register()
    }
    fn load_local(&mut self, _sym: SymId, _symtab: &SymbolTable) -> CResult<Reg> {
        self.alloc_register()
    }
    fn load_addr(&mut self, _sym: SymId, _symtab: &SymbolTable) -> CResult<Reg> {
        self.alloc_register()
    }
    fn load_string(&mut self, _label: usize) -> CResult<Reg> {
        self.alloc_register()
    }
    fn add(&mut self, l: Reg, _r: Reg) -> CResult<Reg> {
        Ok(l)
    }
    fn sub(&mut self, l: Reg, _r: Reg) -> CResult<Reg> {
        Ok(l)
    }
    fn mul(&mut self, l: Reg, _r: Reg) -> CResult<Reg> {
        Ok(l)
    }
    fn div(&mut self, l: Reg, _r: Reg) -> CResult<Reg> {
        Ok(l)
    }
    fn bitand(&mut self, l: Reg, _r: Reg) -> CResult<Reg> {
        Ok(l)
    }
    fn bitor(&mut self, l: Reg, _r: Reg) -> CResult<Reg> {
        Ok(l)
    }
    fn bitxor(&mut self, l: Reg, _r: Reg) -> CResult<Reg> {
        Ok(l)
    }
    fn shl(&mut self, l: Reg, _r: Reg) -> CResult<Reg> {
        Ok(l)
    }
    fn shr(&mut self, l: Reg, _r: Reg) -> CResult<Reg> {
        Ok(l)
    }
    fn negate(&mut self, r: Reg) -> CResult<Reg> {
        Ok(r)
    }
    fn invert(&mut self, r: Reg) -> CResult<Reg> {
        Ok(r)
    }
    fn lognot(&mut self, r: Reg) -> CResult<Reg> {
        Ok(r)
    }
    fn to_bool(&mut self, r: Reg, _jump_false: Option<usize>) -> CResult<Reg> {
        Ok(r)
    }
    fn compare_and_set(&mut self, _op: AstOp, l: Reg, _r: Reg) -> CResult<Reg> {
        Ok(l)
    }
    fn compare_and_jump(&mut self, _op: AstOp, _l: Reg, _r: Reg, _label: usize) -> CResult<()> {
        Ok(())
    }
    fn scale(&mut self, r: Reg, _scale: i64) -> CResult<Reg> {
        Ok(r)
    }
    fn widen(&mut self, r: Reg, _from: PrimType, _to: PrimType) -> CResult<Reg> {
        Ok(r)
    }
    fn store_global(&mut self, r: Reg, _sym: SymId, _symtab: &SymbolTable) -> CResult<Reg> {
        Ok(r)
    }
    fn store_local(&mut self, r: Reg, _sym: SymId, _symtab: &SymbolTable) -> CResult<Reg> {
        Ok(r)
    }
    fn store_deref(&mut self, value: Reg, _addr: Reg, _ty: PrimType) -> CResult<Reg> {
        Ok(value)
    }
    fn deref(&mut self, addr: Reg, _ty: PrimType) -> CResult<Reg> {
        Ok(addr)
    }
    fn emit_label(&mut self, _label: usize) {}
    fn jump(&mut self, _label: usize) {}
    fn func_preamble(&mut self, _sym: SymId, _symtab: &SymbolTable) {}
    fn func_postamble(&mut self, _sym: SymId, _symtab: &SymbolTable) {}
    fn return_value(&mut self, _r: Option<Reg>, _sym: SymId, _symtab: &SymbolTable) {}
    fn copy_arg(&mut self, _r: Reg, _index: usize) -> CResult<()> {
        Ok(())
    }
    fn call(&mut self, _sym: SymId, _symtab: &SymbolTable, _numargs: usize) -> CResult<Reg> {
        self.alloc_register()
    }
    fn glob_str(&mut self, _label: usize, _text: &str, _append: bool) {}
    fn glob_str_end(&mut self, _label: usize) {}
    fn switch(&mut self, _selector: Reg, _cases: &[(i64, usize)], _default_label: usize) -> CResult<()> {
        Ok(())
    }
    fn assembly(&self) -> &str {
        ""
    }
}

macro_rules! fixture_test {
    ($name:ident, $file:literal) => {
        #[test]
        fn $name() {
            let source = include_str!(concat!("fixtures/", $file));
            let mut backend = NullBackend::default();
            let config = CompilerConfig::default();
            let result = compile_to_assembly(source, &mut backend, &config);
            assert!(result.is_ok(), "{} failed to compile: {:?}", $file, result.err());
        }
    };
}

fixture_test!(expression_compiles, "expression.c");
fixture_test!(factorial_compiles, "factorial.c");
fixture_test!(fibonacci_compiles, "fibonacci.c");
fixture_test!(mutual_recursion_compiles, "mutual_recursion.c");
fixture_test!(pointer_short_circuit_compiles, "pointer_short_circuit.c");
fixture_test!(pointer_scaling_compiles, "pointer_scaling.c");
