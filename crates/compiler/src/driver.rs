//! Compilation pipeline: preprocess, parse+codegen, assemble, link.
//!
//! `compile_to_assembly` is generic over `Backend` and does the parts that
//! stay the same no matter the target; `compile_file`/`link_files` shell
//! out to the external `cpp`/`as`/`cc` collaborators named in §6, matching
//! `do_compile`/`do_assemble`/`do_link` in the original `main()`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::ast::AstNode;
use crate::backend::Backend;
use crate::codegen::{gen_ast, GenContext, LabelAllocator};
use crate::config::{CompilerConfig, MAX_OBJECT_FILES};
use crate::dump::Dumper;
use crate::error::{CResult, CompileError};
use crate::optimize::optimise;
use crate::parser::{parse, Program};
use crate::symtab::SymbolTable;

/// Parse, optimise and generate code for one already-preprocessed source
/// string, returning the assembled-text-producing backend and (if
/// requested) the AST/symbol-table dumps.
pub fn compile_to_assembly<B: Backend>(
    source: &str,
    backend: &mut B,
    config: &CompilerConfig,
) -> CResult<CompileReport> {
    let program = parse(source)?;
    let Program { functions, mut symtab, string_literals } = program;

    let mut report = CompileReport::default();

    if config.dump_ast {
        let mut dumper = Dumper::new();
        for func in &functions {
            report.ast_dump.push_str(dumper.dump(func, &symtab, 0));
        }
    }
    if config.dump_symtab {
        report.symtab_dump = dump_symtab(&symtab);
    }

    for (label, text) in &string_literals {
        backend.glob_str(*label, text, false);
        backend.glob_str_end(*label);
    }

    let mut labels = LabelAllocator::new();
    for func in functions {
        let func = optimise(func);
        codegen_function(backend, &mut symtab, &mut labels, &func)?;
    }

    Ok(report)
}

fn codegen_function<B: Backend>(
    backend: &mut B,
    symtab: &mut SymbolTable,
    labels: &mut LabelAllocator,
    func: &AstNode,
) -> CResult<()> {
    let sym = func.sym.expect("top-level FUNCTION node missing symbol");
    // `free_local_syms` cleared this when the function finished parsing;
    // `Return` codegen needs it back to find the enclosing function's type.
    symtab.current_function = Some(sym);
    gen_ast(backend, symtab, labels, func, GenContext::default())?;
    symtab.current_function = None;
    Ok(())
}

fn dump_symtab(symtab: &SymbolTable) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    for (label, ids) in [
        ("globals", &symtab.globals),
        ("structs", &symtab.structs),
        ("unions", &symtab.unions),
        ("enums", &symtab.enums),
        ("typedefs", &symtab.typedefs),
        ("statics", &symtab.statics),
    ] {
        if ids.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{label}:");
        for id in ids {
            let sym = symtab.get(*id);
            let _ = writeln!(out, "  {} ty={:?} size={}", sym.name, sym.ty, sym.size);
        }
    }
    out
}

#[derive(Default)]
pub struct CompileReport {
    pub ast_dump: String,
    pub symtab_dump: String,
}

/// Run an external command, failing with a `CompileError` on a missing
/// binary or non-zero exit — the I/O error class of §7.
fn run_tool(name: &str, args: &[impl AsRef<std::ffi::OsStr>]) -> CResult<()> {
    let output = Command::new(name)
        .args(args)
        .output()
        .map_err(|e| CompileError::new(format!("Failed to run {name}: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CompileError::new(format!("{name} failed: {stderr}")));
    }
    Ok(())
}

/// Preprocess `input` with `cpp`, returning the expanded source text.
pub fn preprocess(input: &Path, config: &CompilerConfig) -> CResult<String> {
    let isystem = format!("{}", config.include_dir.display());
    let output = Command::new(&config.cpp_cmd)
        .arg("-nostdinc")
        .arg("-isystem")
        .arg(&isystem)
        .arg(input)
        .output()
        .map_err(|e| CompileError::new(format!("Failed to run {}: {e}", config.cpp_cmd)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CompileError::new(format!("Preprocessing {} failed: {stderr}", input.display())));
    }
    String::from_utf8(output.stdout).map_err(|e| CompileError::new(format!("Preprocessor output is not UTF-8: {e}")))
}

/// Compile one `.c` input all the way to its `.s` file, returning the
/// assembly path. The caller assembles and/or links it afterward
/// depending on `config`.
pub fn do_compile<B: Backend + Default>(input: &Path, config: &CompilerConfig) -> CResult<PathBuf> {
    let source = preprocess(input, config)?;
    let mut backend = B::default();
    compile_to_assembly(&source, &mut backend, config)?;

    let asm_path = input.with_extension("s");
    fs::write(&asm_path, backend.assembly())
        .map_err(|e| CompileError::new(format!("Failed to write {}: {e}", asm_path.display())))?;
    Ok(asm_path)
}

/// `as -o X.o X.s`.
pub fn do_assemble(asm_path: &Path, config: &CompilerConfig) -> CResult<PathBuf> {
    let obj_path = asm_path.with_extension("o");
    run_tool(&config.as_cmd, &["-o".as_ref(), obj_path.as_os_str(), asm_path.as_os_str()])?;
    Ok(obj_path)
}

/// `cc -o outfile obj1 obj2 ...`, capped at `MAX_OBJECT_FILES` per link.
pub fn do_link(objects: &[PathBuf], config: &CompilerConfig) -> CResult<()> {
    if objects.len() > MAX_OBJECT_FILES {
        return Err(CompileError::new(format!(
            "Too many object files to link: {} exceeds the limit of {MAX_OBJECT_FILES}",
            objects.len()
        )));
    }
    let mut args: Vec<std::ffi::OsString> = vec!["-o".into(), config.out_file.clone().into()];
    args.extend(objects.iter().map(|p| p.clone().into_os_string()));
    run_tool(&config.cc_cmd, &args)
}

/// Clean up a partial output on a fatal error, matching §5's "closes and
/// unlinks the output file" guarantee.
pub fn unlink_on_error(path: &Path) {
    let _ = fs::remove_file(path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwj_test_backend::RecordingBackend;

    #[test]
    fn compiles_a_minimal_function_without_error() {
        let mut backend = RecordingBackend::default();
        let config = CompilerConfig::default();
        let report = compile_to_assembly("int main() { return 0; }", &mut backend, &config).unwrap();
        assert!(report.ast_dump.is_empty());
    }

    #[test]
    fn dump_ast_flag_populates_the_report() {
        let mut backend = RecordingBackend::default();
        let config = CompilerConfig { dump_ast: true, ..CompilerConfig::default() };
        let report = compile_to_assembly("int main() { return 1 + 2; }", &mut backend, &config).unwrap();
        assert!(report.ast_dump.contains("FUNCTION"));
    }

    #[test]
    fn current_function_is_restored_per_function_for_codegen() {
        let mut backend = RecordingBackend::default();
        let config = CompilerConfig::default();
        let source = "int one() { return 1; } int two() { return 2; }";
        assert!(compile_to_assembly(source, &mut backend, &config).is_ok());
    }
}

#[cfg(test)]
mod cwj_test_backend {
    //! A no-op `Backend` used only so `driver`'s tests don't depend on the
    //! x86-64 crate (which itself depends on this one).
    use crate::ast::AstOp;
    use crate::backend::{Backend, Reg};
    use crate::error::CResult;
    use crate::symtab::{SymId, SymbolTable};
    use crate::types::PrimType;

    #[derive(Default)]
    pub struct RecordingBackend {
        next_reg: Reg,
        asm: String,
    }

    impl Backend for RecordingBackend {
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
            &self.asm
        }
    }
}
