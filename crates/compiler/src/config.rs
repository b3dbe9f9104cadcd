//! Compiler configuration.
//!
//! Ports the teacher's `CompilerConfig` builder pattern to the option flags
//! of the `cwj` driver (`-v -c -S -T -M -o`). Keeping the toolchain command
//! names here (rather than hard-coded in the driver) lets tests substitute
//! a fake `cpp`/`as`/`cc` instead of shelling out to a real toolchain.

use std::path::PathBuf;

/// Default name of the linked executable, matching `AOUT` in the original.
pub const DEFAULT_OUTFILE: &str = "a.out";

/// Maximum number of object files a single link step may combine, matching
/// `MAXOBJ` in the original `main()`.
pub const MAX_OBJECT_FILES: usize = 100;

/// Length of the scanner's identifier/string text buffer, matching
/// `TEXTLEN` in the original `defs.h`.
pub const TEXTLEN: usize = 512;

/// Runtime configuration for one invocation of the compiler.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// `-T`: dump the AST for each input file.
    pub dump_ast: bool,
    /// `-M`: dump the symbol tables for each input file.
    pub dump_symtab: bool,
    /// `-S`: keep the generated assembly, skip assembling/linking.
    pub keep_asm: bool,
    /// `-c`: assemble to object code but don't link.
    pub assemble_only: bool,
    /// `-v`: print the stages and the commands run for each one.
    pub verbose: bool,
    /// Whether the final link step runs at all.
    pub do_link: bool,
    /// `-o outfile`.
    pub out_file: PathBuf,
    /// System header search path passed to the preprocessor as `-isystem`.
    pub include_dir: PathBuf,
    /// Preprocessor command (defaults to `cpp -nostdinc -isystem`, `CPPCMD`).
    pub cpp_cmd: String,
    /// Assembler command (defaults to `as`, `ASCMD`).
    pub as_cmd: String,
    /// Linker-driver command (defaults to `cc`, `LDCMD`).
    pub cc_cmd: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            dump_ast: false,
            dump_symtab: false,
            keep_asm: false,
            assemble_only: false,
            verbose: false,
            do_link: true,
            out_file: PathBuf::from(DEFAULT_OUTFILE),
            include_dir: PathBuf::from("/usr/include"),
            cpp_cmd: "cpp".to_string(),
            as_cmd: "as".to_string(),
            cc_cmd: "cc".to_string(),
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_out_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.out_file = path.into();
        self
    }

    pub fn with_include_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_dir = path.into();
        self
    }

    pub fn verbose(mut self, yes: bool) -> Self {
        self.verbose = yes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_flags() {
        let cfg = CompilerConfig::new();
        assert!(cfg.do_link);
        assert!(!cfg.assemble_only);
        assert!(!cfg.keep_asm);
        assert_eq!(cfg.out_file, PathBuf::from(DEFAULT_OUTFILE));
    }

    #[test]
    fn builder_overrides_out_file() {
        let cfg = CompilerConfig::new().with_out_file("prog");
        assert_eq!(cfg.out_file, PathBuf::from("prog"));
    }
}
