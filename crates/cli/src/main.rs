//! `cwj` — command-line front-end.
//!
//! `cwj [-vcSTM] [-o outfile] file [file ...]`, matching §6. Parses
//! options with `clap` (its derive macro bundles short boolean flags like
//! `-vcS` the same way the original's hand-rolled `getopt` loop did), then
//! drives `cwjc::driver` once per input file and links the results.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use cwj_backend_x86::X86Backend;
use cwjc::config::CompilerConfig;
use cwjc::driver;

#[derive(ClapParser, Debug)]
#[command(name = "cwj", about = "A compiler for a C subset, targeting x86-64")]
struct Cli {
    /// Verbose: print the stages and commands run for each one.
    #[arg(short = 'v')]
    verbose: bool,
    /// Compile and assemble only; do not link.
    #[arg(short = 'c')]
    compile_only: bool,
    /// Emit assembly only: keep the `.s` file, skip assembling and linking.
    #[arg(short = 'S')]
    assembly_only: bool,
    /// Dump the AST for each input file.
    #[arg(short = 'T')]
    dump_ast: bool,
    /// Dump the symbol table for each input file.
    #[arg(short = 'M')]
    dump_symtab: bool,
    /// Override the output file name (default `a.out`).
    #[arg(short = 'o', value_name = "outfile")]
    out_file: Option<PathBuf>,
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = CompilerConfig::new();
    config.verbose = cli.verbose;
    config.assemble_only = cli.compile_only;
    config.keep_asm = cli.assembly_only;
    config.dump_ast = cli.dump_ast;
    config.dump_symtab = cli.dump_symtab;
    config.do_link = !cli.compile_only && !cli.assembly_only;
    if let Some(out) = cli.out_file {
        config.out_file = out;
    }

    match run(&cli.files, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("cwj: {message}");
            driver::unlink_on_error(&config.out_file);
            ExitCode::FAILURE
        }
    }
}

fn run(files: &[PathBuf], config: &CompilerConfig) -> Result<(), String> {
    let mut objects = Vec::new();

    for input in files {
        if config.verbose {
            eprintln!("cwj: compiling {}", input.display());
        }
        let asm_path = driver::do_compile::<X86Backend>(input, config).map_err(|e| e.to_string())?;

        if config.keep_asm {
            // `-S`: nothing further for this file.
            continue;
        }

        if config.verbose {
            eprintln!("cwj: assembling {}", asm_path.display());
        }
        let obj_path = driver::do_assemble(&asm_path, config).map_err(|e| e.to_string())?;
        objects.push(obj_path);
    }

    if config.do_link && !objects.is_empty() {
        if config.verbose {
            eprintln!("cwj: linking -> {}", config.out_file.display());
        }
        driver::do_link(&objects, config).map_err(|e| e.to_string())?;
    }

    Ok(())
}
