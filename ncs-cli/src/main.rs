//! ncs - inspect, assemble and run compiled NCS script modules

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ncs_assembler::assemble;
use ncs_disassembler::{disassemble_with, ListingOptions};
use ncs_runtime::{ExecutionContext, ExitStatus, Routines, VMConfig, VM};
use ncs_spec::{validate, Program};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ncs")]
#[command(about = "Inspect, assemble and run compiled NCS script modules")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a pcode listing of a module
    Disasm {
        /// Module to read
        input: PathBuf,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Routine names, one per line, line number = routine index
        #[arg(long)]
        routines: Option<PathBuf>,

        /// Prefix instructions with their offsets
        #[arg(long)]
        offsets: bool,
    },

    /// Assemble a pcode listing into a module
    Asm {
        /// Listing to read
        input: PathBuf,

        /// Output module; defaults to the input with a .ncs extension
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Routine names, one per line, line number = routine index
        #[arg(long)]
        routines: Option<PathBuf>,
    },

    /// Decode, re-encode and compare a module byte for byte
    Verify {
        /// Module to check
        input: PathBuf,
    },

    /// Execute a module with no native routines
    Run {
        /// Module to execute
        input: PathBuf,

        /// Fault after this many instructions
        #[arg(long, default_value_t = 1_000_000)]
        max_instructions: u64,

        /// Object id substituted for CONSTO 0
        #[arg(long, default_value_t = ncs_spec::OBJECT_INVALID)]
        caller: u32,

        /// Log every executed instruction (needs -vvv)
        #[arg(long)]
        trace: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Disasm {
            input,
            output,
            routines,
            offsets,
        } => disasm(&input, output.as_deref(), routines.as_deref(), offsets),
        Command::Asm {
            input,
            output,
            routines,
        } => asm(&input, output.as_deref(), routines.as_deref()),
        Command::Verify { input } => verify(&input),
        Command::Run {
            input,
            max_instructions,
            caller,
            trace,
        } => run(
            &input,
            VMConfig {
                max_instructions,
                trace,
            },
            ExecutionContext::with_caller(caller),
        ),
    }
}

/// Module name: file name up to the first dot
fn module_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .unwrap_or("script")
        .to_string()
}

fn load_program(path: &Path) -> Result<Program> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let program = Program::from_bytes(&module_name(path), &bytes)
        .with_context(|| format!("decoding {}", path.display()))?;
    info!(
        module = program.name(),
        instructions = program.len(),
        "loaded module"
    );
    Ok(program)
}

fn load_routine_names(path: Option<&Path>) -> Result<Vec<String>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let names: Vec<String> = text.lines().map(|line| line.trim().to_string()).collect();
    debug!(count = names.len(), "loaded routine names");
    Ok(names)
}

fn disasm(input: &Path, output: Option<&Path>, routines: Option<&Path>, offsets: bool) -> Result<()> {
    let program = load_program(input)?;
    let names = load_routine_names(routines)?;
    let options = ListingOptions {
        header: true,
        offsets,
    };
    let listing = disassemble_with(&program, &names, &options)
        .with_context(|| format!("disassembling {}", input.display()))?;

    match output {
        Some(path) => {
            fs::write(path, listing).with_context(|| format!("writing {}", path.display()))?;
            info!(output = %path.display(), "wrote listing");
        }
        None => print!("{}", listing),
    }
    Ok(())
}

/// `foo.ncs.pcode` and `foo.pcode` both become `foo.ncs`
fn default_module_path(input: &Path) -> PathBuf {
    let stem = if input.extension().is_some_and(|ext| ext == "pcode") {
        input.with_extension("")
    } else {
        input.to_path_buf()
    };
    if stem.extension().is_some_and(|ext| ext == "ncs") {
        stem
    } else {
        stem.with_extension("ncs")
    }
}

fn asm(input: &Path, output: Option<&Path>, routines: Option<&Path>) -> Result<()> {
    let source =
        fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let names = load_routine_names(routines)?;
    let program = assemble(&module_name(input), &source, &names)
        .with_context(|| format!("assembling {}", input.display()))?;

    let report = validate(&program);
    for warning in &report.warnings {
        warn!(%warning, "validation warning");
    }
    if !report.is_valid() {
        for error in &report.errors {
            eprintln!("error: {}", error);
        }
        bail!("{} failed validation", input.display());
    }

    let bytes = program.to_bytes()?;
    let path = output.map(Path::to_path_buf).unwrap_or_else(|| default_module_path(input));
    fs::write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?;
    println!(
        "{}: {} instructions, {} bytes",
        path.display(),
        program.len(),
        bytes.len()
    );
    Ok(())
}

fn verify(input: &Path) -> Result<()> {
    let original = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let program = Program::from_bytes(&module_name(input), &original)
        .with_context(|| format!("decoding {}", input.display()))?;
    let rewritten = program.to_bytes()?;

    if let Some(offset) = original
        .iter()
        .zip(&rewritten)
        .position(|(a, b)| a != b)
    {
        bail!("{}: re-encoded module differs at byte {:#x}", input.display(), offset);
    }
    if original.len() != rewritten.len() {
        bail!(
            "{}: re-encoded module is {} bytes, original {}",
            input.display(),
            rewritten.len(),
            original.len()
        );
    }

    let report = validate(&program);
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    for error in &report.errors {
        println!("error: {}", error);
    }
    println!(
        "{}: {} instructions, {} bytes, round trip ok",
        input.display(),
        program.len(),
        original.len()
    );
    if !report.is_valid() {
        bail!("{} failed validation", input.display());
    }
    Ok(())
}

fn run(input: &Path, config: VMConfig, context: ExecutionContext) -> Result<()> {
    let program = Arc::new(load_program(input)?);
    let vm = VM::new(program, Arc::new(Routines::empty()), context, config);
    let result = vm.run().with_context(|| format!("executing {}", input.display()))?;

    let status = match result.status {
        ExitStatus::Returned => "returned",
        ExitStatus::Suspended => "suspended",
    };
    println!(
        "{} after {} instructions",
        status, result.instructions_executed
    );
    for (slot, value) in result.stack.iter().enumerate() {
        println!("  [{}] {}", slot, value);
    }
    Ok(())
}
