//! PIM Matrix Multiplication Compiler CLI
//!
//! Usage:
//!   pimc --shape A=2x3 --shape B=3x2
//!   pimc --rows 4 --cols 4 --common 8 --format binary -o mm.bin
//!   pimc --verify mm.pim
//!   pimc --disassemble mm.bin

use clap::Parser as ClapParser;
use colored::Colorize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use pim_compiler::{
    compile, listing, render, CompilationUnit, CompileError, CompileResult, CompilerConfig,
    Diagnostics, InstructionStream, IrFunction, IrModule, MatMulShape, OutputFormat,
    RecognizedMatMul,
};

#[derive(ClapParser, Debug)]
#[command(name = "pimc")]
#[command(author = "PIM Team")]
#[command(version = "0.1.0")]
#[command(about = "Compiles matrix multiplications to PIM instruction streams")]
struct Args {
    /// Define matrix shapes (e.g., "A=2x3"); A and B are required, C is checked if given
    #[arg(short = 's', long = "shape", value_parser = parse_shape)]
    shapes: Vec<(String, (u32, u32))>,

    /// Rows of A and C
    #[arg(long = "rows")]
    rows: Option<u32>,

    /// Columns of B and C
    #[arg(long = "cols")]
    cols: Option<u32>,

    /// Columns of A, rows of B
    #[arg(long = "common")]
    common: Option<u32>,

    /// Name of the compiled function
    #[arg(long = "function", default_value = "matrixMultiply")]
    function: String,

    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Output format: text, binary or json
    #[arg(short = 'f', long = "format")]
    format: Option<OutputFormat>,

    /// Compiler configuration (JSON)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Print the IR after memory mapping
    #[arg(long = "dump-ir")]
    dump_ir: bool,

    /// Skip the memory mapping pass
    #[arg(long = "no-memory-mapping")]
    no_memory_mapping: bool,

    /// Check a text listing and report its instruction count
    #[arg(long = "verify", value_name = "LISTING")]
    verify: Option<PathBuf>,

    /// Print the listing of a binary image
    #[arg(long = "disassemble", value_name = "IMAGE")]
    disassemble: Option<PathBuf>,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn parse_shape(s: &str) -> Result<(String, (u32, u32)), String> {
    let parts: Vec<&str> = s.split('=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid shape format: {}", s));
    }

    let name = parts[0].to_string();
    let dims: Vec<&str> = parts[1].split('x').collect();
    if dims.len() != 2 {
        return Err(format!("Invalid dimensions: {}", parts[1]));
    }

    let rows = dims[0]
        .parse::<u32>()
        .map_err(|_| format!("Invalid row count: {}", dims[0]))?;
    let cols = dims[1]
        .parse::<u32>()
        .map_err(|_| format!("Invalid col count: {}", dims[1]))?;

    Ok((name, (rows, cols)))
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .try_init();

    if let Err(e) = run(&args) {
        eprintln!("{}: {}", "Error".red(), e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> CompileResult<()> {
    if let Some(path) = &args.verify {
        return verify(path);
    }
    if let Some(path) = &args.disassemble {
        return disassemble(path, args.output.as_deref());
    }

    let mut config = match &args.config {
        Some(path) => CompilerConfig::from_file(path)?,
        None => CompilerConfig::default(),
    };
    if let Some(format) = args.format {
        config.output_format = format;
    }
    if args.no_memory_mapping {
        config.enable_memory_mapping = false;
    }
    config.verbose |= args.verbose;

    let rec = recognize(args)?;
    let shape = rec.require_shape()?;
    config.validate_shape(&shape)?;

    if config.verbose {
        eprintln!("{}", "PIM Matrix Multiplication Compiler".bold().blue());
        eprintln!("{}", "=".repeat(35));
        eprintln!("{}: {}", "Function".green(), rec.function);
        eprintln!("{}: {}", "Shape".green(), shape);
        eprintln!();
    }

    let ir = IrModule::new("MatrixMultiplicationModule")
        .with_function(IrFunction::unrolled_matmul(rec.function.as_str(), &shape));
    let mut unit = CompilationUnit::new(rec).with_ir(ir);
    let mut diag = Diagnostics::new();
    let stream = compile(&mut unit, &config, &mut diag)?;

    if args.dump_ir {
        if let Some(ir) = &unit.ir {
            eprintln!("{}", ir);
        }
    }
    if config.verbose {
        print_summary(&stream);
    }

    write_stream(&stream, config.output_format, args.output.as_deref())
}

fn recognize(args: &Args) -> CompileResult<RecognizedMatMul> {
    if !args.shapes.is_empty() {
        let declarations: Vec<(&str, (u32, u32))> = args
            .shapes
            .iter()
            .map(|(name, dims)| (name.as_str(), *dims))
            .collect();
        return RecognizedMatMul::from_declarations(args.function.as_str(), &declarations);
    }

    match (args.rows, args.cols, args.common) {
        (Some(rows), Some(cols), Some(common)) => Ok(RecognizedMatMul::new(
            args.function.as_str(),
            Some(MatMulShape::new(rows, cols, common)),
        )),
        _ => Err(CompileError::missing_dimensions(args.function.as_str())),
    }
}

fn write_stream(stream: &InstructionStream, format: OutputFormat, output: Option<&Path>) -> CompileResult<()> {
    let bytes = match format {
        OutputFormat::Text => render::listing(stream).into_bytes(),
        OutputFormat::Binary => render::binary_image(stream),
        OutputFormat::Json => {
            let mut json = stream.to_json()?;
            json.push('\n');
            json.into_bytes()
        }
    };
    write_bytes(&bytes, output)
}

fn write_bytes(bytes: &[u8], output: Option<&Path>) -> CompileResult<()> {
    match output {
        Some(path) => fs::write(path, bytes)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn verify(path: &Path) -> CompileResult<()> {
    let source = fs::read_to_string(path)?;
    let instructions = listing::parse_listing(&source)?;
    println!(
        "{}: {} instructions in {}",
        "Verified".green(),
        instructions.len(),
        path.display()
    );
    Ok(())
}

fn disassemble(path: &Path, output: Option<&Path>) -> CompileResult<()> {
    let image = fs::read(path)?;
    let instructions = listing::disassemble(&image)?;
    let mut text = String::new();
    for inst in &instructions {
        text.push_str(&inst.to_string());
        text.push('\n');
    }
    write_bytes(text.as_bytes(), output)
}

fn print_summary(stream: &InstructionStream) {
    eprintln!("{}", "Compilation Results".bold().green());
    eprintln!("{}", "=".repeat(50));
    eprintln!("{}: {}", "Instructions".cyan(), stream.len());
    for span in stream.phases() {
        eprintln!("  {}: {}", format!("{} phase", span.phase).cyan(), span.len());
    }
    eprintln!();
    eprintln!("{}", "Opcode counts".bold().yellow());
    eprintln!("{}", "-".repeat(50));
    for (op, count) in stream.opcode_counts() {
        eprintln!("  {:<7} {}", op.mnemonic(), count);
    }
    eprintln!();
}
