//! Example: 2x2 Matrix Multiplication
//!
//! Compiles C = A @ B for 2x2 operands and prints the stream phase by phase.
//!
//! Run with: cargo run --example matmul_2x2

use pim_compiler::{
    compile, render, CompilationUnit, CompilerConfig, Diagnostics, IrFunction, IrModule,
    MatMulShape, Phase, RecognizedMatMul,
};

fn main() {
    println!("=== 2x2 Matrix Multiplication Example ===\n");

    let config = CompilerConfig::default();
    let shape = MatMulShape::new(2, 2, 2);

    // Example 1: the full pipeline, with the IR rewritten by the memory mapper
    println!("Example 1: compile pipeline");
    println!("Shape: {}\n", shape);

    let ir = IrModule::new("MatrixMultiplicationModule")
        .with_function(IrFunction::unrolled_matmul("matrixMultiply", &shape));
    let mut unit = CompilationUnit::new(RecognizedMatMul::new("matrixMultiply", Some(shape))).with_ir(ir);
    let mut diag = Diagnostics::new();
    let stream = compile(&mut unit, &config, &mut diag).unwrap();

    println!("Generated {} instructions", stream.len());
    for phase in [Phase::Load, Phase::Compute, Phase::Store] {
        println!("  {} phase: {}", phase, stream.phase(phase).unwrap().len());
    }
    println!();

    // Example 2: the first multiply-accumulate step
    println!("Example 2: first multiply-accumulate step");
    for inst in &stream.phase(Phase::Compute).unwrap()[..6] {
        println!("  {}", inst);
    }
    println!();

    // Example 3: mapped IR, first few ops
    println!("Example 3: mapped IR (first 8 lines)");
    let dump = unit.ir.as_ref().unwrap().to_string();
    for line in dump.lines().take(8) {
        println!("  {}", line);
    }
    println!();

    // Example 4: export formats
    println!("Example 4: export formats\n");
    println!("Annotated listing:");
    print!("{}", render::annotated_listing(&stream));
    println!();
    println!("Binary image: {} bytes", render::binary_image(&stream).len());
    println!();
    println!("{}", stream.summary());
}
