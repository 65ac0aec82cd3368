//! Example: Rectangular Matrix Multiplication
//!
//! Derives the shape from declared operand dimensions, shows the address
//! plan, and compares the concatenated and architectural layouts.
//!
//! Run with: cargo run --example matmul_rect

use pim_compiler::{
    render, AddressPlan, CompilerConfig, Diagnostics, PimBackend, RecognizedMatMul,
};

fn main() {
    println!("=== Rectangular Matrix Multiplication Example ===\n");

    // Example 1: shape from declarations
    println!("Example 1: A is 3x4, B is 4x2");
    let rec = RecognizedMatMul::from_declarations("rectMultiply", &[("A", (3, 4)), ("B", (4, 2))]).unwrap();
    let shape = rec.require_shape().unwrap();
    println!("Shape: {}", shape);
    println!("Multiply-accumulate steps: {}\n", shape.mac_count());

    // Example 2: concatenated plan
    println!("Example 2: concatenated address plan");
    let plan = AddressPlan::for_matmul(&rec, &shape).unwrap();
    for p in plan.placements() {
        println!("  {} ({}x{}): {:?}", p.matrix.name, p.matrix.rows, p.matrix.cols, p.range());
    }
    println!();

    let backend = PimBackend::new(CompilerConfig::default());
    let mut diag = Diagnostics::new();
    let stream = backend.generate(&rec, &plan, &mut diag).unwrap();
    println!("{}", stream.summary());

    // Example 3: architectural plan; addresses past 255 wrap in the 8-bit fields
    println!("Example 3: architectural address plan");
    let arch = AddressPlan::architectural(&rec, &shape).unwrap();
    for p in arch.placements() {
        println!("  {}: {:?}", p.matrix.name, p.range());
    }
    let arch_stream = backend.generate(&rec, &arch, &mut diag).unwrap();
    for line in render::text_lines(&arch_stream).iter().skip(15).take(3) {
        println!("  {}", line);
    }
    println!();

    // Example 4: inconsistent declarations are rejected
    println!("Example 4: mismatched inner dimensions");
    match RecognizedMatMul::from_declarations("bad", &[("A", (3, 4)), ("B", (5, 2))]) {
        Ok(_) => println!("  unexpectedly accepted"),
        Err(e) => println!("  {}", e),
    }
}
