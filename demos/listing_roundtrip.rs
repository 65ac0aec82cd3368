//! Example: Reading Listings Back
//!
//! Renders a stream as text and as a binary image, then reads both back.
//!
//! Run with: cargo run --example listing_roundtrip

use pim_compiler::{compile_shape, listing, render, CompilerConfig, Diagnostics};

fn main() {
    println!("=== Listing Round Trip Example ===\n");

    let stream = compile_shape("matrixMultiply", 2, 3, 2, &CompilerConfig::default(), &mut Diagnostics::new())
        .unwrap();

    // Example 1: text listing
    let text = render::listing(&stream);
    let parsed = listing::parse_listing(&text).unwrap();
    println!("Example 1: text listing");
    println!("  {} lines rendered, {} instructions read back", text.lines().count(), parsed.len());
    println!("  identical: {}\n", parsed == stream.instructions());

    // Example 2: binary image
    let image = render::binary_image(&stream);
    let decoded = listing::disassemble(&image).unwrap();
    println!("Example 2: binary image");
    println!("  {} bytes, {} words decoded", image.len(), decoded.len());
    println!("  first word: {:02x?}\n", &image[..4]);

    // Example 3: a tampered line is caught
    println!("Example 3: tampered listing");
    let tampered = text.replacen("CONFIG 0, 4", "CONFIG 0, 5", 1);
    match listing::parse_listing(&tampered) {
        Ok(_) => println!("  unexpectedly accepted"),
        Err(e) => println!("  {}", e),
    }
}
