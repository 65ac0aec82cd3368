//! PIM Matrix Multiplication Compiler
//!
//! This library lowers a recognized matrix multiplication `C = A @ B` into a
//! stream of fixed-width instructions for a processing-in-memory device,
//! together with the memory layout planning that goes with it.
//!
//! # Example
//!
//! ```rust
//! use pim_compiler::{compile_shape, render, CompilerConfig, Diagnostics};
//!
//! let config = CompilerConfig::default();
//! let mut diag = Diagnostics::new();
//! let stream = compile_shape("matrixMultiply", 2, 2, 2, &config, &mut diag).unwrap();
//! assert_eq!(stream.len(), 67);
//! print!("{}", render::listing(&stream));
//! ```

pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod frontend;
pub mod ir;
pub mod isa;
pub mod layout;
pub mod listing;
pub mod mapper;
pub mod render;
pub mod stream;

pub use backend::PimBackend;
pub use config::{CompilerConfig, OutputFormat, PimArchParams};
pub use diagnostics::{Diagnostics, Level};
pub use error::{CompileError, CompileResult};
pub use frontend::{MatMulShape, RecognizedMatMul};
pub use ir::{IrFunction, IrModule};
pub use isa::{Instruction, Opcode};
pub use layout::{AddressPlan, DimensionTable};
pub use mapper::{MappingReport, MemoryMapper};
pub use stream::{InstructionStream, Phase};

/// Everything the compiler receives for one function
#[derive(Debug, Clone, Default)]
pub struct CompilationUnit {
    /// `None` when the front end found no matrix multiplication
    pub recognized: Option<RecognizedMatMul>,
    /// IR rewritten in place by the memory mapper
    pub ir: Option<IrModule>,
}

impl CompilationUnit {
    pub fn new(recognized: RecognizedMatMul) -> Self {
        Self {
            recognized: Some(recognized),
            ir: None,
        }
    }

    pub fn with_ir(mut self, ir: IrModule) -> Self {
        self.ir = Some(ir);
        self
    }
}

/// Main compilation function: plan memory, map the IR, generate instructions
pub fn compile(
    unit: &mut CompilationUnit,
    config: &CompilerConfig,
    diag: &mut Diagnostics,
) -> CompileResult<InstructionStream> {
    let rec = match unit.recognized.as_ref() {
        Some(rec) => rec,
        None => {
            let err = CompileError::unrecognized("front end produced no recognized multiply");
            diag.error(err.to_string());
            return Err(err);
        }
    };
    diag.info(format!("Compiling function {}", rec.function));

    let shape = rec.require_shape().map_err(|e| {
        diag.error(format!("{}: no translation performed", e));
        e
    })?;
    config.validate_shape(&shape).map_err(|e| {
        diag.error(format!("{}: no translation performed", e));
        e
    })?;

    let plan = AddressPlan::for_matmul(rec, &shape)?;
    for p in plan.placements() {
        diag.debug(format!(
            "{} ({}x{}) placed at {}..{}",
            p.matrix.name,
            p.matrix.rows,
            p.matrix.cols,
            p.range().start,
            p.range().end
        ));
    }

    if config.enable_memory_mapping {
        let ir = unit.ir.as_mut().ok_or_else(|| {
            CompileError::missing_ir(format!("memory mapping enabled but no IR for {}", rec.function))
        })?;
        let dims = DimensionTable::from_recognized(rec)?;
        let report = MemoryMapper::new(&dims).apply(ir, diag);
        if report.skipped > 0 {
            diag.warn(format!("{} memory accesses left unmapped", report.skipped));
        }
    } else {
        diag.debug("Memory mapping disabled");
    }

    PimBackend::new(config.clone()).generate(rec, &plan, diag)
}

/// Compile a multiply of the given shape, with the unrolled reference IR
pub fn compile_shape(
    function: &str,
    rows: u32,
    cols: u32,
    common: u32,
    config: &CompilerConfig,
    diag: &mut Diagnostics,
) -> CompileResult<InstructionStream> {
    let shape = MatMulShape::new(rows, cols, common);
    // The unrolled IR grows with rows * cols * common; reject before building it
    config.validate_shape(&shape).map_err(|e| {
        diag.error(format!("{}: no translation performed", e));
        e
    })?;

    let ir = IrModule::new("MatrixMultiplicationModule")
        .with_function(IrFunction::unrolled_matmul(function, &shape));
    let mut unit = CompilationUnit::new(RecognizedMatMul::new(function, Some(shape))).with_ir(ir);
    compile(&mut unit, config, diag)
}
