//! PIM code generator
//!
//! Lowers a recognized `C = A @ B` into three phases:
//!
//! 1. load: CONFIG the three array sizes, LOAD every element of A and B,
//!    LOAD zero into every element of C
//! 2. compute: for each (i, j, k), accumulate `A[i][k] * B[k][j]` into
//!    `C[i][j]` through scratch registers R0..R3, six instructions per step
//! 3. store: STORE every element of C back to the host
//!
//! Output depends only on the shape and the address plan.

use crate::config::CompilerConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{CompileError, CompileResult};
use crate::frontend::{MatMulShape, RecognizedMatMul};
use crate::isa::{ConfigParam, Instruction, Opcode, Register};
use crate::layout::{AddressPlan, Placement};
use crate::stream::{InstructionStream, Phase};

/// Host address used for loads and stores until a host mapping exists
pub const HOST_PLACEHOLDER: u32 = 0;

/// Instructions emitted per multiply-accumulate step
pub const INSTRUCTIONS_PER_MAC: u32 = 6;

/// Resolved base offsets for the three operands
#[derive(Debug, Clone, Copy)]
struct Bases {
    a: u32,
    b: u32,
    c: u32,
}

pub struct PimBackend {
    config: CompilerConfig,
}

impl PimBackend {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Generate the full stream for `rec`, or nothing at all
    pub fn generate(
        &self,
        rec: &RecognizedMatMul,
        plan: &AddressPlan,
        diag: &mut Diagnostics,
    ) -> CompileResult<InstructionStream> {
        diag.info(format!("Starting PIM instruction generation for {}", rec.function));

        let shape = match rec.require_shape() {
            Ok(shape) => shape,
            Err(e) => {
                diag.error(format!("{}: no translation performed", e));
                return Err(e);
            }
        };
        let bases = self.check_inputs(rec, &shape, plan).map_err(|e| {
            diag.error(format!("{}: no translation performed", e));
            e
        })?;

        diag.info(format!("Matrix dimensions: {}", shape));

        let mut stream = InstructionStream::new(&rec.function);
        self.emit_loads(&mut stream, &shape, bases, diag);
        self.emit_compute(&mut stream, &shape, bases, diag);
        self.emit_stores(&mut stream, &shape, bases, diag);

        diag.info(format!("Generated {} PIM instructions", stream.len()));
        Ok(stream)
    }

    fn check_inputs(
        &self,
        rec: &RecognizedMatMul,
        shape: &MatMulShape,
        plan: &AddressPlan,
    ) -> CompileResult<Bases> {
        self.config.validate_shape(shape)?;

        let placed = |name: &str, dims: (u32, u32)| -> CompileResult<u32> {
            let p: &Placement = plan
                .placement(name)
                .ok_or_else(|| CompileError::undefined(name))?;
            if (p.matrix.rows, p.matrix.cols) != dims {
                return Err(CompileError::ShapeMismatch {
                    expected: format!("{} to be placed as {:?}", name, dims),
                    got: format!("({}, {})", p.matrix.rows, p.matrix.cols),
                });
            }
            Ok(p.base)
        };

        let bases = Bases {
            a: placed(rec.a.as_str(), shape.a_dims())?,
            b: placed(rec.b.as_str(), shape.b_dims())?,
            c: placed(rec.c.as_str(), shape.c_dims())?,
        };

        if !plan.is_disjoint() {
            return Err(CompileError::config("address plan has overlapping ranges"));
        }
        Ok(bases)
    }

    fn emit_loads(
        &self,
        stream: &mut InstructionStream,
        shape: &MatMulShape,
        bases: Bases,
        diag: &mut Diagnostics,
    ) {
        diag.debug("Generating matrix load instructions");
        stream.begin_phase(Phase::Load);

        stream.push(Instruction::config(ConfigParam::ArraySize, shape.a_elements()));
        stream.push(Instruction::config(ConfigParam::OpMode, shape.b_elements()));
        stream.push(Instruction::config(ConfigParam::Precision, shape.c_elements()));

        for i in 0..shape.rows {
            for k in 0..shape.common {
                let dest = bases.a + i * shape.common + k;
                stream.push(Instruction::load(dest, HOST_PLACEHOLDER, i, k));
            }
        }

        for k in 0..shape.common {
            for j in 0..shape.cols {
                let dest = bases.b + k * shape.cols + j;
                stream.push(Instruction::load(dest, HOST_PLACEHOLDER, k, j));
            }
        }

        // C starts zeroed; the source operand is the literal 0
        for i in 0..shape.rows {
            for j in 0..shape.cols {
                let dest = bases.c + i * shape.cols + j;
                stream.push(Instruction::load(dest, 0, i, j));
            }
        }

        stream.end_phase();
    }

    fn emit_compute(
        &self,
        stream: &mut InstructionStream,
        shape: &MatMulShape,
        bases: Bases,
        diag: &mut Diagnostics,
    ) {
        diag.debug("Generating matrix multiply instructions");
        stream.begin_phase(Phase::Compute);

        let (r0, r1, r2, r3) = (
            Register::R0.id(),
            Register::R1.id(),
            Register::R2.id(),
            Register::R3.id(),
        );

        for i in 0..shape.rows {
            for j in 0..shape.cols {
                let c_addr = bases.c + i * shape.cols + j;
                for k in 0..shape.common {
                    let a_addr = bases.a + i * shape.common + k;
                    let b_addr = bases.b + k * shape.cols + j;

                    stream.push(Instruction::mov(r0, a_addr));
                    stream.push(Instruction::mov(r1, b_addr));
                    stream.push(Instruction::alu(Opcode::Mul, r2, r0, r1));
                    stream.push(Instruction::mov(r3, c_addr));
                    stream.push(Instruction::alu(Opcode::Add, r3, r3, r2));
                    stream.push(Instruction::mov(c_addr, r3));
                }
            }
        }

        stream.end_phase();
    }

    fn emit_stores(
        &self,
        stream: &mut InstructionStream,
        shape: &MatMulShape,
        bases: Bases,
        diag: &mut Diagnostics,
    ) {
        diag.debug("Generating store result instructions");
        stream.begin_phase(Phase::Store);

        for i in 0..shape.rows {
            for j in 0..shape.cols {
                let c_addr = bases.c + i * shape.cols + j;
                stream.push(Instruction::store(HOST_PLACEHOLDER, c_addr, i, j));
            }
        }

        stream.end_phase();
    }
}

/// Stream lengths `(load, compute, store)` for a shape
pub fn expected_phase_lengths(shape: &MatMulShape) -> (u64, u64, u64) {
    let (rows, cols, common) = (shape.rows as u64, shape.cols as u64, shape.common as u64);
    let load = 3 + rows * common + common * cols + rows * cols;
    let compute = INSTRUCTIONS_PER_MAC as u64 * rows * cols * common;
    let store = rows * cols;
    (load, compute, store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::encode;
    use crate::layout::MatrixDescriptor;
    use pretty_assertions::assert_eq;

    fn generate(rows: u32, cols: u32, common: u32) -> InstructionStream {
        let shape = MatMulShape::new(rows, cols, common);
        let rec = RecognizedMatMul::new("matrixMultiply", Some(shape));
        let plan = AddressPlan::for_matmul(&rec, &shape).unwrap();
        let mut diag = Diagnostics::new();
        PimBackend::new(CompilerConfig::default())
            .generate(&rec, &plan, &mut diag)
            .unwrap()
    }

    #[test]
    fn test_2x2x2_counts() {
        let stream = generate(2, 2, 2);
        assert_eq!(stream.len(), 67);
        assert_eq!(stream.phase(Phase::Load).unwrap().len(), 15);
        assert_eq!(stream.phase(Phase::Compute).unwrap().len(), 48);
        assert_eq!(stream.phase(Phase::Store).unwrap().len(), 4);
    }

    #[test]
    fn test_count_formula_rectangular() {
        for &(rows, cols, common) in &[(1, 1, 1), (3, 2, 4), (2, 5, 1), (4, 4, 3)] {
            let shape = MatMulShape::new(rows, cols, common);
            let stream = generate(rows, cols, common);
            let (load, compute, store) = expected_phase_lengths(&shape);
            assert_eq!(stream.phase(Phase::Load).unwrap().len() as u64, load);
            assert_eq!(stream.phase(Phase::Compute).unwrap().len() as u64, compute);
            assert_eq!(stream.phase(Phase::Store).unwrap().len() as u64, store);

            let counts = stream.opcode_counts();
            let loads = (rows * common + common * cols + rows * cols) as usize;
            assert_eq!(counts[&Opcode::Load], loads);
            assert_eq!(counts[&Opcode::Store], (rows * cols) as usize);
            assert_eq!(counts[&Opcode::Mul], shape.mac_count() as usize);
        }
    }

    #[test]
    fn test_phase_lengths_at_dimension_limit() {
        let (load, compute, store) = expected_phase_lengths(&MatMulShape::new(1024, 1024, 1024));
        assert_eq!(load, 3 + 3 * (1 << 20));
        assert_eq!(compute, 6 * (1u64 << 30));
        assert_eq!(store, 1 << 20);
    }

    #[test]
    fn test_config_prologue() {
        let stream = generate(2, 2, 2);
        let lines: Vec<String> = stream.iter().take(3).map(|i| i.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "CONFIG 0, 4 ; 0x44001000",
                "CONFIG 1, 4 ; 0x44041000",
                "CONFIG 2, 4 ; 0x44081000",
            ]
        );
        for (id, inst) in stream.iter().take(3).enumerate() {
            assert_eq!(inst.fields(), (Opcode::Config, id as u32, 4, 0, 0));
        }
    }

    #[test]
    fn test_config_uses_each_operand_size() {
        let stream = generate(3, 2, 4);
        let sizes: Vec<u32> = stream.iter().take(3).map(|i| i.src1()).collect();
        assert_eq!(sizes, vec![12, 8, 6]);
    }

    #[test]
    fn test_load_phase_addresses() {
        // A is 2x3 at 0, B is 3x2 at 6, C is 2x2 at 12
        let stream = generate(2, 2, 3);
        let loads: Vec<_> = stream.phase(Phase::Load).unwrap()[3..].to_vec();
        assert_eq!(loads.len(), 6 + 6 + 4);

        assert_eq!(loads[0].fields(), (Opcode::Load, 0, 0, 0, 0));
        assert_eq!(loads[4].fields(), (Opcode::Load, 4, 0, 1, 1));
        assert_eq!(loads[6].fields(), (Opcode::Load, 6, 0, 0, 0));
        assert_eq!(loads[11].fields(), (Opcode::Load, 11, 0, 2, 1));
        assert_eq!(loads[12].fields(), (Opcode::Load, 12, 0, 0, 0));
        assert_eq!(loads[15].fields(), (Opcode::Load, 15, 0, 1, 1));
    }

    #[test]
    fn test_compute_sequence() {
        let stream = generate(2, 2, 2);
        let compute = stream.phase(Phase::Compute).unwrap();
        // i = 0, j = 1, k = 1: A[0][1] = 1, B[1][1] = 4 + 3 = 7, C[0][1] = 8 + 1 = 9
        let step: Vec<_> = compute[18..24].iter().map(|i| i.fields()).collect();
        assert_eq!(
            step,
            vec![
                (Opcode::Move, 0, 1, 0, 0),
                (Opcode::Move, 1, 7, 0, 0),
                (Opcode::Mul, 2, 0, 1, 0),
                (Opcode::Move, 3, 9, 0, 0),
                (Opcode::Add, 3, 3, 2, 0),
                (Opcode::Move, 9, 3, 0, 0),
            ]
        );
    }

    #[test]
    fn test_store_phase() {
        let stream = generate(2, 3, 1);
        let stores: Vec<_> = stream.phase(Phase::Store).unwrap().iter().map(|i| i.fields()).collect();
        // C starts after A (2x1) and B (1x3)
        assert_eq!(stores[0], (Opcode::Store, 0, 5, 0, 0));
        assert_eq!(stores[5], (Opcode::Store, 0, 10, 1, 2));
        assert_eq!(stream.iter().last().unwrap().to_string(), "STORE 0, 10 [1, 2] ; 0x08002806");
    }

    #[test]
    fn test_deterministic_output() {
        let first = generate(3, 2, 4);
        let second = generate(3, 2, 4);
        assert_eq!(first, second);
        let words = |s: &InstructionStream| s.iter().map(|i| i.encode()).collect::<Vec<_>>();
        assert_eq!(words(&first), words(&second));
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_missing_dimensions_emits_nothing() {
        let rec = RecognizedMatMul::new("matrixMultiply", None);
        let shape = MatMulShape::new(2, 2, 2);
        let plan = AddressPlan::for_matmul(&rec, &shape).unwrap();
        let mut diag = Diagnostics::new();

        let result = PimBackend::new(CompilerConfig::default()).generate(&rec, &plan, &mut diag);
        assert!(matches!(result, Err(CompileError::MissingDimensions { .. })));
        assert!(diag.contains("no translation performed"));
    }

    #[test]
    fn test_plan_must_match_shape() {
        let shape = MatMulShape::new(2, 2, 2);
        let rec = RecognizedMatMul::new("f", Some(shape));
        let plan = AddressPlan::concatenated(vec![
            MatrixDescriptor::new("A", 2, 2),
            MatrixDescriptor::new("B", 2, 3),
            MatrixDescriptor::new("C", 2, 2),
        ])
        .unwrap();
        let mut diag = Diagnostics::new();
        let result = PimBackend::new(CompilerConfig::default()).generate(&rec, &plan, &mut diag);
        assert!(matches!(result, Err(CompileError::ShapeMismatch { .. })));

        let partial = AddressPlan::concatenated(vec![MatrixDescriptor::new("A", 2, 2)]).unwrap();
        let result = PimBackend::new(CompilerConfig::default()).generate(&rec, &partial, &mut diag);
        assert!(matches!(result, Err(CompileError::UndefinedMatrix { .. })));
    }

    #[test]
    fn test_architectural_plan_addresses_truncate() {
        let shape = MatMulShape::new(2, 2, 2);
        let rec = RecognizedMatMul::new("f", Some(shape));
        let plan = AddressPlan::architectural(&rec, &shape).unwrap();
        let mut diag = Diagnostics::new();
        let stream = PimBackend::new(CompilerConfig::default())
            .generate(&rec, &plan, &mut diag)
            .unwrap();

        // first B load targets 1024, which the 8-bit dest field keeps as 0
        let first_b = stream.instructions()[3 + 4];
        assert_eq!(first_b.dest(), 1024);
        assert_eq!(first_b.encode(), encode(Opcode::Load, 0, 0, 0, 0));
    }
}
