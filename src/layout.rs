//! Memory layout planning
//!
//! Matrices are laid out row-major, one contiguous range each, in the PIM
//! linear address space. The default plan concatenates A, B and C in
//! declaration order starting at address 0.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};
use crate::frontend::{MatMulShape, RecognizedMatMul};
use crate::isa::memory_layout;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixDescriptor {
    pub name: String,
    pub rows: u32,
    pub cols: u32,
}

impl MatrixDescriptor {
    pub fn new(name: impl Into<String>, rows: u32, cols: u32) -> Self {
        Self {
            name: name.into(),
            rows,
            cols,
        }
    }

    pub fn elements(&self) -> u32 {
        self.rows * self.cols
    }

    /// Element count, or `None` if it does not fit in `u32`
    pub fn checked_elements(&self) -> Option<u32> {
        self.rows.checked_mul(self.cols)
    }

    /// Row-major offset of `(row, col)` inside this matrix
    pub fn linear_index(&self, row: u32, col: u32) -> u32 {
        row * self.cols + col
    }
}

/// Known matrix dimensions, looked up by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionTable {
    dims: BTreeMap<String, (u32, u32)>,
}

impl DimensionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: &str, rows: u32, cols: u32) {
        self.dims.insert(name.to_string(), (rows, cols));
    }

    pub fn lookup(&self, name: &str) -> Option<MatrixDescriptor> {
        self.dims
            .get(name)
            .map(|&(rows, cols)| MatrixDescriptor::new(name, rows, cols))
    }

    /// Table for a recognized multiply; fails if its dimensions are unknown
    pub fn from_recognized(rec: &RecognizedMatMul) -> CompileResult<Self> {
        let shape = rec.require_shape()?;
        let mut table = Self::new();
        let (ar, ac) = shape.a_dims();
        let (br, bc) = shape.b_dims();
        let (cr, cc) = shape.c_dims();
        table.define(&rec.a, ar, ac);
        table.define(&rec.b, br, bc);
        table.define(&rec.c, cr, cc);
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }
}

/// One matrix and the first address of its range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub matrix: MatrixDescriptor,
    pub base: u32,
}

impl Placement {
    pub fn range(&self) -> Range<u32> {
        self.base..self.base + self.matrix.elements()
    }
}

/// Base offsets for every matrix of a compilation unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPlan {
    placements: Vec<Placement>,
}

impl AddressPlan {
    /// Place matrices back to back in the given order, starting at 0
    pub fn concatenated(matrices: Vec<MatrixDescriptor>) -> CompileResult<Self> {
        let mut placements: Vec<Placement> = Vec::with_capacity(matrices.len());
        let mut next = 0u32;

        for matrix in matrices {
            if placements.iter().any(|p| p.matrix.name == matrix.name) {
                return Err(CompileError::config(format!(
                    "matrix '{}' placed twice",
                    matrix.name
                )));
            }
            let base = next;
            next = matrix
                .checked_elements()
                .and_then(|size| next.checked_add(size))
                .ok_or_else(|| {
                    CompileError::config(format!("matrix '{}' runs past the address space", matrix.name))
                })?;
            placements.push(Placement { matrix, base });
        }

        Ok(Self { placements })
    }

    /// A, B and C of a recognized multiply, concatenated in that order
    pub fn for_matmul(rec: &RecognizedMatMul, shape: &MatMulShape) -> CompileResult<Self> {
        Self::concatenated(Self::operands(rec, shape))
    }

    /// A, B and C pinned to the fixed architectural regions
    pub fn architectural(rec: &RecognizedMatMul, shape: &MatMulShape) -> CompileResult<Self> {
        let bases = [
            (memory_layout::MATRIX_A_OFFSET, memory_layout::MATRIX_B_OFFSET),
            (memory_layout::MATRIX_B_OFFSET, memory_layout::MATRIX_C_OFFSET),
            (memory_layout::MATRIX_C_OFFSET, memory_layout::REGISTER_FILE_OFFSET),
        ];

        let mut placements = Vec::with_capacity(3);
        for (matrix, (base, limit)) in Self::operands(rec, shape).into_iter().zip(bases) {
            let fits = matrix
                .checked_elements()
                .map_or(false, |size| size <= limit - base);
            if !fits {
                return Err(CompileError::config(format!(
                    "matrix '{}' ({}x{}) does not fit its region at {}",
                    matrix.name, matrix.rows, matrix.cols, base
                )));
            }
            placements.push(Placement { matrix, base });
        }

        Ok(Self { placements })
    }

    fn operands(rec: &RecognizedMatMul, shape: &MatMulShape) -> Vec<MatrixDescriptor> {
        let (ar, ac) = shape.a_dims();
        let (br, bc) = shape.b_dims();
        let (cr, cc) = shape.c_dims();
        vec![
            MatrixDescriptor::new(&rec.a, ar, ac),
            MatrixDescriptor::new(&rec.b, br, bc),
            MatrixDescriptor::new(&rec.c, cr, cc),
        ]
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn placement(&self, name: &str) -> Option<&Placement> {
        self.placements.iter().find(|p| p.matrix.name == name)
    }

    pub fn base(&self, name: &str) -> Option<u32> {
        self.placement(name).map(|p| p.base)
    }

    pub fn range(&self, name: &str) -> Option<Range<u32>> {
        self.placement(name).map(Placement::range)
    }

    /// Flat address of `name[row][col]`, if the matrix is placed and the index is in bounds
    pub fn address(&self, name: &str, row: u32, col: u32) -> Option<u32> {
        let p = self.placement(name)?;
        if row >= p.matrix.rows || col >= p.matrix.cols {
            return None;
        }
        Some(p.base + p.matrix.linear_index(row, col))
    }

    /// Checked address lookup for code generation
    pub fn require_address(&self, name: &str, row: u32, col: u32) -> CompileResult<u32> {
        self.address(name, row, col).ok_or_else(|| {
            CompileError::config(format!(
                "no address for {}[{}][{}] in the address plan",
                name, row, col
            ))
        })
    }

    /// One past the highest address used
    pub fn end(&self) -> u32 {
        self.placements
            .iter()
            .map(|p| p.range().end)
            .max()
            .unwrap_or(0)
    }

    pub fn is_disjoint(&self) -> bool {
        self.placements.iter().enumerate().all(|(i, a)| {
            self.placements[i + 1..].iter().all(|b| {
                let (ra, rb) = (a.range(), b.range());
                ra.is_empty() || rb.is_empty() || ra.end <= rb.start || rb.end <= ra.start
            })
        })
    }
}
