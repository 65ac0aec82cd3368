//! Memory mapping pass
//!
//! Rewrites loads and stores with constant two-dimensional subscripts into
//! flat, zero-based accesses at `row * cols + col`. Anything the pass cannot
//! resolve exactly is left as it was and noted in the diagnostics.

use crate::diagnostics::Diagnostics;
use crate::ir::{Access, IrFunction, IrModule};
use crate::layout::DimensionTable;

/// Why an access was left untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnknownMatrix(String),
    IndexCount(usize),
    NonConstantIndex,
    OutOfBounds { row: u32, col: u32 },
    AlreadyLinear,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UnknownMatrix(name) => write!(f, "unknown matrix '{}'", name),
            SkipReason::IndexCount(n) => write!(f, "{} indices, expected 2", n),
            SkipReason::NonConstantIndex => write!(f, "non-constant index"),
            SkipReason::OutOfBounds { row, col } => write!(f, "index [{}][{}] out of bounds", row, col),
            SkipReason::AlreadyLinear => write!(f, "already linear"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingReport {
    pub rewritten: usize,
    pub skipped: usize,
}

impl MappingReport {
    fn merge(&mut self, other: MappingReport) {
        self.rewritten += other.rewritten;
        self.skipped += other.skipped;
    }
}

pub struct MemoryMapper<'a> {
    dims: &'a DimensionTable,
}

impl<'a> MemoryMapper<'a> {
    pub fn new(dims: &'a DimensionTable) -> Self {
        Self { dims }
    }

    /// Rewrite every function of `module` in place
    pub fn apply(&self, module: &mut IrModule, diag: &mut Diagnostics) -> MappingReport {
        diag.info(format!("Starting memory mapping of module {}", module.name));

        let mut report = MappingReport::default();
        for func in &mut module.functions {
            diag.debug(format!("Applying memory mapping to function: {}", func.name));
            report.merge(self.map_function(func, diag));
        }

        diag.info(format!(
            "Memory mapping complete: {} rewritten, {} skipped",
            report.rewritten, report.skipped
        ));
        report
    }

    pub fn map_function(&self, func: &mut IrFunction, diag: &mut Diagnostics) -> MappingReport {
        let mut report = MappingReport::default();

        for (pos, op) in func.body.iter_mut().enumerate() {
            let Some(access) = op.access_mut() else {
                continue;
            };

            match self.linearize(access) {
                Ok(linear) => {
                    *access = linear;
                    report.rewritten += 1;
                }
                Err(reason) => {
                    diag.debug(format!(
                        "{}: op {} ({}) left unmapped: {}",
                        func.name, pos, access, reason
                    ));
                    report.skipped += 1;
                }
            }
        }

        report
    }

    /// Flat form of `access`, or why it cannot be computed
    pub fn linearize(&self, access: &Access) -> Result<Access, SkipReason> {
        let (base, indices) = match access {
            Access::Indexed { base, indices } => (base, indices),
            Access::Linear { .. } => return Err(SkipReason::AlreadyLinear),
        };

        let matrix = self
            .dims
            .lookup(base)
            .ok_or_else(|| SkipReason::UnknownMatrix(base.clone()))?;

        if indices.len() != 2 {
            return Err(SkipReason::IndexCount(indices.len()));
        }

        let (row, col) = match (indices[0].as_const(), indices[1].as_const()) {
            (Some(row), Some(col)) => (row, col),
            _ => return Err(SkipReason::NonConstantIndex),
        };

        if row >= matrix.rows || col >= matrix.cols {
            return Err(SkipReason::OutOfBounds { row, col });
        }

        Ok(Access::Linear {
            base: base.clone(),
            offset: matrix.linear_index(row, col),
        })
    }
}
