//! Compiler configuration and PIM architecture parameters

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};
use crate::frontend::MatMulShape;

/// Scratch registers used by the multiply-accumulate sequence (R0..=R3)
pub const SCRATCH_REGISTERS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptLevel {
    O0,
    O1,
    O2,
    O3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Binary,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "binary" => Ok(OutputFormat::Binary),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

/// Hardware parameters of the target PIM device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PimArchParams {
    pub num_processing_elements: u32,
    /// Bytes per memory bank
    pub memory_bank_size: u32,
    pub num_memory_banks: u32,
    /// Registers per processing element
    pub register_file_size: u32,
    /// Word size in bits
    pub word_size: u32,
    /// Largest accepted matrix dimension
    pub matrix_dim_limit: u32,
}

impl Default for PimArchParams {
    fn default() -> Self {
        Self {
            num_processing_elements: 128,
            memory_bank_size: 1024,
            num_memory_banks: 64,
            register_file_size: 8,
            word_size: 32,
            matrix_dim_limit: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub opt_level: OptLevel,
    pub output_format: OutputFormat,
    pub verbose: bool,
    pub enable_memory_mapping: bool,
    pub arch: PimArchParams,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            opt_level: OptLevel::O2,
            output_format: OutputFormat::Text,
            verbose: false,
            enable_memory_mapping: true,
            arch: PimArchParams::default(),
        }
    }
}

impl CompilerConfig {
    pub fn from_json_str(json: &str) -> CompileResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> CompileResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check that this configuration can lower a multiply of `shape`
    pub fn validate_shape(&self, shape: &MatMulShape) -> CompileResult<()> {
        if self.arch.register_file_size < SCRATCH_REGISTERS {
            return Err(CompileError::config(format!(
                "register file has {} registers, the multiply sequence needs {}",
                self.arch.register_file_size, SCRATCH_REGISTERS
            )));
        }

        let limit = self.arch.matrix_dim_limit;
        for (label, dim) in [("rows", shape.rows), ("cols", shape.cols), ("common", shape.common)] {
            if dim == 0 || dim > limit {
                return Err(CompileError::config(format!(
                    "{} = {} is outside the supported range 1..={}",
                    label, dim, limit
                )));
            }
        }

        if instruction_count(shape).is_none() {
            return Err(CompileError::config(format!(
                "shape {} needs more than {} addresses or instructions",
                shape,
                u32::MAX
            )));
        }
        Ok(())
    }
}

/// Instruction count of a shape, if it and the address span fit in `u32`
fn instruction_count(shape: &MatMulShape) -> Option<u32> {
    let a = shape.rows.checked_mul(shape.common)?;
    let b = shape.common.checked_mul(shape.cols)?;
    let c = shape.rows.checked_mul(shape.cols)?;
    let span = a.checked_add(b)?.checked_add(c)?;

    let compute = c
        .checked_mul(shape.common)?
        .checked_mul(crate::backend::INSTRUCTIONS_PER_MAC)?;
    span.checked_add(3)?.checked_add(compute)?.checked_add(c)
}
