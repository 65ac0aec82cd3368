//! Error types for the PIM compiler

use thiserror::Error;

/// Result type for compilation operations
pub type CompileResult<T> = Result<T, CompileError>;

/// Compilation errors
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Missing matrix dimensions for function '{function}'")]
    MissingDimensions { function: String },

    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    #[error("Undefined matrix: {name}")]
    UndefinedMatrix { name: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("No matrix multiplication recognized: {message}")]
    Unrecognized { message: String },

    #[error("Missing intermediate representation: {message}")]
    MissingRepresentation { message: String },

    #[error("Unknown opcode value: {value}")]
    UnknownOpcode { value: u32 },

    #[error("Unknown mnemonic: {name}")]
    UnknownMnemonic { name: String },

    #[error("Listing error on line {line}: {message}")]
    Listing { line: usize, message: String },

    #[error("Encoding mismatch on line {line}: fields encode to {expected:#010x}, listing says {found:#010x}")]
    EncodingMismatch { line: usize, expected: u32, found: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompileError {
    pub fn missing_dimensions(function: impl Into<String>) -> Self {
        CompileError::MissingDimensions { function: function.into() }
    }

    pub fn undefined(name: impl Into<String>) -> Self {
        CompileError::UndefinedMatrix { name: name.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        CompileError::Config { message: msg.into() }
    }

    pub fn unrecognized(msg: impl Into<String>) -> Self {
        CompileError::Unrecognized { message: msg.into() }
    }

    pub fn missing_ir(msg: impl Into<String>) -> Self {
        CompileError::MissingRepresentation { message: msg.into() }
    }

    pub fn listing(line: usize, msg: impl Into<String>) -> Self {
        CompileError::Listing { line, message: msg.into() }
    }
}
