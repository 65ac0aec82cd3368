//! Recognized computations handed to the backend
//!
//! Whatever front end is in use reduces a source function to a
//! [`RecognizedMatMul`]: the three matrix names and, when it could work them
//! out, the multiply's dimensions. The backend never needs to know which
//! front end produced it.

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};

/// Dimensions of `C[rows x cols] = A[rows x common] @ B[common x cols]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatMulShape {
    pub rows: u32,
    pub cols: u32,
    pub common: u32,
}

impl MatMulShape {
    pub fn new(rows: u32, cols: u32, common: u32) -> Self {
        Self { rows, cols, common }
    }

    pub fn a_dims(&self) -> (u32, u32) {
        (self.rows, self.common)
    }

    pub fn b_dims(&self) -> (u32, u32) {
        (self.common, self.cols)
    }

    pub fn c_dims(&self) -> (u32, u32) {
        (self.rows, self.cols)
    }

    pub fn a_elements(&self) -> u32 {
        self.rows * self.common
    }

    pub fn b_elements(&self) -> u32 {
        self.common * self.cols
    }

    pub fn c_elements(&self) -> u32 {
        self.rows * self.cols
    }

    /// Multiply-accumulate steps in the compute phase
    pub fn mac_count(&self) -> u32 {
        self.rows * self.cols * self.common
    }
}

impl std::fmt::Display for MatMulShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} * {}x{}",
            self.rows, self.common, self.common, self.cols
        )
    }
}

/// A function recognized as a matrix multiplication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedMatMul {
    pub function: String,
    pub a: String,
    pub b: String,
    pub c: String,
    /// `None` when the front end could not determine the dimensions
    pub shape: Option<MatMulShape>,
}

impl RecognizedMatMul {
    /// Recognized multiply over matrices named `A`, `B` and `C`
    pub fn new(function: impl Into<String>, shape: Option<MatMulShape>) -> Self {
        Self {
            function: function.into(),
            a: "A".to_string(),
            b: "B".to_string(),
            c: "C".to_string(),
            shape,
        }
    }

    pub fn with_names(
        mut self,
        a: impl Into<String>,
        b: impl Into<String>,
        c: impl Into<String>,
    ) -> Self {
        self.a = a.into();
        self.b = b.into();
        self.c = c.into();
        self
    }

    /// Derive the shape from declared matrices `A`, `B` and optionally `C`
    pub fn from_declarations(
        function: impl Into<String>,
        declarations: &[(&str, (u32, u32))],
    ) -> CompileResult<Self> {
        let lookup = |name: &str| {
            declarations
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, dims)| *dims)
        };

        let (m, k1) = lookup("A").ok_or_else(|| CompileError::undefined("A"))?;
        let (k2, n) = lookup("B").ok_or_else(|| CompileError::undefined("B"))?;

        if k1 != k2 {
            return Err(CompileError::ShapeMismatch {
                expected: format!("inner dimensions to match, got {} and {}", k1, k2),
                got: format!("A: ({}, {}), B: ({}, {})", m, k1, k2, n),
            });
        }

        if let Some((cr, cc)) = lookup("C") {
            if (cr, cc) != (m, n) {
                return Err(CompileError::ShapeMismatch {
                    expected: format!("C to be ({}, {})", m, n),
                    got: format!("({}, {})", cr, cc),
                });
            }
        }

        Ok(Self::new(function, Some(MatMulShape::new(m, n, k1))))
    }

    /// Shape, or the error that stops generation for this function
    pub fn require_shape(&self) -> CompileResult<MatMulShape> {
        self.shape
            .ok_or_else(|| CompileError::missing_dimensions(&self.function))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shape_from_declarations() {
        let rec = RecognizedMatMul::from_declarations(
            "matrixMultiplyFixed",
            &[("A", (3, 4)), ("B", (4, 2)), ("C", (3, 2))],
        )
        .unwrap();
        assert_eq!(rec.shape, Some(MatMulShape::new(3, 2, 4)));
        assert_eq!(rec.a, "A");
    }

    #[test]
    fn test_inner_dimension_mismatch() {
        let result = RecognizedMatMul::from_declarations("f", &[("A", (2, 3)), ("B", (4, 5))]);
        assert!(matches!(result, Err(CompileError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_result_dimension_mismatch() {
        let result = RecognizedMatMul::from_declarations(
            "f",
            &[("A", (2, 3)), ("B", (3, 5)), ("C", (5, 2))],
        );
        assert!(matches!(result, Err(CompileError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_missing_operand() {
        let result = RecognizedMatMul::from_declarations("f", &[("A", (2, 3))]);
        assert!(matches!(result, Err(CompileError::UndefinedMatrix { name }) if name == "B"));
    }

    #[test]
    fn test_require_shape() {
        let rec = RecognizedMatMul::new("matrixMultiply", None);
        assert!(matches!(
            rec.require_shape(),
            Err(CompileError::MissingDimensions { function }) if function == "matrixMultiply"
        ));
    }

    #[test]
    fn test_element_counts() {
        let shape = MatMulShape::new(3, 2, 4);
        assert_eq!(shape.a_elements(), 12);
        assert_eq!(shape.b_elements(), 8);
        assert_eq!(shape.c_elements(), 6);
        assert_eq!(shape.mac_count(), 24);
        assert_eq!(shape.to_string(), "3x4 * 4x2");
    }
}
