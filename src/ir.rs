//! Intermediate representation of a recognized kernel
//!
//! This is the form an IR builder hands to the compiler before memory
//! mapping: a flat list of operations per function, where loads and stores
//! address matrices through indexed accesses such as `A[i][k]`. The memory
//! mapper rewrites constant accesses in place into the flat
//! [`Access::Linear`] form.

use serde::{Deserialize, Serialize};

use crate::frontend::MatMulShape;

/// Subscript of an indexed access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Index {
    Const(u32),
    Var(String),
}

impl Index {
    pub fn as_const(&self) -> Option<u32> {
        match self {
            Index::Const(v) => Some(*v),
            Index::Var(_) => None,
        }
    }
}

impl std::fmt::Display for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Index::Const(v) => write!(f, "{}", v),
            Index::Var(name) => write!(f, "{}", name),
        }
    }
}

/// Memory location read or written by a load/store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    /// `base[i][j]...` as written in the source
    Indexed { base: String, indices: Vec<Index> },
    /// Zero-based single index into the matrix's flat range
    Linear { base: String, offset: u32 },
}

impl Access {
    pub fn indexed(base: &str, indices: Vec<Index>) -> Self {
        Access::Indexed {
            base: base.to_string(),
            indices,
        }
    }

    pub fn base(&self) -> &str {
        match self {
            Access::Indexed { base, .. } | Access::Linear { base, .. } => base,
        }
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Access::Indexed { base, indices } => {
                write!(f, "{}", base)?;
                for idx in indices {
                    write!(f, "[{}]", idx)?;
                }
                Ok(())
            }
            Access::Linear { base, offset } => write!(f, "pim_{}[{}]", base, offset),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Value(String),
    Const(i64),
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Value(name) => write!(f, "%{}", name),
            Operand::Const(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl std::fmt::Display for ArithOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrOp {
    Load { dest: String, access: Access },
    Store { value: Operand, access: Access },
    Arith { op: ArithOp, dest: String, lhs: Operand, rhs: Operand },
    LoopBegin { var: String, bound: u32 },
    LoopEnd,
}

impl IrOp {
    pub fn access(&self) -> Option<&Access> {
        match self {
            IrOp::Load { access, .. } | IrOp::Store { access, .. } => Some(access),
            _ => None,
        }
    }

    pub fn access_mut(&mut self) -> Option<&mut Access> {
        match self {
            IrOp::Load { access, .. } | IrOp::Store { access, .. } => Some(access),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<IrOp>,
}

impl IrFunction {
    pub fn new(name: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            name: name.into(),
            params,
            body: Vec::new(),
        }
    }

    /// Fully unrolled `C = A @ B` with constant subscripts
    ///
    /// C is zeroed element by element, then each `C[i][j] += A[i][k] * B[k][j]`
    /// is emitted in i, j, k order.
    pub fn unrolled_matmul(name: impl Into<String>, shape: &MatMulShape) -> Self {
        let mut func = Self::new(name, vec!["A".into(), "B".into(), "C".into()]);
        let mut temps = TempNames::default();
        let c = |i, j| Access::indexed("C", vec![Index::Const(i), Index::Const(j)]);

        for i in 0..shape.rows {
            for j in 0..shape.cols {
                func.body.push(IrOp::Store {
                    value: Operand::Const(0),
                    access: c(i, j),
                });
            }
        }

        for i in 0..shape.rows {
            for j in 0..shape.cols {
                for k in 0..shape.common {
                    func.push_mac(
                        &mut temps,
                        Access::indexed("A", vec![Index::Const(i), Index::Const(k)]),
                        Access::indexed("B", vec![Index::Const(k), Index::Const(j)]),
                        c(i, j),
                    );
                }
            }
        }

        func
    }

    /// The same kernel as a loop nest over `i`, `j`, `k`
    pub fn looped_matmul(name: impl Into<String>, shape: &MatMulShape) -> Self {
        let mut func = Self::new(name, vec!["A".into(), "B".into(), "C".into()]);
        let mut temps = TempNames::default();
        let var = |v: &str| Index::Var(v.to_string());
        let c = || Access::indexed("C", vec![var("i"), var("j")]);

        func.body.push(IrOp::LoopBegin { var: "i".into(), bound: shape.rows });
        func.body.push(IrOp::LoopBegin { var: "j".into(), bound: shape.cols });
        func.body.push(IrOp::Store {
            value: Operand::Const(0),
            access: c(),
        });
        func.body.push(IrOp::LoopBegin { var: "k".into(), bound: shape.common });
        func.push_mac(
            &mut temps,
            Access::indexed("A", vec![var("i"), var("k")]),
            Access::indexed("B", vec![var("k"), var("j")]),
            c(),
        );
        func.body.push(IrOp::LoopEnd);
        func.body.push(IrOp::LoopEnd);
        func.body.push(IrOp::LoopEnd);

        func
    }

    fn push_mac(&mut self, temps: &mut TempNames, a: Access, b: Access, c: Access) {
        let (ta, tb, tp, tc, ts) = (temps.next(), temps.next(), temps.next(), temps.next(), temps.next());
        self.body.push(IrOp::Load { dest: ta.clone(), access: a });
        self.body.push(IrOp::Load { dest: tb.clone(), access: b });
        self.body.push(IrOp::Arith {
            op: ArithOp::Mul,
            dest: tp.clone(),
            lhs: Operand::Value(ta),
            rhs: Operand::Value(tb),
        });
        self.body.push(IrOp::Load { dest: tc.clone(), access: c.clone() });
        self.body.push(IrOp::Arith {
            op: ArithOp::Add,
            dest: ts.clone(),
            lhs: Operand::Value(tc),
            rhs: Operand::Value(tp),
        });
        self.body.push(IrOp::Store {
            value: Operand::Value(ts),
            access: c,
        });
    }

    pub fn memory_ops(&self) -> impl Iterator<Item = &IrOp> {
        self.body.iter().filter(|op| op.access().is_some())
    }
}

#[derive(Default)]
struct TempNames {
    counter: usize,
}

impl TempNames {
    fn next(&mut self) -> String {
        let name = format!("t{}", self.counter);
        self.counter += 1;
        name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrModule {
    pub name: String,
    pub functions: Vec<IrFunction>,
}

impl IrModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    pub fn with_function(mut self, func: IrFunction) -> Self {
        self.functions.push(func);
        self
    }

    pub fn function(&self, name: &str) -> Option<&IrFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

impl std::fmt::Display for IrModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "module {}", self.name)?;
        for func in &self.functions {
            writeln!(f)?;
            writeln!(f, "fn {}({}) {{", func.name, func.params.join(", "))?;
            let mut depth = 1;
            for op in &func.body {
                if matches!(op, IrOp::LoopEnd) {
                    depth -= 1;
                }
                write!(f, "{}", "  ".repeat(depth))?;
                match op {
                    IrOp::Load { dest, access } => writeln!(f, "%{} = load {}", dest, access)?,
                    IrOp::Store { value, access } => writeln!(f, "store {}, {}", value, access)?,
                    IrOp::Arith { op, dest, lhs, rhs } => {
                        writeln!(f, "%{} = {} {}, {}", dest, op, lhs, rhs)?
                    }
                    IrOp::LoopBegin { var, bound } => {
                        writeln!(f, "for {} in 0..{} {{", var, bound)?;
                        depth += 1;
                    }
                    IrOp::LoopEnd => writeln!(f, "}}")?,
                }
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unrolled_op_counts() {
        let shape = MatMulShape::new(2, 3, 4);
        let func = IrFunction::unrolled_matmul("matrixMultiply", &shape);
        // 6 zero stores, then 6 ops per multiply-accumulate
        assert_eq!(func.body.len(), 6 + 6 * 24);
        assert_eq!(func.memory_ops().count(), 6 + 4 * 24);
        assert!(func
            .memory_ops()
            .filter_map(IrOp::access)
            .all(|a| matches!(a, Access::Indexed { indices, .. } if indices.iter().all(|i| i.as_const().is_some()))));
    }

    #[test]
    fn test_looped_structure() {
        let func = IrFunction::looped_matmul("matrixMultiply", &MatMulShape::new(2, 2, 2));
        let loops = func.body.iter().filter(|op| matches!(op, IrOp::LoopBegin { .. })).count();
        let ends = func.body.iter().filter(|op| matches!(op, IrOp::LoopEnd)).count();
        assert_eq!(loops, 3);
        assert_eq!(ends, 3);
    }

    #[test]
    fn test_dump() {
        let shape = MatMulShape::new(1, 1, 1);
        let module = IrModule::new("MatrixMultiplicationModule")
            .with_function(IrFunction::unrolled_matmul("mm", &shape));
        let text = module.to_string();
        assert_eq!(
            text,
            "module MatrixMultiplicationModule\n\
             \n\
             fn mm(A, B, C) {\n  \
             store 0, C[0][0]\n  \
             %t0 = load A[0][0]\n  \
             %t1 = load B[0][0]\n  \
             %t2 = mul %t0, %t1\n  \
             %t3 = load C[0][0]\n  \
             %t4 = add %t3, %t2\n  \
             store %t4, C[0][0]\n\
             }\n"
        );
    }

    #[test]
    fn test_dump_loop_indentation() {
        let module = IrModule::new("m")
            .with_function(IrFunction::looped_matmul("mm", &MatMulShape::new(2, 2, 2)));
        let text = module.to_string();
        assert!(text.contains("  for i in 0..2 {\n    for j in 0..2 {\n      store 0, C[i][j]\n"));
        assert!(text.contains("        %t0 = load A[i][k]\n"));
    }
}
