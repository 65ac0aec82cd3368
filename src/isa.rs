//! PIM instruction set
//!
//! Every instruction is a fixed 32-bit word, most significant field first:
//!
//! ```text
//! [31:26] opcode (6 bits)
//! [25:18] dest   (8 bits)
//! [17:10] src1   (8 bits)
//! [9:2]   src2   (8 bits)
//! [1:0]   imm    (2 bits)
//! ```
//!
//! Fields wider than their slot are masked, never rejected. The 2-bit
//! immediate is narrow, but downstream tools read this exact layout.

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};

pub const OPCODE_SHIFT: u32 = 26;
pub const OPCODE_MASK: u32 = 0x3F;

pub const DEST_SHIFT: u32 = 18;
pub const DEST_MASK: u32 = 0xFF;

pub const SRC1_SHIFT: u32 = 10;
pub const SRC1_MASK: u32 = 0xFF;

pub const SRC2_SHIFT: u32 = 2;
pub const SRC2_MASK: u32 = 0xFF;

pub const IMM_SHIFT: u32 = 0;
pub const IMM_MASK: u32 = 0x3;

/// Operation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,
    Load,
    Store,
    Move,
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Jump,
    JumpZ,
    JumpNz,
    Config,
}

impl Opcode {
    pub const ALL: [Opcode; 18] = [
        Opcode::Nop,
        Opcode::Load,
        Opcode::Store,
        Opcode::Move,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::And,
        Opcode::Or,
        Opcode::Xor,
        Opcode::Not,
        Opcode::Shl,
        Opcode::Shr,
        Opcode::Jump,
        Opcode::JumpZ,
        Opcode::JumpNz,
        Opcode::Config,
    ];

    /// Opcode for a raw 6-bit field value, if one is assigned
    pub fn from_bits(bits: u32) -> Option<Opcode> {
        Self::ALL.get(bits as usize).copied()
    }

    pub fn bits(self) -> u32 {
        self as u32
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Move => "MOVE",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Not => "NOT",
            Opcode::Shl => "SHL",
            Opcode::Shr => "SHR",
            Opcode::Jump => "JUMP",
            Opcode::JumpZ => "JUMPZ",
            Opcode::JumpNz => "JUMPNZ",
            Opcode::Config => "CONFIG",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        Self::ALL.iter().copied().find(|op| op.mnemonic() == name)
    }

    pub fn operand_form(self) -> OperandForm {
        match self {
            Opcode::Nop => OperandForm::None,
            Opcode::Config => OperandForm::Pair,
            Opcode::Load | Opcode::Store => OperandForm::Memory,
            Opcode::Not | Opcode::Jump => OperandForm::Single,
            Opcode::JumpZ | Opcode::JumpNz => OperandForm::Pair,
            _ => OperandForm::Ternary,
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// How an opcode's operands appear in a rendered line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandForm {
    /// `NOP`
    None,
    /// `NOT d`, `JUMP d`
    Single,
    /// `CONFIG d, s1`, `JUMPZ d, s1`
    Pair,
    /// `LOAD d, s1 [s2, imm]` with the bracket only when s2 or imm is set
    Memory,
    /// `ADD d, s1, s2` with `, imm` only when imm is set
    Ternary,
}

/// Parameters selectable by a CONFIG instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConfigParam {
    ArraySize = 0,
    OpMode = 1,
    Precision = 2,
    Interconnect = 3,
}

impl ConfigParam {
    pub fn id(self) -> u32 {
        self as u32
    }
}

/// Architectural registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Register {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    Pc,
    Status,
}

impl Register {
    pub fn id(self) -> u32 {
        self as u32
    }
}

/// Fixed regions of the PIM linear address space, in elements
pub mod memory_layout {
    pub const MATRIX_A_OFFSET: u32 = 0;
    pub const MATRIX_B_OFFSET: u32 = 1024;
    pub const MATRIX_C_OFFSET: u32 = 2048;
    pub const REGISTER_FILE_OFFSET: u32 = 4096;
    pub const INSTRUCTION_MEMORY_OFFSET: u32 = 5120;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRegion {
    MatrixA,
    MatrixB,
    MatrixC,
    RegisterFile,
    InstructionMemory,
}

impl MemoryRegion {
    /// Region of the architectural address map that holds `address`
    pub fn of(address: u32) -> MemoryRegion {
        use memory_layout::*;
        if address >= INSTRUCTION_MEMORY_OFFSET {
            MemoryRegion::InstructionMemory
        } else if address >= REGISTER_FILE_OFFSET {
            MemoryRegion::RegisterFile
        } else if address >= MATRIX_C_OFFSET {
            MemoryRegion::MatrixC
        } else if address >= MATRIX_B_OFFSET {
            MemoryRegion::MatrixB
        } else {
            MemoryRegion::MatrixA
        }
    }
}

/// Pack fields into a word, masking each to its width
pub fn encode(opcode: Opcode, dest: u32, src1: u32, src2: u32, imm: u32) -> u32 {
    ((opcode.bits() & OPCODE_MASK) << OPCODE_SHIFT)
        | ((dest & DEST_MASK) << DEST_SHIFT)
        | ((src1 & SRC1_MASK) << SRC1_SHIFT)
        | ((src2 & SRC2_MASK) << SRC2_SHIFT)
        | ((imm & IMM_MASK) << IMM_SHIFT)
}

/// Unpack a word. Fails only when the opcode field has no assigned opcode.
pub fn decode(word: u32) -> CompileResult<Instruction> {
    let bits = (word >> OPCODE_SHIFT) & OPCODE_MASK;
    let opcode = Opcode::from_bits(bits).ok_or(CompileError::UnknownOpcode { value: bits })?;

    Ok(Instruction::new(
        opcode,
        (word >> DEST_SHIFT) & DEST_MASK,
        (word >> SRC1_SHIFT) & SRC1_MASK,
        (word >> SRC2_SHIFT) & SRC2_MASK,
        (word >> IMM_SHIFT) & IMM_MASK,
    ))
}

/// A single PIM instruction
///
/// Operands are kept at full width; truncation happens only in [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    opcode: Opcode,
    dest: u32,
    src1: u32,
    src2: u32,
    imm: u32,
}

impl Instruction {
    pub fn new(opcode: Opcode, dest: u32, src1: u32, src2: u32, imm: u32) -> Self {
        Self {
            opcode,
            dest,
            src1,
            src2,
            imm,
        }
    }

    pub fn config(param: ConfigParam, value: u32) -> Self {
        Self::new(Opcode::Config, param.id(), value, 0, 0)
    }

    /// LOAD into PIM address `dest` from host `src`, tagged with the element's row and column
    pub fn load(dest: u32, src: u32, row: u32, col: u32) -> Self {
        Self::new(Opcode::Load, dest, src, row, col)
    }

    /// STORE PIM address `src` to host `dest`, tagged with the element's row and column
    pub fn store(dest: u32, src: u32, row: u32, col: u32) -> Self {
        Self::new(Opcode::Store, dest, src, row, col)
    }

    pub fn mov(dest: u32, src: u32) -> Self {
        Self::new(Opcode::Move, dest, src, 0, 0)
    }

    pub fn alu(opcode: Opcode, dest: u32, src1: u32, src2: u32) -> Self {
        Self::new(opcode, dest, src1, src2, 0)
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn dest(&self) -> u32 {
        self.dest
    }

    pub fn src1(&self) -> u32 {
        self.src1
    }

    pub fn src2(&self) -> u32 {
        self.src2
    }

    pub fn imm(&self) -> u32 {
        self.imm
    }

    pub fn fields(&self) -> (Opcode, u32, u32, u32, u32) {
        (self.opcode, self.dest, self.src1, self.src2, self.imm)
    }

    pub fn encode(&self) -> u32 {
        encode(self.opcode, self.dest, self.src1, self.src2, self.imm)
    }

    /// The instruction as the hardware will see it, with every field masked
    pub fn truncated(&self) -> Self {
        Self::new(
            self.opcode,
            self.dest & DEST_MASK,
            self.src1 & SRC1_MASK,
            self.src2 & SRC2_MASK,
            self.imm & IMM_MASK,
        )
    }

    pub fn is_memory_access(&self) -> bool {
        matches!(self.opcode, Opcode::Load | Opcode::Store)
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.opcode)?;

        match self.opcode.operand_form() {
            OperandForm::None => {}
            OperandForm::Single => write!(f, " {}", self.dest)?,
            OperandForm::Pair => write!(f, " {}, {}", self.dest, self.src1)?,
            OperandForm::Memory => {
                write!(f, " {}, {}", self.dest, self.src1)?;
                if self.src2 != 0 || self.imm != 0 {
                    write!(f, " [{}, {}]", self.src2, self.imm)?;
                }
            }
            OperandForm::Ternary => {
                write!(f, " {}, {}, {}", self.dest, self.src1, self.src2)?;
                if self.imm != 0 {
                    write!(f, ", {}", self.imm)?;
                }
            }
        }

        write!(f, " ; 0x{:08x}", self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_field_extremes() {
        for op in Opcode::ALL {
            for &(dest, src1, src2, imm) in &[(0, 0, 0, 0), (255, 255, 255, 3), (1, 128, 77, 2)] {
                let word = encode(op, dest, src1, src2, imm);
                let back = decode(word).unwrap();
                assert_eq!(back.fields(), (op, dest, src1, src2, imm));
            }
        }
    }

    #[test]
    fn test_round_trip_every_field_value() {
        for op in Opcode::ALL {
            for v in 0..=255 {
                assert_eq!(decode(encode(op, v, 5, 9, 2)).unwrap().fields(), (op, v, 5, 9, 2));
                assert_eq!(decode(encode(op, 7, v, 9, 2)).unwrap().fields(), (op, 7, v, 9, 2));
                assert_eq!(decode(encode(op, 7, 5, v, 2)).unwrap().fields(), (op, 7, 5, v, 2));
            }
            for imm in 0..=3 {
                assert_eq!(decode(encode(op, 7, 5, 9, imm)).unwrap().fields(), (op, 7, 5, 9, imm));
            }
        }
    }

    #[test]
    fn test_truncation_keeps_low_bits() {
        assert_eq!(encode(Opcode::Add, 300, 0, 0, 0), encode(Opcode::Add, 44, 0, 0, 0));
        assert_eq!(encode(Opcode::Load, 0, 0, 0, 7), encode(Opcode::Load, 0, 0, 0, 3));

        let inst = Instruction::new(Opcode::Move, 300, 513, 256, 5);
        assert_eq!(decode(inst.encode()).unwrap(), inst.truncated());
        assert_eq!(inst.truncated().fields(), (Opcode::Move, 44, 1, 0, 1));
    }

    #[test]
    fn test_field_positions() {
        assert_eq!(encode(Opcode::Config, 0, 0, 0, 0), 0x4400_0000);
        assert_eq!(encode(Opcode::Nop, 1, 0, 0, 0), 1 << 18);
        assert_eq!(encode(Opcode::Nop, 0, 1, 0, 0), 1 << 10);
        assert_eq!(encode(Opcode::Nop, 0, 0, 1, 0), 1 << 2);
        assert_eq!(encode(Opcode::Nop, 0, 0, 0, 1), 1);
    }

    #[test]
    fn test_decode_unassigned_opcode() {
        let word = 18 << OPCODE_SHIFT;
        assert!(matches!(decode(word), Err(CompileError::UnknownOpcode { value: 18 })));
        assert!(decode(0xFFFF_FFFF).is_err());
    }

    #[test]
    fn test_config_lines() {
        assert_eq!(Instruction::config(ConfigParam::ArraySize, 4).to_string(), "CONFIG 0, 4 ; 0x44001000");
        assert_eq!(Instruction::config(ConfigParam::OpMode, 4).to_string(), "CONFIG 1, 4 ; 0x44041000");
        assert_eq!(Instruction::config(ConfigParam::Precision, 4).to_string(), "CONFIG 2, 4 ; 0x44081000");
    }

    #[test]
    fn test_operand_shapes() {
        assert_eq!(Instruction::new(Opcode::Nop, 0, 0, 0, 0).to_string(), "NOP ; 0x00000000");
        assert_eq!(Instruction::load(5, 0, 0, 0).to_string(), "LOAD 5, 0 ; 0x04140000");
        assert_eq!(Instruction::load(5, 0, 1, 1).to_string(), "LOAD 5, 0 [1, 1] ; 0x04140005");
        assert_eq!(Instruction::store(0, 9, 0, 1).to_string(), "STORE 0, 9 [0, 1] ; 0x08002401");
        assert_eq!(Instruction::new(Opcode::Not, 3, 7, 7, 0).to_string(), "NOT 3 ; 0x2c0c1c1c");
        assert_eq!(Instruction::new(Opcode::JumpNz, 4, 1, 0, 0).to_string(), "JUMPNZ 4, 1 ; 0x40100400");
        assert_eq!(Instruction::alu(Opcode::Mul, 2, 0, 1).to_string(), "MUL 2, 0, 1 ; 0x18080004");
        assert_eq!(Instruction::new(Opcode::Add, 3, 3, 2, 1).to_string(), "ADD 3, 3, 2, 1 ; 0x100c0c09");
    }

    #[test]
    fn test_rendering_shows_untruncated_operands() {
        let line = Instruction::mov(300, 3).to_string();
        assert_eq!(line, format!("MOVE 300, 3, 0 ; 0x{:08x}", encode(Opcode::Move, 44, 3, 0, 0)));
    }

    #[test]
    fn test_mnemonic_lookup() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
            assert_eq!(Opcode::from_bits(op.bits()), Some(op));
        }
        assert_eq!(Opcode::from_mnemonic("MAC"), None);
    }

    #[test]
    fn test_memory_regions() {
        assert_eq!(MemoryRegion::of(0), MemoryRegion::MatrixA);
        assert_eq!(MemoryRegion::of(1023), MemoryRegion::MatrixA);
        assert_eq!(MemoryRegion::of(1024), MemoryRegion::MatrixB);
        assert_eq!(MemoryRegion::of(2048), MemoryRegion::MatrixC);
        assert_eq!(MemoryRegion::of(4096), MemoryRegion::RegisterFile);
        assert_eq!(MemoryRegion::of(5120), MemoryRegion::InstructionMemory);
    }
}
