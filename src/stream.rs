//! Instruction stream produced by the backend

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::isa::{Instruction, Opcode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Load,
    Compute,
    Store,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Load => write!(f, "load"),
            Phase::Compute => write!(f, "compute"),
            Phase::Store => write!(f, "store"),
        }
    }
}

/// Where one phase sits in the stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSpan {
    pub phase: Phase,
    pub start: usize,
    pub end: usize,
}

impl PhaseSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Ordered instructions for one compiled function; order is execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionStream {
    pub function: String,
    instructions: Vec<Instruction>,
    phases: Vec<PhaseSpan>,
}

impl InstructionStream {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            instructions: Vec::new(),
            phases: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, inst: Instruction) {
        self.instructions.push(inst);
    }

    pub(crate) fn begin_phase(&mut self, phase: Phase) {
        let at = self.instructions.len();
        self.phases.push(PhaseSpan {
            phase,
            start: at,
            end: at,
        });
    }

    pub(crate) fn end_phase(&mut self) {
        let at = self.instructions.len();
        if let Some(span) = self.phases.last_mut() {
            span.end = at;
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn phases(&self) -> &[PhaseSpan] {
        &self.phases
    }

    pub fn phase(&self, phase: Phase) -> Option<&[Instruction]> {
        self.phases
            .iter()
            .find(|span| span.phase == phase)
            .map(|span| &self.instructions[span.range()])
    }

    /// Per-opcode instruction counts, in opcode order
    pub fn opcode_counts(&self) -> BTreeMap<Opcode, usize> {
        let mut counts = BTreeMap::new();
        for inst in &self.instructions {
            *counts.entry(inst.opcode()).or_insert(0) += 1;
        }
        counts
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "Function: {}\nInstructions: {}\n",
            self.function,
            self.instructions.len()
        );
        for span in &self.phases {
            out.push_str(&format!("  {} phase: {}\n", span.phase, span.len()));
        }
        out.push_str("Opcode counts:\n");
        for (op, count) in self.opcode_counts() {
            out.push_str(&format!("  {:<7} {}\n", op.mnemonic(), count));
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct Entry<'a> {
            text: String,
            word: u32,
            instruction: &'a Instruction,
        }

        #[derive(Serialize)]
        struct Export<'a> {
            function: &'a str,
            phases: &'a [PhaseSpan],
            instructions: Vec<Entry<'a>>,
        }

        let export = Export {
            function: &self.function,
            phases: &self.phases,
            instructions: self
                .instructions
                .iter()
                .map(|inst| Entry {
                    text: inst.to_string(),
                    word: inst.encode(),
                    instruction: inst,
                })
                .collect(),
        };
        serde_json::to_string_pretty(&export)
    }
}

impl<'a> IntoIterator for &'a InstructionStream {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

impl std::fmt::Display for InstructionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for inst in &self.instructions {
            writeln!(f, "{}", inst)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::ConfigParam;
    use pretty_assertions::assert_eq;

    fn sample() -> InstructionStream {
        let mut stream = InstructionStream::new("f");
        stream.begin_phase(Phase::Load);
        stream.push(Instruction::config(ConfigParam::ArraySize, 1));
        stream.push(Instruction::load(0, 0, 0, 0));
        stream.end_phase();
        stream.begin_phase(Phase::Compute);
        stream.push(Instruction::mov(0, 0));
        stream.end_phase();
        stream
    }

    #[test]
    fn test_phase_spans() {
        let stream = sample();
        assert_eq!(stream.len(), 3);
        assert_eq!(stream.phases()[0].range(), 0..2);
        assert_eq!(stream.phase(Phase::Compute).unwrap().len(), 1);
        assert!(stream.phase(Phase::Store).is_none());
    }

    #[test]
    fn test_opcode_counts_and_summary() {
        let stream = sample();
        let counts = stream.opcode_counts();
        assert_eq!(counts.get(&Opcode::Config), Some(&1));
        assert_eq!(counts.get(&Opcode::Move), Some(&1));
        assert_eq!(counts.get(&Opcode::Store), None);

        let summary = stream.summary();
        assert!(summary.contains("Instructions: 3"));
        assert!(summary.contains("load phase: 2"));
    }

    #[test]
    fn test_json_export() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["function"], "f");
        assert_eq!(value["instructions"][0]["word"], 0x4400_0400);
        assert_eq!(value["instructions"][0]["text"], "CONFIG 0, 1 ; 0x44000400");
    }
}
