//! Output formatting for instruction streams
//!
//! Pure functions over a borrowed stream; nothing here mutates it.

use crate::stream::InstructionStream;

/// One mnemonic line per instruction, e.g. `MUL 2, 0, 1 ; 0x18080004`
pub fn text_lines(stream: &InstructionStream) -> Vec<String> {
    stream.iter().map(|inst| inst.to_string()).collect()
}

/// Encoded 32-bit words in stream order
pub fn words(stream: &InstructionStream) -> Vec<u32> {
    stream.iter().map(|inst| inst.encode()).collect()
}

/// Words as a big-endian byte image
pub fn binary_image(stream: &InstructionStream) -> Vec<u8> {
    stream
        .iter()
        .flat_map(|inst| inst.encode().to_be_bytes())
        .collect()
}

/// Text lines joined with trailing newlines, as written to an output file
pub fn listing(stream: &InstructionStream) -> String {
    let mut out = String::new();
    for line in text_lines(stream) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Listing with index and phase comments between phases
pub fn annotated_listing(stream: &InstructionStream) -> String {
    let mut out = format!("# function {}\n", stream.function);
    let lines = text_lines(stream);

    for (idx, line) in lines.iter().enumerate() {
        if let Some(span) = stream.phases().iter().find(|s| s.start == idx && !s.is_empty()) {
            out.push_str(&format!("# {} phase ({} instructions)\n", span.phase, span.len()));
        }
        out.push_str(&format!("{:>6}: {}\n", idx, line));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PimBackend;
    use crate::config::CompilerConfig;
    use crate::diagnostics::Diagnostics;
    use crate::frontend::{MatMulShape, RecognizedMatMul};
    use crate::layout::AddressPlan;
    use pretty_assertions::assert_eq;

    fn stream() -> InstructionStream {
        let shape = MatMulShape::new(1, 1, 1);
        let rec = RecognizedMatMul::new("mm", Some(shape));
        let plan = AddressPlan::for_matmul(&rec, &shape).unwrap();
        PimBackend::new(CompilerConfig::default())
            .generate(&rec, &plan, &mut Diagnostics::new())
            .unwrap()
    }

    #[test]
    fn test_1x1x1_listing() {
        let stream = stream();
        assert_eq!(
            text_lines(&stream),
            vec![
                "CONFIG 0, 1 ; 0x44000400",
                "CONFIG 1, 1 ; 0x44040400",
                "CONFIG 2, 1 ; 0x44080400",
                "LOAD 0, 0 ; 0x04000000",
                "LOAD 1, 0 ; 0x04040000",
                "LOAD 2, 0 ; 0x04080000",
                "MOVE 0, 0, 0 ; 0x0c000000",
                "MOVE 1, 1, 0 ; 0x0c040400",
                "MUL 2, 0, 1 ; 0x18080004",
                "MOVE 3, 2, 0 ; 0x0c0c0800",
                "ADD 3, 3, 2 ; 0x100c0c08",
                "MOVE 2, 3, 0 ; 0x0c080c00",
                "STORE 0, 2 ; 0x08000800",
            ]
        );
    }

    #[test]
    fn test_words_and_image_agree() {
        let stream = stream();
        let words = words(&stream);
        let image = binary_image(&stream);
        assert_eq!(image.len(), words.len() * 4);
        assert_eq!(&image[0..4], &[0x44, 0x00, 0x04, 0x00]);
        for (chunk, word) in image.chunks(4).zip(&words) {
            assert_eq!(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]), *word);
        }
    }

    #[test]
    fn test_listing_does_not_mutate() {
        let stream = stream();
        let before = stream.clone();
        let text = listing(&stream);
        assert_eq!(text.lines().count(), stream.len());
        assert!(text.ends_with('\n'));
        assert_eq!(stream, before);
    }

    #[test]
    fn test_annotated_listing() {
        let text = annotated_listing(&stream());
        assert!(text.starts_with("# function mm\n# load phase (6 instructions)\n     0: CONFIG 0, 1"));
        assert!(text.contains("# compute phase (6 instructions)\n     6: MOVE 0, 0, 0"));
        assert!(text.contains("# store phase (1 instructions)\n    12: STORE 0, 2"));
    }
}
