//! Reader for rendered listings and binary images
//!
//! Accepts the text produced by [`crate::render`]: one instruction per line,
//! `MNEMONIC operands ; 0xHHHHHHHH`. An optional `N:` index prefix (as in the
//! annotated listing) is allowed. Operands the line does not show are taken
//! from the trailing word; the shown operands must encode to that same word.

use logos::Logos;

use crate::error::{CompileError, CompileResult};
use crate::isa::{self, Instruction, Opcode, OperandForm};

/// Tokens of a listing line
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
pub enum Token {
    #[regex(r"0x[0-9a-fA-F]+", |lex| u32::from_str_radix(&lex.slice()[2..], 16).ok())]
    Hex(u32),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<u32>().ok())]
    Number(u32),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[token(",")]
    Comma,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token(";")]
    Semicolon,

    #[token(":")]
    Colon,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Hex(v) => write!(f, "0x{:08x}", v),
            Token::Number(n) => write!(f, "{}", n),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Comma => write!(f, ","),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Semicolon => write!(f, ";"),
            Token::Colon => write!(f, ":"),
        }
    }
}

/// Cursor over the tokens of one line
struct LineParser {
    line: usize,
    tokens: Vec<Token>,
    pos: usize,
}

impl LineParser {
    fn new(line: usize, text: &str) -> CompileResult<Self> {
        let mut tokens = Vec::new();
        for (token, span) in Token::lexer(text).spanned() {
            match token {
                Ok(t) => tokens.push(t),
                Err(()) => {
                    return Err(CompileError::listing(
                        line,
                        format!("unexpected '{}' at column {}", &text[span.clone()], span.start + 1),
                    ))
                }
            }
        }
        Ok(Self { line, tokens, pos: 0 })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::listing(self.line, message)
    }

    fn found(&self) -> String {
        match self.peek() {
            Some(token) => format!("'{}'", token),
            None => "end of line".to_string(),
        }
    }

    fn expect(&mut self, expected: Token) -> CompileResult<()> {
        if self.check(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}', found {}", expected, self.found())))
        }
    }

    fn number(&mut self) -> CompileResult<u32> {
        match self.peek() {
            Some(Token::Number(n)) => {
                let n = *n;
                self.pos += 1;
                Ok(n)
            }
            _ => Err(self.error(format!("expected operand, found {}", self.found()))),
        }
    }

    /// `d, s1` followed by `more` further comma-separated operands
    fn operands(&mut self, more: usize) -> CompileResult<Vec<u32>> {
        let mut values = vec![self.number()?];
        for _ in 0..more {
            self.expect(Token::Comma)?;
            values.push(self.number()?);
        }
        Ok(values)
    }

    fn skip_index_prefix(&mut self) {
        if matches!(self.peek(), Some(Token::Number(_))) && self.peek_at(1) == Some(&Token::Colon) {
            self.pos += 2;
        }
    }

    fn parse(mut self) -> CompileResult<Instruction> {
        self.skip_index_prefix();

        let opcode = match self.advance() {
            Some(Token::Ident(name)) => {
                Opcode::from_mnemonic(&name).ok_or(CompileError::UnknownMnemonic { name })?
            }
            other => {
                let found = other.map_or("end of line".to_string(), |t| format!("'{}'", t));
                return Err(self.error(format!("expected mnemonic, found {}", found)));
            }
        };

        // Shown operands, in field order; None for fields the line leaves out
        let mut shown: [Option<u32>; 4] = [None; 4];
        match opcode.operand_form() {
            OperandForm::None => {}
            OperandForm::Single => shown[0] = Some(self.number()?),
            OperandForm::Pair => {
                let v = self.operands(1)?;
                shown[0] = Some(v[0]);
                shown[1] = Some(v[1]);
            }
            OperandForm::Memory => {
                let v = self.operands(1)?;
                shown[0] = Some(v[0]);
                shown[1] = Some(v[1]);
                if self.check(&Token::LBracket) {
                    self.pos += 1;
                    let tag = self.operands(1)?;
                    self.expect(Token::RBracket)?;
                    shown[2] = Some(tag[0]);
                    shown[3] = Some(tag[1]);
                }
            }
            OperandForm::Ternary => {
                let v = self.operands(2)?;
                shown[0] = Some(v[0]);
                shown[1] = Some(v[1]);
                shown[2] = Some(v[2]);
                if self.check(&Token::Comma) {
                    self.pos += 1;
                    shown[3] = Some(self.number()?);
                }
            }
        }

        self.expect(Token::Semicolon)?;
        let word = match self.advance() {
            Some(Token::Hex(word)) => word,
            _ => return Err(self.error("expected encoded word after ';'")),
        };
        if let Some(extra) = self.peek() {
            return Err(self.error(format!("unexpected '{}' after encoded word", extra)));
        }

        let from_word = [
            (word >> isa::DEST_SHIFT) & isa::DEST_MASK,
            (word >> isa::SRC1_SHIFT) & isa::SRC1_MASK,
            (word >> isa::SRC2_SHIFT) & isa::SRC2_MASK,
            (word >> isa::IMM_SHIFT) & isa::IMM_MASK,
        ];
        let field = |i: usize| shown[i].unwrap_or(from_word[i]);
        let inst = Instruction::new(opcode, field(0), field(1), field(2), field(3));

        if inst.encode() != word {
            return Err(CompileError::EncodingMismatch {
                line: self.line,
                expected: inst.encode(),
                found: word,
            });
        }
        Ok(inst)
    }
}

/// Parse one listing line; blank and `#` comment lines yield `None`
pub fn parse_line(line_no: usize, line: &str) -> CompileResult<Option<Instruction>> {
    let text = line.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }
    LineParser::new(line_no, text)?.parse().map(Some)
}

/// Parse a whole listing; line numbers in errors are 1-based
pub fn parse_listing(source: &str) -> CompileResult<Vec<Instruction>> {
    let mut instructions = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        if let Some(inst) = parse_line(idx + 1, line)? {
            instructions.push(inst);
        }
    }
    Ok(instructions)
}

/// Decode a big-endian word image
pub fn disassemble(bytes: &[u8]) -> CompileResult<Vec<Instruction>> {
    if bytes.len() % 4 != 0 {
        return Err(CompileError::config(format!(
            "binary image length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    bytes
        .chunks_exact(4)
        .map(|chunk| isa::decode(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])))
        .collect()
}
