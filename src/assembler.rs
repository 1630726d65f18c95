//! Two-pass assembly from source text to an encoded program.
//!
//! The first pass walks the source lines and binds every label to the address of the
//! instruction that follows it. The second pass encodes the instructions, looking up label
//! operands from the table produced by the first pass. Both passes validate mnemonics the same
//! way, so a program with an unknown instruction is rejected before anything is encoded.
//!
//! Each instruction is encoded as its opcode byte followed by one byte per operand. An operand
//! token is, in order of precedence:
//! 1. a register name (`a`, `b`, `c`), encoded as the register selector,
//! 2. a label, encoded as the label's address,
//! 3. an integer literal, encoded as `(value & 0x7F) | 0x80`.
//!
//! The rules are the same for every operand position. The emulator uses a jump operand as a
//! raw address, so a label can only be jumped to if it lies in the first 256 bytes of memory,
//! and a literal target such as `jmp 5` lands at `0x85`.

use slog::{debug, o, trace, warn, Discard, Logger};

use logos::Logos;

use crate::error::{AssembleError, ErrorKind, SyntaxError};
use crate::instruction::{self, InstructionSpec, Register, IMMEDIATE_FLAG, IMMEDIATE_MASK};
use crate::memory::{LoadError, Memory, MEMORY_SIZE};
use crate::parsing::{parse_integer, strip_comments};
use crate::symbol_table::LabelTable;
use crate::token::Token;

/// An assembled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// The address the program was assembled for.
    pub origin: u16,

    /// The encoded instructions.
    pub bytes: Vec<u8>,

    /// The labels declared in the source.
    pub labels: LabelTable,
}

impl Program {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copies the program into `memory` at its origin and returns the number of bytes written.
    pub fn load_into(&self, memory: &mut Memory) -> Result<usize, LoadError> {
        memory.load(self.origin, &self.bytes)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum LineKind<'a> {
    Label(&'a str),
    Instruction {
        mnemonic: &'a str,
        operands: Vec<&'a str>,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Line<'a> {
    /// 1-based line number in the source.
    number: usize,
    kind: LineKind<'a>,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Splits a comment-free source line into a label declaration or an instruction.
///
/// Returns `None` for lines without any tokens.
fn parse_line(number: usize, text: &str) -> Result<Option<Line>, AssembleError> {
    let text = text.trim();
    let tokens = Token::lexer(text).spanned().collect::<Vec<_>>();

    if text.ends_with(':') {
        let name = text[..text.len() - 1].trim_end();

        return match tokens.as_slice() {
            [(Token::Label(label), _)] => Ok(Some(Line { number, kind: LineKind::Label(*label) })),
            [(Token::Word(word), _), (Token::Error, _)] if is_identifier(word) => {
                Ok(Some(Line { number, kind: LineKind::Label(*word) }))
            }
            _ => Err(AssembleError::new(number, SyntaxError::InvalidLabel {
                name: name.to_string(),
            })),
        };
    }

    let mut words = Vec::with_capacity(tokens.len());

    for (token, span) in tokens {
        match token {
            Token::Word(word) => words.push(word),
            Token::Label(label) => {
                return Err(AssembleError::new(number, SyntaxError::TrailingInput {
                    label: label.to_string(),
                }))
            }
            Token::Error => {
                return Err(AssembleError::new(number, SyntaxError::UnexpectedCharacter {
                    text: text[span].to_string(),
                }))
            }
        }
    }

    let mut words = words.into_iter();

    Ok(words.next().map(|mnemonic| Line {
        number,
        kind: LineKind::Instruction {
            mnemonic,
            operands: words.collect(),
        },
    }))
}

fn parse_lines(source: &str) -> Result<Vec<Line>, AssembleError> {
    source
        .lines()
        .enumerate()
        .filter_map(|(i, text)| parse_line(i + 1, text).transpose())
        .collect()
}

fn find_instruction(mnemonic: &str, line: usize) -> Result<&'static InstructionSpec, AssembleError> {
    instruction::lookup(mnemonic).ok_or_else(|| {
        AssembleError::new(line, ErrorKind::UnknownInstruction {
            mnemonic: mnemonic.to_string(),
            suggestion: instruction::suggest(mnemonic),
        })
    })
}

/// First pass: binds every label to the address of the next instruction.
fn resolve_labels(lines: &[Line], origin: u16, logger: &Logger) -> Result<LabelTable, AssembleError> {
    let (labels, _) = lines.iter().try_fold::<_, _, Result<_, AssembleError>>(
        (LabelTable::new(), origin as usize),
        |(mut labels, address), line| match &line.kind {
            LineKind::Label(label) => {
                if address >= MEMORY_SIZE {
                    return Err(AssembleError::from(LoadError {
                        origin,
                        length: address - origin as usize,
                    }));
                }

                debug!(logger, "bind label"; "label" => *label, "address" => address);

                labels
                    .define(label, address as u16)
                    .map_err(|kind| AssembleError::new(line.number, kind))?;

                Ok((labels, address))
            }
            LineKind::Instruction { mnemonic, .. } => {
                let spec = find_instruction(mnemonic, line.number)?;
                Ok((labels, address + spec.size()))
            }
        },
    )?;

    Ok(labels)
}

fn address_byte(operand: &str, address: u64, line: usize) -> Result<u8, AssembleError> {
    if address > u8::max_value() as u64 {
        return Err(AssembleError::new(line, ErrorKind::AddressOverflow {
            operand: operand.to_string(),
            address,
        }));
    }

    Ok(address as u8)
}

fn encode_operand(token: &str, labels: &LabelTable, line: usize, logger: &Logger) -> Result<u8, AssembleError> {
    if let Some(register) = Register::from_name(token) {
        return Ok(register.selector());
    }

    if let Some(address) = labels.get(token) {
        return address_byte(token, address as u64, line);
    }

    let value = parse_integer(token).ok_or_else(|| {
        AssembleError::new(line, ErrorKind::MalformedOperand {
            token: token.to_string(),
        })
    })?;

    if value < 0 || value > IMMEDIATE_MASK as i64 {
        warn!(logger, "immediate does not fit in 7 bits and is truncated";
              "line" => line, "value" => value, "encoded" => value as u8 & IMMEDIATE_MASK);
    }

    Ok((value as u8 & IMMEDIATE_MASK) | IMMEDIATE_FLAG)
}

/// Second pass: encodes the instructions.
fn encode(lines: &[Line], labels: &LabelTable, origin: u16, logger: &Logger) -> Result<Vec<u8>, AssembleError> {
    lines.iter().try_fold(Vec::new(), |mut bytes, line| {
        let (mnemonic, operands) = match &line.kind {
            LineKind::Label(_) => return Ok(bytes),
            LineKind::Instruction { mnemonic, operands } => (mnemonic, operands),
        };

        let spec = find_instruction(mnemonic, line.number)?;

        if operands.len() != spec.operand_count() {
            return Err(AssembleError::new(line.number, SyntaxError::OperandCount {
                mnemonic: spec.mnemonic,
                expected: spec.operand_count(),
                found: operands.len(),
            }));
        }

        trace!(logger, "encode instruction";
               "line" => line.number,
               "address" => origin as usize + bytes.len(),
               "mnemonic" => spec.mnemonic);

        bytes.push(spec.byte());

        for token in operands {
            bytes.push(encode_operand(token, labels, line.number, logger)?);
        }

        Ok(bytes)
    })
}

/// Assembles `source` into a program that is meant to be loaded at `origin`.
///
/// # Errors
/// Returns the first error found. No partial output is produced.
pub fn assemble(source: &str, origin: u16) -> Result<Program, AssembleError> {
    assemble_with_logger(source, origin, None)
}

/// Same as [assemble], but logs the progress of the assembly to `logger`.
pub fn assemble_with_logger<L>(source: &str, origin: u16, logger: L) -> Result<Program, AssembleError>
where
    L: Into<Option<Logger>>,
{
    let logger = logger
        .into()
        .unwrap_or(Logger::root(Discard, o!()))
        .new(o!("stage" => "assembly"));

    let stripped = strip_comments(source)?;
    let lines = parse_lines(&stripped)?;

    let labels = resolve_labels(&lines, origin, &logger)?;
    let bytes = encode(&lines, &labels, origin, &logger)?;

    if origin as usize + bytes.len() > MEMORY_SIZE {
        return Err(LoadError { origin, length: bytes.len() }.into());
    }

    debug!(logger, "assembled program"; "bytes" => bytes.len(), "labels" => labels.len());

    Ok(Program { origin, bytes, labels })
}

/// Assembles `source` and copies the result into `memory` at `origin`.
///
/// # Returns
/// The number of bytes written. Memory is not modified if assembly fails.
pub fn load(memory: &mut Memory, source: &str, origin: u16) -> Result<usize, AssembleError> {
    load_with_logger(memory, source, origin, None)
}

/// Same as [load], but logs the progress of the assembly to `logger`.
pub fn load_with_logger<L>(memory: &mut Memory, source: &str, origin: u16, logger: L) -> Result<usize, AssembleError>
where
    L: Into<Option<Logger>>,
{
    let program = assemble_with_logger(source, origin, logger)?;
    Ok(program.load_into(memory)?)
}
