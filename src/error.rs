//! Error types of the assembler and the emulator.

use std::fmt::{self, Display};

use crate::memory::LoadError;

/// Reasons for a source line to be rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    /// The instruction was given the wrong number of operands.
    OperandCount {
        mnemonic: &'static str,
        expected: usize,
        found: usize,
    },

    /// A label name that is not an identifier.
    InvalidLabel { name: String },

    /// A label declaration followed by something else on the same line.
    TrailingInput { label: String },

    /// A character that cannot appear in the source.
    UnexpectedCharacter { text: String },

    /// A `/*` without a matching `*/`.
    UnterminatedComment,
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SyntaxError::OperandCount { mnemonic, expected, found } =>
                write!(f, "'{}' takes {} operand(s), found {}", mnemonic, expected, found),
            SyntaxError::InvalidLabel { name } =>
                write!(f, "invalid label name '{}'", name),
            SyntaxError::TrailingInput { label } =>
                write!(f, "label '{}' must be on a line of its own", label),
            SyntaxError::UnexpectedCharacter { text } =>
                write!(f, "unexpected input '{}'", text),
            SyntaxError::UnterminatedComment =>
                write!(f, "unterminated block comment"),
        }
    }
}

/// The reason an assembly run failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The mnemonic is not in the [instruction set](crate::instruction::INSTRUCTION_SET).
    UnknownInstruction {
        mnemonic: String,
        /// The closest known mnemonic, if any.
        suggestion: Option<&'static str>,
    },

    /// An operand is neither a register, a known label nor an integer literal.
    MalformedOperand { token: String },

    Syntax(SyntaxError),

    /// A label was declared twice.
    DuplicateLabel { label: String },

    /// A label or literal address does not fit in a single operand byte.
    AddressOverflow { operand: String, address: u64 },

    /// The encoded program does not fit into memory.
    ProgramTooLarge(LoadError),
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::UnknownInstruction { mnemonic, suggestion: Some(suggestion) } =>
                write!(f, "unknown instruction '{}' (did you mean '{}'?)", mnemonic, suggestion),
            ErrorKind::UnknownInstruction { mnemonic, suggestion: None } =>
                write!(f, "unknown instruction '{}'", mnemonic),
            ErrorKind::MalformedOperand { token } =>
                write!(f, "malformed operand '{}'", token),
            ErrorKind::Syntax(err) => Display::fmt(err, f),
            ErrorKind::DuplicateLabel { label } =>
                write!(f, "label '{}' is declared more than once", label),
            ErrorKind::AddressOverflow { operand, address } =>
                write!(f, "address 0x{:X} of '{}' does not fit in an operand byte", address, operand),
            ErrorKind::ProgramTooLarge(err) => Display::fmt(err, f),
        }
    }
}

/// Error returned by the [assembler](crate::assembler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleError {
    /// The 1-based source line number of the error location. Zero if the error is not tied to a
    /// single line.
    pub line: usize,
    pub kind: ErrorKind,
}

impl AssembleError {
    pub(crate) fn new<K: Into<ErrorKind>>(line: usize, kind: K) -> AssembleError {
        AssembleError { line, kind: kind.into() }
    }
}

impl From<SyntaxError> for ErrorKind {
    fn from(err: SyntaxError) -> ErrorKind {
        ErrorKind::Syntax(err)
    }
}

impl From<LoadError> for AssembleError {
    fn from(err: LoadError) -> AssembleError {
        AssembleError::new(0, ErrorKind::ProgramTooLarge(err))
    }
}

impl Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.line {
            0 => Display::fmt(&self.kind, f),
            line => write!(f, "at line {}: {}", line, self.kind),
        }
    }
}

impl std::error::Error for AssembleError {}

/// An unrecoverable condition that stops the emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The byte fetched as an opcode is not mapped to an instruction.
    UnknownOpcode { opcode: u8, pc: u16 },

    /// A `div` instruction with a zero divisor.
    DivisionByZero { pc: u16 },
}

impl Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Fault::UnknownOpcode { opcode, pc } =>
                write!(f, "unknown opcode {:02X} at PC={:04X}", opcode, pc),
            Fault::DivisionByZero { pc } =>
                write!(f, "division by zero at PC={:04X}", pc),
        }
    }
}

impl std::error::Error for Fault {}

#[test]
fn test_error_messages() {
    let err = AssembleError::new(3, ErrorKind::UnknownInstruction {
        mnemonic: "mvo".into(),
        suggestion: Some("mov"),
    });
    assert_eq!(err.to_string(), "at line 3: unknown instruction 'mvo' (did you mean 'mov'?)");

    let err = AssembleError::new(7, SyntaxError::OperandCount { mnemonic: "add", expected: 2, found: 1 });
    assert_eq!(err.to_string(), "at line 7: 'add' takes 2 operand(s), found 1");

    let fault = Fault::UnknownOpcode { opcode: 0x41, pc: 0x0010 };
    assert_eq!(fault.to_string(), "unknown opcode 41 at PC=0010");
}
