//! The instruction set: mnemonics, opcodes, operand roles and cycle costs.
//!
//! [INSTRUCTION_SET] is the only place where an opcode is tied to its mnemonic and arity. The
//! [assembler](crate::assembler) validates source lines against it and the
//! [emulator](crate::emulator) builds its dispatch table from it, so the two can never disagree
//! on how many operand bytes follow an opcode.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

/// Bit that tags an operand byte as an immediate value.
pub const IMMEDIATE_FLAG: u8 = 0x80;

/// Mask for the value part of an immediate operand byte.
pub const IMMEDIATE_MASK: u8 = 0x7F;

/// Extra cycles charged when a conditional branch is taken.
pub const BRANCH_PENALTY: u64 = 1;

/// Describes how the emulator interprets a single operand byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandKind {
    /// Read like a [Source](OperandKind::Source) and written back with
    /// [Cpu::write_register](crate::cpu::Cpu::write_register). Writes to a byte that does not
    /// select a register are ignored.
    Destination,

    /// A value resolved with [Cpu::resolve_operand](crate::cpu::Cpu::resolve_operand): an
    /// immediate, a register or a raw byte.
    Source,

    /// The operand byte itself is the jump address, so only the first 256 bytes of memory can
    /// be jumped to.
    Target,
}

use self::OperandKind::{Destination as Dst, Source as Src, Target as Tgt};

/// Static description of a single instruction.
#[derive(Debug, PartialEq, Eq)]
pub struct InstructionSpec {
    pub opcode: OpCode,
    pub mnemonic: &'static str,
    pub operands: &'static [OperandKind],
    /// Fixed number of cycles the instruction takes when it retires.
    pub cost: u64,
}

impl InstructionSpec {
    /// The opcode byte of the instruction.
    pub fn byte(&self) -> u8 {
        self.opcode.as_byte()
    }

    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    /// Size of an encoded instruction in bytes.
    pub fn size(&self) -> usize {
        1 + self.operands.len()
    }
}

macro_rules! instruction_set {
    ( $( $(#[$doc:meta])* $variant:ident = $opcode:literal, $mnemonic:literal => [$($kind:ident),*], $cost:literal; )* ) => {
        /// Instructions of the machine.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum OpCode {
            $( $(#[$doc])* $variant, )*
        }

        impl OpCode {
            pub fn as_byte(self) -> u8 {
                match self {
                    $( OpCode::$variant => $opcode, )*
                }
            }

            /// Decodes an opcode byte. Returns `None` for bytes that are not mapped to an
            /// instruction.
            pub fn from_byte(byte: u8) -> Option<OpCode> {
                match byte {
                    $( $opcode => Some(OpCode::$variant), )*
                    _ => None,
                }
            }
        }

        /// Every instruction of the machine. Entries are in the declaration order of [OpCode].
        pub static INSTRUCTION_SET: &[InstructionSpec] = &[
            $(
                InstructionSpec {
                    opcode: OpCode::$variant,
                    mnemonic: $mnemonic,
                    operands: &[$($kind),*],
                    cost: $cost,
                },
            )*
        ];
    };
}

instruction_set! {
    /// `mov dst, src`: copies a value into a register.
    Move = 0x01, "mov" => [Dst, Src], 2;
    /// `div dst, src`: unsigned division. Faults when `src` is zero.
    Divide = 0x08, "div" => [Dst, Src], 10;
    /// `mul dst, src`: multiplication, keeping the low byte.
    Multiply = 0x09, "mul" => [Dst, Src], 6;
    /// `inc dst`
    Increment = 0x06, "inc" => [Dst], 2;
    /// `dec dst`
    Decrement = 0x07, "dec" => [Dst], 2;
    /// `add dst, src`: wrapping addition.
    Add = 0x10, "add" => [Dst, Src], 3;
    /// `sub dst, src`: wrapping subtraction.
    Subtract = 0x11, "sub" => [Dst, Src], 3;
    And = 0x12, "and" => [Dst, Src], 3;
    Or = 0x13, "or" => [Dst, Src], 3;
    Xor = 0x14, "xor" => [Dst, Src], 3;
    Not = 0x15, "not" => [Dst], 2;
    Nand = 0x16, "nand" => [Dst, Src], 3;
    Nor = 0x17, "nor" => [Dst, Src], 3;
    /// `cmp x, y`: clears the comparison flag when the operands are equal and sets it otherwise.
    Compare = 0x18, "cmp" => [Src, Src], 3;
    /// `jmp target`
    Jump = 0x20, "jmp" => [Tgt], 3;
    /// `jz target`: jumps when the comparison flag is clear.
    JumpZero = 0x21, "jz" => [Tgt], 2;
    /// `jnz target`: jumps when the comparison flag is set.
    JumpNotZero = 0x22, "jnz" => [Tgt], 2;
    /// `print src`: sends a value to the output device.
    Print = 0x40, "print" => [Src], 3;
    Halt = 0xFF, "halt" => [], 1;
}

lazy_static! {
    static ref BY_MNEMONIC: HashMap<&'static str, &'static InstructionSpec> = INSTRUCTION_SET
        .iter()
        .map(|spec| (spec.mnemonic, spec))
        .collect();
}

impl OpCode {
    /// Returns the table entry of the opcode.
    pub fn spec(self) -> &'static InstructionSpec {
        &INSTRUCTION_SET[self as usize]
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.spec().mnemonic)
    }
}

/// Finds an instruction by its mnemonic. The comparison is case-insensitive.
pub fn lookup(mnemonic: &str) -> Option<&'static InstructionSpec> {
    BY_MNEMONIC
        .get(mnemonic.to_ascii_lowercase().as_str())
        .copied()
}

/// Finds an instruction by its opcode byte.
pub fn decode(byte: u8) -> Option<&'static InstructionSpec> {
    OpCode::from_byte(byte).map(OpCode::spec)
}

/// Returns the known mnemonic closest to `mnemonic`, if there is one within two edits.
pub fn suggest(mnemonic: &str) -> Option<&'static str> {
    let lower = mnemonic.to_ascii_lowercase();

    INSTRUCTION_SET
        .iter()
        .map(|spec| (edit_distance::edit_distance(&lower, spec.mnemonic), spec.mnemonic))
        .filter(|(distance, _)| *distance <= 2)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, mnemonic)| mnemonic)
}

/// The registers of the machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    A,
    B,
    C,
    /// The comparison flag. Readable through its selector, but it has no name in the assembly
    /// language.
    Cmp,
}

impl Register {
    /// Returns the operand byte that selects this register.
    pub fn selector(self) -> u8 {
        match self {
            Register::A => 0,
            Register::B => 1,
            Register::C => 2,
            Register::Cmp => 3,
        }
    }

    pub fn from_selector(byte: u8) -> Option<Register> {
        match byte {
            0 => Some(Register::A),
            1 => Some(Register::B),
            2 => Some(Register::C),
            3 => Some(Register::Cmp),
            _ => None,
        }
    }

    /// Parses a register name as written in assembly source (`a`, `b` or `c`, in any case).
    pub fn from_name(name: &str) -> Option<Register> {
        match name.to_ascii_lowercase().as_str() {
            "a" => Some(Register::A),
            "b" => Some(Register::B),
            "c" => Some(Register::C),
            _ => None,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Register::A => write!(f, "A"),
            Register::B => write!(f, "B"),
            Register::C => write!(f, "C"),
            Register::Cmp => write!(f, "CMP"),
        }
    }
}
