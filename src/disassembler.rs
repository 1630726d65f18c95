//! Decoding memory back into instructions, for listings and debugging.

use std::fmt;

use crate::instruction::{self, InstructionSpec, OperandKind, Register, IMMEDIATE_FLAG, IMMEDIATE_MASK};
use crate::memory::Memory;

/// A decoded instruction, or a byte that does not start one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Address of the first byte.
    pub address: u16,

    /// The instruction, or `None` if the byte at `address` is not an opcode.
    pub spec: Option<&'static InstructionSpec>,

    /// All bytes of the instruction, opcode included.
    pub bytes: Vec<u8>,
}

fn fmt_operand(f: &mut fmt::Formatter, kind: OperandKind, byte: u8) -> fmt::Result {
    match kind {
        OperandKind::Target => write!(f, "0x{:02X}", byte),
        _ if byte & IMMEDIATE_FLAG != 0 => write!(f, "{}", byte & IMMEDIATE_MASK),
        _ => match Register::from_selector(byte) {
            Some(register) => write!(f, "{}", register),
            None => write!(f, "[0x{:02X}]", byte),
        },
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04X}: ", self.address)?;

        let spec = match self.spec {
            Some(spec) => spec,
            None => return write!(f, ".byte 0x{:02X}", self.bytes[0]),
        };

        write!(f, "{}", spec.mnemonic)?;

        for (i, (kind, byte)) in spec.operands.iter().zip(&self.bytes[1..]).enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            fmt_operand(f, *kind, *byte)?;
        }

        Ok(())
    }
}

/// Decodes the `length` bytes starting at `origin`.
///
/// Bytes that are not opcodes are reported one at a time. An instruction whose operands run
/// past the end of the range is still decoded completely, reading its operands the way the
/// emulator fetches them, wrapping from `0xFFFF` to `0x0000`.
pub fn disassemble(memory: &Memory, origin: u16, length: usize) -> Vec<Decoded> {
    let end = origin as usize + length;
    let mut address = origin as usize;
    let mut listing = Vec::new();

    while address < end && address <= u16::max_value() as usize {
        let start = address as u16;
        let spec = instruction::decode(memory.read(start));
        let size = spec.map(InstructionSpec::size).unwrap_or(1);

        listing.push(Decoded {
            address: start,
            spec,
            bytes: (0..size as u16).map(|i| memory.read(start.wrapping_add(i))).collect(),
        });

        address += size;
    }

    listing
}

#[test]
fn test_disassemble() {
    let mut memory = Memory::new();
    let program = crate::assembler::assemble("mov a, 5\nloop:\ncmp b, c\njnz loop\nhalt", 0).unwrap();
    program.load_into(&mut memory).unwrap();

    let listing = disassemble(&memory, 0, 10)
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    assert_eq!(listing, vec![
        "0000: mov A, 5",
        "0003: cmp B, C",
        "0006: jnz 0x03",
        "0008: halt",
        "0009: .byte 0x00",
    ]);
}

#[test]
fn test_disassemble_wraps_at_end_of_memory() {
    let mut memory = Memory::new();
    memory.write(0xFFFF, 0x01);
    memory.write(0x0000, 0x02);
    memory.write(0x0001, 0x85);

    let listing = disassemble(&memory, 0xFFFF, 1);

    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].bytes, vec![0x01, 0x02, 0x85]);
    assert_eq!(listing[0].to_string(), "FFFF: mov C, 5");
}
