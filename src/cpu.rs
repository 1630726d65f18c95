//! The register file of the processor.

use crate::instruction::{Register, IMMEDIATE_FLAG, IMMEDIATE_MASK};

/// Contains the execution state of the processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cpu {
    pub a: u8,
    pub b: u8,
    pub c: u8,

    /// The comparison flag. Always 0 or 1 when written through [Cpu::write_register].
    pub cmp: u8,

    /// The Program Counter stores the address of the next byte to be fetched.
    pub pc: u16,

    /// Total number of cycles taken by retired instructions.
    pub cycles: u64,
}

impl Cpu {
    /// Creates a processor with every register cleared.
    pub fn new() -> Cpu {
        Cpu::default()
    }

    pub fn register(&self, register: Register) -> u8 {
        match register {
            Register::A => self.a,
            Register::B => self.b,
            Register::C => self.c,
            Register::Cmp => self.cmp,
        }
    }

    /// Interprets an operand byte.
    ///
    /// Bytes with the immediate flag set evaluate to their low seven bits. Register selectors
    /// evaluate to the value of the register. Everything else is returned as is.
    pub fn resolve_operand(&self, byte: u8) -> u8 {
        if byte & IMMEDIATE_FLAG != 0 {
            return byte & IMMEDIATE_MASK;
        }

        match Register::from_selector(byte) {
            Some(register) => self.register(register),
            None => byte,
        }
    }

    /// Writes `value` to the register selected by `selector`.
    ///
    /// Writes to the comparison flag are normalized to 0 or 1. Selectors that do not name a
    /// register are ignored.
    pub fn write_register(&mut self, selector: u8, value: u8) {
        match Register::from_selector(selector) {
            Some(Register::A) => self.a = value,
            Some(Register::B) => self.b = value,
            Some(Register::C) => self.c = value,
            Some(Register::Cmp) => self.cmp = (value != 0) as u8,
            None => (),
        }
    }
}
