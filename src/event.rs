//! Observing a run.
//!
//! Listeners registered with [add_listener](crate::emulator::Emulator::add_listener) are
//! called from [step](crate::emulator::Emulator::step) as soon as an event happens. Any
//! `FnMut(&Event)` closure is a listener.

use std::fmt;

use crate::error::Fault;

/// A single retired instruction, as reported by the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    /// The address the opcode was fetched from.
    pub pc: u16,

    /// The opcode byte.
    pub opcode: u8,

    /// Cycles taken by this instruction.
    pub cost: u64,

    /// Cycles taken by the program so far, including this instruction.
    pub total: u64,
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PC={:04X} OP={:02X} +{} cycles (total={})", self.pc, self.opcode, self.cost, self.total)
    }
}

/// Represents an event that occurred while executing a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// An instruction retired. Only sent while tracing is enabled.
    Trace(TraceRecord),

    /// A `print` instruction sent a value to the output device.
    Output {
        value: u8,
    },

    /// The program executed `halt`.
    Halted {
        /// Total number of cycles taken by the program.
        cycles: u64,
    },

    /// Execution stopped because of a fault.
    Faulted(Fault),
}

/// Receives the [events](Event) of an [Emulator](crate::emulator::Emulator) run.
pub trait EventListener {
    fn event(&mut self, event: &Event);
}

impl<F: FnMut(&Event)> EventListener for F {
    fn event(&mut self, event: &Event) {
        self(event)
    }
}

#[test]
fn test_trace_record_format() {
    let record = TraceRecord { pc: 0x0012, opcode: 0x21, cost: 3, total: 17 };

    assert_eq!(record.to_string(), "PC=0012 OP=21 +3 cycles (total=17)");
}
