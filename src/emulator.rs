//! [Emulator] for executing programs loaded into [Memory].

use slog::{error, info, o, trace, Discard, Logger};

use lazy_static::lazy_static;

use crate::cpu::Cpu;
use crate::error::Fault;
use crate::event::{Event, EventListener, TraceRecord};
use crate::instruction::{InstructionSpec, OpCode, Register, BRANCH_PENALTY, INSTRUCTION_SET};
use crate::memory::Memory;

/// Interface to the output device.
pub trait InputOutput {
    /// Called when a `print` instruction is executed.
    ///
    /// # Parameters
    /// - `value`: The resolved operand of the instruction.
    fn output(&mut self, value: u8);
}

impl<T: InputOutput + ?Sized> InputOutput for &mut T {
    fn output(&mut self, value: u8) {
        (**self).output(value)
    }
}

/// An IO handler that prints every value on its own line to the standard output.
pub struct StdIo;

impl InputOutput for StdIo {
    fn output(&mut self, value: u8) {
        println!("{}", value);
    }
}

/// An IO handler for testing purposes.
///
/// Appends printed values to an output buffer.
#[derive(Debug, Default)]
pub struct TestIo {
    output_buffer: Vec<u8>,
}

impl TestIo {
    pub fn new() -> TestIo {
        TestIo::default()
    }

    pub fn output(&self) -> &[u8] {
        &self.output_buffer[..]
    }

    pub fn into_output(self) -> Vec<u8> {
        self.output_buffer
    }
}

impl InputOutput for TestIo {
    fn output(&mut self, value: u8) {
        self.output_buffer.push(value);
    }
}

/// Execution state of the emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,

    /// The program executed `halt`. Terminal.
    Halted,

    /// Execution stopped because of a fault. Terminal.
    Faulted(Fault),
}

/// The operand bytes of the instruction being executed.
#[derive(Debug, Clone, Copy)]
struct Operands {
    /// Address the opcode was fetched from.
    pc: u16,
    bytes: [u8; 2],
}

/// What the emulator does after an instruction handler returns.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Flow {
    Next,
    Branch { taken: bool },
    Output(u8),
    Halt,
}

type Handler = fn(&mut Cpu, &Operands) -> Result<Flow, Fault>;

#[derive(Clone, Copy)]
struct Entry {
    spec: &'static InstructionSpec,
    handler: Handler,
}

fn source(cpu: &Cpu, ops: &Operands, index: usize) -> u8 {
    cpu.resolve_operand(ops.bytes[index])
}

fn unary(cpu: &mut Cpu, ops: &Operands, f: fn(u8) -> u8) -> Result<Flow, Fault> {
    let value = f(source(cpu, ops, 0));
    cpu.write_register(ops.bytes[0], value);
    Ok(Flow::Next)
}

fn binary(cpu: &mut Cpu, ops: &Operands, f: fn(u8, u8) -> u8) -> Result<Flow, Fault> {
    let value = f(source(cpu, ops, 0), source(cpu, ops, 1));
    cpu.write_register(ops.bytes[0], value);
    Ok(Flow::Next)
}

fn branch(cpu: &mut Cpu, ops: &Operands, taken: bool) -> Result<Flow, Fault> {
    if taken {
        cpu.pc = ops.bytes[0] as u16;
    }

    Ok(Flow::Branch { taken })
}

fn mov(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    binary(cpu, ops, |_, src| src)
}

fn add(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    binary(cpu, ops, u8::wrapping_add)
}

fn sub(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    binary(cpu, ops, u8::wrapping_sub)
}

fn mul(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    binary(cpu, ops, u8::wrapping_mul)
}

fn div(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    if source(cpu, ops, 1) == 0 {
        return Err(Fault::DivisionByZero { pc: ops.pc });
    }

    binary(cpu, ops, |dst, src| dst / src)
}

fn inc(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    unary(cpu, ops, |dst| dst.wrapping_add(1))
}

fn dec(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    unary(cpu, ops, |dst| dst.wrapping_sub(1))
}

fn and(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    binary(cpu, ops, |dst, src| dst & src)
}

fn or(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    binary(cpu, ops, |dst, src| dst | src)
}

fn xor(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    binary(cpu, ops, |dst, src| dst ^ src)
}

fn not(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    unary(cpu, ops, |dst| !dst)
}

fn nand(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    binary(cpu, ops, |dst, src| !(dst & src))
}

fn nor(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    binary(cpu, ops, |dst, src| !(dst | src))
}

fn cmp(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    let different = source(cpu, ops, 0) != source(cpu, ops, 1);
    cpu.write_register(Register::Cmp.selector(), different as u8);
    Ok(Flow::Next)
}

fn jmp(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    cpu.pc = ops.bytes[0] as u16;
    Ok(Flow::Next)
}

fn jz(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    let taken = cpu.cmp == 0;
    branch(cpu, ops, taken)
}

fn jnz(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    let taken = cpu.cmp != 0;
    branch(cpu, ops, taken)
}

fn print(cpu: &mut Cpu, ops: &Operands) -> Result<Flow, Fault> {
    Ok(Flow::Output(source(cpu, ops, 0)))
}

fn halt(_cpu: &mut Cpu, _ops: &Operands) -> Result<Flow, Fault> {
    Ok(Flow::Halt)
}

fn handler(opcode: OpCode) -> Handler {
    match opcode {
        OpCode::Move => mov,
        OpCode::Add => add,
        OpCode::Subtract => sub,
        OpCode::Multiply => mul,
        OpCode::Divide => div,
        OpCode::Increment => inc,
        OpCode::Decrement => dec,
        OpCode::And => and,
        OpCode::Or => or,
        OpCode::Xor => xor,
        OpCode::Not => not,
        OpCode::Nand => nand,
        OpCode::Nor => nor,
        OpCode::Compare => cmp,
        OpCode::Jump => jmp,
        OpCode::JumpZero => jz,
        OpCode::JumpNotZero => jnz,
        OpCode::Print => print,
        OpCode::Halt => halt,
    }
}

lazy_static! {
    /// Opcode byte to instruction handler. Built from the instruction set so that the operand
    /// count used when decoding is the one the assembler encoded with.
    static ref DISPATCH: [Option<Entry>; 256] = {
        let mut table = [None; 256];

        for spec in INSTRUCTION_SET {
            table[spec.byte() as usize] = Some(Entry {
                spec,
                handler: handler(spec.opcode),
            });
        }

        table
    };
}

/// The emulator contains the execution state of a run and the interfaces for output and
/// observation.
///
/// The memory is borrowed for the lifetime of the emulator and is never written to.
pub struct Emulator<'m, IO> {
    /// The memory holding the program.
    memory: &'m Memory,

    /// The register file.
    pub cpu: Cpu,

    /// Interface for `print` output.
    pub io: IO,

    state: State,
    tracing: bool,
    listeners: Vec<Box<dyn EventListener>>,
    logger: Logger,
}

impl<'m, IO> Emulator<'m, IO> where IO: InputOutput {
    /// Create a new emulator with all registers cleared.
    ///
    /// # Parameters
    /// - `memory`: The [Memory] which has the program.
    /// - `io`: An [IO handler](InputOutput).
    pub fn new(memory: &'m Memory, io: IO) -> Emulator<'m, IO> {
        Emulator::with_logger(memory, io, None)
    }

    /// Create a new emulator that logs every executed instruction to `logger`.
    pub fn with_logger<L>(memory: &'m Memory, io: IO, logger: L) -> Emulator<'m, IO>
    where
        L: Into<Option<Logger>>,
    {
        let logger = logger
            .into()
            .unwrap_or(Logger::root(Discard, o!()))
            .new(o!("stage" => "execution"));

        Emulator {
            memory,
            cpu: Cpu::new(),
            io,
            state: State::Running,
            tracing: false,
            listeners: Vec::new(),
            logger,
        }
    }

    pub fn set_logger(&mut self, logger: Logger) {
        self.logger = logger.new(o!("stage" => "execution"));
    }

    /// Enables or disables [trace events](Event::Trace).
    pub fn set_tracing(&mut self, enabled: bool) {
        self.tracing = enabled;
    }

    /// Registers a listener that is notified of the events of this run.
    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn memory(&self) -> &Memory {
        self.memory
    }

    fn emit(&mut self, event: Event) {
        for listener in &mut self.listeners {
            listener.event(&event);
        }
    }

    fn fault(&mut self, fault: Fault) -> Fault {
        error!(self.logger, "execution faulted"; "fault" => %fault);

        self.state = State::Faulted(fault);
        self.emit(Event::Faulted(fault));

        fault
    }

    /// Fetches, decodes and executes a single instruction.
    ///
    /// Stepping an emulator that has already halted does nothing.
    ///
    /// # Returns
    /// The state of the emulator after the instruction.
    ///
    /// # Errors
    /// Returns the [Fault] that stopped the execution, also when called again after a fault.
    pub fn step(&mut self) -> Result<State, Fault> {
        match self.state {
            State::Running => (),
            State::Halted => return Ok(State::Halted),
            State::Faulted(fault) => return Err(fault),
        }

        let pc = self.cpu.pc;
        let opcode = self.memory.read(pc);
        self.cpu.pc = pc.wrapping_add(1);

        let entry = match DISPATCH[opcode as usize] {
            Some(entry) => entry,
            None => return Err(self.fault(Fault::UnknownOpcode { opcode, pc })),
        };

        let count = entry.spec.operand_count();
        let mut operands = Operands { pc, bytes: [0; 2] };

        for (i, byte) in operands.bytes.iter_mut().take(count).enumerate() {
            *byte = self.memory.read(self.cpu.pc.wrapping_add(i as u16));
        }

        self.cpu.pc = self.cpu.pc.wrapping_add(count as u16);

        let flow = match (entry.handler)(&mut self.cpu, &operands) {
            Ok(flow) => flow,
            Err(fault) => return Err(self.fault(fault)),
        };

        let mut cost = entry.spec.cost;

        match flow {
            Flow::Branch { taken: true } => cost += BRANCH_PENALTY,
            Flow::Output(value) => {
                self.io.output(value);
                self.emit(Event::Output { value });
            }
            Flow::Next | Flow::Branch { taken: false } | Flow::Halt => (),
        }

        self.cpu.cycles += cost;

        trace!(self.logger, "retire instruction";
               "pc" => pc,
               "mnemonic" => entry.spec.mnemonic,
               "cost" => cost,
               "total" => self.cpu.cycles);

        if self.tracing {
            self.emit(Event::Trace(TraceRecord {
                pc,
                opcode,
                cost,
                total: self.cpu.cycles,
            }));
        }

        if flow == Flow::Halt {
            info!(self.logger, "halted"; "cycles" => self.cpu.cycles);

            self.state = State::Halted;
            self.emit(Event::Halted { cycles: self.cpu.cycles });
        }

        Ok(self.state)
    }

    /// Executes the program until it halts.
    ///
    /// # Returns
    /// The total number of cycles taken by the program.
    ///
    /// # Errors
    /// Returns the [Fault] that stopped the execution.
    pub fn run(&mut self) -> Result<u64, Fault> {
        while self.step()? == State::Running {}

        Ok(self.cpu.cycles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler;

    use std::cell::RefCell;
    use std::rc::Rc;

    fn load(source: &str) -> Memory {
        let mut memory = Memory::new();
        assembler::load(&mut memory, source, 0).expect("could not assemble the program");
        memory
    }

    macro_rules! assert_register {
        ($emulator:expr, $register:ident, $value:expr) => {
            assert_eq!($emulator.cpu.$register, $value, "Register {} != {}", stringify!($register), $value);
        };
    }

    #[test]
    fn test_dispatch_covers_instruction_set() {
        for spec in INSTRUCTION_SET {
            let entry = DISPATCH[spec.byte() as usize].expect("missing handler");
            assert_eq!(entry.spec, spec);
        }

        assert_eq!(DISPATCH.iter().filter(|entry| entry.is_some()).count(), INSTRUCTION_SET.len());
    }

    #[test]
    fn test_arithmetic_wraps() {
        let memory = load(r#"
            mov a, 100
            add a, 100
            add a, 100
            mov b, 0
            dec b
            mov c, 20
            mul c, 20
            halt
        "#);

        let mut emulator = Emulator::new(&memory, TestIo::new());
        emulator.run().unwrap();

        assert_register!(emulator, a, 44);
        assert_register!(emulator, b, 255);
        assert_register!(emulator, c, 144);
    }

    #[test]
    fn test_bitwise() {
        let memory = load(r#"
            mov a, 0x0F
            and a, 0x3C
            mov b, 0x0F
            or b, 0x30
            mov c, 0x0F
            nand c, 0x3C
            halt
        "#);

        let mut emulator = Emulator::new(&memory, TestIo::new());
        emulator.run().unwrap();

        assert_register!(emulator, a, 0x0C);
        assert_register!(emulator, b, 0x3F);
        assert_register!(emulator, c, 0xF3);
    }

    #[test]
    fn test_unary_and_remaining_bitwise() {
        let memory = load(r#"
            mov a, 0x55
            not a
            mov b, 0x0F
            xor b, 0x3C
            mov c, 0x01
            nor c, 0x02
            inc c
            halt
        "#);

        let mut emulator = Emulator::new(&memory, TestIo::new());
        emulator.run().unwrap();

        assert_register!(emulator, a, 0xAA);
        assert_register!(emulator, b, 0x33);
        assert_register!(emulator, c, 0xFD);
    }

    #[test]
    fn test_division() {
        let memory = load("mov a, 100\nmov b, 7\ndiv a, b\nhalt");

        let mut emulator = Emulator::new(&memory, TestIo::new());

        assert_eq!(emulator.run(), Ok(2 + 2 + 10 + 1));
        assert_register!(emulator, a, 14);
    }

    #[test]
    fn test_division_by_zero() {
        let memory = load("mov a, 1\nmov b, 0\ndiv a, b\nhalt");

        let mut emulator = Emulator::new(&memory, TestIo::new());

        assert_eq!(emulator.run(), Err(Fault::DivisionByZero { pc: 6 }));
        assert_eq!(emulator.state(), State::Faulted(Fault::DivisionByZero { pc: 6 }));
        assert_register!(emulator, a, 1);
        assert_eq!(emulator.cpu.cycles, 4);

        assert_eq!(emulator.step(), Err(Fault::DivisionByZero { pc: 6 }));
    }

    #[test]
    fn test_unknown_opcode() {
        let mut memory = load("inc a");
        memory.write(2, 0x41);

        let mut emulator = Emulator::new(&memory, TestIo::new());

        assert_eq!(emulator.step(), Ok(State::Running));
        assert_eq!(emulator.step(), Err(Fault::UnknownOpcode { opcode: 0x41, pc: 2 }));
        assert_eq!(emulator.cpu.cycles, 2);
    }

    #[test]
    fn test_compare_and_branch() {
        let memory = load(r#"
            mov a, 3
            loop:
            print a
            dec a
            cmp a, 0
            jnz loop
            halt
        "#);

        let mut io = TestIo::new();
        let cycles = Emulator::new(&memory, &mut io).run().unwrap();

        assert_eq!(io.output(), &[3, 2, 1]);

        // mov + 3 * (print + dec + cmp + jnz) + 2 taken branches + halt
        assert_eq!(cycles, 2 + 3 * (3 + 2 + 3 + 2) + 2 + 1);
    }

    #[test]
    fn test_cmp_flag_is_readable() {
        let mut memory = load("mov a, 1\ncmp a, 2\nhalt");
        memory.write(6, 0x01);
        memory.write(7, 0x01);
        memory.write(8, 0x03);
        memory.write(9, 0xFF);

        let mut emulator = Emulator::new(&memory, TestIo::new());
        emulator.run().unwrap();

        assert_register!(emulator, cmp, 1);
        assert_register!(emulator, b, 1);
    }

    #[test]
    fn test_immediate_destination_is_not_written() {
        let memory = load("mov a, 9\ninc 5\nnot 0x10\nhalt");

        let mut emulator = Emulator::new(&memory, TestIo::new());

        assert_eq!(emulator.run(), Ok(2 + 2 + 2 + 1));
        assert_register!(emulator, a, 9);
        assert_register!(emulator, b, 0);
        assert_register!(emulator, c, 0);
        assert_register!(emulator, cmp, 0);
    }

    #[test]
    fn test_jump_operand_is_a_raw_address() {
        let mut memory = load("jmp 5");
        memory.write(0x85, 0xFF);

        let mut emulator = Emulator::new(&memory, TestIo::new());

        assert_eq!(emulator.step(), Ok(State::Running));
        assert_eq!(emulator.cpu.pc, 0x85);
        assert_eq!(emulator.run(), Ok(3 + 1));

        // A register operand is its selector, so `jmp c` lands at address 2.
        let memory = load("jmp c\nhalt");
        let mut emulator = Emulator::new(&memory, TestIo::new());
        emulator.cpu.c = 0x40;

        assert_eq!(emulator.step(), Ok(State::Running));
        assert_eq!(emulator.cpu.pc, 2);
    }

    #[test]
    fn test_halted_emulator_stays_halted() {
        let memory = load("halt\ninc a");

        let mut emulator = Emulator::new(&memory, TestIo::new());

        assert_eq!(emulator.step(), Ok(State::Halted));
        assert_eq!(emulator.step(), Ok(State::Halted));
        assert_eq!(emulator.run(), Ok(1));
        assert_register!(emulator, a, 0);
    }

    #[test]
    fn test_trace_events() {
        let memory = load("mov a, 1\ncmp a, 1\njz done\nhalt\ndone:\nhalt");

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();

        let mut emulator = Emulator::new(&memory, TestIo::new());
        emulator.set_tracing(true);
        emulator.add_listener(move |event: &Event| sink.borrow_mut().push(*event));
        emulator.run().unwrap();

        let events = events.borrow();

        assert_eq!(*events, vec![
            Event::Trace(TraceRecord { pc: 0, opcode: 0x01, cost: 2, total: 2 }),
            Event::Trace(TraceRecord { pc: 3, opcode: 0x18, cost: 3, total: 5 }),
            Event::Trace(TraceRecord { pc: 6, opcode: 0x21, cost: 3, total: 8 }),
            Event::Trace(TraceRecord { pc: 9, opcode: 0xFF, cost: 1, total: 9 }),
            Event::Halted { cycles: 9 },
        ]);
    }

    #[test]
    fn test_tracing_disabled_by_default() {
        let memory = load("print 7\nhalt");

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();

        let mut emulator = Emulator::new(&memory, TestIo::new());
        emulator.add_listener(move |event: &Event| sink.borrow_mut().push(*event));
        emulator.run().unwrap();

        assert_eq!(*events.borrow(), vec![Event::Output { value: 7 }, Event::Halted { cycles: 4 }]);
        assert_eq!(emulator.io.output(), &[7]);
    }
}
