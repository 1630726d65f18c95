use vm8::{
    assembler,
    emulator::{Emulator, TestIo},
    event::Event,
    memory::Memory,
};

use slog::{o, Drain, Logger};
use slog_term::{FullFormat, TermDecorator};

use std::cell::RefCell;
use std::rc::Rc;

fn logger() -> Logger {
    let decorator = TermDecorator::new().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    Logger::root(drain, o!())
}

#[test]
fn test_fibonacci() {
    let source = include_str!("fibonacci.asm");

    let mut memory = Memory::new();
    let size = assembler::load_with_logger(&mut memory, source, 0, logger())
        .expect("could not assemble fibonacci.asm");

    assert_eq!(size, 28);

    let mut io = TestIo::new();
    let mut emulator = Emulator::with_logger(&memory, &mut io, logger());

    let cycles = emulator.run()
        .expect("error while executing the program");

    assert_eq!(cycles, 234);
    assert_eq!(io.into_output(), vec![0, 1, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89]);
}

#[test]
fn test_countdown_at_origin() {
    let source = include_str!("countdown.asm");

    let program = assembler::assemble(source, 0x80)
        .expect("could not assemble countdown.asm");

    assert_eq!(program.labels.get("TOP"), Some(0x86));

    let mut memory = Memory::new();
    assert_eq!(program.load_into(&mut memory), Ok(program.len()));

    let traced = Rc::new(RefCell::new(Vec::new()));
    let sink = traced.clone();

    let mut emulator = Emulator::new(&memory, TestIo::new());
    emulator.cpu.pc = program.origin;
    emulator.set_tracing(true);
    emulator.add_listener(move |event: &Event| {
        if let Event::Trace(record) = event {
            sink.borrow_mut().push(*record);
        }
    });

    let cycles = emulator.run().unwrap();

    assert_eq!(emulator.io.output(), &[5, 4, 3, 2, 1]);
    assert_eq!(emulator.cpu.c, 120);
    assert_eq!(cycles, 89);

    let traced = traced.borrow();
    let last = traced.last().expect("no trace records");

    assert_eq!(traced.len(), 2 + 5 * 5 + 1);
    assert_eq!(last.opcode, 0xFF);
    assert_eq!(last.total, cycles);
    assert_eq!(traced.iter().map(|record| record.cost).sum::<u64>(), cycles);
}
