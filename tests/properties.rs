use vm8::{
    assembler::{self, Program},
    emulator::{Emulator, State, TestIo},
    error::Fault,
    instruction::{self, OperandKind, Register},
    memory::Memory,
};

fn assemble(source: &str) -> Program {
    assembler::assemble(source, 0)
        .expect("could not assemble the source")
}

fn load(source: &str) -> Memory {
    let mut memory = Memory::new();
    assemble(source).load_into(&mut memory)
        .expect("could not load the program");
    memory
}

fn cost(mnemonic: &str) -> u64 {
    instruction::lookup(mnemonic)
        .expect("no such instruction")
        .cost
}

#[test]
fn test_first_byte_is_the_opcode() {
    for spec in instruction::INSTRUCTION_SET {
        let operands = spec.operands.iter()
            .map(|kind| match kind {
                OperandKind::Destination => "b",
                OperandKind::Source => "c",
                OperandKind::Target => "0x10",
            })
            .collect::<Vec<_>>();

        let program = assemble(&format!("{} {}", spec.mnemonic, operands.join(",")));

        assert_eq!(instruction::decode(program.bytes[0]), Some(spec));
    }
}

#[test]
fn test_label_resolution_is_order_independent() {
    let program = assemble(r#"
        jmp target
        target:
        halt
        jz target
    "#);

    assert_eq!(program.labels.get("target"), Some(2));
    assert_eq!(program.bytes, vec![0x20, 0x02, 0xFF, 0x21, 0x02]);

    let forward = assembler::assemble("jmp over\ninc a\nover:\nhalt", 0x40).unwrap();
    let backward = assembler::assemble("inc b\ninc a\nover:\nhalt\njmp over", 0x40).unwrap();

    assert_eq!(forward.labels.get("over"), Some(0x44));
    assert_eq!(backward.labels.get("over"), Some(0x44));
    assert_eq!(forward.bytes[1], backward.bytes[6]);
}

#[test]
fn test_mov_add_halt() {
    let memory = load("mov A,5\nadd A,3\nhalt");

    let mut emulator = Emulator::new(&memory, TestIo::new());
    let cycles = emulator.run().unwrap();

    assert_eq!(emulator.state(), State::Halted);
    assert_eq!(emulator.cpu.a, 8);
    assert_eq!(cycles, cost("mov") + cost("add") + cost("halt"));
    assert_eq!(cycles, 6);
}

#[test]
fn test_registers_immediates_and_labels_do_not_collide() {
    let program = assemble("a:\nprint a\nprint 65\nprint A");

    assert_eq!(program.labels.get("a"), Some(0));
    assert_eq!(program.bytes, vec![
        0x40, Register::A.selector(),
        0x40, 65 | 0x80,
        0x40, Register::A.selector(),
    ]);
    assert_ne!(Register::A.selector(), 65 | 0x80);
}

#[test]
fn test_operands_resolve_the_same_in_every_position() {
    assert_eq!(assemble("jmp 5").bytes, vec![0x20, 5 | 0x80]);
    assert_eq!(assemble("jmp a").bytes, vec![0x20, Register::A.selector()]);
    assert_eq!(assemble("inc 5").bytes, vec![0x06, 5 | 0x80]);

    let memory = load("inc 5\nhalt");
    let mut emulator = Emulator::new(&memory, TestIo::new());

    assert_eq!(emulator.run(), Ok(cost("inc") + cost("halt")));
    assert_eq!(emulator.cpu.a, 0);
}

#[test]
fn test_division_by_zero_faults_without_writing() {
    let memory = load("mov A,1\nmov B,0\ndiv A,B\nhalt");

    let mut emulator = Emulator::new(&memory, TestIo::new());

    assert_eq!(emulator.run(), Err(Fault::DivisionByZero { pc: 6 }));
    assert_eq!(emulator.state(), State::Faulted(Fault::DivisionByZero { pc: 6 }));
    assert_eq!(emulator.cpu.a, 1);
    assert_eq!(emulator.cpu.cycles, cost("mov") * 2);
}

#[test]
fn test_taken_branch_reaches_target() {
    let memory = load(r#"
        mov A,1
        mov B,1
        cmp A,B
        jz target
        print A
        halt
        target:
        halt
    "#);

    let mut io = TestIo::new();
    let mut emulator = Emulator::new(&memory, &mut io);
    let cycles = emulator.run().unwrap();

    assert_eq!(emulator.cpu.cmp, 0);
    assert_eq!(emulator.cpu.pc, 15);
    assert_eq!(cycles, 2 * cost("mov") + cost("cmp") + cost("jz") + 1 + cost("halt"));
    assert!(io.output().is_empty());
}

#[test]
fn test_unknown_opcode_reports_pc() {
    let mut memory = Memory::new();
    memory.load(0x30, &[0x06, 0x01, 0x00]).unwrap();

    let mut emulator = Emulator::new(&memory, TestIo::new());
    emulator.cpu.pc = 0x30;

    let fault = emulator.run().unwrap_err();

    assert_eq!(fault, Fault::UnknownOpcode { opcode: 0x00, pc: 0x32 });
    assert_eq!(fault.to_string(), "unknown opcode 00 at PC=0032");
    assert_eq!(emulator.cpu.b, 1);
}
