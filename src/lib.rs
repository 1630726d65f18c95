//! A crate for assembling and running programs for a minimal virtual 8-bit computer.
//!
//! The machine has 64 KiB of memory shared by code and data, three general purpose registers
//! (`A`, `B` and `C`), a comparison flag and a 16-bit program counter. Every instruction has a
//! fixed cycle cost and the emulator keeps a running total.
//!
//! This crate provides the functionality to:
//! - Assemble source text into bytes with a two-pass assembler.
//! - Execute the bytes while counting cycles, optionally tracing every instruction.
//! - Disassemble memory for listings.
//!
//! # Source format
//!
//! One instruction or label per line. Tokens are separated by whitespace, commas or semicolons.
//! Mnemonics and register names are case-insensitive. Comments are either `// line comments`
//! or `/* block comments */`, which may span lines.
//!
//! ```text
//! // prints 3, 2, 1
//!         mov  a, 3
//! loop:
//!         print a
//!         dec  a
//!         cmp  a, 0
//!         jnz  loop
//!         halt
//! ```
//!
//! Every operand is one byte: a register selector, a label address, or a 7-bit immediate
//! tagged with the high bit. Jumps use their operand byte as the target address, so labels
//! past `0xFF` cannot be jumped to and a literal target such as `jmp 5` goes to `0x85`.
//!
//! # Example
//! ```
//! use vm8::{
//!     assembler,
//!     emulator::{Emulator, TestIo},
//!     memory::Memory,
//! };
//!
//! let source = r#"
//!     mov a, 5
//!     add a, 3
//!     print a
//!     halt
//! "#;
//!
//! // Assemble the source into memory at address 0.
//! let mut memory = Memory::new();
//! let size = assembler::load(&mut memory, source, 0)
//!     .expect("could not assemble the program");
//! assert_eq!(size, 9);
//!
//! // Run it with an IO handler that records the printed values.
//! let mut emulator = Emulator::new(&memory, TestIo::new());
//! let cycles = emulator.run()
//!     .expect("an error occured while emulating the program");
//!
//! assert_eq!(emulator.io.output(), &[8]);
//! assert_eq!(cycles, 2 + 3 + 3 + 1);
//! ```
//!
//! # Executables
//!
//! ## `vm8run`
//!
//! Assembles a source file and runs it. `-S` prints the assembled bytes instead of running
//! them and `-trace` prints a line for every executed instruction.
pub mod instruction;
pub mod memory;
pub mod cpu;
pub mod token;
pub mod parsing;
pub mod symbol_table;
pub mod assembler;
pub mod disassembler;
pub mod emulator;
pub mod error;
pub mod event;
