use vm8::{
    assembler,
    disassembler,
    error::{AssembleError, Fault},
    emulator::{Emulator, StdIo},
    event::Event,
    memory::Memory,
    parsing::parse_integer,
};

use std::fmt;
use std::process::exit;

use clap::{App, Arg, ArgMatches};
use itertools::Itertools;
use slog::{o, Discard, Drain, Logger};
use slog_term::{FullFormat, TermDecorator};

enum Error {
    Assemble(AssembleError),
    Execution(Fault),
    InvalidOrigin(String),
    IO(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::IO(e)
    }
}

impl From<AssembleError> for Error {
    fn from(e: AssembleError) -> Error {
        Error::Assemble(e)
    }
}

impl From<Fault> for Error {
    fn from(e: Fault) -> Error {
        Error::Execution(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Assemble(e) => write!(f, "Assembly error: {}", e),
            Error::Execution(e) => write!(f, "Execution error: {}", e),
            Error::InvalidOrigin(origin) => write!(f, "Invalid origin: {}", origin),
            Error::IO(e) => write!(f, "IO error: {}", e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Run,
    Trace,
    Dump,
    Disassemble,
}

/// Rewrites the single-dash `-trace` flag into the `--trace` form clap understands.
fn normalize_args<I: IntoIterator<Item = String>>(args: I) -> Vec<String> {
    args.into_iter()
        .map(|arg| if arg == "-trace" { "--trace".to_string() } else { arg })
        .collect()
}

fn parse_arguments() -> ArgMatches<'static> {
    App::new("vm8run")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Mitja Karhusaari <mitja@karhusaari.me>")
        .about("Utility for assembling and executing vm8 programs")
        .arg(Arg::with_name("source")
             .help("File containing assembly source")
             .value_name("SOURCE")
             .required(true)
             .index(1))
        .arg(Arg::with_name("dump")
             .help("Assemble only and print the encoded bytes as hex")
             .short("S")
             .conflicts_with_all(&["trace", "disassemble"]))
        .arg(Arg::with_name("trace")
             .help("Print every executed instruction and its cycle cost")
             .long("trace")
             .conflicts_with("disassemble"))
        .arg(Arg::with_name("disassemble")
             .help("Assemble only and print a listing of the encoded instructions")
             .long("disassemble")
             .short("d"))
        .arg(Arg::with_name("origin")
             .help("Address to load the program at and start executing from")
             .long("origin")
             .value_name("ADDRESS")
             .default_value("0"))
        .arg(Arg::with_name("verbose")
             .help("Enables verbose logging")
             .long("verbose")
             .short("v"))
        .get_matches_from(normalize_args(std::env::args()))
}

fn build_logger(verbose: bool) -> Logger {
    if !verbose {
        return Logger::root(Discard, o!());
    }

    let decorator = TermDecorator::new().stderr().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    Logger::root(drain, o!())
}

fn parse_origin(origin: &str) -> Result<u16, Error> {
    parse_integer(origin)
        .filter(|value| (0..=u16::max_value() as i64).contains(value))
        .map(|value| value as u16)
        .ok_or_else(|| Error::InvalidOrigin(origin.to_string()))
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes.chunks(16)
        .map(|line| line.iter().map(|byte| format!("{:02X}", byte)).join(" "))
        .join("\n")
}

fn main() {
    let args = parse_arguments();

    let mode = if args.is_present("dump") {
        Mode::Dump
    } else if args.is_present("disassemble") {
        Mode::Disassemble
    } else if args.is_present("trace") {
        Mode::Trace
    } else {
        Mode::Run
    };

    let logger = build_logger(args.is_present("verbose"));

    let file_path = args.value_of("source").unwrap_or_default();
    let origin = args.value_of("origin").unwrap_or("0");

    if let Err(e) = run(file_path, origin, mode, logger) {
        eprintln!("{}", e);
        exit(1);
    }
}

fn run(file_path: &str, origin: &str, mode: Mode, logger: Logger) -> Result<(), Error> {
    let origin = parse_origin(origin)?;
    let source = std::fs::read_to_string(file_path)?;

    let mut memory = Memory::new();
    let size = assembler::load_with_logger(&mut memory, &source, origin, logger.clone())?;

    println!("Loaded {} bytes", size);

    match mode {
        Mode::Dump => {
            println!("{}", hex_dump(memory.slice(origin, size)));
            return Ok(());
        }
        Mode::Disassemble => {
            for decoded in disassembler::disassemble(&memory, origin, size) {
                println!("{}", decoded);
            }
            return Ok(());
        }
        Mode::Run | Mode::Trace => (),
    }

    let mut emulator = Emulator::with_logger(&memory, StdIo, logger);
    emulator.cpu.pc = origin;

    if mode == Mode::Trace {
        emulator.set_tracing(true);
        emulator.add_listener(|event: &Event| {
            if let Event::Trace(record) = event {
                println!("{}", record);
            }
        });
    }

    let cycles = emulator.run()?;

    println!("Total cycles: {}", cycles);

    Ok(())
}
