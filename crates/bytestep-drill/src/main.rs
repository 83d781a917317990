//! CLI entry point for the bytestep binary.

use std::env;
use std::ffi::OsString;

use bytestep_core::{
    disassemble, parse_hex, run_hex, CoreConfig, Cpu, NoopTraceSink, TraceEvent, TraceSink,
    RESULT_OUT_OF_RANGE,
};
use bytestep_drill::{classify_hex, generate, generate_for, Classification, Level};
#[cfg(test)]
use proptest as _;
use rand::rngs::StdRng;
use rand::SeedableRng;
#[cfg(test)]
use rstest as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber::EnvFilter;

const USAGE_TEXT: &str = "\
Usage: bytestep <command> [options]

Commands:
  run <hex...> [--trace]      Decode and execute a program, print registers and result
  gen <level> [--seed <n>]    Generate a program for level 1-4
  check <hex...>              Print the difficulty level of a program
  disasm <hex...>             Print one listing row per instruction
  drill [--seed <n>]          Generate, classify and run one program per level

Options:
  --trace              Print every decode/retire event (run only)
  --seed <n>           Seed the random generator for reproducible output
  -h, --help           Show this help message

Hex may be given spaced or unspaced, in one argument or several.

Examples:
  bytestep run b8 01 00 00 00 48 81 c0 02 00 00 00
  bytestep gen 4 --seed 7
  bytestep check b82a0000004881c001000000
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run { hex: String, trace: bool },
    Gen { level: u8, seed: Option<u64> },
    Check { hex: String },
    Disasm { hex: String },
    Drill { seed: Option<u64> },
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();
    let rest: Vec<String> = args.map(|arg| arg.to_string_lossy().to_string()).collect();
    if rest.iter().any(|arg| arg == "--help" || arg == "-h") {
        return Ok(ParseResult::Help);
    }

    let command = match command_str.as_str() {
        "run" => {
            let trace = rest.iter().any(|arg| arg == "--trace");
            let words = rest.iter().filter(|arg| *arg != "--trace");
            Command::Run {
                hex: join_hex(words)?,
                trace,
            }
        }
        "gen" => {
            let (seed, positional) = split_seed(rest)?;
            let [level] = positional.as_slice() else {
                return Err("gen expects exactly one level".to_string());
            };
            let level = level
                .parse()
                .map_err(|_| format!("invalid level: {level}"))?;
            Command::Gen { level, seed }
        }
        "check" => Command::Check {
            hex: join_hex(rest.iter())?,
        },
        "disasm" => Command::Disasm {
            hex: join_hex(rest.iter())?,
        },
        "drill" => {
            let (seed, positional) = split_seed(rest)?;
            if let Some(extra) = positional.first() {
                return Err(format!("unexpected argument: {extra}"));
            }
            Command::Drill { seed }
        }
        other => return Err(format!("unknown command: {other}")),
    };

    Ok(ParseResult::Command(command))
}

fn join_hex<'a>(words: impl Iterator<Item = &'a String>) -> Result<String, String> {
    let mut hex = String::new();
    for word in words {
        if word.starts_with('-') {
            return Err(format!("unknown option: {word}"));
        }
        hex.push_str(word);
    }
    if hex.is_empty() {
        return Err("missing hex input".to_string());
    }
    Ok(hex)
}

#[allow(clippy::while_let_on_iterator)]
fn split_seed(args: Vec<String>) -> Result<(Option<u64>, Vec<String>), String> {
    let mut seed = None;
    let mut positional = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if arg == "--seed" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --seed".to_string())?;
            seed = Some(
                value
                    .parse()
                    .map_err(|_| format!("invalid seed: {value}"))?,
            );
            continue;
        }

        if arg.starts_with('-') {
            return Err(format!("unknown option: {arg}"));
        }
        positional.push(arg);
    }

    Ok((seed, positional))
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

fn format_result(value: i32) -> String {
    if value < 0 {
        format!("-{:x}", value.unsigned_abs())
    } else {
        format!("{value:x}")
    }
}

struct StderrTraceSink;

impl TraceSink for StderrTraceSink {
    fn on_event(&mut self, event: TraceEvent) {
        match event {
            TraceEvent::InstructionDecoded {
                offset,
                instruction,
            } => eprintln!(
                "decode  {offset:>4}: opcode 0x{:02x}, {} bytes",
                instruction.opcode, instruction.length
            ),
            TraceEvent::InstructionRetired { pc, registers } => {
                eprintln!("retire  {pc:>4}: {registers}");
            }
            TraceEvent::Faulted { fault } => eprintln!("fault   {fault}"),
        }
    }
}

fn run_program(hex: &str, trace: bool) -> Result<(), i32> {
    let mut cpu = Cpu::new();
    let outcome = if trace {
        run_hex(&mut cpu, hex, &CoreConfig::traced(), &mut StderrTraceSink)
    } else {
        run_hex(&mut cpu, hex, &CoreConfig::default(), &mut NoopTraceSink)
    };

    match outcome {
        Ok(report) => {
            println!("{}", report.registers);
            print_result(report.result);
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("registers at fault: {}", cpu.registers());
            Err(1)
        }
    }
}

fn print_result(result: Option<i32>) {
    match result {
        Some(value) => println!("result: {}", format_result(value)),
        None => println!(
            "result: {} (rax does not fit in 32 bits)",
            format_result(RESULT_OUT_OF_RANGE)
        ),
    }
}

fn run_gen(level: u8, seed: Option<u64>) -> Result<(), i32> {
    match generate_for(level, &mut seeded_rng(seed)) {
        Ok(program) => {
            println!("{}", program.spaced);
            println!("{}", program.compact);
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {e}");
            Err(1)
        }
    }
}

fn describe_classification(classification: &Classification) -> String {
    let width = classification.width.map_or_else(
        || "no immediates".to_string(),
        |width| format!("widest immediate {} byte(s)", width.bytes()),
    );
    format!(
        "{} ({width}, {} calculation(s))",
        classification.level, classification.calculations
    )
}

fn run_check(hex: &str) -> Result<(), i32> {
    match classify_hex(hex) {
        Ok(classification) => {
            println!("{}", describe_classification(&classification));
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {e}");
            Err(1)
        }
    }
}

fn run_disasm(hex: &str) -> Result<(), i32> {
    let code = parse_hex(hex).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    let rows = disassemble(&code);
    for row in &rows {
        println!("{row}");
    }

    if rows.iter().any(|row| row.is_illegal) {
        Err(1)
    } else {
        Ok(())
    }
}

fn run_drill(seed: Option<u64>) -> Result<(), i32> {
    let mut rng = seeded_rng(seed);
    let mut failures = 0;

    for level in Level::GENERATABLE {
        let program = match generate(level, &mut rng) {
            Ok(program) => program,
            Err(e) => {
                eprintln!("error: {e}");
                return Err(1);
            }
        };
        println!("{level}: {}", program.spaced);

        match classify_hex(&program.compact) {
            Ok(classification) if classification.level == level => {}
            Ok(classification) => {
                eprintln!("  classified as {}", classification.level);
                failures += 1;
            }
            Err(e) => {
                eprintln!("  error: {e}");
                failures += 1;
            }
        }

        let mut cpu = Cpu::new();
        match run_hex(
            &mut cpu,
            &program.compact,
            &CoreConfig::default(),
            &mut NoopTraceSink,
        ) {
            Ok(report) => println!(
                "  {} -> result {}",
                report.registers,
                format_result(cpu.result_or_sentinel())
            ),
            Err(e) => {
                eprintln!("  error: {e}");
                failures += 1;
            }
        }
    }

    if failures == 0 {
        Ok(())
    } else {
        Err(1)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => {
            let outcome = match command {
                Command::Run { hex, trace } => run_program(&hex, trace),
                Command::Gen { level, seed } => run_gen(level, seed),
                Command::Check { hex } => run_check(&hex),
                Command::Disasm { hex } => run_disasm(&hex),
                Command::Drill { seed } => run_drill(seed),
            };
            match outcome {
                Ok(()) => 0,
                Err(code) => code,
            }
        }
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            1
        }
    };

    std::process::exit(exit_code);
}
