//! COMET II Emulator - CLI Entry Point
//!
//! Commands:
//! - `comet2-emu run [WORDS...]` - Run a memory image given as hex words
//!   and/or a JSON run configuration
//! - `comet2-emu test` - Built-in self-test

use clap::{Parser, Subcommand};
use comet2::cpu::registers::GR_COUNT;
use comet2::{Cpu, CpuError, Instruction, RunConfig, RunExit};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "comet2-emu")]
#[command(version)]
#[command(about = "An instruction-set emulator for the COMET II teaching CPU")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it returns to the sentinel address
    Run {
        /// Memory image words in hex (e.g. 7001 0000 8100)
        #[arg(value_parser = parse_word)]
        words: Vec<u16>,
        /// JSON run configuration; other options override it
        #[arg(short, long)]
        config: Option<String>,
        /// Load address of the image
        #[arg(long, value_parser = parse_number)]
        origin: Option<u16>,
        /// Entry address
        #[arg(long, value_parser = parse_number)]
        entry: Option<u16>,
        /// Initial stack pointer
        #[arg(long, value_parser = parse_number)]
        sp: Option<u16>,
        /// Return address that ends the run
        #[arg(long, value_parser = parse_number)]
        sentinel: Option<u16>,
        /// Preset a register, e.g. --gr 1=0xcab7
        #[arg(long = "gr", value_parser = parse_register)]
        registers: Vec<(usize, u16)>,
        /// Map an SVC number to a handler, e.g. --trap 1=0x0100
        #[arg(long = "trap", value_parser = parse_trap)]
        traps: Vec<(u16, u16)>,
        /// Maximum number of steps to run
        #[arg(short, long)]
        max_steps: Option<u64>,
        /// Show trace output
        #[arg(short, long)]
        trace: bool,
        /// Print the final registers as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Run {
            words,
            config,
            origin,
            entry,
            sp,
            sentinel,
            registers,
            traps,
            max_steps,
            trace,
            json,
        }) => {
            let mut run = match config {
                Some(path) => match RunConfig::load(&path) {
                    Ok(run) => run,
                    Err(e) => {
                        eprintln!("❌ Failed to load {}: {}", path, e);
                        std::process::exit(1);
                    }
                },
                None => RunConfig::default(),
            };

            if !words.is_empty() {
                run.image = words;
            }
            run.origin = origin.unwrap_or(run.origin);
            run.entry = entry.unwrap_or(run.entry);
            run.sp = sp.unwrap_or(run.sp);
            run.sentinel = sentinel.unwrap_or(run.sentinel);
            run.max_steps = max_steps.unwrap_or(run.max_steps);
            run.registers.extend(registers);
            run.traps.extend(traps);

            run_program(&run, trace, json);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("COMET II Emulator v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_number(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid 16-bit value '{}': {}", s, e))
}

fn parse_word(s: &str) -> Result<u16, String> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex word '{}': {}", s, e))
}

fn split_assignment(s: &str) -> Result<(&str, &str), String> {
    s.split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, found '{}'", s))
}

fn parse_register(s: &str) -> Result<(usize, u16), String> {
    let (index, value) = split_assignment(s)?;
    let index = index.trim_start_matches(|c| c == 'G' || c == 'R' || c == 'g' || c == 'r');
    let index: usize = index
        .parse()
        .map_err(|_| format!("invalid register in '{}'", s))?;
    if index >= GR_COUNT {
        return Err(format!("no such register: GR{}", index));
    }
    Ok((index, parse_number(value)?))
}

fn parse_trap(s: &str) -> Result<(u16, u16), String> {
    let (trap, vector) = split_assignment(s)?;
    Ok((parse_number(trap)?, parse_number(vector)?))
}

fn run_program(run: &RunConfig, trace: bool, json: bool) {
    if run.image.is_empty() {
        eprintln!("❌ No words to execute");
        std::process::exit(1);
    }

    let mut cpu = match run.build() {
        Ok(cpu) => cpu,
        Err(e) => {
            eprintln!("❌ Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let exit = if trace {
        trace_run(&mut cpu, run)
    } else {
        cpu.run_until(run.sentinel, run.max_steps)
    };

    let exit = match exit {
        Ok(exit) => exit,
        Err(e) => {
            eprintln!("❌ CPU error: {}", e);
            print_state(&cpu);
            std::process::exit(1);
        }
    };

    if json {
        match serde_json::to_string_pretty(&cpu.regs) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to serialize registers: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        println!("Steps: {}", exit.steps());
        print_state(&cpu);
    }

    if let RunExit::StepLimit { steps } = exit {
        eprintln!();
        eprintln!("⚠️  Reached max steps limit ({}). Use --max-steps to increase.", steps);
        std::process::exit(2);
    }
}

/// `run_until`, printing every step.
fn trace_run(cpu: &mut Cpu, run: &RunConfig) -> Result<RunExit, CpuError> {
    cpu.run_until_with(run.sentinel, run.max_steps, |cpu, pr, instr| {
        println!("{}", trace_line(cpu, pr, instr));
        println!("      {}", cpu.regs);
    })
}

/// One trace line: address, opcode word, the address word if the
/// instruction has one, and the decoded form.
fn trace_line(cpu: &Cpu, pr: u16, instr: Instruction) -> String {
    if instr.has_address_word() {
        let adr = cpu.read(pr.wrapping_add(1));
        format!("{:04x}: {:04x} {:04x}  {:?}", pr, instr.word(), adr, instr)
    } else {
        format!("{:04x}: {:04x}       {:?}", pr, instr.word(), instr)
    }
}

fn print_state(cpu: &Cpu) {
    for i in 0..GR_COUNT {
        println!("GR{}: {:04x} ({})", i, cpu.register(i), cpu.register(i) as i16);
    }
    println!("PR:  {:04x}", cpu.pc());
    println!("SP:  {:04x}", cpu.sp());
    println!("FR:  {}", cpu.flags());
}

fn run_self_test() {
    println!("━━━ COMET II Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    // Test 1: population count of GR1, returned in GR0
    print!("Bit count subroutine... ");
    let run = RunConfig {
        image: vec![
            0x7001, 0x0000, 0x7002, 0x0000, 0x2522, 0x3411, 0x6300, 0x000f, 0x1222, 0x0001,
            0x1201, 0xffff, 0x3410, 0x6200, 0x0008, 0x1402, 0x7120, 0x7110, 0x8100,
        ],
        registers: [(1, 0xcab7)].into_iter().collect(),
        max_steps: 10_000,
        ..RunConfig::default()
    };
    match run.build().map(|mut cpu| (cpu.run_until(run.sentinel, run.max_steps), cpu)) {
        Ok((Ok(RunExit::Returned { .. }), cpu)) if cpu.register(0) == 10 => {
            println!("✓");
            passed += 1;
        }
        Ok((result, cpu)) => {
            println!("✗ (got GR0={}, {:?})", cpu.register(0), result);
            failed += 1;
        }
        Err(e) => {
            println!("✗ ({})", e);
            failed += 1;
        }
    }

    // Test 2: SVC round trip through the trap table
    print!("SVC through trap table... ");
    let run = RunConfig {
        // SVC 1; RET  /  handler at 0x10: LAD GR0,42; RET
        image: vec![0xf000, 0x0001, 0x8100],
        traps: [(1, 0x0010)].into_iter().collect(),
        max_steps: 100,
        ..RunConfig::default()
    };
    match run.build() {
        Ok(mut cpu) => {
            cpu.load_image(0x0010, &[0x1200, 0x002a, 0x8100]);
            match cpu.run_until(run.sentinel, run.max_steps) {
                Ok(RunExit::Returned { .. }) if cpu.register(0) == 42 && cpu.sp() == 0xffff => {
                    println!("✓");
                    passed += 1;
                }
                other => {
                    println!("✗ ({:?})", other);
                    failed += 1;
                }
            }
        }
        Err(e) => {
            println!("✗ ({})", e);
            failed += 1;
        }
    }

    // Test 3: an unmapped opcode is reported, not executed
    print!("Illegal instruction detection... ");
    let mut cpu = Cpu::new();
    cpu.write(0, 0x9900);
    match cpu.step() {
        Err(CpuError::IllegalInstruction { addr: 0, .. }) if cpu.pc() == 0 => {
            println!("✓");
            passed += 1;
        }
        other => {
            println!("✗ ({:?})", other);
            failed += 1;
        }
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comet2::Operand;

    #[test]
    fn test_parse_register() {
        assert_eq!(parse_register("1=0xcab7"), Ok((1, 0xcab7)));
        assert_eq!(parse_register("GR7=42"), Ok((7, 42)));
        assert_eq!(parse_register("gr0=0X10"), Ok((0, 0x10)));
        assert!(parse_register("GR8=1").is_err());
        assert!(parse_register("GR1").is_err());
        assert!(parse_register("GR1=0x10000").is_err());
    }

    #[test]
    fn test_parse_trap() {
        assert_eq!(parse_trap("1=0x0100"), Ok((1, 0x0100)));
        assert_eq!(parse_trap("0x10=32"), Ok((0x10, 32)));
        assert!(parse_trap("1").is_err());
    }

    #[test]
    fn test_parse_word() {
        assert_eq!(parse_word("8100"), Ok(0x8100));
        assert_eq!(parse_word("0x7001"), Ok(0x7001));
        assert!(parse_word("12345").is_err());
    }

    #[test]
    fn test_trace_line_shows_address_word() {
        let mut cpu = Cpu::new();
        cpu.load_image(0x0010, &[0x1210, 0x0007, 0x1412, 0x8100]);

        let lad = Instruction::Lad { r: 1, x: 0 };
        assert_eq!(trace_line(&cpu, 0x0010, lad), format!("0010: 1210 0007  {:?}", lad));

        let ld = Instruction::Ld(Operand::Register { r1: 1, r2: 2 });
        assert_eq!(trace_line(&cpu, 0x0012, ld), format!("0012: 1412       {:?}", ld));
    }

    #[test]
    fn test_trace_run_matches_run_until() {
        let run = RunConfig {
            image: vec![0x1210, 0x0005, 0x8100],
            max_steps: 10,
            ..RunConfig::default()
        };

        let mut traced = run.build().unwrap();
        let mut plain = run.build().unwrap();
        let exit = trace_run(&mut traced, &run).unwrap();

        assert_eq!(exit, plain.run_until(run.sentinel, run.max_steps).unwrap());
        assert_eq!(exit, RunExit::Returned { steps: 2 });
        assert_eq!(traced.regs, plain.regs);
        assert_eq!(traced.register(1), 5);
    }
}
