//! CLI entry point for the compliance-test simulator binary.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use rv32_core::{AddressSpace, RegisterFile};
use rv32_sim::{run, selected_stepper, RunConfig};
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: rv32-sim [-h] [-v] [-s output.signature] [-g granularity] [-n num_cycles] -e input.elf

Options:
  -e <input.elf>         ELF executable to simulate (required)
  -n <num_cycles>        Cycle budget; 0 runs until tohost goes non-zero (default: 0)
  -s <output.signature>  Write the compliance signature to this file
  -g <granularity>       Signature chunk size in bytes: 1, 2 or 4 (default: 4)
  -v                     Print the finish line and register dump to stderr
  -h                     Show this help message
";

#[derive(Debug, PartialEq, Eq)]
struct SimArgs {
    elf: PathBuf,
    signature: Option<PathBuf>,
    granularity: u32,
    cycle_budget: u64,
    verbose: bool,
}

#[derive(Debug)]
enum ParseResult {
    Args(SimArgs),
    Help,
}

#[allow(clippy::while_let_on_iterator)]
fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut elf: Option<PathBuf> = None;
    let mut signature: Option<PathBuf> = None;
    let mut granularity = 4_u32;
    let mut cycle_budget = 0_u64;
    let mut verbose = false;

    while let Some(arg) = args.next() {
        if arg == "-h" {
            return Ok(ParseResult::Help);
        }
        if arg == "-v" {
            verbose = true;
            continue;
        }
        if arg == "-e" {
            let value = args.next().ok_or_else(|| "missing value for -e".to_string())?;
            elf = Some(PathBuf::from(value));
            continue;
        }
        if arg == "-s" {
            let value = args.next().ok_or_else(|| "missing value for -s".to_string())?;
            signature = Some(PathBuf::from(value));
            continue;
        }
        if arg == "-g" {
            let value = args.next().ok_or_else(|| "missing value for -g".to_string())?;
            granularity = value
                .to_string_lossy()
                .parse()
                .map_err(|_| "invalid value for -g".to_string())?;
            continue;
        }
        if arg == "-n" {
            let value = args.next().ok_or_else(|| "missing value for -n".to_string())?;
            cycle_budget = value
                .to_string_lossy()
                .parse()
                .map_err(|_| "invalid value for -n".to_string())?;
            continue;
        }
        return Err(format!("unknown option: {}", arg.to_string_lossy()));
    }

    let elf = elf.ok_or_else(|| "missing -e <input.elf>".to_string())?;
    Ok(ParseResult::Args(SimArgs {
        elf,
        signature,
        granularity,
        cycle_budget,
        verbose,
    }))
}

fn run_simulation(args: &SimArgs) -> Result<(), i32> {
    let image = match fs::read(&args.elf) {
        Ok(bytes) => bytes,
        Err(error) => {
            eprintln!("error: {}: {error}", args.elf.display());
            return Err(1);
        }
    };

    let mut mem = match AddressSpace::load_image(&image) {
        Ok(mem) => mem,
        Err(error) => {
            eprintln!("error: {}: {error}", args.elf.display());
            return Err(1);
        }
    };

    let mut regs = RegisterFile::new();
    let mut stepper = selected_stepper();
    let config = RunConfig {
        cycle_budget: args.cycle_budget,
    };

    let report = match run(&mut stepper, &mut mem, &mut regs, config) {
        Ok(report) => report,
        Err(fault) => {
            eprintln!("error: {fault}");
            return Err(1);
        }
    };

    if args.verbose {
        eprintln!(
            "Finished: t={} pc={:#x} .tohost={:#x}",
            report.cycles, report.pc, report.tohost
        );
        let stderr = std::io::stderr();
        if let Err(error) = regs.describe(&mut stderr.lock()) {
            eprintln!("error: register dump failed: {error}");
            return Err(1);
        }
    }

    if let Some(path) = &args.signature {
        let mut sigfile = match fs::File::create(path) {
            Ok(file) => file,
            Err(error) => {
                eprintln!("error: {}: {error}", path.display());
                return Err(1);
            }
        };
        if let Err(error) = mem.dump_signature(&mut sigfile, args.granularity) {
            eprintln!("error: signature dump failed: {error}");
            return Err(1);
        }
        if let Err(error) = sigfile.flush() {
            eprintln!("error: {}: {error}", path.display());
            return Err(1);
        }
    }

    Ok(())
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Args(args)) => match run_simulation(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            1
        }
    };

    std::process::exit(exit_code);
}
