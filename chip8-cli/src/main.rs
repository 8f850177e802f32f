//! Entrypoint for CLI
mod error;

use std::{
    env,
    error::Error,
    fs, thread,
    time::{Duration, Instant},
};

use chip8::{prelude::*, IMPL_VERSION};
use log::{error, info, warn};

use self::error::AppError;

static USAGE: &str = r#"
usage: chip8 CMD FILE [OPTIONS]

commands:
    run     Run the target ROM file, then print the display
    dis     Disassemble the the target ROM into readable assembly

options:
    --config FILE   YAML file with VM configuration
    --frames N      Number of 60 Hz frames to run for (default 600)

examples:
    chip8 run maze.rom
    chip8 run maze.rom --config chip8.yaml --frames 120
    chip8 dis maze.rom

Set RUST_LOG=trace to print every executed instruction.
"#;

/// Default run time, 10 seconds.
const DEFAULT_FRAMES: u64 = 600;

/// Time between driver updates.
const FRAME_TIME: Duration = Duration::from_micros(1_000_000 / 60);

fn run_bytecode(opts: &RunOpts) -> Result<(), AppError> {
    info!("load rom: {}", opts.filepath);
    let bytecode = fs::read(&opts.filepath)?;

    let conf = match &opts.config {
        Some(path) => {
            info!("load config: {path}");
            serde_yaml::from_reader(fs::File::open(path)?)?
        }
        None => Chip8Conf::default(),
    };

    let mut vm = Chip8Vm::new(conf)?;
    vm.load_program(&bytecode)?;

    let start = Instant::now();
    let mut driver = Driver::new(&vm, start);
    let mut cycles = 0_u64;
    let mut buzzing = false;

    for _ in 0..opts.frames {
        thread::sleep(FRAME_TIME);

        let update = driver.update(&mut vm, Instant::now())?;
        cycles += update.cycles as u64;

        // There is no audio device, the buzzer is reported in the log instead.
        if vm.timers().is_buzzing() != buzzing {
            buzzing = vm.timers().is_buzzing();
            info!("buzzer {}", if buzzing { "on" } else { "off" });
        }

        match update.flow {
            Flow::Halted => break,
            Flow::KeyWait => {
                // No keyboard is attached to the terminal runner.
                warn!("program is waiting for a key press, stopping");
                break;
            }
            _ => {}
        }
    }

    println!(
        "{cycles} instructions in {}ms",
        start.elapsed().as_nanos() as f64 / 1000000.0
    ); // to millis
    println!("{}", vm.dump_display().map_err(Chip8Error::from)?);

    Ok(())
}

fn run_disassembler(filepath: &str) -> Result<(), AppError> {
    info!("disassemble: {filepath}");

    let bytecode = fs::read(filepath)?;
    let mut buf = String::new();
    Disassembler::new(&bytecode)
        .disassemble(&mut buf)
        .map_err(Chip8Error::from)?;
    print!("{buf}");

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()?;

    let result = match parse_args(env::args().skip(1)) {
        Ok(Cmd::Run(opts)) => run_bytecode(&opts),
        Ok(Cmd::Dis { filepath }) => run_disassembler(&filepath),
        Err(err) => {
            error!("{err}");
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    };

    if let Err(err) = result {
        error!("{err}");
        std::process::exit(1);
    }

    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Cmd, AppError> {
    let cmd = args.next().ok_or_else(|| AppError::usage("missing command"))?;
    match cmd.as_str() {
        "run" => {
            let mut opts = RunOpts {
                filepath: consume_arg(&mut args, "ROM file")?,
                config: None,
                frames: DEFAULT_FRAMES,
            };

            while let Some(flag) = args.next() {
                match flag.as_str() {
                    "--config" => opts.config = Some(consume_arg(&mut args, "config file")?),
                    "--frames" => {
                        let value = consume_arg(&mut args, "frame count")?;
                        opts.frames = value
                            .parse()
                            .map_err(|_| AppError::usage(format!("invalid frame count: {value}")))?;
                    }
                    _ => return Err(AppError::usage(format!("unknown option: {flag}"))),
                }
            }

            Ok(Cmd::Run(opts))
        }
        "dis" => Ok(Cmd::Dis {
            filepath: consume_arg(&mut args, "ROM file")?,
        }),
        _ => Err(AppError::usage(format!("unknown command: {cmd}"))),
    }
}

/// Consumes the next argument, or reports what was expected.
fn consume_arg(args: &mut impl Iterator<Item = String>, what: &str) -> Result<String, AppError> {
    args.next()
        .ok_or_else(|| AppError::usage(format!("missing {what}")))
}

fn print_usage() {
    println!("Chip8 v{IMPL_VERSION}");
    println!("{USAGE}");
}

#[derive(Debug, PartialEq, Eq)]
struct RunOpts {
    filepath: String,
    config: Option<String>,
    frames: u64,
}

#[derive(Debug, PartialEq, Eq)]
enum Cmd {
    /// Run file
    Run(RunOpts),
    /// Disassemble
    Dis { filepath: String },
}
