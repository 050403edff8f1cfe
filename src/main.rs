use std::{env, error, fs, path::PathBuf};

use emu::cpu::arm7tdmi::{Arm7tdmi, CpuConfig};
use emu::cpu::registers::REG_PROGRAM_COUNTER;
use emu::memory::FlatMemory;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const USAGE: &str = "usage: armcore <image> [--steps N] [--load-address ADDR] \
                     [--memory-size BYTES] [--high-vectors] [--log-file]";

struct Options {
    image: PathBuf,
    steps: u64,
    load_address: u32,
    memory_size: usize,
    high_vectors: bool,
    log_file: bool,
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, Box<dyn error::Error>> {
        let mut image = None;
        let mut options = Self {
            image: PathBuf::new(),
            steps: 1_000,
            load_address: 0,
            memory_size: 0x10_0000,
            high_vectors: false,
            log_file: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--steps" => options.steps = parse_number(args.next())?,
                "--load-address" => options.load_address = u32::try_from(parse_number(args.next())?)?,
                "--memory-size" => options.memory_size = usize::try_from(parse_number(args.next())?)?,
                "--high-vectors" => options.high_vectors = true,
                "--log-file" => options.log_file = true,
                "-h" | "--help" => return Err(USAGE.into()),
                flag if flag.starts_with("--") => {
                    return Err(format!("unknown option {flag}\n{USAGE}").into());
                }
                path => image = Some(PathBuf::from(path)),
            }
        }

        options.image = image.ok_or(USAGE)?;
        Ok(options)
    }
}

/// Decimal or `0x` prefixed hexadecimal.
fn parse_number(text: Option<String>) -> Result<u64, Box<dyn error::Error>> {
    let text = text.ok_or(USAGE)?;
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16)?,
        None => text.parse()?,
    };

    Ok(value)
}

/// `RUST_LOG` picks the level, `info` otherwise. The returned guard flushes
/// the log file when dropped.
fn init_tracing(log_file: bool) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_file {
        let path = env::temp_dir();
        let appender = tracing_appender::rolling::never(&path, "armcore.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        registry
            .with(fmt::layer().with_writer(writer).with_ansi(false))
            .init();
        eprintln!("Logging to file: {}", path.join("armcore.log").display());
        Some(guard)
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        None
    }
}

fn main() -> Result<(), Box<dyn error::Error>> {
    let options = Options::parse(env::args().skip(1))?;
    let _guard = init_tracing(options.log_file);
    tracing::info!("armcore v{}", env!("CARGO_PKG_VERSION"));

    let image = fs::read(&options.image)?;
    let mut memory = FlatMemory::new(options.memory_size);
    memory.load(options.load_address, &image)?;
    tracing::info!(
        "loaded {} bytes from {} at 0x{:08X}",
        image.len(),
        options.image.display(),
        options.load_address
    );

    let config = if options.high_vectors {
        CpuConfig::high_vectors()
    } else {
        CpuConfig::default()
    };
    let mut cpu = Arm7tdmi::with_config(memory, config);
    cpu.set_register_at(REG_PROGRAM_COUNTER, options.load_address);

    cpu.run(options.steps);
    tracing::info!("stopped at 0x{:08X} after {} steps", cpu.pc(), cpu.cycles());

    println!("{}", serde_json::to_string_pretty(&cpu.snapshot())?);
    Ok(())
}
