//! glyph-run - Decode a glyph program and run it on the software backend
//!
//! # Usage
//!
//! ```bash
//! # Image with its sibling dictionary (hello.png + hello.json)
//! glyph-run path/to/hello.png
//!
//! # Program name under the configured data directory
//! glyph-run --config runtime.json boot/hello
//!
//! # Built-in console demo, no image needed
//! glyph-run --demo "hello, glyph"
//! ```
//!
//! Console output is printed as the guest flushes lines; the final core
//! state is printed when every core halts or the tick limit is reached.

use anyhow::{bail, Context, Result};
use glyphcore::loader::{load, load_path, DictionarySource, GlyphLoader, ImageSource};
use glyphcore::validate::dictionary_for;
use glyphcore::vm::software::console_program;
use glyphcore::{
    DecodedProgram, ExecutionManager, PositionKey, RuntimeConfig, SoftwareBackend, Supervisor,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const DEFAULT_TICKS: usize = 1000;

struct Options {
    program: Option<String>,
    dictionary: Option<PathBuf>,
    demo: Option<String>,
    config: Option<PathBuf>,
    ticks: usize,
}

fn main() -> ExitCode {
    let options = match parse_args() {
        Ok(Some(options)) => options,
        Ok(None) => return ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}\n", e);
            print_help();
            return ExitCode::from(2);
        }
    };

    match run(options) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn parse_args() -> Result<Option<Options>> {
    let mut options = Options {
        program: None,
        dictionary: None,
        demo: None,
        config: None,
        ticks: DEFAULT_TICKS,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(None);
            }
            "-d" | "--dict" => options.dictionary = Some(PathBuf::from(value_for(&arg, args.next())?)),
            "-c" | "--config" => options.config = Some(PathBuf::from(value_for(&arg, args.next())?)),
            "--demo" => options.demo = Some(value_for(&arg, args.next())?),
            "-t" | "--ticks" => {
                let raw = value_for(&arg, args.next())?;
                options.ticks = raw
                    .parse()
                    .with_context(|| format!("invalid tick count: {}", raw))?;
            }
            _ if arg.starts_with('-') => bail!("Unknown option: {}", arg),
            _ if options.program.is_some() => bail!("more than one program given"),
            _ => options.program = Some(arg),
        }
    }

    if options.program.is_none() && options.demo.is_none() {
        bail!("No program specified");
    }
    Ok(Some(options))
}

fn value_for(flag: &str, value: Option<String>) -> Result<String> {
    value.with_context(|| format!("{} requires a value", flag))
}

fn decode(options: &Options) -> Result<DecodedProgram> {
    let Some(program) = &options.program else {
        bail!("No program specified");
    };

    let path = Path::new(program);
    if path.is_file() {
        let dictionary = options
            .dictionary
            .clone()
            .unwrap_or_else(|| dictionary_for(path));
        return load(
            ImageSource::Path(path.to_path_buf()),
            DictionarySource::Path(dictionary),
        )
        .with_context(|| format!("Failed to decode {}", path.display()));
    }

    load_path(program).with_context(|| {
        format!(
            "Failed to decode {} from {}",
            program,
            GlyphLoader::data_dir().display()
        )
    })
}

/// Returns whether every core halted without faulting
fn run(options: Options) -> Result<bool> {
    let config = match &options.config {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if let Some(dir) = &config.data_dir {
        GlyphLoader::set_data_dir(dir);
    }

    let instructions = match &options.demo {
        Some(text) => {
            let mut bytes = text.clone().into_bytes();
            bytes.push(b'\n');
            console_program(&bytes)
        }
        None => {
            let program = decode(&options)?;
            let report = &program.report;
            eprintln!(
                "decoded {}x{}: {} executable, {} padding, {} unresolved",
                program.width,
                program.height,
                report.executable,
                report.non_executable,
                report.unresolved()
            );
            program.instructions
        }
    };

    let mut manager = ExecutionManager::new(SoftwareBackend::new(), config.manager.clone())?;
    manager
        .initialize()
        .context("Failed to initialize execution manager")?;
    manager.load_program(0, &instructions)?;
    let key = PositionKey::new(0, 0);
    manager.register_glyph(key, 0)?;

    let mut supervisor = Supervisor::new(manager, &config.bridge)?;
    let mut printed = 0;
    let mut ticks = 0;
    while ticks < options.ticks && !supervisor.manager().all_halted() {
        supervisor.tick()?;
        ticks += 1;
        for line in supervisor.console().lines().skip(printed) {
            println!("{}", line);
            printed += 1;
        }
    }
    let pending = supervisor.console().pending_line();
    if !pending.is_empty() {
        println!("{}", pending);
    }

    let Some(state) = supervisor.manager().get_execution_state(key) else {
        bail!("core for {} disappeared", key);
    };
    let stats = supervisor.bridge().stats();
    eprintln!();
    eprintln!(
        "core {}: pc=0x{:05X} cycles={} halted={} faulted={} awaiting_sbi={}",
        state.core_id, state.pc, state.cycles, state.halted, state.faulted, state.awaiting_sbi
    );
    eprintln!(
        "{} ticks, {} supervisor calls ({} unsupported)",
        ticks, stats.calls, stats.not_supported
    );

    if !state.halted {
        eprintln!("tick limit reached before the program halted");
    }
    Ok(state.halted && !state.faulted)
}

fn print_help() {
    eprintln!("glyph-run - Run a glyph program on the software backend");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    glyph-run [OPTIONS] <PROGRAM>");
    eprintln!("    glyph-run [OPTIONS] --demo <TEXT>");
    eprintln!();
    eprintln!("ARGS:");
    eprintln!("    <PROGRAM>    Image file, or a name under the data directory (no extension)");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -d, --dict <PATH>      Dictionary document (default: image path with .json)");
    eprintln!("    -c, --config <PATH>    Runtime configuration (JSON)");
    eprintln!("    -t, --ticks <N>        Tick limit (default: {})", DEFAULT_TICKS);
    eprintln!("        --demo <TEXT>      Print TEXT through console calls instead of loading a program");
    eprintln!("    -h, --help             Print this help message");
    eprintln!();
    eprintln!("EXIT CODES:");
    eprintln!("    0    Program halted cleanly");
    eprintln!("    1    Program faulted, did not halt, or failed to load");
    eprintln!("    2    Invalid arguments");
}
