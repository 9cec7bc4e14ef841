//! glyph-validate - Pre-execution validation tool for glyph images
//!
//! # Usage
//!
//! ```bash
//! # Decode every .png (with its sibling .json dictionary) in a directory
//! glyph-validate path/to/glyphs
//!
//! # Also fail images whose executable pixels do not all resolve
//! glyph-validate --strict path/to/glyphs
//!
//! # Verbose output with dimensions and pixel counts
//! glyph-validate -v path/to/glyphs
//! ```
//!
//! # Exit Codes
//!
//! - 0: All images validated successfully
//! - 1: One or more images failed validation
//! - 2: Invalid arguments or IO error

use glyphcore::validate::{validate_directory, validate_file, ValidationResult, ValidationSummary};
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let mut verbose = false;
    let mut strict = false;
    let mut paths = Vec::new();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "-v" | "--verbose" => verbose = true,
            "-s" | "--strict" => strict = true,
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            _ if arg.starts_with('-') => {
                eprintln!("Unknown option: {}\n", arg);
                print_help();
                return ExitCode::from(2);
            }
            _ => paths.push(arg.clone()),
        }
    }

    if paths.is_empty() {
        eprintln!("Error: No path specified\n");
        print_help();
        return ExitCode::from(2);
    }

    let mut all_results = Vec::new();

    for path_str in &paths {
        let path = Path::new(path_str);

        if !path.exists() {
            eprintln!("Error: Path does not exist: {}", path.display());
            return ExitCode::from(2);
        }

        if path.is_file() {
            let result = validate_file(path, strict);
            print_result(&result, verbose);
            all_results.push(result);
        } else if path.is_dir() {
            match validate_directory(path, strict) {
                Ok(results) => {
                    for result in &results {
                        print_result(result, verbose);
                    }
                    all_results.extend(results);
                }
                Err(e) => {
                    eprintln!("Error reading directory {}: {}", path.display(), e);
                    return ExitCode::from(2);
                }
            }
        }
    }

    let summary = ValidationSummary::from_results(&all_results);
    eprintln!();
    summary.print_report();

    if summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_result(result: &ValidationResult, verbose: bool) {
    match result {
        ValidationResult::Ok { path, program, warnings } => {
            let marker = if warnings.is_empty() { "+" } else { "!" };

            if verbose {
                let report = &program.report;
                println!(
                    "{} {} ({}x{}, {} executable, {} padding, {} unresolved)",
                    marker,
                    path.display(),
                    program.width,
                    program.height,
                    report.executable,
                    report.non_executable,
                    report.unresolved()
                );
            } else {
                println!("{} {}", marker, path.display());
            }

            for warning in warnings {
                eprintln!("  WARN : {}", warning);
            }
        }
        ValidationResult::Err { path, error } => {
            eprintln!("x {}", path.display());
            eprintln!("  {}", error);
        }
    }
}

fn print_help() {
    eprintln!("glyph-validate - Validate glyph program images");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    glyph-validate [OPTIONS] <PATH>...");
    eprintln!();
    eprintln!("ARGS:");
    eprintln!("    <PATH>    Image or directory to validate (recursive for directories)");
    eprintln!("              Each NAME.png is decoded with NAME.json");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -v, --verbose    Show dimensions and pixel counts");
    eprintln!("    -s, --strict     Fail images with unresolved tokens or no executable pixels");
    eprintln!("    -h, --help       Print this help message");
    eprintln!();
    eprintln!("EXIT CODES:");
    eprintln!("    0    All images validated successfully");
    eprintln!("    1    One or more images failed validation");
    eprintln!("    2    Invalid arguments or IO error");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("    glyph-validate glyphs/             Decode check every image");
    eprintln!("    glyph-validate --strict glyphs/    Require fully resolved programs");
    eprintln!("    glyph-validate -v boot/hello.png   Single image with counts");
}
