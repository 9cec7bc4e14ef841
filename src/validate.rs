//! Validation utilities for glyph programs
//!
//! Provides batch validation with detailed error reporting. Every `*.png`
//! is decoded with the `*.json` dictionary next to it.
//! Two levels of validation:
//! - Decode validation (always runs): image readable, dictionary well-formed
//! - Strict validation (with `--strict`): executable pixels must all resolve
//!   to a dictionary entry
//!
//! # Example
//!
//! ```ignore
//! use glyphcore::validate::{validate_directory, ValidationResult};
//!
//! let results = validate_directory("path/to/glyphs", false)?;
//! for result in &results {
//!     match result {
//!         ValidationResult::Ok { path, program, .. } => {
//!             println!("✓ {}: {} instructions", path.display(), program.len());
//!         }
//!         ValidationResult::Err { path, error } => {
//!             eprintln!("✗ {}: {}", path.display(), error);
//!         }
//!     }
//! }
//! ```

use crate::glyph::DecodedProgram;
use crate::loader::{load, DictionarySource, ImageSource, DICTIONARY_EXTENSION, IMAGE_EXTENSION};
use std::path::{Path, PathBuf};

/// Result of validating a single glyph image
#[derive(Debug)]
pub enum ValidationResult {
    /// Image decoded
    Ok {
        path: PathBuf,
        program: DecodedProgram,
        /// Problems found by strict validation (empty otherwise)
        warnings: Vec<String>,
    },
    /// Image or dictionary could not be decoded
    Err { path: PathBuf, error: String },
}

impl ValidationResult {
    /// Decoded and no strict-mode problems
    pub fn is_ok(&self) -> bool {
        match self {
            Self::Ok { warnings, .. } => warnings.is_empty(),
            Self::Err { .. } => false,
        }
    }

    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Ok { path, .. } => path,
            Self::Err { path, .. } => path,
        }
    }
}

/// Dictionary document that belongs to `image`
pub fn dictionary_for(image: &Path) -> PathBuf {
    image.with_extension(DICTIONARY_EXTENSION)
}

/// Validate one image against its sibling dictionary.
///
/// With `strict`, unresolved tokens (out of range or absent entries) are
/// reported; they still decode as no-ops.
pub fn validate_file<P: AsRef<Path>>(path: P, strict: bool) -> ValidationResult {
    let path = path.as_ref().to_path_buf();
    let dictionary = dictionary_for(&path);

    let program = match load(
        ImageSource::Path(path.clone()),
        DictionarySource::Path(dictionary),
    ) {
        Ok(program) => program,
        Err(e) => {
            return ValidationResult::Err {
                path,
                error: e.to_string(),
            }
        }
    };

    let mut warnings = Vec::new();
    if strict {
        let report = &program.report;
        if report.out_of_range > 0 {
            warnings.push(format!("{} pixels reference tokens past the dictionary", report.out_of_range));
        }
        if report.absent > 0 {
            warnings.push(format!("{} pixels reference absent dictionary entries", report.absent));
        }
        if report.executable == 0 {
            warnings.push("no executable pixels".to_string());
        }
    }

    ValidationResult::Ok {
        path,
        program,
        warnings,
    }
}

/// Validate every image in a directory (recursive).
pub fn validate_directory<P: AsRef<Path>>(dir: P, strict: bool) -> std::io::Result<Vec<ValidationResult>> {
    let mut results = Vec::new();
    validate_directory_recursive(dir.as_ref(), strict, &mut results)?;

    // Sort by path for consistent output
    results.sort_by(|a, b| a.path().cmp(b.path()));

    Ok(results)
}

fn validate_directory_recursive(
    dir: &Path,
    strict: bool,
    results: &mut Vec<ValidationResult>,
) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_dir() {
            validate_directory_recursive(&path, strict, results)?;
        } else if path.extension().map_or(false, |e| e == IMAGE_EXTENSION) {
            results.push(validate_file(&path, strict));
        }
    }

    Ok(())
}

/// Summary of validation results
#[derive(Debug, Default)]
pub struct ValidationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: Vec<(PathBuf, String)>,
    pub instructions: usize,
    pub unresolved: usize,
}

impl ValidationSummary {
    /// Create summary from results
    pub fn from_results(results: &[ValidationResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };

        for result in results {
            match result {
                ValidationResult::Ok { program, warnings, .. } => {
                    if warnings.is_empty() {
                        summary.passed += 1;
                    } else {
                        summary.failed += 1;
                    }
                    summary.instructions += program.len();
                    summary.unresolved += program.report.unresolved();
                }
                ValidationResult::Err { path, error } => {
                    summary.failed += 1;
                    summary.errors.push((path.clone(), error.clone()));
                }
            }
        }

        summary
    }

    /// Print summary to stderr
    pub fn print_report(&self) {
        if !self.errors.is_empty() {
            eprintln!("\n{} DECODE ERRORS:", self.errors.len());
            for (path, error) in &self.errors {
                eprintln!("\n  {}", path.display());
                eprintln!("    {}", error);
            }
            eprintln!();
        }

        eprintln!(
            "Validated {} images: {} passed, {} failed",
            self.total, self.passed, self.failed
        );
        if self.instructions > 0 {
            eprintln!(
                "Instructions: {} decoded, {} unresolved",
                self.instructions, self.unresolved
            );
        }
    }
}
