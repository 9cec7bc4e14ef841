//! Glyph program loader
//!
//! Turns an image source plus a dictionary source into a [`DecodedProgram`].
//!
//! # Usage
//!
//! ## Runtime loading
//!
//! ```ignore
//! use glyphcore::loader::{GlyphLoader, load_path};
//!
//! // Configure data directory once at startup
//! GlyphLoader::set_data_dir("/path/to/glyphs");
//!
//! // {data_dir}/boot/hello.png + {data_dir}/boot/hello.json
//! let program = load_path("boot/hello")?;
//! ```
//!
//! ## Explicit sources
//!
//! ```ignore
//! use glyphcore::loader::{load, DictionarySource, ImageSource};
//!
//! let program = load(
//!     ImageSource::Bytes(png_bytes),
//!     DictionarySource::Json(dictionary_text),
//! )?;
//! ```

use crate::error::DecodeError;
use crate::glyph::{decode_rgba, DecodedProgram, DictionaryDocument, InstructionDictionary};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Global data directory for `load_path`
static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Image extension used by `load_path`
pub const IMAGE_EXTENSION: &str = "png";

/// Dictionary extension used by `load_path`
pub const DICTIONARY_EXTENSION: &str = "json";

/// Where the pixel data comes from
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Encoded image file (any format the `image` crate reads)
    Path(PathBuf),
    /// Encoded image bytes
    Bytes(Vec<u8>),
    /// Raw RGBA8, row-major
    Rgba {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
}

impl ImageSource {
    fn name(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes(bytes) => format!("<{} encoded bytes>", bytes.len()),
            Self::Rgba { width, height, .. } => format!("<{}x{} rgba>", width, height),
        }
    }

    /// Fetch and convert to `(width, height, rgba8)`
    fn fetch(self) -> Result<(u32, u32, Vec<u8>), DecodeError> {
        let source_name = self.name();
        let fetch_error = |reason: String| DecodeError::ImageFetch {
            source_name: source_name.clone(),
            reason,
        };
        let img = match self {
            Self::Rgba { width, height, pixels } => return Ok((width, height, pixels)),
            Self::Path(path) => image::open(&path).map_err(|e| fetch_error(e.to_string()))?,
            Self::Bytes(bytes) => {
                image::load_from_memory(&bytes).map_err(|e| fetch_error(e.to_string()))?
            }
        };
        let rgba = img.to_rgba8();
        Ok((rgba.width(), rgba.height(), rgba.into_raw()))
    }
}

/// Where the instruction dictionary comes from
#[derive(Debug, Clone)]
pub enum DictionarySource {
    Path(PathBuf),
    Json(String),
    Document(DictionaryDocument),
}

impl DictionarySource {
    fn resolve(self) -> Result<InstructionDictionary, DecodeError> {
        let document = match self {
            Self::Document(document) => document,
            Self::Json(text) => DictionaryDocument::from_json(&text)?,
            Self::Path(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| DecodeError::Dictionary(format!("{}: {}", path.display(), e)))?;
                DictionaryDocument::from_json(&text)?
            }
        };
        document.into_dictionary()
    }
}

/// Loader configuration and utilities
pub struct GlyphLoader;

impl GlyphLoader {
    /// Set the data directory for `load_path`
    ///
    /// Call this once at application startup; later calls are ignored.
    pub fn set_data_dir<P: AsRef<Path>>(path: P) {
        let _ = DATA_DIR.set(path.as_ref().to_path_buf());
    }

    /// Get the configured data directory, or default to "data/glyphs"
    pub fn data_dir() -> PathBuf {
        DATA_DIR
            .get()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("data/glyphs"))
    }

    /// Image and dictionary paths for `name` (no extension) under `dir`
    pub fn paths_in(dir: &Path, name: &str) -> (PathBuf, PathBuf) {
        let base = dir.join(name);
        (
            base.with_extension(IMAGE_EXTENSION),
            base.with_extension(DICTIONARY_EXTENSION),
        )
    }
}

/// Decode a program from explicit sources.
///
/// The dictionary is resolved first so a bad document fails before any
/// image is fetched.
pub fn load(image: ImageSource, dictionary: DictionarySource) -> Result<DecodedProgram, DecodeError> {
    let dictionary = dictionary.resolve()?;
    let (width, height, pixels) = image.fetch()?;
    decode_rgba(width, height, &pixels, &dictionary)
}

/// Decode `{dir}/{name}.png` with `{dir}/{name}.json`
pub fn load_from_dir(dir: &Path, name: &str) -> Result<DecodedProgram, DecodeError> {
    let (image, dictionary) = GlyphLoader::paths_in(dir, name);
    load(ImageSource::Path(image), DictionarySource::Path(dictionary))
}

/// Decode a program by name from the configured data directory
///
/// # Arguments
/// * `name` - Path without extension, e.g. "boot/hello"
pub fn load_path(name: &str) -> Result<DecodedProgram, DecodeError> {
    load_from_dir(&GlyphLoader::data_dir(), name)
}
