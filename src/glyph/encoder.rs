//! Glyph encoder - instruction streams to pixel images
//!
//! Inverse of the decoder. Instructions are deduplicated into a dictionary
//! in first-appearance order; every instruction becomes one executable
//! pixel and the last row is padded with transparent (non-executable)
//! pixels, which decode as no-ops.

use super::{DictionaryDocument, InstructionDictionary, EXECUTABLE_ALPHA, MAX_TOKENS};
use crate::error::{GlyphError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Encoded glyph image with its dictionary
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major
    pub pixels: Vec<u8>,
    pub dictionary: InstructionDictionary,
}

impl EncodedImage {
    /// Dictionary in document form
    pub fn document(&self) -> DictionaryDocument {
        DictionaryDocument::from(&self.dictionary)
    }

    /// Write the image as PNG and the dictionary as JSON
    pub fn save(&self, image_path: &Path, dictionary_path: &Path) -> Result<()> {
        let img = image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| GlyphError::Encode("pixel buffer does not match dimensions".into()))?;
        img.save(image_path)
            .map_err(|e| GlyphError::Encode(format!("{}: {}", image_path.display(), e)))?;

        let json = self.document().to_json()?;
        std::fs::write(dictionary_path, json)?;
        Ok(())
    }
}

/// Encode `instructions` into an image `width` pixels wide.
///
/// # Errors
/// `Encode` for a zero width or more than 65536 distinct instructions.
pub fn encode_program(instructions: &[u32], width: u32) -> Result<EncodedImage> {
    if width == 0 {
        return Err(GlyphError::Encode("width must be at least 1".into()));
    }

    let mut tokens: HashMap<u32, u16> = HashMap::new();
    let mut entries: Vec<u32> = Vec::new();
    let mut pixel_tokens = Vec::with_capacity(instructions.len());

    for &word in instructions {
        let token = match tokens.get(&word) {
            Some(&token) => token,
            None => {
                if entries.len() >= MAX_TOKENS {
                    return Err(GlyphError::Encode(format!(
                        "more than {} distinct instructions",
                        MAX_TOKENS
                    )));
                }
                let token = entries.len() as u16;
                entries.push(word);
                tokens.insert(word, token);
                token
            }
        };
        pixel_tokens.push(token);
    }

    if entries.is_empty() {
        entries.push(super::NOP);
    }

    let height = (instructions.len() as u32).div_ceil(width).max(1);
    let mut pixels = vec![0u8; width as usize * height as usize * 4];
    for (px, token) in pixels.chunks_exact_mut(4).zip(&pixel_tokens) {
        px[0] = (token & 0xFF) as u8;
        px[1] = (token >> 8) as u8;
        px[2] = (token & 0xFF) as u8;
        px[3] = EXECUTABLE_ALPHA;
    }

    Ok(EncodedImage {
        width,
        height,
        pixels,
        dictionary: InstructionDictionary::from_instructions(&entries)?,
    })
}
