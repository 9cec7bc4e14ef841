//! Per-pixel decode and whole-image decode

use super::{InstructionDictionary, EXECUTABLE_ALPHA, NOP};
use crate::error::DecodeError;
use rayon::prelude::*;

/// TokenID carried by a pixel: `(g << 8) | b`.
///
/// Red and alpha do not participate.
#[inline]
pub fn decode_token_id(_r: u8, g: u8, b: u8, _a: u8) -> u16 {
    ((g as u16) << 8) | b as u16
}

/// Instruction for `token`, or [`NOP`] when the pixel is not executable,
/// the token is out of range, or the entry is absent.
#[inline]
pub fn lookup_instruction(token: u16, dictionary: &InstructionDictionary, alpha: u8) -> u32 {
    if alpha != EXECUTABLE_ALPHA {
        return NOP;
    }
    dictionary.get(token).unwrap_or(NOP)
}

/// How a single pixel decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelClass {
    /// Executable pixel with a present dictionary entry
    Executable,
    /// Alpha was not the executable sentinel
    NonExecutable,
    /// TokenID ≥ dictionary length
    OutOfRange,
    /// TokenID in range but the entry is null
    Absent,
}

/// Decode one RGBA pixel into `(instruction, glyph index, class)`
pub fn decode_pixel(
    r: u8,
    g: u8,
    b: u8,
    a: u8,
    dictionary: &InstructionDictionary,
) -> (u32, u8, PixelClass) {
    let token = decode_token_id(r, g, b, a);
    let class = if a != EXECUTABLE_ALPHA {
        PixelClass::NonExecutable
    } else if token as usize >= dictionary.len() {
        PixelClass::OutOfRange
    } else if dictionary.get(token).is_none() {
        PixelClass::Absent
    } else {
        PixelClass::Executable
    };
    (lookup_instruction(token, dictionary, a), r, class)
}

/// Per-class pixel counts gathered during decode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeReport {
    pub executable: usize,
    pub non_executable: usize,
    pub out_of_range: usize,
    pub absent: usize,
}

impl DecodeReport {
    fn record(&mut self, class: PixelClass) {
        match class {
            PixelClass::Executable => self.executable += 1,
            PixelClass::NonExecutable => self.non_executable += 1,
            PixelClass::OutOfRange => self.out_of_range += 1,
            PixelClass::Absent => self.absent += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.executable + self.non_executable + self.out_of_range + self.absent
    }

    /// Executable pixels whose token did not resolve
    pub fn unresolved(&self) -> usize {
        self.out_of_range + self.absent
    }
}

/// Decoded glyph program: one instruction and one glyph index per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedProgram {
    pub width: u32,
    pub height: u32,
    /// Instruction words in row-major pixel order
    pub instructions: Vec<u32>,
    /// Red channel copy, for rendering and diagnostics only
    pub glyph_indices: Vec<u8>,
    pub report: DecodeReport,
}

impl DecodedProgram {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Size of the instruction stream in bytes
    pub fn byte_len(&self) -> usize {
        self.instructions.len() * 4
    }

    /// Instruction stream as little-endian bytes, ready for upload
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.instructions
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect()
    }
}

/// Decode a raw RGBA8 buffer (row-major, 4 bytes per pixel).
///
/// Pixels are independent, so the pass runs in parallel.
pub fn decode_rgba(
    width: u32,
    height: u32,
    pixels: &[u8],
    dictionary: &InstructionDictionary,
) -> Result<DecodedProgram, DecodeError> {
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected {
        return Err(DecodeError::MalformedImage {
            width,
            height,
            expected,
            actual: pixels.len(),
        });
    }

    let decoded: Vec<(u32, u8, PixelClass)> = pixels
        .par_chunks_exact(4)
        .map(|px| decode_pixel(px[0], px[1], px[2], px[3], dictionary))
        .collect();

    let mut instructions = Vec::with_capacity(decoded.len());
    let mut glyph_indices = Vec::with_capacity(decoded.len());
    let mut report = DecodeReport::default();
    for (instruction, glyph, class) in decoded {
        instructions.push(instruction);
        glyph_indices.push(glyph);
        report.record(class);
    }

    if report.unresolved() > 0 {
        log::debug!(
            "decoded {}x{} glyph image: {} unresolved tokens mapped to no-op",
            width,
            height,
            report.unresolved()
        );
    }

    Ok(DecodedProgram {
        width,
        height,
        instructions,
        glyph_indices,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::HALT;
    use rand::Rng;

    fn dict(entries: &[Option<u32>]) -> InstructionDictionary {
        InstructionDictionary::new(entries.to_vec()).unwrap()
    }

    #[test]
    fn test_token_id_big_endian() {
        assert_eq!(decode_token_id(0, 0x01, 0x02, 0xFF), 0x0102);
        assert_eq!(decode_token_id(0xAB, 0x00, 0x07, 0x00), 0x0007);
        assert_eq!(decode_token_id(0, 0xFF, 0xFF, 0xFF), 0xFFFF);
    }

    #[test]
    fn test_red_channel_ignored() {
        let d = dict(&[Some(0xDEAD_BEEF)]);
        for r in [0u8, 1, 0x7F, 0xFF] {
            let (instr, glyph, _) = decode_pixel(r, 0, 0, 0xFF, &d);
            assert_eq!(instr, 0xDEAD_BEEF);
            assert_eq!(glyph, r);
        }
    }

    #[test]
    fn test_non_executable_alpha_is_nop() {
        let d = dict(&[Some(HALT)]);
        for a in 0u8..0xFF {
            assert_eq!(lookup_instruction(0, &d, a), NOP);
        }
        assert_eq!(lookup_instruction(0, &d, 0xFF), HALT);
    }

    #[test]
    fn test_out_of_range_token_is_nop() {
        let d = dict(&[Some(HALT), Some(HALT)]);
        assert_eq!(lookup_instruction(2, &d, 0xFF), NOP);
        assert_eq!(lookup_instruction(0xFFFF, &d, 0xFF), NOP);
    }

    #[test]
    fn test_absent_entry_is_nop() {
        let d = dict(&[Some(HALT), None]);
        assert_eq!(lookup_instruction(1, &d, 0xFF), NOP);
        let (_, _, class) = decode_pixel(0, 0, 1, 0xFF, &d);
        assert_eq!(class, PixelClass::Absent);
    }

    #[test]
    fn test_dictionary_slot_resolves() {
        let mut entries = vec![None; 300];
        entries[257] = Some(0x1234_5678);
        let d = dict(&entries);
        let token = 257u16;
        let pixels = [0x10, (token >> 8) as u8, (token & 0xFF) as u8, 0xFF];
        let program = decode_rgba(1, 1, &pixels, &d).unwrap();
        assert_eq!(program.instructions, vec![0x1234_5678]);
        assert_eq!(program.glyph_indices, vec![0x10]);
    }

    #[test]
    fn test_whole_image_decode() {
        let d = dict(&[Some(0x0050_0893), Some(HALT), None]);
        #[rustfmt::skip]
        let pixels = [
            7, 0, 0, 0xFF,   // token 0
            8, 0, 1, 0xFF,   // token 1
            9, 0, 1, 0x80,   // non-executable
            1, 0, 2, 0xFF,   // absent
            2, 0, 9, 0xFF,   // out of range
            3, 0, 0, 0xFF,   // token 0
        ];
        let program = decode_rgba(3, 2, &pixels, &d).unwrap();
        assert_eq!(program.len(), 6);
        assert_eq!(
            program.instructions,
            vec![0x0050_0893, HALT, NOP, NOP, NOP, 0x0050_0893]
        );
        assert_eq!(program.glyph_indices, vec![7, 8, 9, 1, 2, 3]);
        assert_eq!(
            program.report,
            DecodeReport {
                executable: 3,
                non_executable: 1,
                out_of_range: 1,
                absent: 1,
            }
        );
        assert_eq!(program.report.total(), 6);
    }

    #[test]
    fn test_buffer_size_mismatch() {
        let d = dict(&[Some(NOP)]);
        let result = decode_rgba(2, 2, &[0u8; 12], &d);
        assert!(matches!(
            result,
            Err(DecodeError::MalformedImage { expected: 16, actual: 12, .. })
        ));
    }

    #[test]
    fn test_random_pixels_respect_nop_rules() {
        let mut rng = rand::thread_rng();
        let entries: Vec<Option<u32>> = (0..64)
            .map(|i| if i % 5 == 0 { None } else { Some(0x1000 + i) })
            .collect();
        let d = dict(&entries);

        let pixels: Vec<u8> = (0..32 * 32 * 4).map(|_| rng.gen()).collect();
        let program = decode_rgba(32, 32, &pixels, &d).unwrap();

        for (i, px) in pixels.chunks_exact(4).enumerate() {
            let token = decode_token_id(px[0], px[1], px[2], px[3]) as usize;
            let expected = if px[3] != 0xFF || token >= entries.len() {
                NOP
            } else {
                entries[token].unwrap_or(NOP)
            };
            assert_eq!(program.instructions[i], expected, "pixel {}", i);
            assert_eq!(program.glyph_indices[i], px[0]);
        }
    }

    #[test]
    fn test_le_bytes() {
        let d = dict(&[Some(0x0403_0201)]);
        let program = decode_rgba(1, 1, &[0, 0, 0, 0xFF], &d).unwrap();
        assert_eq!(program.to_le_bytes(), vec![1, 2, 3, 4]);
        assert_eq!(program.byte_len(), 4);
    }
}
