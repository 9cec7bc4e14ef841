//! Console extension (EID 0x01)
//!
//! `putchar` appends to a line buffer; a newline flushes the line to the
//! `glyphcore::console` log target and into a bounded history. There is no
//! input queue, so `getchar` answers `NOT_SUPPORTED`.

use super::{ProtocolError, SbiResponse, EID_CONSOLE};
use std::collections::VecDeque;

pub const FID_PUTCHAR: u32 = 0;
pub const FID_GETCHAR: u32 = 1;

/// Log target for flushed console lines
pub const LOG_TARGET: &str = "glyphcore::console";

/// Guest console state
#[derive(Debug, Clone)]
pub struct Console {
    line: Vec<u8>,
    history: VecDeque<String>,
    max_history: usize,
    bytes_written: u64,
}

impl Console {
    pub fn new(max_history: usize) -> Self {
        Self {
            line: Vec::new(),
            history: VecDeque::new(),
            max_history,
            bytes_written: 0,
        }
    }

    pub fn handle(&mut self, fid: u32, args: &[u32; 6]) -> Result<SbiResponse, ProtocolError> {
        match fid {
            FID_PUTCHAR => {
                let byte = args[0] as u8;
                self.putchar(byte);
                Ok(SbiResponse::success(byte as u32))
            }
            FID_GETCHAR => Ok(SbiResponse::not_supported()),
            _ => Err(ProtocolError::UnknownFunction { eid: EID_CONSOLE, fid }),
        }
    }

    pub fn putchar(&mut self, byte: u8) {
        self.bytes_written += 1;
        match byte {
            b'\n' => self.flush(),
            b'\r' => {}
            _ => self.line.push(byte),
        }
    }

    /// Emit the buffered line, even if empty
    pub fn flush(&mut self) {
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        log::info!(target: LOG_TARGET, "{}", line);

        if self.max_history == 0 {
            return;
        }
        if self.history.len() == self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(line);
    }

    /// Characters written since the last newline
    pub fn pending_line(&self) -> String {
        String::from_utf8_lossy(&self.line).into_owned()
    }

    /// Flushed lines, oldest first
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(console: &mut Console, text: &str) {
        for byte in text.bytes() {
            console.handle(FID_PUTCHAR, &[byte as u32, 0, 0, 0, 0, 0]).unwrap();
        }
    }

    #[test]
    fn test_putchar_echoes_byte() {
        let mut console = Console::new(8);
        let response = console.handle(FID_PUTCHAR, &[0x41, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(response, SbiResponse::success(0x41));
        assert_eq!(console.pending_line(), "A");
    }

    #[test]
    fn test_newline_flushes() {
        let mut console = Console::new(8);
        put(&mut console, "hello\r\nworld\n");
        assert_eq!(console.lines().collect::<Vec<_>>(), vec!["hello", "world"]);
        assert_eq!(console.pending_line(), "");
        assert_eq!(console.bytes_written(), 13);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut console = Console::new(2);
        put(&mut console, "a\nb\nc\n");
        assert_eq!(console.lines().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn test_getchar_not_supported() {
        let mut console = Console::new(1);
        assert_eq!(
            console.handle(FID_GETCHAR, &[0; 6]).unwrap(),
            SbiResponse::not_supported()
        );
        assert!(console.handle(2, &[0; 6]).is_err());
    }
}
