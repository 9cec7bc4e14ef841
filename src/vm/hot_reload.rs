//! Hot reload for glyph programs
//!
//! Watches a program's image and dictionary and re-decodes when either
//! changes, so an edited glyph image replaces the running program without
//! restarting the host.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │               GlyphReloadManager                │
//! ├─────────────────────────────────────────────────┤
//! │  Watcher → Debounce → Decoder → reload_glyph    │
//! │                                                 │
//! │  1. Image or dictionary change detected         │
//! │  2. Wait for the debounce window to pass        │
//! │  3. Decode image + dictionary                   │
//! │  4. Upload to the core's program base           │
//! │  5. Restart the core                            │
//! │  6. Emit reload event                           │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use glyphcore::vm::{GlyphReloadManager, PositionKey};
//!
//! let mut watcher = GlyphReloadManager::new("hello.png", "hello.json")?;
//!
//! // Between dispatches
//! if let Some(program) = watcher.poll_reload()? {
//!     manager.reload_glyph(PositionKey::new(0, 0), &program)?;
//! }
//! ```

use super::backend::ComputeBackend;
use super::manager::ExecutionManager;
use super::slots::{CoreId, PositionKey};
use crate::glyph::DecodedProgram;
use crate::loader::{load, DictionarySource, ImageSource};
use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::time::{Duration, Instant};

/// Reload event emitted when a glyph program is replaced
#[derive(Debug, Clone)]
pub struct ReloadEvent {
    /// Glyph whose core was restarted
    pub key: PositionKey,
    pub core_id: CoreId,
    /// Timestamp of reload
    pub timestamp: Instant,
    /// Number of instructions in new program
    pub instruction_count: usize,
    /// Executable pixels whose token did not resolve
    pub unresolved: usize,
}

/// Watches one image + dictionary pair
pub struct GlyphReloadManager {
    image_path: PathBuf,
    dictionary_path: PathBuf,
    /// File watcher
    _watcher: RecommendedWatcher,
    /// Channel for file change events
    change_rx: Receiver<PathBuf>,
    /// Debounce duration to avoid rapid reloads
    debounce: Duration,
    /// Last change time for debouncing
    last_change: Option<Instant>,
    current_program: Option<DecodedProgram>,
}

impl GlyphReloadManager {
    /// Watch `image_path` and `dictionary_path`
    pub fn new(image_path: impl AsRef<Path>, dictionary_path: impl AsRef<Path>) -> Result<Self> {
        let image_path = image_path.as_ref().to_path_buf();
        let dictionary_path = dictionary_path.as_ref().to_path_buf();
        let (tx, rx) = channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if matches!(
                    event.kind,
                    notify::EventKind::Modify(_) | notify::EventKind::Create(_)
                ) {
                    for path in event.paths {
                        let _ = tx.send(path);
                    }
                }
            }
        })
        .context("Failed to create file watcher")?;

        // Watch parent directories; editors often replace files rather than modify them
        let mut parents: Vec<PathBuf> = Vec::new();
        for path in [&image_path, &dictionary_path] {
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            };
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
        for parent in &parents {
            watcher
                .watch(parent, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch {}", parent.display()))?;
        }

        Ok(Self {
            image_path,
            dictionary_path,
            _watcher: watcher,
            change_rx: rx,
            debounce: Duration::from_millis(100),
            last_change: None,
            current_program: None,
        })
    }

    /// Set debounce duration
    pub fn with_debounce(mut self, duration: Duration) -> Self {
        self.debounce = duration;
        self
    }

    fn is_watched(&self, path: &Path) -> bool {
        let matches = |target: &Path| {
            path == target || (path.file_name().is_some() && path.file_name() == target.file_name())
        };
        matches(&self.image_path) || matches(&self.dictionary_path)
    }

    /// Record a change to `path` as if the watcher reported it
    fn note_change(&mut self, path: &Path) {
        if self.is_watched(path) {
            self.last_change = Some(Instant::now());
        }
    }

    /// Decode the watched pair right now
    pub fn reload_now(&mut self) -> Result<DecodedProgram> {
        let program = load(
            ImageSource::Path(self.image_path.clone()),
            DictionarySource::Path(self.dictionary_path.clone()),
        )
        .with_context(|| format!("Failed to decode {}", self.image_path.display()))?;
        self.current_program = Some(program.clone());
        Ok(program)
    }

    /// Poll for pending reloads (non-blocking)
    ///
    /// Returns Some(DecodedProgram) once a change has settled for the
    /// debounce window, None otherwise.
    pub fn poll_reload(&mut self) -> Result<Option<DecodedProgram>> {
        loop {
            match self.change_rx.try_recv() {
                Ok(path) => self.note_change(&path),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    anyhow::bail!("File watcher disconnected");
                }
            }
        }

        match self.last_change {
            Some(changed) if changed.elapsed() >= self.debounce => {
                self.last_change = None;
                self.reload_now().map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Poll and, on a reload, restart `key`'s core with the new program
    pub fn apply<B: ComputeBackend>(
        &mut self,
        manager: &mut ExecutionManager<B>,
        key: PositionKey,
    ) -> Result<Option<ReloadEvent>> {
        let Some(program) = self.poll_reload()? else {
            return Ok(None);
        };
        let core_id = manager
            .reload_glyph(key, &program)
            .with_context(|| format!("Failed to reload glyph {}", key))?;
        Ok(Some(ReloadEvent {
            key,
            core_id,
            timestamp: Instant::now(),
            instruction_count: program.len(),
            unresolved: program.report.unresolved(),
        }))
    }

    /// Last successfully decoded program
    pub fn current_program(&self) -> Option<&DecodedProgram> {
        self.current_program.as_ref()
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn dictionary_path(&self) -> &Path {
        &self.dictionary_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::glyph::{encode_program, HALT};
    use crate::vm::software::{addi, SoftwareBackend};

    fn write_program(dir: &Path, instructions: &[u32]) -> (PathBuf, PathBuf) {
        let image = dir.join("prog.png");
        let dict = dir.join("prog.json");
        encode_program(instructions, 4)
            .unwrap()
            .save(&image, &dict)
            .unwrap();
        (image, dict)
    }

    #[test]
    fn test_reload_now() {
        let dir = tempfile::tempdir().unwrap();
        let (image, dict) = write_program(dir.path(), &[addi(5, 0, 1), HALT]);

        let mut watcher = GlyphReloadManager::new(&image, &dict).unwrap();
        assert!(watcher.current_program().is_none());
        let program = watcher.reload_now().unwrap();
        assert_eq!(&program.instructions[..2], &[addi(5, 0, 1), HALT]);
        assert!(watcher.current_program().is_some());
    }

    #[test]
    fn test_debounced_change_applies() {
        let dir = tempfile::tempdir().unwrap();
        let (image, dict) = write_program(dir.path(), &[addi(5, 0, 1), HALT]);

        let mut manager =
            ExecutionManager::new(SoftwareBackend::new(), ManagerConfig::with_max_cores(1)).unwrap();
        manager.initialize().unwrap();
        let key = PositionKey::new(0, 0);
        manager.load_program(0, &[addi(5, 0, 1), HALT]).unwrap();
        manager.register_glyph(key, 0).unwrap();
        manager.step().unwrap();

        write_program(dir.path(), &[addi(5, 0, 7), HALT]);
        let mut watcher = GlyphReloadManager::new(&image, &dict)
            .unwrap()
            .with_debounce(Duration::ZERO);
        watcher.note_change(&image);

        let event = watcher.apply(&mut manager, key).unwrap().unwrap();
        assert_eq!(event.core_id, 0);
        assert_eq!(event.instruction_count, 4);
        assert_eq!(event.unresolved, 0);

        manager.step().unwrap();
        assert_eq!(manager.get_execution_state(key).unwrap().registers[5], 7);

        // Nothing new pending
        assert!(watcher.poll_reload().unwrap().is_none());
    }

    #[test]
    fn test_unrelated_file_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (image, dict) = write_program(dir.path(), &[HALT]);
        let mut watcher = GlyphReloadManager::new(&image, &dict)
            .unwrap()
            .with_debounce(Duration::ZERO);

        watcher.note_change(&dir.path().join("notes.txt"));
        assert!(watcher.last_change.is_none());
    }

    #[test]
    fn test_bad_dictionary_surfaces_error() {
        let dir = tempfile::tempdir().unwrap();
        let (image, dict) = write_program(dir.path(), &[HALT]);
        std::fs::write(&dict, r#"{ "dictionary": { "instructions": [19] } }"#).unwrap();

        let mut watcher = GlyphReloadManager::new(&image, &dict).unwrap();
        let err = watcher.reload_now().unwrap_err();
        assert!(format!("{:#}", err).contains("type marker"));
    }
}
