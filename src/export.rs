//! History export to a text file and per-entry clipboard copy.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::history::HistoryStore;

const ACK_WINDOW: Duration = Duration::from_secs(2);

/// Transient acknowledgement shown after a successful clipboard copy.
#[derive(Debug, Clone, Copy)]
pub struct CopyAck {
    at: Instant,
}

impl CopyAck {
    pub fn now() -> Self {
        Self { at: Instant::now() }
    }

    /// Still within the display window.
    pub fn is_active(&self) -> bool {
        self.at.elapsed() < ACK_WINDOW
    }
}

/// Put one translation on the system clipboard. Returns an ack on success;
/// clipboard failures are logged and yield nothing.
pub fn copy_translation(text: &str) -> Option<CopyAck> {
    match arboard::Clipboard::new() {
        Ok(mut clipboard) => match clipboard.set_text(text.to_string()) {
            Ok(()) => Some(CopyAck::now()),
            Err(e) => {
                warn!("[EXPORT] clipboard write failed: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("[EXPORT] clipboard unavailable: {}", e);
            None
        }
    }
}

/// Write the full history document into `dir` under a dated file name.
/// Returns the written path, or nothing on failure or an empty history.
pub fn write_export(history: &HistoryStore, dir: &Path) -> Option<PathBuf> {
    if history.is_empty() {
        return None;
    }

    let path = dir.join(HistoryStore::export_file_name());
    match std::fs::write(&path, history.export_document()) {
        Ok(()) => {
            info!("[EXPORT] wrote {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!("[EXPORT] failed to write {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::TranscriptEntry;

    fn temp_store(name: &str) -> HistoryStore {
        let path = std::env::temp_dir().join(format!(
            "lecture-live-translator-export-{}-{}.json",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        HistoryStore::load(path)
    }

    #[test]
    fn fresh_ack_is_active() {
        assert!(CopyAck::now().is_active());
    }

    #[test]
    fn empty_history_exports_nothing() {
        let store = temp_store("empty");
        assert!(write_export(&store, &std::env::temp_dir()).is_none());
    }

    #[test]
    fn export_writes_dated_document() {
        let mut store = temp_store("write");
        store.push(TranscriptEntry::new(
            "สวัสดี".to_string(),
            "你好".to_string(),
            "Thai",
        ));

        let path = write_export(&store, &std::env::temp_dir()).expect("export path");
        let doc = std::fs::read_to_string(&path).unwrap();
        assert!(doc.contains("Source: สวัสดี\n"));
        assert!(doc.contains("Trans: 你好\n"));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("translation-history-"));
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(store.path());
    }

    #[test]
    fn unwritable_directory_fails_quietly() {
        let mut store = temp_store("unwritable");
        store.push(TranscriptEntry::new("a".to_string(), "b".to_string(), "Chinese"));
        assert!(write_export(&store, Path::new("/no/such/dir/anywhere")).is_none());
        let _ = std::fs::remove_file(store.path());
    }
}
