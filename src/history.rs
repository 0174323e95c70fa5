//! Append-only session history with JSON persistence.
//!
//! The store is the only state that outlives a session. It is read once at
//! startup and written after every change; a missing or corrupt file falls
//! back to an empty history and persistence failures are logged, never
//! surfaced.

use std::path::PathBuf;

use chrono::Local;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Who spoke the source side of a turn. Assigned at flush time and manually
/// correctable afterwards; not a protocol event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeakerRole {
    Professor,
    Student,
}

impl SpeakerRole {
    pub fn toggled(self) -> SpeakerRole {
        match self {
            SpeakerRole::Professor => SpeakerRole::Student,
            SpeakerRole::Student => SpeakerRole::Professor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakerRole::Professor => "Professor",
            SpeakerRole::Student => "Student",
        }
    }
}

/// One finalized turn. Immutable once stored, except for the role toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub timestamp: String,
    pub source_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub role: SpeakerRole,
}

impl TranscriptEntry {
    pub fn new(source_text: String, translated_text: String, source_language: &str) -> Self {
        let now = Local::now();
        Self {
            id: now.format("%Y%m%d_%H%M%S_%f").to_string(),
            timestamp: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            source_text,
            translated_text,
            source_language: source_language.to_string(),
            role: SpeakerRole::Professor,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source_text.trim().is_empty() && self.translated_text.trim().is_empty()
    }
}

/// Append-only log of finalized turns, persisted as a JSON array.
pub struct HistoryStore {
    entries: Vec<TranscriptEntry>,
    path: PathBuf,
}

impl HistoryStore {
    /// Default history location in the platform config directory.
    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_default()
            .join("lecture-live-translator");
        let _ = std::fs::create_dir_all(&config_dir);
        config_dir.join("history.json")
    }

    /// Load history from disk. Absent or corrupt data yields an empty store.
    pub fn load(path: PathBuf) -> Self {
        let entries = match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("[HISTORY] corrupt history file, starting empty: {}", e);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self { entries, path }
    }

    /// Append one entry and persist. Empty turns are discarded.
    pub fn push(&mut self, entry: TranscriptEntry) -> bool {
        if entry.is_empty() {
            return false;
        }
        self.entries.push(entry);
        self.save();
        true
    }

    /// Flip the speaker role of one entry. Returns false for an unknown id.
    pub fn toggle_role(&mut self, id: &str) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        entry.role = entry.role.toggled();
        self.save();
        true
    }

    /// Remove every entry.
    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.save();
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the whole history as a line-oriented text document.
    pub fn export_document(&self) -> String {
        let mut doc = String::new();
        for entry in &self.entries {
            doc.push_str(&format!("[{}] {}\n", entry.timestamp, entry.role.as_str()));
            doc.push_str(&format!("Source: {}\n", entry.source_text));
            doc.push_str(&format!("Trans: {}\n\n", entry.translated_text));
        }
        doc
    }

    /// Export file name carrying the current date.
    pub fn export_file_name() -> String {
        format!("translation-history-{}.txt", Local::now().format("%Y-%m-%d"))
    }

    fn save(&self) {
        if let Err(e) = self.try_save() {
            warn!("[HISTORY] {}", e);
        }
    }

    fn try_save(&self) -> SessionResult<()> {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let data = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| SessionError::Persistence(format!("serialize history: {}", e)))?;
        std::fs::write(&self.path, data).map_err(|e| {
            SessionError::Persistence(format!("write {}: {}", self.path.display(), e))
        })?;
        Ok(())
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}
