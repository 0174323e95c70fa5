//! Per-turn transcript accumulation.

use crate::history::TranscriptEntry;

/// Tag the language pair by scanning the source text for Thai script.
///
/// This is a script heuristic, not a language detector: the session is fixed
/// to a Thai/Chinese pair, so any Thai codepoint means the source side was
/// Thai and anything else is treated as Chinese.
pub fn detect_source_language(text: &str) -> &'static str {
    if text.chars().any(|c| ('\u{0E00}'..='\u{0E7F}').contains(&c)) {
        "Thai"
    } else {
        "Chinese"
    }
}

/// Streaming transcript fragments for the turn currently in progress.
/// Owned by the session controller and valid only within one open turn.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    pending_source: String,
    pending_translated: String,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an input-transcript fragment in arrival order.
    pub fn push_source(&mut self, fragment: &str) {
        self.pending_source.push_str(fragment);
    }

    /// Append an output-transcript fragment in arrival order.
    pub fn push_translated(&mut self, fragment: &str) {
        self.pending_translated.push_str(fragment);
    }

    pub fn is_empty(&self) -> bool {
        self.pending_source.trim().is_empty() && self.pending_translated.trim().is_empty()
    }

    /// Finalize the open turn into an entry and reset for the next one.
    /// An empty turn yields nothing.
    pub fn flush(&mut self) -> Option<TranscriptEntry> {
        if self.is_empty() {
            self.pending_source.clear();
            self.pending_translated.clear();
            return None;
        }

        let source = std::mem::take(&mut self.pending_source);
        let translated = std::mem::take(&mut self.pending_translated);
        let language = detect_source_language(&source);
        Some(TranscriptEntry::new(
            source.trim().to_string(),
            translated.trim().to_string(),
            language,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thai_source_is_tagged_thai() {
        let mut turn = TurnAccumulator::new();
        turn.push_source("สวัส");
        turn.push_source("ดี");
        turn.push_translated("你好");

        let entry = turn.flush().expect("entry");
        assert_eq!(entry.source_language, "Thai");
        assert_eq!(entry.source_text, "สวัสดี");
        assert_eq!(entry.translated_text, "你好");
    }

    #[test]
    fn chinese_source_is_tagged_chinese() {
        let mut turn = TurnAccumulator::new();
        turn.push_source("你好吗");
        turn.push_translated("สบายดีไหม");

        let entry = turn.flush().expect("entry");
        assert_eq!(entry.source_language, "Chinese");
    }

    #[test]
    fn empty_turn_flushes_nothing() {
        let mut turn = TurnAccumulator::new();
        assert!(turn.flush().is_none());

        turn.push_source("   ");
        turn.push_translated("\n");
        assert!(turn.flush().is_none());
    }

    #[test]
    fn flush_resets_for_next_turn() {
        let mut turn = TurnAccumulator::new();
        turn.push_source("你好");
        assert!(turn.flush().is_some());
        assert!(turn.is_empty());
        assert!(turn.flush().is_none());
    }

    #[test]
    fn mixed_script_counts_as_thai() {
        // Any Thai codepoint wins; behavior for third languages is out of
        // scope for the fixed pair.
        assert_eq!(detect_source_language("你好 ครับ"), "Thai");
        assert_eq!(detect_source_language("hello"), "Chinese");
    }
}
