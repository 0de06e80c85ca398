//! Transcript Accumulator
//!
//! Merges incremental recognition results into a running transcript.
//! Finalized text only grows; interim text is replaced wholesale.

use crate::engine::RecognitionResult;

/// Running transcript for one capture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptAccumulator {
    finalized: Vec<String>,
    interim: String,
    last_non_empty: String,
    /// Entries of the current engine session's result list already finalized
    cursor: usize,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one engine result event.
    ///
    /// `results` is the engine's whole result list for its current session
    /// and `result_index` the first entry that changed. Entries before the
    /// cursor were already committed and are skipped, so replaying the same
    /// event is a no-op.
    pub fn apply_results(&mut self, results: &[RecognitionResult], result_index: usize) {
        let mut new_finals = Vec::new();
        let mut interim_parts = Vec::new();

        for (i, result) in results.iter().enumerate().skip(result_index) {
            if result.is_final {
                if i >= self.cursor {
                    new_finals.push(result.transcript.as_str());
                    self.cursor = i + 1;
                }
            } else if i >= self.cursor {
                interim_parts.push(result.transcript.trim());
            }
        }

        let interim = interim_parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        self.merge(&new_finals, &interim);
    }

    fn merge(&mut self, new_finals: &[&str], interim: &str) {
        for segment in new_finals {
            let segment = segment.trim();
            if !segment.is_empty() {
                self.finalized.push(segment.to_string());
            }
        }
        if !new_finals.is_empty() {
            self.interim.clear();
        }
        self.interim = interim.trim().to_string();
        self.remember_combined();
    }

    /// The engine was replaced: its result list starts over from zero.
    ///
    /// A dangling interim segment is committed first so it survives the
    /// restart.
    pub fn start_engine_session(&mut self) {
        self.commit_interim();
        self.cursor = 0;
    }

    /// Promote the interim segment to finalized text
    pub fn commit_interim(&mut self) {
        let interim = std::mem::take(&mut self.interim);
        if !interim.is_empty() {
            self.finalized.push(interim);
        }
        self.remember_combined();
    }

    pub fn finalized_text(&self) -> String {
        self.finalized.join(" ")
    }

    pub fn interim_text(&self) -> &str {
        &self.interim
    }

    /// `finalized + " " + interim`, trimmed, without fallback
    pub fn combined(&self) -> String {
        let finalized = self.finalized_text();
        format!("{} {}", finalized, self.interim).trim().to_string()
    }

    /// The transcript shown to the user; falls back to the last non-empty value
    pub fn full_transcript(&self) -> String {
        let combined = self.combined();
        if combined.is_empty() {
            self.last_non_empty.clone()
        } else {
            combined
        }
    }

    pub fn is_empty(&self) -> bool {
        self.full_transcript().is_empty()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn remember_combined(&mut self) {
        let combined = self.combined();
        if !combined.is_empty() {
            self.last_non_empty = combined;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fin(text: &str) -> RecognitionResult {
        RecognitionResult::final_text(text)
    }

    fn interim(text: &str) -> RecognitionResult {
        RecognitionResult::interim(text)
    }

    #[test]
    fn test_final_segments_join_with_spaces() {
        let mut acc = TranscriptAccumulator::new();
        acc.apply_results(&[fin("the cat ")], 0);
        acc.apply_results(&[fin("the cat "), fin(" sat")], 1);
        assert_eq!(acc.finalized_text(), "the cat sat");
        assert_eq!(acc.full_transcript(), "the cat sat");
    }

    #[test]
    fn test_interim_is_replaced_not_appended() {
        let mut acc = TranscriptAccumulator::new();
        acc.apply_results(&[interim("the")], 0);
        acc.apply_results(&[interim("the ca")], 0);
        assert_eq!(acc.interim_text(), "the ca");
        assert_eq!(acc.full_transcript(), "the ca");

        acc.apply_results(&[fin("the cat")], 0);
        assert_eq!(acc.interim_text(), "");
        assert_eq!(acc.full_transcript(), "the cat");
    }

    #[test]
    fn test_repeated_event_is_idempotent() {
        let mut acc = TranscriptAccumulator::new();
        let results = vec![fin("hello"), interim("wor")];
        acc.apply_results(&results, 0);
        acc.apply_results(&results, 0);
        assert_eq!(acc.finalized_text(), "hello");
        assert_eq!(acc.full_transcript(), "hello wor");
    }

    #[test]
    fn test_repeated_final_with_interim_is_idempotent() {
        let mut acc = TranscriptAccumulator::new();
        let results = vec![fin("the cat"), interim("sa")];
        acc.apply_results(&results, 0);
        acc.apply_results(&results, 1);
        acc.apply_results(&results, 0);
        assert_eq!(acc.finalized_text(), "the cat");
        assert_eq!(acc.interim_text(), "sa");
        assert_eq!(acc.full_transcript(), "the cat sa");
    }

    #[test]
    fn test_stale_result_index_does_not_double_count() {
        let mut acc = TranscriptAccumulator::new();
        acc.apply_results(&[fin("one")], 0);
        // Engine re-reports the whole list from zero
        acc.apply_results(&[fin("one"), fin("two")], 0);
        assert_eq!(acc.finalized_text(), "one two");
    }

    #[test]
    fn test_engine_session_rollover_keeps_text() {
        let mut acc = TranscriptAccumulator::new();
        acc.apply_results(&[interim("hello")], 0);
        acc.start_engine_session();
        assert_eq!(acc.finalized_text(), "hello");

        acc.apply_results(&[fin("world")], 0);
        assert_eq!(acc.full_transcript(), "hello world");
    }

    #[test]
    fn test_fallback_to_last_non_empty() {
        let mut acc = TranscriptAccumulator::new();
        acc.apply_results(&[interim("maybe")], 0);
        // Engine retracts the interim hypothesis
        acc.apply_results(&[interim("")], 0);
        assert_eq!(acc.combined(), "");
        assert_eq!(acc.full_transcript(), "maybe");
        assert!(!acc.is_empty());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut acc = TranscriptAccumulator::new();
        acc.apply_results(&[fin("a"), interim("b")], 0);
        acc.reset();
        assert_eq!(acc, TranscriptAccumulator::default());
        assert!(acc.is_empty());
    }

    #[test]
    fn test_finalized_only_grows() {
        let mut acc = TranscriptAccumulator::new();
        let mut previous = String::new();
        let events = vec![
            (vec![interim("a")], 0),
            (vec![fin("a b")], 0),
            (vec![fin("a b"), interim("c")], 1),
            (vec![fin("a b"), fin("c d")], 1),
            (vec![fin("a b"), fin("c d"), interim("")], 2),
        ];
        for (results, index) in events {
            acc.apply_results(&results, index);
            let current = acc.finalized_text();
            assert!(current.starts_with(&previous));
            previous = current;
        }
        assert_eq!(previous, "a b c d");
    }
}
