//! Word-level transcription results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One recognized word with timestamps in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptWord {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl TranscriptWord {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// A sentence-like segment of speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub words: Vec<TranscriptWord>,
}

/// A finished transcription.
///
/// Only produced once the whole audio has been processed; consumed by
/// value through [`Transcript::into_segments`] or [`Transcript::into_words`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.segments.iter().map(|s| s.words.len()).sum()
    }

    pub fn into_segments(self) -> Vec<TranscriptSegment> {
        self.segments
    }

    /// All words in order, flattened across segments.
    pub fn into_words(self) -> Vec<TranscriptWord> {
        self.segments.into_iter().flat_map(|s| s.words).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_words_preserves_order() {
        let transcript = Transcript::new(vec![
            TranscriptSegment {
                start: 0.0,
                end: 1.0,
                text: "hello world".into(),
                words: vec![
                    TranscriptWord::new("hello", 0.0, 0.4),
                    TranscriptWord::new("world", 0.5, 1.0),
                ],
            },
            TranscriptSegment {
                start: 1.2,
                end: 1.6,
                text: "again".into(),
                words: vec![TranscriptWord::new("again", 1.2, 1.6)],
            },
        ]);
        assert_eq!(transcript.word_count(), 3);
        let words: Vec<String> = transcript.into_words().into_iter().map(|w| w.text).collect();
        assert_eq!(words, vec!["hello", "world", "again"]);
    }
}
