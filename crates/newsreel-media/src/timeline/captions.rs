//! Word caption placement.

use newsreel_models::{CaptionEvent, CaptionStyle, TranscriptWord};

/// One caption per spoken word, clamped into `[0, total]`.
///
/// Every event lasts at least `style.min_duration` (unless the whole
/// narration is shorter), even when the recognizer reports `end <= start`.
/// An event is cut at `total`; it starts early only as far as needed to
/// keep the minimum duration.
pub fn place_captions(words: &[TranscriptWord], total: f64, style: &CaptionStyle) -> Vec<CaptionEvent> {
    words
        .iter()
        .filter_map(|word| place_word(word, total, style))
        .collect()
}

fn place_word(word: &TranscriptWord, total: f64, style: &CaptionStyle) -> Option<CaptionEvent> {
    let text = style.format_text(&word.text);
    if text.is_empty() || !word.start.is_finite() {
        return None;
    }

    let mut start = word.start.clamp(0.0, total);
    let word_end = if word.end.is_finite() { word.end } else { start };
    let end = word_end.max(start + style.min_duration).min(total);

    if end - start < style.min_duration {
        start = (end - style.min_duration).max(0.0);
    }

    Some(CaptionEvent {
        text,
        start,
        end,
        position: style.position,
    })
}
