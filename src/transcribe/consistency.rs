//! Conditioning on previously decoded text, and the cutoff that stops it
//! from feeding a repetition loop.

use super::Segment;

/// Characters of prior text handed to the next window.
pub const PROMPT_CHARS: usize = 200;

/// Consecutive identical segments that mark a window as looping.
const REPEATED_SEGMENTS: usize = 3;

/// Back-to-back repeats of one phrase inside a segment that mark it as looping.
const REPEATED_PHRASE: usize = 4;

/// The last `max_chars` characters of `text`, cut at a word boundary when
/// one is available.
pub fn prompt_tail(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    let tail: String = text.chars().skip(total - max_chars).collect();
    match tail.find(char::is_whitespace) {
        Some(pos) if pos + 1 < tail.len() => tail[pos..].trim_start().to_string(),
        _ => tail,
    }
}

/// Whether a window's output looks like the engine got stuck repeating itself.
pub fn is_degenerate(segments: &[Segment]) -> bool {
    let mut run = 1;
    for pair in segments.windows(2) {
        let (prev, next) = (normalize(&pair[0].text), normalize(&pair[1].text));
        if !next.is_empty() && prev == next {
            run += 1;
            if run >= REPEATED_SEGMENTS {
                return true;
            }
        } else {
            run = 1;
        }
    }

    segments
        .iter()
        .any(|s| has_repeated_phrase(&s.text, REPEATED_PHRASE))
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Any phrase of one to four words repeated `min_repeats` times in a row.
fn has_repeated_phrase(text: &str, min_repeats: usize) -> bool {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| c.is_ascii_punctuation())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();

    for len in 1..=4 {
        if words.len() < len * min_repeats {
            break;
        }
        for start in 0..=(words.len() - len * min_repeats) {
            let phrase = &words[start..start + len];
            let repeats = (1..min_repeats)
                .take_while(|k| &words[start + k * len..start + (k + 1) * len] == phrase)
                .count()
                + 1;
            if repeats >= min_repeats {
                return true;
            }
        }
    }

    false
}
