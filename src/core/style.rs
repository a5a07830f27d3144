//! Bracket-tag style annotations.
//!
//! Scripts may carry delivery annotations such as `[whisper]...[/whisper]` or
//! `[pause:3s]`. The provider has no channel for structured style markup, so
//! recognized spans are rewritten into natural-language delivery hints before
//! the script enters the session instructions.
//!
//! Implemented as an explicit scanner rather than regular expressions: the
//! matching contract (case-insensitive, shortest span to the next matching
//! closing tag) is enforced directly, and there is no backtracking.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Natural-language hint for each recognized paired tag.
static STYLE_HINTS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("whisper", "speak softly and intimately"),
        ("excited", "speak with excitement and energy"),
        ("serious", "speak in a calm, serious tone"),
        ("slow", "speak slowly and deliberately"),
        ("fast", "speak quickly and briskly"),
        ("emphasis", "strongly emphasize the following"),
        ("sad", "speak with sadness and weight"),
        ("happy", "speak cheerfully and warmly"),
        ("angry", "speak with barely controlled anger"),
    ])
});

/// Filler token emitted for pause markers.
const PAUSE_FILLER: &str = "...";

/// Repetitions for a bare `[pause]` with no duration.
const DEFAULT_PAUSE_REPEATS: usize = 2;

/// Rewrite bracket-tag annotations into delivery hints.
///
/// Pure and total: unrecognized or unmatched tags pass through verbatim, and
/// the transform never fails. Output containing no further bracket tags is a
/// fixed point. The result is trimmed of leading/trailing whitespace.
pub fn process(script: &str) -> String {
    rewrite(script).trim().to_string()
}

fn rewrite(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while let Some(rel) = input[i..].find('[') {
        let open = i + rel;
        out.push_str(&input[i..open]);

        let Some(close_rel) = input[open..].find(']') else {
            // Dangling '[' with no closing bracket: literal text.
            out.push_str(&input[open..]);
            return out;
        };
        let close = open + close_rel;
        let tag = input[open + 1..close].to_ascii_lowercase();

        if let Some(repeats) = parse_pause(&tag) {
            for n in 0..repeats {
                if n > 0 {
                    out.push(' ');
                }
                out.push_str(PAUSE_FILLER);
            }
            i = close + 1;
        } else if let Some(hint) = STYLE_HINTS.get(tag.as_str()) {
            match find_closing(input, close + 1, &tag) {
                Some((span_end, resume)) => {
                    out.push('(');
                    out.push_str(hint);
                    out.push_str(") ");
                    out.push_str(&rewrite(&input[close + 1..span_end]));
                    i = resume;
                }
                None => {
                    // Recognized opener with no matching closer: literal.
                    out.push_str(&input[open..=close]);
                    i = close + 1;
                }
            }
        } else {
            // Unrecognized tag (including stray closers): literal.
            out.push_str(&input[open..=close]);
            i = close + 1;
        }
    }
    out.push_str(&input[i..]);
    out
}

/// Parse `pause` / `pause:Ns` / `pause:N` markers, returning the repeat
/// count. Anything malformed is not a pause marker.
fn parse_pause(tag: &str) -> Option<usize> {
    if tag == "pause" {
        return Some(DEFAULT_PAUSE_REPEATS);
    }
    let duration = tag.strip_prefix("pause:")?;
    let digits = duration.strip_suffix('s').unwrap_or(duration);
    digits.parse::<usize>().ok()
}

/// Locate the next `[/tag]` (case-insensitive) at or after `from`.
///
/// Returns the index where the span's inner text ends and the index to
/// resume scanning after the closing tag. Picking the *next* matching closer
/// gives the shortest possible span.
fn find_closing(input: &str, from: usize, tag: &str) -> Option<(usize, usize)> {
    let mut j = from;
    while let Some(rel) = input[j..].find("[/") {
        let start = j + rel;
        let name_start = start + 2;
        let end = name_start + input[name_start..].find(']')?;
        if input[name_start..end].eq_ignore_ascii_case(tag) {
            return Some((start, end + 1));
        }
        // Closer for a different tag; keep scanning.
        j = start + 2;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through_trimmed() {
        assert_eq!(process("Hello there."), "Hello there.");
        assert_eq!(process("  spaced out \n"), "spaced out");
        assert_eq!(process(""), "");
    }

    #[test]
    fn test_whisper_rewrite() {
        assert_eq!(
            process("[whisper]hello[/whisper]"),
            "(speak softly and intimately) hello"
        );
    }

    #[test]
    fn test_rewrite_is_case_insensitive() {
        assert_eq!(
            process("[WHISPER]hello[/Whisper]"),
            "(speak softly and intimately) hello"
        );
    }

    #[test]
    fn test_rewrite_inside_surrounding_text() {
        assert_eq!(
            process("Hi [excited]there[/excited], friend"),
            "Hi (speak with excitement and energy) there, friend"
        );
    }

    #[test]
    fn test_pause_defaults_to_two_repeats() {
        assert_eq!(process("[pause]"), "... ...");
    }

    #[test]
    fn test_pause_with_duration() {
        assert_eq!(process("[pause:3s]"), "... ... ...");
        assert_eq!(process("[pause:1s]"), "...");
        assert_eq!(process("a[pause:0s]b"), "ab");
    }

    #[test]
    fn test_malformed_pause_passes_through() {
        assert_eq!(process("[pause:xs]"), "[pause:xs]");
    }

    #[test]
    fn test_unrecognized_tag_passes_through() {
        assert_eq!(process("[shout]hey[/shout]"), "[shout]hey[/shout]");
    }

    #[test]
    fn test_unmatched_opener_passes_through() {
        assert_eq!(process("[whisper]hello"), "[whisper]hello");
    }

    #[test]
    fn test_shortest_span_wins() {
        // The first closer terminates the span; the rest is literal text
        // with a stray closer left as-is.
        assert_eq!(
            process("[sad]a[/sad]b[/sad]"),
            "(speak with sadness and weight) ab[/sad]"
        );
    }

    #[test]
    fn test_nested_tags_rewrite() {
        assert_eq!(
            process("[happy]oh [emphasis]yes[/emphasis][/happy]"),
            "(speak cheerfully and warmly) oh (strongly emphasize the following) yes"
        );
    }

    #[test]
    fn test_idempotent_on_tag_free_output() {
        let once = process("[whisper]hello[/whisper] and [pause:2s] then");
        assert_eq!(process(&once), once);
    }

    #[test]
    fn test_dangling_bracket_is_literal() {
        assert_eq!(process("left [ alone"), "left [ alone");
    }
}
