//! Brace filter for displayed text
//!
//! The responder may interleave structured control payloads (`{...}`) with
//! natural-language text. Before text is shown, every balanced brace span is
//! removed. The filter is purely syntactic: braces inside JSON strings are
//! counted like any other brace.

use std::ops::RangeInclusive;

/// Remove every balanced `{...}` span and trim the result.
///
/// Scans left to right with a depth counter. When the depth returns to zero
/// the span from the opening brace to the current closing brace is deleted
/// and the scan restarts from the beginning, until a full pass removes
/// nothing. An unmatched `{` leaves the rest of the text untouched; a `}`
/// at depth zero is ignored.
pub fn strip_braced_spans(text: &str) -> String {
    let mut out = text.to_string();
    while let Some(span) = first_balanced_span(&out) {
        out.replace_range(span, "");
    }
    out.trim().to_string()
}

fn first_balanced_span(text: &str) -> Option<RangeInclusive<usize>> {
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, c) in text.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return Some(start..=i);
                }
            }
            _ => {}
        }
    }

    None
}
