//! Text formatting for popup bodies.
//!
//! Applies the user's format template to a notification, then word-wraps
//! the result to the popup's inner width. Wrapping is driven by a caller
//! supplied measure function so the layout logic stays independent of any
//! particular font backend.

use crate::notification::Notification;

/// Substitute `{summary}`, `{body}` and `{app_name}` in the format template.
///
/// Unknown placeholders are left untouched rather than erroring; senders
/// routinely put braces in notification bodies.
pub fn format_text(template: &str, notif: &Notification) -> String {
    template
        .replace("{summary}", &notif.summary)
        .replace("{body}", &notif.body)
        .replace("{app_name}", &notif.app_name)
}

/// Word-wrap text to `max_width` pixels using `measure` for line widths.
///
/// Explicit newlines in the input always break; words longer than the full
/// width are split at the last character that fits so no input is dropped.
pub fn wrap_text<F>(text: &str, max_width: u32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> u32,
{
    let mut lines = Vec::new();
    for raw_line in text.split('\n') {
        if measure(raw_line) <= max_width {
            lines.push(raw_line.to_string());
            continue;
        }
        wrap_line(raw_line, max_width, &measure, &mut lines);
    }
    lines
}

fn wrap_line<F>(line: &str, max_width: u32, measure: &F, out: &mut Vec<String>)
where
    F: Fn(&str) -> u32,
{
    let mut current = String::new();
    for word in line.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if measure(&candidate) <= max_width {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        // Word alone still too wide: hard-split it
        if measure(word) > max_width {
            current = hard_split(word, max_width, measure, out);
        } else {
            current = word.to_string();
        }
    }
    if !current.is_empty() || line.trim().is_empty() {
        out.push(current);
    }
}

/// Break an over-long word at character boundaries, pushing full chunks and
/// returning the trailing remainder.
fn hard_split<F>(word: &str, max_width: u32, measure: &F, out: &mut Vec<String>) -> String
where
    F: Fn(&str) -> u32,
{
    let mut chunk = String::new();
    for ch in word.chars() {
        chunk.push(ch);
        if measure(&chunk) > max_width && chunk.chars().count() > 1 {
            chunk.pop();
            out.push(std::mem::take(&mut chunk));
            chunk.push(ch);
        }
    }
    chunk
}
