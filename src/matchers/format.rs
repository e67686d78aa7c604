//! Failure message rendering.

use similar::{ChangeTag, TextDiff};

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render `Expected <actual> <verb> <expected>`.
pub fn message(actual: &str, verb: &str, expected: &str) -> String {
    format!(
        "Expected\n{}\n{}\n{}",
        indent(actual),
        verb,
        indent(expected)
    )
}

/// Like [`message`], followed by a line diff from `expected` to `actual`.
pub fn message_with_diff(actual: &str, verb: &str, expected: &str) -> String {
    let mut out = message(actual, verb, expected);
    if actual == expected {
        return out;
    }

    out.push_str("\nDifference (- expected, + actual):\n");
    let diff = TextDiff::from_lines(expected, actual);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => ' ',
        };
        out.push(sign);
        out.push_str(change.value());
        if change.missing_newline() {
            out.push('\n');
        }
    }
    out
}
