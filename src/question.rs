//! Coding-example extraction from interviewer replies
//!
//! Replies are free-form prose, so this is a best-effort heuristic: each field
//! is looked up independently and the first strategy that yields a non-empty
//! value wins. Missing fields are normal; the caller falls back to showing the
//! raw reply.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Input/Output example pulled out of a coding question
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CodingExample {
    /// Example input, trimmed and non-empty when present
    pub input: Option<String>,
    /// Expected output, trimmed and non-empty when present
    pub output: Option<String>,
}

impl CodingExample {
    /// True when neither field was found
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.input.is_none() && self.output.is_none()
    }
}

static FENCED_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\binput\b[:\s]*```(?:[\w+#.-]*[ \t]*\r?\n)?(.*?)```").expect("valid regex")
});

static FENCED_OUTPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\boutput\b[:\s]*```(?:[\w+#.-]*[ \t]*\r?\n)?(.*?)```").expect("valid regex")
});

static INPUT_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\binput\b[ \t]*:").expect("valid regex"));

static OUTPUT_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\boutput\b[ \t]*:").expect("valid regex"));

/// Labels that terminate an unfenced input value
static INPUT_STOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:output|expected|explanation)\b").expect("valid regex")
});

/// Labels that terminate an unfenced output value
static OUTPUT_STOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:input|explanation|example|constraints?)\b").expect("valid regex")
});

static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```(?:[\w+#.-]*[ \t]*\r?\n)?").expect("valid regex"));

static TRAILING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?```\s*$").expect("valid regex"));

/// A line opened by an `Input` or `Example` label, e.g. "Example 1:"
static EXAMPLE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:input|example)\b(?:[ \t]*\d+)?[ \t]*:?[ \t]*").expect("valid regex")
});

/// `name = value`, rejecting `==`, `<=`, `>=` and `!=`
static ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_]\w*[ \t]*=[ \t]*[^=\s]").expect("valid regex"));

/// A line opened by an output label, e.g. "Expected output:"
static OUTPUT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:expected[ \t]+)?(?:output|expected)[ \t]*:").expect("valid regex")
});

static OUTPUT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:output|expected)\b(?:[ \t]+output\b)?[ \t]*:?[ \t]*([^\n]*)")
        .expect("valid regex")
});

/// Extract the Input/Output example from a reply
///
/// Never panics; each returned field is either absent or a non-empty trimmed
/// string.
#[must_use]
pub fn extract(text: &str) -> CodingExample {
    let mut input = fenced(&FENCED_INPUT, text).or_else(|| unfenced(&INPUT_LABEL, &INPUT_STOP, text));
    let mut output =
        fenced(&FENCED_OUTPUT, text).or_else(|| unfenced(&OUTPUT_LABEL, &OUTPUT_STOP, text));

    if input.is_none() || output.is_none() {
        let (inline_input, inline_output) = inline_example(text);
        input = input.or(inline_input);
        output = output.or(inline_output);
    }

    tracing::trace!(
        found_input = input.is_some(),
        found_output = output.is_some(),
        "coding example extracted"
    );

    CodingExample { input, output }
}

fn fenced(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| non_empty(m.as_str()))
}

fn unfenced(label: &Regex, stop: &Regex, text: &str) -> Option<String> {
    let rest = &text[label.find(text)?.end()..];
    let value = stop.find(rest).map_or(rest, |m| &rest[..m.start()]);

    let value = LEADING_FENCE.replace(value, "");
    let value = TRAILING_FENCE.replace(&value, "");
    non_empty(&value)
}

/// Assignment-style example such as `nums = [2,7,11,15], target = 9`
fn inline_example(text: &str) -> (Option<String>, Option<String>) {
    let lines: Vec<&str> = text.lines().collect();

    let labeled = lines.iter().position(|line| {
        EXAMPLE_PREFIX.is_match(line) && ASSIGNMENT.is_match(&EXAMPLE_PREFIX.replace(line, ""))
    });

    // Unlabeled assignments only count when a line is labeled as the output
    let start = labeled.or_else(|| {
        if OUTPUT_LINE.is_match(text) {
            lines.iter().position(|line| ASSIGNMENT.is_match(line))
        } else {
            None
        }
    });

    let Some(start) = start else {
        return (None, None);
    };

    let block = lines[start..]
        .iter()
        .take_while(|line| !line.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n");

    let Some(marker) = OUTPUT_MARKER.captures(&block) else {
        return (non_empty(&strip_example_labels(&block)), None);
    };

    let (before, _) = block.split_at(marker.get(0).map_or(block.len(), |m| m.start()));
    let input = non_empty(&strip_example_labels(before));
    let output = marker.get(1).and_then(|m| non_empty(m.as_str()));
    (input, output)
}

fn strip_example_labels(text: &str) -> String {
    let mut current = text.to_string();
    // "Example 1: Input: ..." carries two labels
    while let Some(m) = EXAMPLE_PREFIX.find(&current) {
        current = current[m.end()..].to_string();
    }
    current
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
