//! Compiled failure patterns, tried in priority order.
//!
//! Line patterns resolve a signature and message from a single line. Stack
//! frame patterns only delimit trace blocks; the extractor turns an
//! unexplained block into the catch-all `Exception` signature.

use std::sync::LazyLock;

use regex::Regex;

/// Priority class of the pattern that produced a match. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PatternClass {
    /// `<dotted.or.simple.TypeName>: <message>`
    Typed,
    /// `ERROR`, `FAILURE`, or `FATAL` at line start.
    Generic,
    /// A stack trace with no resolvable exception type.
    StackTrace,
}

/// Signature emitted for stack traces without a specific type.
pub(crate) const STACK_TRACE_SIGNATURE: &str = "Exception";

/// A signature/message pair resolved from one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LineHit {
    pub class: PatternClass,
    pub signature: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Line patterns
// ---------------------------------------------------------------------------

/// Optional leading timestamp (Jenkins timestamper, logging frameworks).
static TIMESTAMP_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[?\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:Z|[+-]\d{2}:?\d{2})?\]?\s*(?:\|\s*)?",
    )
    .expect("valid regex")
});

/// Log level column in front of a typed exception (`ERROR | ValueError: ...`).
static LEVEL_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[?(?:INFO|ERROR|WARN|WARNING|DEBUG|FATAL|TRACE)\]?(?:\s*\|\s*|\s+)")
        .expect("valid regex")
});

static TYPED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:Caused by:\s*)?(?P<sig>(?:[A-Za-z_][A-Za-z0-9_$]*\.)*[A-Za-z0-9_$]*(?:Exception|Error|Warning))(?:\s*:\s*(?P<msg>.*))?$",
    )
    .expect("valid regex")
});

static GENERIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[?(?P<sig>ERROR|FAILURE|FATAL)\b\]?:?\s*(?P<msg>.*)$").expect("valid regex")
});

// ---------------------------------------------------------------------------
// Stack frame patterns
// ---------------------------------------------------------------------------

static FRAME_START_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Python
        r"^Traceback \(most recent call last\):",
        r#"^\s+File ".+", line \d+"#,
        // JVM / Node
        r"^\s+at [\w$.<>/-]+(?:\s*\(.*\))?\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Remove a leading timestamp column, if any.
pub(crate) fn strip_timestamp(line: &str) -> &str {
    match TIMESTAMP_PREFIX_RE.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// Resolve a line against the typed and generic patterns, in that order.
pub(crate) fn classify(line: &str) -> Option<LineHit> {
    let body = strip_timestamp(line);

    let typed_input = {
        let trimmed = body.trim_start();
        match LEVEL_PREFIX_RE.find(trimmed) {
            Some(m) => &trimmed[m.end()..],
            None => trimmed,
        }
    };
    if let Some(caps) = TYPED_RE.captures(typed_input.trim_end()) {
        return Some(LineHit {
            class: PatternClass::Typed,
            signature: caps["sig"].to_string(),
            message: caps.name("msg").map_or("", |m| m.as_str()).trim().to_string(),
        });
    }

    if let Some(caps) = GENERIC_RE.captures(body.trim_end()) {
        return Some(LineHit {
            class: PatternClass::Generic,
            signature: caps["sig"].to_string(),
            message: caps["msg"].trim().to_string(),
        });
    }

    None
}

/// Does this line open (or belong to) a stack trace on its own?
pub(crate) fn is_frame_start(line: &str) -> bool {
    let body = strip_timestamp(line);
    FRAME_START_RES.iter().any(|re| re.is_match(body))
}

/// Inside an open trace block, any indented line (source excerpts, carets,
/// `... 12 more`) continues the block.
pub(crate) fn is_frame_continuation(line: &str) -> bool {
    let body = strip_timestamp(line);
    body.starts_with([' ', '\t']) && !body.trim().is_empty()
}
