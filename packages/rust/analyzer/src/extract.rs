//! Failure signature extraction.
//!
//! Scans a log top to bottom and yields one [`Candidate`] per matching line.
//! Each line is resolved by the first pattern class that matches it:
//!
//! 1. typed exception lines (`pkg.module.SomeError: message`)
//! 2. generic `ERROR` / `FAILURE` / `FATAL` tokens at line start
//! 3. the catch-all `Exception` for a stack trace no typed line accounts for
//!
//! A trace block is accounted for when a matching line sits directly before
//! it (JVM style) or directly after it (Python style). An unaccounted block
//! yields `Exception` with an empty message, anchored at its last frame line.

use std::collections::HashSet;
use std::iter::{Copied, Enumerate};
use std::slice;
use std::str::Lines;

use crate::patterns::{self, LineHit, PatternClass, STACK_TRACE_SIGNATURE};

/// One extracted failure before context selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub signature: String,
    pub message: String,
    /// Zero-based index of the matched line.
    pub line_index: usize,
    pub class: PatternClass,
}

/// Extract candidates from `log_text`, dropping signatures in `ignore`.
pub fn extract<'a>(log_text: &'a str, ignore: &'a HashSet<String>) -> Matches<'a, Lines<'a>> {
    Matches::new(log_text.lines(), ignore)
}

/// Signature extraction bound to an ignore list.
#[derive(Debug, Clone, Default)]
pub struct SignatureExtractor {
    ignore: HashSet<String>,
}

impl SignatureExtractor {
    pub fn new(ignore: HashSet<String>) -> Self {
        Self { ignore }
    }

    /// Lazily scan raw log text.
    pub fn extract<'a>(&'a self, log_text: &'a str) -> Matches<'a, Lines<'a>> {
        Matches::new(log_text.lines(), &self.ignore)
    }

    /// Lazily scan a log already split into lines.
    pub fn extract_lines<'a>(
        &'a self,
        lines: &'a [&'a str],
    ) -> Matches<'a, Copied<slice::Iter<'a, &'a str>>> {
        Matches::new(lines.iter().copied(), &self.ignore)
    }
}

// ---------------------------------------------------------------------------
// Matches iterator
// ---------------------------------------------------------------------------

/// An open run of stack frame lines.
#[derive(Debug, Clone, Copy)]
struct TraceBlock {
    /// The line right before the block resolved to a signature.
    explained: bool,
    last_line: usize,
}

/// Lazy, finite sequence of candidates. Holds no state beyond the scan position.
#[derive(Debug)]
pub struct Matches<'a, I> {
    lines: Enumerate<I>,
    ignore: &'a HashSet<String>,
    block: Option<TraceBlock>,
    prev_matched: bool,
    done: bool,
}

impl<'a, I> Matches<'a, I>
where
    I: Iterator<Item = &'a str>,
{
    fn new(lines: I, ignore: &'a HashSet<String>) -> Self {
        Self {
            lines: lines.enumerate(),
            ignore,
            block: None,
            prev_matched: false,
            done: false,
        }
    }

    fn candidate(&self, hit: LineHit, line_index: usize) -> Option<Candidate> {
        if self.ignore.contains(&hit.signature) {
            tracing::trace!(signature = %hit.signature, line_index, "ignored signature");
            return None;
        }
        Some(Candidate {
            signature: hit.signature,
            message: hit.message,
            line_index,
            class: hit.class,
        })
    }
}

fn stack_trace_hit() -> LineHit {
    LineHit {
        class: PatternClass::StackTrace,
        signature: STACK_TRACE_SIGNATURE.to_string(),
        message: String::new(),
    }
}

impl<'a, I> Iterator for Matches<'a, I>
where
    I: Iterator<Item = &'a str>,
{
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        if self.done {
            return None;
        }

        while let Some((idx, line)) = self.lines.next() {
            let in_block = self.block.is_some();
            if patterns::is_frame_start(line) || (in_block && patterns::is_frame_continuation(line))
            {
                match self.block.as_mut() {
                    Some(block) => block.last_line = idx,
                    None => {
                        self.block = Some(TraceBlock {
                            explained: self.prev_matched,
                            last_line: idx,
                        })
                    }
                }
                self.prev_matched = false;
                continue;
            }

            let closed = self.block.take().filter(|b| !b.explained);
            let classified = patterns::classify(line);
            // Only a real line match explains the next block, never a catch-all.
            self.prev_matched = classified.is_some();
            let (hit, at) = match (classified, closed) {
                (Some(hit), _) => (hit, idx),
                (None, Some(block)) => (stack_trace_hit(), block.last_line),
                (None, None) => continue,
            };

            if let Some(candidate) = self.candidate(hit, at) {
                return Some(candidate);
            }
        }

        self.done = true;
        let block = self.block.take().filter(|b| !b.explained)?;
        self.candidate(stack_trace_hit(), block.last_line)
    }
}
