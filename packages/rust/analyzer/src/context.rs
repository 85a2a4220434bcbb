//! Evidence window selection.
//!
//! A window ends at the matched line and starts at the nearest strictly
//! preceding timestamp line, never reaching back more than `max_lines - 1`
//! lines. When no timestamp is in reach the window is exactly `max_lines`
//! long (or as long as the log allows).

use std::ops::Range;

use logsweep_shared::{LogsweepError, Result};
use regex::Regex;

/// Bounded context selection with a compiled timestamp pattern.
#[derive(Debug, Clone)]
pub struct ContextSelector {
    timestamp: Regex,
    max_lines: usize,
}

impl ContextSelector {
    /// Compile `timestamp_pattern`. `max_lines` of zero is treated as one.
    pub fn new(timestamp_pattern: &str, max_lines: usize) -> Result<Self> {
        let timestamp = Regex::new(timestamp_pattern).map_err(|e| {
            LogsweepError::config(format!("invalid timestamp_pattern '{timestamp_pattern}': {e}"))
        })?;
        Ok(Self {
            timestamp,
            max_lines: max_lines.max(1),
        })
    }

    /// Line range of the window for a match at `match_idx`.
    ///
    /// An index past the end is clamped to the last line; an empty log gives
    /// an empty range.
    pub fn window<S: AsRef<str>>(&self, lines: &[S], match_idx: usize) -> Range<usize> {
        let Some(last) = lines.len().checked_sub(1) else {
            return 0..0;
        };
        let end = match_idx.min(last);
        let lowest = (end + 1).saturating_sub(self.max_lines);

        let start = (lowest..end)
            .rev()
            .find(|&i| self.timestamp.is_match(lines[i].as_ref()))
            .unwrap_or(lowest);

        start..end + 1
    }

    /// Owned copy of the window lines.
    pub fn select<S: AsRef<str>>(&self, lines: &[S], match_idx: usize) -> Vec<String> {
        lines[self.window(lines, match_idx)]
            .iter()
            .map(|l| l.as_ref().to_string())
            .collect()
    }
}

/// One-shot form of [`ContextSelector::select`].
pub fn select_context<S: AsRef<str>>(
    lines: &[S],
    match_idx: usize,
    max_lines: usize,
    timestamp: &Regex,
) -> Vec<String> {
    let selector = ContextSelector {
        timestamp: timestamp.clone(),
        max_lines: max_lines.max(1),
    };
    selector.select(lines, match_idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logsweep_shared::DEFAULT_TIMESTAMP_PATTERN;

    fn selector(max: usize) -> ContextSelector {
        ContextSelector::new(DEFAULT_TIMESTAMP_PATTERN, max).expect("valid pattern")
    }

    #[test]
    fn window_starts_at_preceding_timestamp() {
        let lines = ["2024-01-01T00:00:00 starting", "ValueError: bad input"];
        assert_eq!(selector(10).select(&lines, 1), lines.to_vec());
    }

    #[test]
    fn nearest_timestamp_wins() {
        let lines = [
            "2024-01-01 00:00:00 step one",
            "doing work",
            "2024-01-01 00:00:05 step two",
            "compiling",
            "ERROR: failed",
        ];
        assert_eq!(selector(10).window(&lines, 4), 2..5);
    }

    #[test]
    fn no_timestamp_gives_exactly_max_lines() {
        let lines: Vec<String> = (0..20).map(|i| format!("line {i}")).collect();
        let got = selector(5).select(&lines, 15);
        assert_eq!(got, vec!["line 11", "line 12", "line 13", "line 14", "line 15"]);
    }

    #[test]
    fn distant_timestamp_is_truncated_to_max_lines() {
        let mut lines = vec!["2024-01-01 00:00:00 start".to_string()];
        lines.extend((1..10).map(|i| format!("line {i}")));
        assert_eq!(selector(4).window(&lines, 9), 6..10);
    }

    #[test]
    fn match_at_top_of_log() {
        let lines = ["FATAL: boom", "after"];
        assert_eq!(selector(30).select(&lines, 0), vec!["FATAL: boom"]);
    }

    #[test]
    fn timestamp_on_match_line_does_not_shrink_window() {
        let lines = ["2024-01-01 00:00:00 a", "b", "2024-01-01 00:00:01 ERROR: c"];
        assert_eq!(selector(10).window(&lines, 2), 0..3);
    }

    #[test]
    fn length_is_always_bounded() {
        let lines: Vec<String> = (0..50)
            .map(|i| {
                if i % 7 == 0 {
                    format!("2024-01-01 00:00:{:02} tick", i % 60)
                } else {
                    format!("work {i}")
                }
            })
            .collect();
        for max in [1, 2, 3, 8, 100] {
            let sel = selector(max);
            for idx in 0..lines.len() {
                let len = sel.select(&lines, idx).len();
                assert!(len >= 1 && len <= max, "max={max} idx={idx} len={len}");
            }
        }
    }

    #[test]
    fn zero_max_and_out_of_range_index_are_clamped() {
        let lines = ["a", "b", "c"];
        assert_eq!(selector(0).select(&lines, 1), vec!["b"]);
        assert_eq!(selector(2).select(&lines, 99), vec!["b", "c"]);
        let empty: [&str; 0] = [];
        assert!(selector(3).select(&empty, 0).is_empty());
    }

    #[test]
    fn free_function_matches_selector() {
        let re = Regex::new(DEFAULT_TIMESTAMP_PATTERN).expect("valid regex");
        let lines = ["2024-01-01 00:00:00 x", "y", "z"];
        assert_eq!(select_context(&lines, 2, 10, &re), selector(10).select(&lines, 2));
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let err = ContextSelector::new("([", 5).unwrap_err();
        assert!(matches!(err, LogsweepError::Config { .. }));
    }
}
