//! Message normalization for aggregation keys.

/// Normalized messages are cut to this many characters before comparison.
pub const MESSAGE_KEY_MAX_CHARS: usize = 200;

/// Collapse whitespace runs to a single space, trim, and truncate.
/// Case is preserved.
pub fn normalize_message(message: &str) -> String {
    let collapsed = message.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MESSAGE_KEY_MAX_CHARS {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(MESSAGE_KEY_MAX_CHARS).collect();
    truncated.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_preserves_case() {
        assert_eq!(normalize_message("  Bad\tInput \n here "), "Bad Input here");
        assert_ne!(normalize_message("Bad"), normalize_message("bad"));
    }

    #[test]
    fn empty_and_blank_messages() {
        assert_eq!(normalize_message(""), "");
        assert_eq!(normalize_message(" \t "), "");
    }

    #[test]
    fn truncates_on_char_boundary() {
        let long = "é".repeat(300);
        let key = normalize_message(&long);
        assert_eq!(key.chars().count(), MESSAGE_KEY_MAX_CHARS);

        let a = format!("{} tail one", "x".repeat(MESSAGE_KEY_MAX_CHARS));
        let b = format!("{} tail two", "x".repeat(MESSAGE_KEY_MAX_CHARS));
        assert_eq!(normalize_message(&a), normalize_message(&b));
    }

    #[test]
    fn never_ends_with_a_space() {
        let msg = format!("{} next", "y".repeat(MESSAGE_KEY_MAX_CHARS - 1));
        let key = normalize_message(&msg);
        assert_eq!(key.chars().count(), MESSAGE_KEY_MAX_CHARS - 1);
        assert!(key.ends_with('y'));
    }
}
