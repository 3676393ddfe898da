//! Text helpers shared by the detectors.

/// Truncate a string to at most `max_chars` characters on a char boundary.
///
/// Prompt context windows are bounded by character count, not bytes, so a
/// multi-byte character near the cut must not split.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strings_pass_through() {
        assert_eq!(truncate_chars("hello", 200), "hello");
        assert_eq!(truncate_chars("", 10), "");
    }

    #[test]
    fn long_strings_truncate() {
        let long = "x".repeat(500);
        assert_eq!(truncate_chars(&long, 200).chars().count(), 200);
    }

    #[test]
    fn multibyte_boundary_is_safe() {
        let s = "héllo wörld";
        let t = truncate_chars(s, 3);
        assert_eq!(t, "hél");
    }
}
