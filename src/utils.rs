/// Truncate to at most `max` characters without splitting a char
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strings_pass_through() {
        assert_eq!(truncate_chars("hello", 255), "hello");
    }

    #[test]
    fn long_strings_are_cut() {
        let long = "a".repeat(300);
        assert_eq!(truncate_chars(&long, 255).len(), 255);
    }

    #[test]
    fn counts_chars_not_bytes() {
        assert_eq!(truncate_chars("áéíóú", 3), "áéí");
    }
}
