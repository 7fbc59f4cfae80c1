/// Truncate to at most `max` characters, not bytes, so multi-byte names
/// survive the cut.
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_values_pass_through() {
        assert_eq!(truncate_chars("Steve", 50), "Steve");
    }

    #[test]
    fn long_values_are_cut_at_char_boundary() {
        let long = "x".repeat(80);
        assert_eq!(truncate_chars(&long, 50).len(), 50);
    }

    #[test]
    fn multibyte_input_is_not_split() {
        assert_eq!(truncate_chars("ééééé", 3), "ééé");
    }
}
