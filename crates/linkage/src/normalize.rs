//! Identifier normalization.
//!
//! Every function here is a pure, idempotent function of its input: applying
//! it to an already-normalized value returns that value unchanged.

/// Canonical width of a zero-padded DOT number.
pub const DOT_WIDTH: usize = 8;

/// Strip surrounding whitespace and a leading "MC" marker (any case).
///
/// `"MC998877"`, `"mc 998877"` and `" 998877 "` all become `"998877"`.
/// Repeated markers (`"MC-MC998877"`) are stripped until none remain.
pub fn mc_key(raw: &str) -> String {
    let mut rest = raw.trim();
    while let Some(prefix) = rest.get(..2) {
        if !prefix.eq_ignore_ascii_case("MC") {
            break;
        }
        rest = rest[2..].trim_start_matches(|c: char| c == '-' || c == '#' || c.is_whitespace());
    }
    rest.trim_end().to_string()
}

/// True if `s` is non-empty and made only of ASCII digits.
pub fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Zero-left-pad a digit string to `width`. Longer strings are unchanged.
pub fn pad(s: &str, width: usize) -> String {
    format!("{s:0>width$}")
}

/// Zero-left-pad to the canonical DOT width.
pub fn pad8(s: &str) -> String {
    pad(s, DOT_WIDTH)
}

/// Strip every leading zero. An all-zero string becomes empty.
pub fn unpad(s: &str) -> &str {
    s.trim_start_matches('0')
}

/// The DOT keys an insurance row is indexed under: the trimmed value as
/// given and, if purely numeric, its padded form. Empty input yields none.
pub fn dot_keys(raw: &str, width: usize) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let mut keys = vec![trimmed.to_string()];
    if is_digits(trimmed) {
        let padded = pad(trimmed, width);
        if padded != trimmed {
            keys.push(padded);
        }
    }
    keys
}

/// Registry field sanitizer: trims, and treats `""` and the literal `None`
/// as absent.
pub fn present(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "None" {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mc_prefix_variants() {
        assert_eq!(mc_key("MC998877"), "998877");
        assert_eq!(mc_key("mc998877"), "998877");
        assert_eq!(mc_key("Mc-998877"), "998877");
        assert_eq!(mc_key("  MC 998877 "), "998877");
        assert_eq!(mc_key("998877"), "998877");
        assert_eq!(mc_key(""), "");
        assert_eq!(mc_key("MC"), "");
        assert_eq!(mc_key("MC-MC998877"), "998877");
    }

    #[test]
    fn mc_key_keeps_non_prefix_letters() {
        assert_eq!(mc_key("FF123"), "FF123");
        assert_eq!(mc_key("MX123"), "MX123");
    }

    #[test]
    fn mc_key_multibyte_input_does_not_panic() {
        assert_eq!(mc_key("É12"), "É12");
    }

    #[test]
    fn pad_and_unpad() {
        assert_eq!(pad8("12345"), "00012345");
        assert_eq!(pad8("123456789"), "123456789");
        assert_eq!(unpad("00012345"), "12345");
        assert_eq!(unpad("0000"), "");
    }

    #[test]
    fn dot_keys_numeric_gets_both_forms() {
        assert_eq!(dot_keys(" 12345 ", DOT_WIDTH), ["12345", "00012345"]);
    }

    #[test]
    fn dot_keys_already_padded_single_entry() {
        assert_eq!(dot_keys("00012345", DOT_WIDTH).len(), 1);
    }

    #[test]
    fn dot_keys_non_numeric_as_is() {
        assert_eq!(dot_keys("12-345", DOT_WIDTH), ["12-345"]);
        assert!(dot_keys("   ", DOT_WIDTH).is_empty());
    }

    #[test]
    fn present_filters_placeholders() {
        assert_eq!(present(" 42 "), Some("42"));
        assert_eq!(present("None"), None);
        assert_eq!(present(""), None);
    }
}
