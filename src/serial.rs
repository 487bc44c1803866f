/// Number of characters in a BBU serial once spaces are removed.
pub const SERIAL_LEN: usize = 13;

/// Removes every space character from a scanned serial.
///
/// Scanners occasionally insert spaces between character groups; those are
/// dropped before any shape check. Other whitespace is left in place so that
/// it causes the serial to be rejected.
pub fn normalize(raw: &str) -> String {
    raw.chars().filter(|c| *c != ' ').collect()
}

/// Returns true when `raw`, after [`normalize`], is exactly 13 ASCII
/// alphanumeric characters with at least one letter and at least one digit.
pub fn validate(raw: &str) -> bool {
    is_valid_shape(&normalize(raw))
}

fn is_valid_shape(serial: &str) -> bool {
    if serial.chars().count() != SERIAL_LEN {
        return false;
    }

    let mut has_alpha = false;
    let mut has_digit = false;

    for c in serial.chars() {
        if c.is_ascii_alphabetic() {
            has_alpha = true;
        } else if c.is_ascii_digit() {
            has_digit = true;
        } else {
            return false;
        }
    }

    has_alpha && has_digit
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_serials() {
        assert!(validate("ABC123DEF4567"));
        assert!(!validate("1234567890123"));
        assert!(!validate("ABCDEFGHIJKLM"));
    }

    #[test]
    fn test_lowercase_is_alphabetic() {
        assert!(validate("abc123def4567"));
        assert!(validate("aBc123DeF4567"));
    }

    #[test]
    fn test_spaces_are_removed_before_checks() {
        assert!(validate("ABC 123 DEF 4567"));
        assert!(validate(" ABC123DEF4567 "));
        assert_eq!(normalize("ABC 123 DEF 4567"), "ABC123DEF4567");
    }

    #[test]
    fn test_other_whitespace_is_rejected() {
        assert!(!validate("ABC123\tDEF4567"));
        assert!(!validate("ABC123DEF456\n"));
    }

    #[test]
    fn test_punctuation_is_rejected() {
        assert!(!validate("ABC-123DEF456"));
        assert!(!validate("ABC123DEF456!"));
    }

    #[test]
    fn test_non_ascii_is_rejected() {
        assert!(!validate("ÄBC123DEF4567"));
        assert!(!validate("ABC123DEF456٣"));
    }

    #[test]
    fn test_wrong_length() {
        assert!(!validate(""));
        assert!(!validate("ABC123DEF456"));
        assert!(!validate("ABC123DEF45678"));
    }

    proptest! {
        #[test]
        fn prop_wrong_length_rejected(s in "[A-Za-z0-9]{0,12}|[A-Za-z0-9]{14,30}") {
            prop_assert!(!validate(&s));
        }

        #[test]
        fn prop_all_letters_rejected(s in "[A-Za-z]{13}") {
            prop_assert!(!validate(&s));
        }

        #[test]
        fn prop_all_digits_rejected(s in "[0-9]{13}") {
            prop_assert!(!validate(&s));
        }

        #[test]
        fn prop_mixed_accepted(prefix in "[A-Za-z]{1,6}", digits in "[0-9]{1,6}", rest in "[A-Za-z0-9]{1,11}") {
            let candidate: String = format!("{prefix}{digits}{rest}").chars().take(SERIAL_LEN).collect();
            prop_assume!(candidate.len() == SERIAL_LEN);
            prop_assume!(candidate.chars().any(|c| c.is_ascii_digit()));
            prop_assert!(validate(&candidate));
        }

        #[test]
        fn prop_punctuation_rejected(head in "[A-Z]{6}[0-9]{6}", punct in "[-_.,;:!?#/]") {
            let candidate = format!("{head}{punct}");
            prop_assert!(!validate(&candidate));
        }
    }
}
