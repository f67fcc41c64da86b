//! Field validation shared by the login form and the command endpoint

use regex::Regex;
use std::sync::LazyLock;

/// Longest accepted email address
pub const MAX_ADDRESS_LENGTH: usize = 254;

/// Longest accepted subject line
pub const MAX_SUBJECT_LENGTH: usize = 255;

/// Longest accepted folder name
pub const MAX_FOLDER_NAME_LENGTH: usize = 64;

/// Longest accepted attachment filename
pub const MAX_FILENAME_LENGTH: usize = 255;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

/// Check address format and length
pub fn is_valid_email(address: &str) -> bool {
    address.len() <= MAX_ADDRESS_LENGTH && EMAIL_REGEX.is_match(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("kate@gmail.com"));
        assert!(is_valid_email("first.last+tag@ukr.net"));

        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@gmail.com"));
        assert!(!is_valid_email("kate@"));
        assert!(!is_valid_email("kate@gmail"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_email_length_ceiling() {
        let local = "a".repeat(MAX_ADDRESS_LENGTH);
        let too_long = format!("{}@gmail.com", local);
        assert!(!is_valid_email(&too_long));
    }
}
