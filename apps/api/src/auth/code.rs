//! OTP code and handle generation.

use rand::Rng;
use uuid::Uuid;

pub const CODE_LENGTH: usize = 6;

/// Uniformly random 6-digit code, zero-padded.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    let code: u32 = rng.random_range(0..1_000_000);
    format!("{:06}", code)
}

/// Opaque handle returned to the client in place of the email.
pub fn generate_handle() -> Uuid {
    Uuid::new_v4()
}

/// A submitted code must be exactly `CODE_LENGTH` ASCII digits.
pub fn is_well_formed_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_code_is_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert!(is_well_formed_code(&code), "bad code {code}");
        }
    }

    #[test]
    fn test_codes_can_start_with_zero() {
        let found = (0..2000).any(|_| generate_code().starts_with('0'));
        assert!(found, "zero padding should produce leading zeros");
    }

    #[test]
    fn test_handles_are_unique() {
        let handles: HashSet<Uuid> = (0..100).map(|_| generate_handle()).collect();
        assert_eq!(handles.len(), 100);
    }

    #[test]
    fn test_rejects_wrong_length_or_non_digits() {
        assert!(!is_well_formed_code("12345"));
        assert!(!is_well_formed_code("1234567"));
        assert!(!is_well_formed_code("12a456"));
        assert!(!is_well_formed_code(" 23456"));
    }
}
