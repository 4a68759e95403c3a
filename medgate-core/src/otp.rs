//! One-time passcode helpers.
//!
//! Codes are fixed-width numeric strings; only their SHA-256 hex digest is
//! ever persisted. Verification recomputes the digest of the candidate and
//! compares it against the stored hash of the patient's newest challenge.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a zero-padded numeric code of the given width.
pub fn generate_code(code_length: u32) -> String {
    let upper = 10u64.pow(code_length);
    let n = rand::thread_rng().gen_range(0..upper);
    format!("{:0width$}", n, width = code_length as usize)
}

/// SHA-256 hex digest of a raw code.
pub fn hash_code(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_has_requested_width() {
        for _ in 0..50 {
            let code = generate_code(6);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn short_codes_are_zero_padded() {
        // 4-digit space is small enough that padding shows up quickly
        let code = generate_code(4);
        assert_eq!(code.len(), 4);
    }

    #[test]
    fn hash_is_sha256_hex() {
        let hash = hash_code("123456");
        assert_eq!(hash.len(), 64);
        // Known digest of the ASCII string "123456"
        assert_eq!(
            hash,
            "8d969eef6ecad3c29a3a629280e686cf0c3f5d5a86aff3ca12020c923adc6c92"
        );
    }

    #[test]
    fn different_codes_hash_differently() {
        assert_ne!(hash_code("123456"), hash_code("123457"));
    }
}
