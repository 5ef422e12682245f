use rand::Rng;
use sha2::{Digest, Sha256};

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                              abcdefghijklmnopqrstuvwxyz\
                              0123456789";
const INVITE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const INVITE_CODE_LEN: usize = 8;

fn random_string(charset: &[u8], len: usize) -> String {
    let mut rng = rand::thread_rng();

    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..charset.len());
            charset[idx] as char
        })
        .collect()
}

/// Generate a URL-safe random token for email links
pub fn generate_token() -> String {
    random_string(ALPHANUMERIC, 43)
}

/// Token mirrored between the `csrf_token` cookie and the `X-CSRF-Token` header
pub fn generate_csrf_token() -> String {
    random_string(ALPHANUMERIC, 32)
}

/// Device API key secret, shown to the user exactly once
pub fn generate_api_secret() -> String {
    format!("pt_{}", random_string(ALPHANUMERIC, 40))
}

/// Coach invite code: uppercase letters and digits
pub fn generate_invite_code() -> String {
    random_string(INVITE_CHARSET, INVITE_CODE_LEN)
}

/// Only digests of tokens and API secrets are persisted
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_code_charset() {
        for _ in 0..50 {
            let code = generate_invite_code();
            assert_eq!(code.len(), INVITE_CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
        assert_ne!(generate_csrf_token(), generate_csrf_token());
        assert!(generate_api_secret().starts_with("pt_"));
    }

    #[test]
    fn test_hash_token_is_sha256_hex() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_token("token").len(), 64);
    }
}
