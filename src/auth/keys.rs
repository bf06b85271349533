//! API key format, generation and salted hashing.
//!
//! Keys look like `omni_` followed by 32 alphanumeric characters. The first 8
//! characters are stored in clear as an indexed lookup prefix; the full key is
//! stored only as `pbkdf2-sha256$<rounds>$<salt hex>$<hash hex>`.

use pbkdf2::pbkdf2_hmac;
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use sha2::Sha256;

pub const API_KEY_PREFIX: &str = "omni_";
/// Characters after the prefix.
pub const API_KEY_RANDOM_LENGTH: usize = 32;
/// Characters of the key stored in clear for lookup.
pub const LOOKUP_PREFIX_LENGTH: usize = 8;
pub const DEFAULT_HASH_ROUNDS: u32 = 100_000;

const HASH_SCHEME: &str = "pbkdf2-sha256";
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;

/// Cheap syntactic check done before any storage lookup.
pub fn is_valid_api_key_format(key: &str) -> bool {
    match key.strip_prefix(API_KEY_PREFIX) {
        Some(rest) => {
            rest.len() == API_KEY_RANDOM_LENGTH && rest.bytes().all(|b| b.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Indexed lookup prefix: the first 8 characters of the key.
pub fn key_prefix(key: &str) -> &str {
    key.get(..LOOKUP_PREFIX_LENGTH).unwrap_or(key)
}

pub fn generate_api_key() -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_RANDOM_LENGTH)
        .map(char::from)
        .collect();
    format!("{}{}", API_KEY_PREFIX, random)
}

pub fn hash_api_key_with_rounds(key: &str, rounds: u32) -> String {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = derive(key, &salt, rounds);
    format!(
        "{}${}${}${}",
        HASH_SCHEME,
        rounds,
        hex::encode(salt),
        hex::encode(digest)
    )
}

fn derive(key: &str, salt: &[u8], rounds: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(key.as_bytes(), salt, rounds, &mut out);
    out
}

/// Check `key` against a stored hash. Malformed hashes never match.
pub fn verify_api_key(key: &str, stored_hash: &str) -> bool {
    let mut parts = stored_hash.split('$');
    let (Some(scheme), Some(rounds), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    let Ok(rounds) = rounds.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(expected)) else {
        return false;
    };
    if rounds == 0 || expected.len() != HASH_LENGTH {
        return false;
    }

    constant_time_eq(&derive(key, &salt, rounds), &expected)
}

/// Compare without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST_ROUNDS: u32 = 1_000;

    #[test]
    fn test_generated_keys_are_well_formed() {
        let key = generate_api_key();
        assert!(is_valid_api_key_format(&key), "{key}");
        assert_eq!(key.len(), 37);
        assert_ne!(generate_api_key(), key);
    }

    #[test]
    fn test_format_rejections() {
        assert!(!is_valid_api_key_format(""));
        assert!(!is_valid_api_key_format("sk-abcdefghijklmnopqrstuvwxyz123456"));
        assert!(!is_valid_api_key_format("omni_short"));
        assert!(!is_valid_api_key_format("omni_abcdefghijklmnopqrstuvwxyz12345!"));
        assert!(!is_valid_api_key_format("omni_abcdefghijklmnopqrstuvwxyz1234567"));
        assert!(is_valid_api_key_format("omni_abcdefghijklmnopqrstuvwxyz123456"));
    }

    #[test]
    fn test_key_prefix() {
        assert_eq!(key_prefix("omni_abcdefghijklmnopqrstuvwxyz123456"), "omni_abc");
        assert_eq!(key_prefix("omni"), "omni");
    }

    #[test]
    fn test_hash_and_verify() {
        let key = generate_api_key();
        let hash = hash_api_key_with_rounds(&key, FAST_ROUNDS);
        assert!(hash.starts_with("pbkdf2-sha256$1000$"));
        assert!(verify_api_key(&key, &hash));
        // Salted: same key, different hash.
        assert_ne!(hash, hash_api_key_with_rounds(&key, FAST_ROUNDS));
    }

    #[test]
    fn test_wrong_suffix_does_not_verify() {
        let key = "omni_abcdefghijklmnopqrstuvwxyz123456";
        let hash = hash_api_key_with_rounds(key, FAST_ROUNDS);
        let impostor = "omni_abcdefghijklmnopqrstuvwxyz654321";
        assert_eq!(key_prefix(key), key_prefix(impostor));
        assert!(!verify_api_key(impostor, &hash));
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        let key = generate_api_key();
        let malformed = [
            "",
            "plaintext",
            "bcrypt$12$aa$bb",
            "pbkdf2-sha256$x$aa$bb",
            "pbkdf2-sha256$0$aa$bb",
        ];
        for bad in malformed {
            assert!(!verify_api_key(&key, bad), "{bad}");
        }
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
