//! Identifier generation.
//!
//! Event and entity identifiers are URL-safe random strings. Production code
//! draws them from the thread RNG; tests inject a sequence.

use rand::Rng;

/// Characters permitted in generated identifiers (RFC 4648 URL-safe alphabet).
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Length of generated identifiers. 22 symbols of 6 bits each is 132 bits.
pub const ID_LENGTH: usize = 22;

/// Abstraction over identifier generation.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh identifier.
    fn next_id(&self) -> String;
}

/// Production generator backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> String {
        random_id()
    }
}

/// Generates a URL-safe random identifier of [`ID_LENGTH`] characters.
#[must_use]
pub fn random_id() -> String {
    let mut rng = rand::rng();
    (0..ID_LENGTH)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_id_has_fixed_length_and_url_safe_characters() {
        let id = random_id();

        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_random_ids_differ() {
        let ids = RandomIds;

        assert_ne!(ids.next_id(), ids.next_id());
    }
}
