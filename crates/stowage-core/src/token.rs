//! Random hash-token generation.
//!
//! The `hash` field of a [`crate::FileRecord`] is a random collision-resistant
//! token assigned once at upload time, not a digest of the file contents.
//! Deduplication of identical bytes is explicitly out of scope.

use rand::Rng;

/// Length of generated hash tokens.
pub const HASH_TOKEN_LEN: usize = 32;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a fresh lowercase alphanumeric token.
///
/// The first characters double as the shard-directory prefix, so the alphabet
/// stays lowercase to keep physical paths case-stable.
pub fn hash_token() -> String {
    let mut rng = rand::rng();
    (0..HASH_TOKEN_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}
