//! Random token generation.

use rand::prelude::RngExt;
use rand::rng;

/// Characters random tokens are drawn from: lowercase, uppercase, then digits.
pub const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a random alphanumeric string of exactly `len` characters.
///
/// Each character is picked independently from [`ALPHABET`] using the thread-local CSPRNG,
/// which is seeded from the operating system. `random_range` samples without modulo bias, so
/// every character is equally likely.
///
/// # Panics
///
/// Panics if the operating system entropy source cannot seed the generator.
pub fn random_string(len: usize) -> String {
    let mut rng = rng();
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}
