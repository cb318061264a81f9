//! # Token Generation
//!
//! Produces the opaque random tokens that authorize state-changing requests.
//!
//! Tokens are hex strings cut to the configured length. Entropy comes from
//! the operating system CSPRNG; if that source is unavailable the generator
//! degrades to alphanumeric output from the thread-local RNG rather than
//! failing the request. The degraded path trades collision guarantees for
//! availability and is reported through `tracing` when taken.
//!
//! # Example
//! ```rust
//! use formguard::token::{generate, DEFAULT_TOKEN_LENGTH};
//!
//! let token = generate(40);
//! assert_eq!(token.len(), 40);
//!
//! // Zero falls back to the default length.
//! assert_eq!(generate(0).len(), DEFAULT_TOKEN_LENGTH as usize);
//! ```

use std::fmt::Write as _;

use rand::distr::Alphanumeric;
use rand::{Rng, TryRngCore};

/// Token length used when the configured value is zero or absent.
pub const DEFAULT_TOKEN_LENGTH: u32 = 32;

/// Number of random bytes drawn per block from the secure source.
const SECURE_BLOCK_BYTES: usize = 64;

/// Number of characters synthesized per block on the degraded path.
const FALLBACK_BLOCK_CHARS: usize = 128;

/// Generates a new authorization token of exactly `length` characters.
///
/// A `length` of zero is clamped to [`DEFAULT_TOKEN_LENGTH`]. The secure path
/// hex-encodes 64 OS-random bytes (128 characters) per block and truncates;
/// blocks are drawn until the requested length is covered, so the length
/// invariant holds for any positive value.
pub fn generate(length: u32) -> String {
    let length = if length == 0 {
        DEFAULT_TOKEN_LENGTH as usize
    } else {
        length as usize
    };

    let mut pool = String::with_capacity(length.max(FALLBACK_BLOCK_CHARS));
    while pool.len() < length {
        pool.push_str(&random_block());
    }
    pool.truncate(length);
    pool
}

/// Draws one block of random characters, preferring the OS CSPRNG.
fn random_block() -> String {
    let mut bytes = [0u8; SECURE_BLOCK_BYTES];
    match rand::rngs::OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => hex_encode(&bytes),
        Err(err) => {
            // Lower-assurance fallback: thread-local PRNG output. Uniqueness
            // is no longer guaranteed across calls.
            tracing::warn!(
                target: "formguard",
                error = %err,
                "secure entropy source unavailable, using degraded token generator"
            );
            rand::rng()
                .sample_iter(Alphanumeric)
                .take(FALLBACK_BLOCK_CHARS)
                .map(char::from)
                .collect()
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // Writing into a String cannot fail.
        let _ = write!(out, "{b:02x}");
    }
    out
}
