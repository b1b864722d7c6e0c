//! SHA-1 request signatures
//!
//! The platform signs by sorting the inputs, concatenating them and hashing the result.
//! Inbound callbacks are checked with [`sign`] over `(token, timestamp, nonce)`; outbound
//! JS-SDK signatures use [`sign_with_ampersand`] over `key=value` pairs.

use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

/// Sort `parts`, concatenate them with no separator and return the lowercase hex SHA-1
pub fn sign<S: AsRef<str>>(parts: &[S]) -> String {
    digest(&sorted(parts).concat())
}

/// Sort `parts`, join them with `&` and return the lowercase hex SHA-1
pub fn sign_with_ampersand<S: AsRef<str>>(parts: &[S]) -> String {
    digest(&sorted(parts).join("&"))
}

/// Compare `signature` against [`sign`] of `parts` in constant time
pub fn verify<S: AsRef<str>>(signature: &str, parts: &[S]) -> bool {
    let expected = sign(parts);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

fn sorted<S: AsRef<str>>(parts: &[S]) -> Vec<&str> {
    let mut parts: Vec<&str> = parts.iter().map(|part| part.as_ref()).collect();
    parts.sort_unstable();
    parts
}

fn digest(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
