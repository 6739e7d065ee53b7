// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Challenge tokens and login proofs.
//!
//! proof = hex(SHA256(secret || challenge))

use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::error::AuthError;

/// Random bytes per challenge or session id.
pub const TOKEN_BYTES: usize = 32;

/// 32 random bytes from the system CSPRNG, hex-encoded (64 chars).
pub fn random_token(rng: &SystemRandom) -> Result<String, AuthError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill(&mut bytes)
        .map_err(|_| AuthError::Internal("system randomness unavailable".to_string()))?;
    Ok(hex::encode(bytes))
}

/// The answer a client holding `secret` gives for `challenge`.
pub fn expected_proof(secret: &str, challenge: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(challenge.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of a submitted answer with the expected proof.
/// Hex case is ignored.
pub fn proof_matches(expected: &str, answer: &str) -> bool {
    let answer = answer.trim().to_ascii_lowercase();
    expected.as_bytes().ct_eq(answer.as_bytes()).into()
}
