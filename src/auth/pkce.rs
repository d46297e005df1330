//! Proof key for code exchange (RFC 7636) used by the hosted ceremonies

use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Method name the identity backend expects alongside the challenge
pub const CHALLENGE_METHOD: &str = "s256";

/// Verifier kept by the gate while the user agent is away at the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::thread_rng().gen();
        let verifier = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
        let challenge = challenge_for(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// S256 challenge of a verifier
pub fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}
