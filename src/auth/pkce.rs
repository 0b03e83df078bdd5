//! Per-session `state` and PKCE (RFC 7636, S256) material.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Anti-forgery `state` plus the PKCE verifier/challenge pair for one attempt.
#[derive(Clone)]
pub struct AuthorizationSecrets {
    pub state: String,
    pub code_verifier: String,
    pub code_challenge: String,
}

impl AuthorizationSecrets {
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = compute_code_challenge(&code_verifier);
        Self {
            state: random_hex(16),
            code_verifier,
            code_challenge,
        }
    }
}

// The verifier never shows up in logs.
impl std::fmt::Debug for AuthorizationSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationSecrets")
            .field("state", &self.state)
            .field("code_verifier", &"..")
            .field("code_challenge", &self.code_challenge)
            .finish()
    }
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    for chunk in buf.chunks_mut(16) {
        let id = uuid::Uuid::new_v4();
        let len = chunk.len();
        chunk.copy_from_slice(&id.as_bytes()[..len]);
    }
    buf
}

fn random_hex(byte_count: usize) -> String {
    let bytes: [u8; 32] = random_bytes();
    bytes[..byte_count.min(32)]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn generate_code_verifier() -> String {
    let bytes: [u8; 32] = random_bytes();
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn compute_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
