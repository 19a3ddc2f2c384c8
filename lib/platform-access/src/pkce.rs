//! PKCE (RFC 7636) verifier/challenge generation and the CSRF state token.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Random bytes behind a verifier; 32 bytes encode to 43 base64url chars,
/// the RFC 7636 minimum length.
const VERIFIER_BYTES: usize = 32;

const STATE_BYTES: usize = 32;

/// How the code challenge is derived from the verifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    #[default]
    #[serde(rename = "S256")]
    S256,
    #[serde(rename = "plain")]
    Plain,
}

impl CodeChallengeMethod {
    /// The value sent as `code_challenge_method`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

impl fmt::Display for CodeChallengeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates a fresh high-entropy code verifier.
#[must_use]
pub fn generate_verifier() -> String {
    random_token(VERIFIER_BYTES)
}

/// Computes the `S256` challenge: `BASE64URL(SHA256(verifier))`.
#[must_use]
pub fn compute_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Derives the challenge for the given method.
#[must_use]
pub fn challenge_for(method: CodeChallengeMethod, verifier: &str) -> String {
    match method {
        CodeChallengeMethod::S256 => compute_challenge(verifier),
        CodeChallengeMethod::Plain => verifier.to_string(),
    }
}

/// Generates an anti-CSRF `state` value.
#[must_use]
pub fn generate_state() -> String {
    random_token(STATE_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_meets_minimum_length_and_alphabet() {
        let verifier = generate_verifier();
        assert!(verifier.len() >= 43);
        assert!(
            verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn verifiers_are_random() {
        assert_ne!(generate_verifier(), generate_verifier());
    }

    #[test]
    fn challenge_matches_rfc7636_appendix_b() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            compute_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn challenge_is_deterministic() {
        let verifier = generate_verifier();
        assert_eq!(compute_challenge(&verifier), compute_challenge(&verifier));
    }

    #[test]
    fn plain_challenge_is_the_verifier() {
        let verifier = generate_verifier();
        assert_eq!(challenge_for(CodeChallengeMethod::Plain, &verifier), verifier);
        assert_eq!(
            challenge_for(CodeChallengeMethod::S256, &verifier),
            compute_challenge(&verifier)
        );
    }

    #[test]
    fn method_serde_uses_wire_names() {
        let json = serde_json::to_string(&CodeChallengeMethod::S256).expect("serialize");
        assert_eq!(json, "\"S256\"");
        let plain: CodeChallengeMethod = serde_json::from_str("\"plain\"").expect("deserialize");
        assert_eq!(plain, CodeChallengeMethod::Plain);
    }
}
