//! Ed25519 signing and verification for AIP envelopes.
//!
//! Signatures cover the envelope's canonical subset (`id`, `type`, `from`,
//! `to`, `timestamp`, `payload`). Because verification recomputes the subset
//! from the envelope's current field values, any post-signing mutation of
//! those fields makes verification fail without the verifier having to keep
//! the originally signed bytes around. The trailer fields (`signature`,
//! `replyTo`, `correlationId`) never affect a signature.

#![warn(missing_docs, clippy::pedantic)]

use aip_primitives::{Envelope, canonical_payload};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::{PUBLIC_KEY_LENGTH, Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

/// Scheme tag carried in exported keys and signatures.
pub const KEY_SCHEME: &str = "ed25519";

const SCHEME_PREFIX: &str = "ed25519:";

/// Result alias for trust operations.
pub type TrustResult<T> = Result<T, TrustError>;

/// Errors surfaced while parsing key material.
#[derive(Debug, Error)]
pub enum TrustError {
    /// The key string did not carry the `ed25519:` scheme tag.
    #[error("unsupported key scheme in `{value}`")]
    UnsupportedScheme {
        /// The offending key string.
        value: String,
    },

    /// The key string was not valid base64.
    #[error("invalid base64 encoding: {source}")]
    InvalidEncoding {
        /// Decoding error from the base64 library.
        #[from]
        source: base64::DecodeError,
    },

    /// The decoded bytes were not a valid Ed25519 public key.
    #[error("invalid ed25519 key material: {reason}")]
    InvalidKey {
        /// Human-readable reason for rejection.
        reason: String,
    },
}

/// An Ed25519 key pair. The private half never leaves this struct; only the
/// public half is exported, as an opaque scheme-tagged string.
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Generates a fresh key pair from the operating system RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Returns the public half of the pair.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Exports the public half as `"ed25519:<base64>"`.
    #[must_use]
    pub fn public_key_string(&self) -> String {
        export_public_key(&self.verifying_key())
    }

    /// Signs the envelope's canonical subset with the private half.
    #[must_use]
    pub fn sign_envelope(&self, envelope: &Envelope) -> String {
        sign_envelope(envelope, &self.signing)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print private key material.
        f.debug_struct("KeyPair")
            .field("public", &self.public_key_string())
            .finish()
    }
}

/// Exports a public key as `"ed25519:<base64>"` over the raw 32 key bytes.
#[must_use]
pub fn export_public_key(key: &VerifyingKey) -> String {
    format!("{SCHEME_PREFIX}{}", BASE64.encode(key.to_bytes()))
}

/// Parses a public key exported by [`export_public_key`].
///
/// # Errors
///
/// Returns [`TrustError`] when the scheme tag is missing, the base64 is
/// malformed, or the decoded bytes are not a valid Ed25519 public key.
pub fn parse_public_key(value: &str) -> TrustResult<VerifyingKey> {
    let encoded = value
        .strip_prefix(SCHEME_PREFIX)
        .ok_or_else(|| TrustError::UnsupportedScheme {
            value: value.into(),
        })?;
    let bytes = BASE64.decode(encoded)?;
    let bytes: [u8; PUBLIC_KEY_LENGTH] =
        bytes.try_into().map_err(|_| TrustError::InvalidKey {
            reason: format!("expected {PUBLIC_KEY_LENGTH} key bytes"),
        })?;
    VerifyingKey::from_bytes(&bytes).map_err(|err| TrustError::InvalidKey {
        reason: err.to_string(),
    })
}

/// Signs the envelope's canonical subset, returning `"ed25519:<base64>"`.
#[must_use]
pub fn sign_envelope(envelope: &Envelope, key: &SigningKey) -> String {
    let signature = key.sign(canonical_payload(envelope).as_bytes());
    format!("{SCHEME_PREFIX}{}", BASE64.encode(signature.to_bytes()))
}

/// Verifies the envelope's signature against the given public key.
///
/// Returns `false` when the signature is absent, malformed, or does not match
/// the canonical subset recomputed from the envelope's current field values.
/// Never an error: an unverifiable envelope is simply unverified.
#[must_use]
pub fn verify_envelope(envelope: &Envelope, key: &VerifyingKey) -> bool {
    let Some(signature) = envelope.signature.as_deref() else {
        return false;
    };
    let encoded = signature.strip_prefix(SCHEME_PREFIX).unwrap_or(signature);
    let Ok(bytes) = BASE64.decode(encoded) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&bytes) else {
        return false;
    };
    key.verify(canonical_payload(envelope).as_bytes(), &signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aip_primitives::MessageType;
    use serde_json::json;

    fn signed_envelope(pair: &KeyPair) -> Envelope {
        let mut env = Envelope::create(
            MessageType::TaskRequest,
            "alice",
            "bob",
            json!({"capability": "echo", "input": {"text": "hi"}}),
        );
        env.signature = Some(pair.sign_envelope(&env));
        env
    }

    #[test]
    fn sign_then_verify_round_trip() {
        let pair = KeyPair::generate();
        let env = signed_envelope(&pair);
        assert!(verify_envelope(&env, &pair.verifying_key()));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let signer = KeyPair::generate();
        let other = KeyPair::generate();
        let env = signed_envelope(&signer);
        assert!(!verify_envelope(&env, &other.verifying_key()));
    }

    #[test]
    fn absent_signature_is_unverified() {
        let pair = KeyPair::generate();
        let env = Envelope::create(MessageType::Ping, "a", "b", json!({}));
        assert!(!verify_envelope(&env, &pair.verifying_key()));
    }

    #[test]
    fn mutation_after_signing_fails_verification() {
        let pair = KeyPair::generate();

        let mut env = signed_envelope(&pair);
        env.payload = json!({"capability": "echo", "input": {"text": "tampered"}});
        assert!(!verify_envelope(&env, &pair.verifying_key()));

        let mut env = signed_envelope(&pair);
        env.from = "mallory".into();
        assert!(!verify_envelope(&env, &pair.verifying_key()));

        let mut env = signed_envelope(&pair);
        env.timestamp = "2020-01-01T00:00:00Z".into();
        assert!(!verify_envelope(&env, &pair.verifying_key()));
    }

    #[test]
    fn trailer_mutation_keeps_signature_valid() {
        let pair = KeyPair::generate();
        let mut env = signed_envelope(&pair);
        env.reply_to = Some("some-other-message".into());
        env.correlation_id = Some("corr-1".into());
        assert!(verify_envelope(&env, &pair.verifying_key()));
    }

    #[test]
    fn garbage_signature_is_unverified() {
        let pair = KeyPair::generate();
        let mut env = signed_envelope(&pair);
        env.signature = Some("ed25519:!!!not-base64!!!".into());
        assert!(!verify_envelope(&env, &pair.verifying_key()));
    }

    #[test]
    fn public_key_export_parse_round_trip() {
        let pair = KeyPair::generate();
        let exported = pair.public_key_string();
        assert!(exported.starts_with("ed25519:"));
        let parsed = parse_public_key(&exported).expect("parse");
        assert_eq!(parsed, pair.verifying_key());
    }

    #[test]
    fn parse_rejects_missing_scheme() {
        let err = parse_public_key("AAAA").expect_err("should fail");
        assert!(matches!(err, TrustError::UnsupportedScheme { .. }));
    }
}
