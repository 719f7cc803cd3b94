//! Signed Channel Envelopes for Cross-Domain Settlement
//!
//! Every message delivered by the cross-domain transport is wrapped in an
//! envelope signed by the channel key. The receiving side verifies the
//! signature before it looks at the payload.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A message from a remote domain, as delivered by the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEnvelope {
    /// Identifier of the originating domain (chain id)
    pub source_domain: u32,
    /// Sending contract or account on the source domain
    pub source_address: String,
    /// Sender-assigned sequence number, unique per source domain
    pub nonce: u64,
    /// Encoded payload (hex)
    pub payload: String,
    /// Ed25519 signature over the envelope digest (128 hex chars)
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    InvalidPubkey(String),
    InvalidSignature(String),
    InvalidPayload(String),
    SignatureMismatch,
}

impl std::fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvelopeError::InvalidPubkey(msg) => write!(f, "Invalid channel pubkey: {}", msg),
            EnvelopeError::InvalidSignature(msg) => write!(f, "Invalid signature: {}", msg),
            EnvelopeError::InvalidPayload(msg) => write!(f, "Invalid payload encoding: {}", msg),
            EnvelopeError::SignatureMismatch => write!(f, "Signature does not match channel key"),
        }
    }
}

impl std::error::Error for EnvelopeError {}

impl ChannelEnvelope {
    /// Build and sign an envelope (sending side, channel adapters, tests)
    pub fn seal(
        signing_key: &SigningKey,
        source_domain: u32,
        source_address: impl Into<String>,
        nonce: u64,
        payload: &[u8],
    ) -> Self {
        let source_address = source_address.into();
        let digest = digest(source_domain, &source_address, nonce, payload);
        let signature = signing_key.sign(&digest);

        ChannelEnvelope {
            source_domain,
            source_address,
            nonce,
            payload: hex::encode(payload),
            signature: hex::encode(signature.to_bytes()),
        }
    }

    pub fn payload_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        hex::decode(&self.payload).map_err(|e| EnvelopeError::InvalidPayload(e.to_string()))
    }

    /// Canonical bytes the channel key signs
    ///
    /// Format: SHA256(source_domain || nonce || address_len || address || payload)
    pub fn to_signing_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        let payload = self.payload_bytes()?;
        Ok(digest(self.source_domain, &self.source_address, self.nonce, &payload))
    }

    /// Verify the signature against the channel key
    pub fn verify(&self, channel_key: &VerifyingKey) -> Result<(), EnvelopeError> {
        let sig_bytes = hex::decode(&self.signature)
            .map_err(|e| EnvelopeError::InvalidSignature(e.to_string()))?;

        let sig_array: [u8; 64] = sig_bytes.try_into().map_err(|bytes: Vec<u8>| {
            EnvelopeError::InvalidSignature(format!("Expected 64 bytes, got {}", bytes.len()))
        })?;
        let signature = Signature::from_bytes(&sig_array);

        let signing_bytes = self.to_signing_bytes()?;
        channel_key
            .verify(&signing_bytes, &signature)
            .map_err(|_| EnvelopeError::SignatureMismatch)
    }
}

/// Parse a hex-encoded Ed25519 public key
pub fn parse_verifying_key(hex_key: &str) -> Result<VerifyingKey, EnvelopeError> {
    let bytes = hex::decode(hex_key.trim()).map_err(|e| EnvelopeError::InvalidPubkey(e.to_string()))?;

    let array: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        EnvelopeError::InvalidPubkey(format!("Expected 32 bytes, got {}", bytes.len()))
    })?;

    VerifyingKey::from_bytes(&array).map_err(|e| EnvelopeError::InvalidPubkey(e.to_string()))
}

fn digest(source_domain: u32, source_address: &str, nonce: u64, payload: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(source_domain.to_be_bytes());
    hasher.update(nonce.to_be_bytes());
    hasher.update((source_address.len() as u64).to_be_bytes());
    hasher.update(source_address.as_bytes());
    hasher.update(payload);
    hasher.finalize().to_vec()
}
