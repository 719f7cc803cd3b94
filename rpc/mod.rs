// ============================================================================
// RPC Module - Cross-Domain Message Channel
// ============================================================================
//
// Wire types for messages delivered by the cross-domain transport.
//
// Components:
//   - channel_envelope: Ed25519 signed envelopes for relayed settlement
//
// ============================================================================

pub mod channel_envelope;

pub use channel_envelope::*;
