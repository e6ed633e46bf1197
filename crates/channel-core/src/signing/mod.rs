//! Ephemeral session-key signing.
//!
//! Each participant authorizes state updates with a throwaway secp256k1
//! keypair created at session start. Signatures are recoverable ECDSA
//! over the keccak-256 digest of the payload's canonical bytes, encoded
//! as 65-byte `r || s || v` hex with v in {27, 28}, the encoding the
//! clearing node verifies against the EVM-style address derived from the
//! key.

mod quorum;

pub use quorum::{quorum_envelope, sign_envelope};

use crate::errors::ChannelError;
use crate::protocol::RpcPayload;
use crate::types::Address;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};
use std::fmt;

/// An ephemeral signing key: the secret plus its derived address.
#[derive(Clone)]
pub struct SessionKey {
    address: Address,
    secret: SecretKey,
}

impl SessionKey {
    /// Generate a fresh random session key.
    pub fn generate() -> Self {
        let secret = SecretKey::new(&mut rand::thread_rng());
        Self::from_secret(secret)
    }

    /// Rebuild a session key from raw secret bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChannelError> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| ChannelError::Signing(format!("invalid secret key: {}", e)))?;
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(&secp, &secret);
        SessionKey {
            address: derive_address(&public),
            secret,
        }
    }

    /// The EVM-style address this key signs as.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Sign a request payload. Deterministic: the same key over the same
    /// canonical bytes always yields the same signature.
    pub fn sign(&self, payload: &RpcPayload) -> Result<String, ChannelError> {
        let digest = payload_digest(payload)?;
        let secp = Secp256k1::new();
        let message = Message::from_digest(digest);
        let recoverable = secp.sign_ecdsa_recoverable(&message, &self.secret);
        Ok(encode_signature(&recoverable))
    }
}

impl fmt::Debug for SessionKey {
    // Never print the secret.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Keccak-256 digest of the payload's canonical bytes.
fn payload_digest(payload: &RpcPayload) -> Result<[u8; 32], ChannelError> {
    let bytes = payload.canonical_bytes()?;
    let mut hasher = Keccak256::new();
    hasher.update(&bytes);
    Ok(hasher.finalize().into())
}

/// Keccak address derivation: last 20 bytes of the digest of the
/// uncompressed public key (tag byte stripped).
fn derive_address(public: &PublicKey) -> Address {
    let uncompressed = public.serialize_uncompressed();
    let mut hasher = Keccak256::new();
    hasher.update(&uncompressed[1..]);
    let digest = hasher.finalize();
    Address::from_raw(format!("0x{}", hex::encode(&digest[12..])))
}

fn encode_signature(recoverable: &RecoverableSignature) -> String {
    let (recovery_id, compact) = recoverable.serialize_compact();
    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&compact);
    out[64] = (recovery_id.to_i32() + 27) as u8;
    format!("0x{}", hex::encode(out))
}

/// Recover the signing address from a signature over `payload`.
pub fn recover_signer(payload: &RpcPayload, signature: &str) -> Result<Address, ChannelError> {
    let raw = hex::decode(signature.trim_start_matches("0x"))
        .map_err(|e| ChannelError::Signing(format!("invalid signature hex: {}", e)))?;
    if raw.len() != 65 {
        return Err(ChannelError::Signing(format!(
            "expected 65-byte signature, got {}",
            raw.len()
        )));
    }
    let recovery_id = RecoveryId::from_i32(i32::from(raw[64]) - 27)
        .map_err(|e| ChannelError::Signing(format!("invalid recovery id: {}", e)))?;
    let recoverable = RecoverableSignature::from_compact(&raw[..64], recovery_id)
        .map_err(|e| ChannelError::Signing(format!("invalid signature: {}", e)))?;

    let digest = payload_digest(payload)?;
    let secp = Secp256k1::new();
    let message = Message::from_digest(digest);
    let public = secp
        .recover_ecdsa(&message, &recoverable)
        .map_err(|e| ChannelError::Signing(format!("recovery failed: {}", e)))?;
    Ok(derive_address(&public))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Method;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn generated_keys_have_evm_addresses() {
        let key = SessionKey::generate();
        let address = key.address().as_str();
        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 42);
        // Self-validating: parse must accept a derived address.
        Address::parse(address).unwrap();
    }

    #[test]
    fn signatures_are_deterministic_and_recoverable() {
        let key = SessionKey::generate();
        let payload = RpcPayload::new(1, Method::SubmitAppState, json!({"x": 1}));

        let first = key.sign(&payload).unwrap();
        let second = key.sign(&payload).unwrap();
        assert_eq!(first, second);

        let recovered = recover_signer(&payload, &first).unwrap();
        assert!(recovered.matches(key.address()));
    }

    #[test]
    fn tampered_payload_recovers_a_different_signer() {
        let key = SessionKey::generate();
        let payload = RpcPayload::new(1, Method::SubmitAppState, json!({"amount": "0.001000"}));
        let signature = key.sign(&payload).unwrap();

        let mut tampered = payload.clone();
        tampered.params = json!({"amount": "0.999999"});

        let recovered = recover_signer(&tampered, &signature).unwrap();
        assert!(!recovered.matches(key.address()));
    }

    #[test]
    fn from_secret_bytes_round_trips() {
        let key = SessionKey::generate();
        let rebuilt = SessionKey::from_secret_bytes(&key.secret.secret_bytes()).unwrap();
        assert_eq!(rebuilt.address(), key.address());
    }

    #[test]
    fn rejects_garbage_secret_bytes() {
        assert!(SessionKey::from_secret_bytes(&[0u8; 32]).is_err());
        assert!(SessionKey::from_secret_bytes(&[1u8; 7]).is_err());
    }
}
