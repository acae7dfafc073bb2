//! # PREIMAGE-SHA-256 Crypto-Conditions
//!
//! Each escrow leg is locked by a fresh 32-byte random preimage. The
//! ledger stores the condition (a SHA-256 fingerprint of the preimage); the
//! fulfillment reveals the preimage and unlocks the escrow.
//!
//! Both are the binary DER encodings from the crypto-conditions draft,
//! rendered as uppercase hex as the ledger expects:
//!
//! ```text
//! condition   = A0 25 80 20 <sha256(preimage)> 81 01 20
//! fulfillment = A0 22 80 20 <preimage>
//! ```
//!
//! The trailing `81 01 20` is the cost field, which for this type equals
//! the preimage length (32).

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

const PREIMAGE_LEN: usize = 32;
const CONDITION_PREFIX: [u8; 4] = [0xA0, 0x25, 0x80, 0x20];
const CONDITION_SUFFIX: [u8; 3] = [0x81, 0x01, PREIMAGE_LEN as u8];
const FULFILLMENT_PREFIX: [u8; 4] = [0xA0, 0x22, 0x80, 0x20];

/// A condition/fulfillment pair in ledger hex encoding.
#[derive(Clone)]
pub struct PreimageCondition {
    pub condition: String,
    pub fulfillment: String,
}

impl std::fmt::Debug for PreimageCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreimageCondition")
            .field("condition", &self.condition)
            .field("fulfillment", &"[REDACTED]")
            .finish()
    }
}

impl PreimageCondition {
    /// Generate a pair from fresh OS randomness.
    pub fn generate() -> Self {
        let mut preimage = Zeroizing::new([0u8; PREIMAGE_LEN]);
        OsRng.fill_bytes(&mut preimage[..]);
        Self::from_preimage(&preimage)
    }

    pub fn from_preimage(preimage: &[u8; PREIMAGE_LEN]) -> Self {
        Self {
            condition: encode_hex(&condition_bytes(preimage)),
            fulfillment: encode_hex(&fulfillment_bytes(preimage)),
        }
    }
}

/// Check that `fulfillment` unlocks `condition`. Both are hex; case is
/// ignored.
pub fn verify(condition: &str, fulfillment: &str) -> bool {
    let Some(bytes) = decode_hex(fulfillment) else {
        return false;
    };
    if bytes.len() != FULFILLMENT_PREFIX.len() + PREIMAGE_LEN || bytes[..4] != FULFILLMENT_PREFIX {
        return false;
    }
    let mut preimage = [0u8; PREIMAGE_LEN];
    preimage.copy_from_slice(&bytes[4..]);
    encode_hex(&condition_bytes(&preimage)).eq_ignore_ascii_case(condition)
}

fn condition_bytes(preimage: &[u8; PREIMAGE_LEN]) -> Vec<u8> {
    let fingerprint = Sha256::digest(preimage);
    let mut out = Vec::with_capacity(CONDITION_PREFIX.len() + fingerprint.len() + CONDITION_SUFFIX.len());
    out.extend_from_slice(&CONDITION_PREFIX);
    out.extend_from_slice(&fingerprint);
    out.extend_from_slice(&CONDITION_SUFFIX);
    out
}

fn fulfillment_bytes(preimage: &[u8; PREIMAGE_LEN]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FULFILLMENT_PREFIX.len() + PREIMAGE_LEN);
    out.extend_from_slice(&FULFILLMENT_PREFIX);
    out.extend_from_slice(preimage);
    out
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| s.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}
