//! NIP-19: bech32-encoded entities.
//!
//! Only the `npub` form is handled here: a 32-byte public key wrapped in a
//! BIP-173 bech32 string with the `npub` human-readable part.
//!
//! Decoding is lenient about the padding bits left over by the 5-bit to
//! 8-bit regrouping: trailing bits that do not make a whole byte are dropped
//! without checking that they are zero.

use bech32::primitives::decode::CheckedHrpstring;
use bech32::{Bech32, Hrp};
use thiserror::Error;

/// Human-readable part for npub (public key)
pub const NPUB_HRP: &str = "npub";

/// Errors that can occur during NIP-19 operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Nip19Error {
    #[error("invalid bech32 string: {0}")]
    InvalidFormat(String),

    #[error("invalid prefix: expected {expected}, got {got}")]
    InvalidPrefix { expected: String, got: String },

    #[error("invalid payload length: expected 32 bytes, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("bech32 encoding error: {0}")]
    Encode(String),
}

/// Decode an npub bech32 string to a 32-byte public key.
pub fn decode_npub(npub: &str) -> Result<[u8; 32], Nip19Error> {
    decode_bech32(NPUB_HRP, npub)
}

/// Encode a 32-byte public key as an npub bech32 string.
pub fn encode_npub(public_key: &[u8; 32]) -> Result<String, Nip19Error> {
    encode_bech32(NPUB_HRP, public_key)
}

/// Decode an npub straight to the lowercase hex form used on the wire.
pub fn npub_to_hex(npub: &str) -> Result<String, Nip19Error> {
    decode_npub(npub).map(hex::encode)
}

/// Encode a hex public key as an npub.
pub fn hex_to_npub(public_key_hex: &str) -> Result<String, Nip19Error> {
    let bytes = hex::decode(public_key_hex).map_err(|e| Nip19Error::InvalidHex(e.to_string()))?;
    let public_key: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| Nip19Error::InvalidLength(bytes.len()))?;
    encode_npub(&public_key)
}

fn encode_bech32(hrp: &str, data: &[u8; 32]) -> Result<String, Nip19Error> {
    let hrp = Hrp::parse(hrp).map_err(|e| Nip19Error::Encode(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, data).map_err(|e| Nip19Error::Encode(e.to_string()))
}

fn decode_bech32(expected_hrp: &str, encoded: &str) -> Result<[u8; 32], Nip19Error> {
    let expected = Hrp::parse(expected_hrp).map_err(|e| Nip19Error::Encode(e.to_string()))?;

    let checked = CheckedHrpstring::new::<Bech32>(encoded)
        .map_err(|e| Nip19Error::InvalidFormat(e.to_string()))?;

    let hrp = checked.hrp();
    if hrp != expected {
        return Err(Nip19Error::InvalidPrefix {
            expected: expected_hrp.to_string(),
            got: hrp.to_lowercase(),
        });
    }

    let bytes: Vec<u8> = checked.byte_iter().collect();
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| Nip19Error::InvalidLength(bytes.len()))
}
