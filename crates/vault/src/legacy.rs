//! Detection and decoding of the pre-encryption payload format.
//!
//! Early records stored `base64(JSON object)` with no encryption at all.
//! Such payloads start with `eyJ` (base64 of `{"`) and are short; modern
//! envelopes start with the cipher version byte and never match.

use {
    base64::{
        Engine, alphabet,
        engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    },
    strongbox_crypto::{CryptoError, Credentials},
    zeroize::Zeroizing,
};

/// Base64 of `{"`.
pub const LEGACY_PREFIX: &str = "eyJ";

/// Payloads at or above this length are never treated as legacy.
pub const LEGACY_MAX_LEN: usize = 500;

/// Standard alphabet, padding optional.
const LEGACY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Whether `payload` is a legacy base64-JSON record.
///
/// True only when the prefix matches, the length is under
/// [`LEGACY_MAX_LEN`], and the payload decodes to a JSON object. Any decode
/// or parse failure means "modern ciphertext".
pub fn is_legacy_base64(payload: &str) -> bool {
    payload.starts_with(LEGACY_PREFIX)
        && payload.len() < LEGACY_MAX_LEN
        && decode_legacy(payload).is_ok()
}

/// Recover the plaintext mapping from a legacy payload.
pub fn decode_legacy(payload: &str) -> Result<Credentials, CryptoError> {
    let bytes = Zeroizing::new(LEGACY_ENGINE.decode(payload)?);
    Ok(serde_json::from_slice(&bytes)?)
}
