//! P_SHA1 key derivation (RFC 2246 §5) for WS-Trust computed keys.
//!
//! ```text
//! P_SHA1(secret, seed) = HMAC_SHA1(secret, A(1) + seed) +
//!                        HMAC_SHA1(secret, A(2) + seed) + ...
//! A(0) = seed
//! A(i) = HMAC_SHA1(secret, A(i-1))
//! ```
//!
//! A WS-Trust computed key is `P_SHA1(requester entropy, issuer entropy)`
//! truncated to the negotiated key size.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use zeroize::Zeroize;

use crate::error::ProtocolError;
use crate::model::SecretBytes;

type HmacSha1 = Hmac<Sha1>;

const SHA1_OUTPUT_LEN: usize = 20;

/// Upper bound on a computed key. The size comes from the issuer, so it is
/// capped before anything is allocated.
pub const MAX_COMPUTED_KEY_BITS: u32 = 4096;

/// Expands `secret` and `seed` into `len` pseudorandom bytes.
pub fn p_sha1(secret: &[u8], seed: &[u8], len: usize) -> Result<SecretBytes, ProtocolError> {
    let keyed = <HmacSha1 as Mac>::new_from_slice(secret)
        .map_err(|e| ProtocolError::KeyDerivation(e.to_string()))?;

    let mut output = Vec::with_capacity(len + SHA1_OUTPUT_LEN);
    let mut a = seed.to_vec();

    while output.len() < len {
        let mut mac = keyed.clone();
        mac.update(&a);
        let next = mac.finalize().into_bytes();
        a.zeroize();
        a = next.to_vec();

        let mut mac = keyed.clone();
        mac.update(&a);
        mac.update(seed);
        output.extend_from_slice(&mac.finalize().into_bytes());
    }

    a.zeroize();
    output[len..].zeroize();
    output.truncate(len);
    Ok(SecretBytes::new(output))
}

/// Combines requester and issuer entropy into a `key_size_bits` proof key.
pub fn compute_combined_key(
    requester_entropy: &[u8],
    issuer_entropy: &[u8],
    key_size_bits: u32,
) -> Result<SecretBytes, ProtocolError> {
    if key_size_bits == 0 || key_size_bits % 8 != 0 || key_size_bits > MAX_COMPUTED_KEY_BITS {
        return Err(ProtocolError::InvalidKeySize(key_size_bits));
    }
    p_sha1(
        requester_entropy,
        issuer_entropy,
        (key_size_bits / 8) as usize,
    )
}
