use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fmt::Write as _;

use super::FeatureVector;

const KEY_LEN: usize = 32;

/// Opaque cache key derived from the stable feature fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureKey(String);

impl SignatureKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fields that participate in the signature. Client address and
/// timestamp are deliberately absent: requests that differ only in who sent
/// them or when must collide.
#[derive(Serialize)]
struct StableFields {
    path_length: usize,
    body_size: usize,
    query_params: usize,
    header_count: usize,
    special_chars: usize,
    method_post: u8,
    payload_entropy: f64,
}

/// Map a feature vector to its cache key: canonical JSON of the stable
/// fields, SHA-256, hex, truncated.
///
/// Never fails. If serialization does, the request gets a one-shot random
/// key; it still flows through the pipeline, it just cannot produce a
/// cache hit.
pub fn signature(features: &FeatureVector) -> SignatureKey {
    let stable = StableFields {
        path_length: features.path_length,
        body_size: features.body_size,
        query_params: features.query_params,
        header_count: features.header_count,
        special_chars: features.special_chars,
        method_post: features.method_post,
        payload_entropy: features.payload_entropy,
    };

    match serde_json::to_vec(&stable) {
        Ok(canonical) => {
            let digest = Sha256::digest(&canonical);
            let mut hex = String::with_capacity(KEY_LEN);
            for byte in digest.iter().take(KEY_LEN / 2) {
                let _ = write!(hex, "{:02x}", byte);
            }
            SignatureKey(hex)
        }
        Err(err) => {
            log::debug!("signature serialization failed, using one-shot key: {err}");
            let mut rng = rand::thread_rng();
            SignatureKey(format!("{:016x}{:016x}", rng.gen::<u64>(), rng.gen::<u64>()))
        }
    }
}
