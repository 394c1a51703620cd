use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;

use crate::snapshot::RequestSnapshot;

/// Fixed-shape features computed from one request snapshot.
///
/// The numeric fields feed both the external scorer and the cache-key
/// derivation. `client_addr` and `ts` are volatile context: they ride along
/// in the scorer payload but are excluded from the signature so that
/// structurally identical requests from different clients or times share a
/// cache entry.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureVector {
    pub path_length: usize,
    pub body_size: usize,
    pub query_params: usize,
    pub header_count: usize,
    pub special_chars: usize,
    pub method_post: u8,
    pub payload_entropy: f64,
    pub client_addr: String,
    pub ts: i64,
}

/// Derive the feature vector for a snapshot. Total: malformed bodies and
/// absent headers degrade to zero/empty values, never to an error.
pub fn extract(snapshot: &RequestSnapshot) -> FeatureVector {
    let combined = format!("{} {}", snapshot.body_text(), snapshot.query_text());

    FeatureVector {
        path_length: snapshot.path.len(),
        body_size: snapshot.body.len(),
        query_params: snapshot.query().len(),
        header_count: snapshot.headers().len(),
        special_chars: special_char_count(&combined),
        method_post: snapshot.method.eq_ignore_ascii_case("POST") as u8,
        payload_entropy: shannon_entropy(&combined),
        client_addr: snapshot.client_identity(),
        ts: Utc::now().timestamp_millis(),
    }
}

/// Count of characters that are neither alphanumeric nor whitespace.
pub fn special_char_count(s: &str) -> usize {
    s.chars()
        .filter(|c| !c.is_ascii_alphanumeric() && !c.is_whitespace())
        .count()
}

/// Base-2 Shannon entropy over characters, rounded to two decimals so the
/// value serializes identically for cache-key derivation.
pub fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for ch in s.chars() {
        *freq.entry(ch).or_insert(0) += 1;
    }

    let len = s.chars().count() as f64;
    let entropy: f64 = freq
        .values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum();

    (entropy * 100.0).round() / 100.0
}
