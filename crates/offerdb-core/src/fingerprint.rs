use sha2::{Digest, Sha256};

const FIELD_SEPARATOR: &str = "\u{1f}";

/// Content fingerprint of an offer: SHA-256 over the lowercased, trimmed
/// title, merchant, and validity text joined by the ASCII unit separator.
///
/// Absent fields should be passed as `""`. The result is 64 lowercase hex
/// characters and is the deduplication key for raw candidates.
#[must_use]
pub fn fingerprint(title: &str, merchant: &str, validity: &str) -> String {
    let input = [title, merchant, validity]
        .iter()
        .map(|field| field.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join(FIELD_SEPARATOR);
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
