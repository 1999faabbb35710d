//! Sender identity normalization and format checks
//!
//! Identities are opaque credential strings accepted in two encodings: the
//! bech32-style `npub1...` form and raw hex (optionally `0x`-prefixed).
//! Equality and allow-list membership are defined on the normalized form
//! only. Full identity values are sensitive and must never be surfaced in
//! diagnostics; use [`short_identity`] wherever one needs to be displayed.

use once_cell::sync::Lazy;
use regex::Regex;

/// Bech32-style public identity: `npub1` followed by at least 58 lowercase
/// alphanumerics.
static NPUB_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^npub1[a-z0-9]{58,}$").unwrap());

/// Raw public key: 64 hex digits after normalization.
static HEX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-f]{64}$").unwrap());

/// Normalize an identity for comparison: trim, lowercase, strip a leading
/// `0x`. Idempotent for every accepted encoding.
pub fn normalize(identity: &str) -> String {
    let lowered = identity.trim().to_lowercase();
    match lowered.strip_prefix("0x") {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

/// Check whether a normalized identity is in one of the accepted encodings.
pub fn is_valid_format(normalized: &str) -> bool {
    NPUB_RE.is_match(normalized) || HEX_RE.is_match(normalized)
}

/// Truncated display form (`npub1abc...xyz`) safe to log.
///
/// Truncates on char boundaries so malformed multibyte input cannot panic.
pub fn short_identity(identity: &str) -> String {
    let count = identity.chars().count();
    if count <= 16 {
        return identity.to_string();
    }
    let head: String = identity.chars().take(12).collect();
    let tail: String = identity.chars().skip(count - 4).collect();
    format!("{head}...{tail}")
}
