//! Cache key derivation.
//!
//! A key is `search:{keyword}:{platforms sorted by id, comma joined}:{limit}`
//! encoded as unpadded URL-safe base64, so the same request always maps to the
//! same token no matter which order the caller listed the platforms in. The
//! encoding is reversible, which keeps distinct requests on distinct keys.

use crate::domain::Platform;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

const PREFIX: &str = "search";

pub fn derive_key(keyword: &str, platforms: &[Platform], limit: u32) -> String {
    let mut ids: Vec<&str> = platforms.iter().map(Platform::as_str).collect();
    ids.sort_unstable();
    ids.dedup();

    let raw = format!("{}:{}:{}:{}", PREFIX, keyword, ids.join(","), limit);
    URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

/// Recover `(keyword, platforms, limit)` from a key made by [`derive_key`]
pub fn decode_key(key: &str) -> Option<(String, Vec<Platform>, u32)> {
    let bytes = URL_SAFE_NO_PAD.decode(key).ok()?;
    let raw = String::from_utf8(bytes).ok()?;

    let rest = raw.strip_prefix(PREFIX)?.strip_prefix(':')?;
    // keyword may itself contain ':', platform ids and the limit never do
    let (rest, limit) = rest.rsplit_once(':')?;
    let (keyword, ids) = rest.rsplit_once(':')?;

    let limit = limit.parse().ok()?;
    let platforms = ids
        .split(',')
        .map(|id| id.parse::<Platform>().ok())
        .collect::<Option<Vec<_>>>()?;

    Some((keyword.to_string(), platforms, limit))
}
