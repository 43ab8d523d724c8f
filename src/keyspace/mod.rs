//! Key/region codec.
//!
//! Maps a (raw key, region) pair to a single cache key and back. The region
//! rides in a length-prefixed segment, so no literal key byte sequence can
//! be mistaken for it: `r{region_len}:{region}:{trimmed_key}`. Leading and
//! trailing whitespace on the raw key is trimmed before marshaling;
//! everything else is case- and whitespace-sensitive.
//!
//! `unmarshal` is the exact left inverse of `marshal` for every key it
//! produces: `unmarshal(marshal(k, r)) == (trim(k), r)`.

/// Region applied when the caller does not name one.
pub const DEFAULT_REGION: &str = "Default_Region";

/// Resolve an optional region to the effective region name.
pub fn region_or_default(region: Option<&str>) -> &str {
    match region {
        Some(r) if !r.trim().is_empty() => r,
        _ => DEFAULT_REGION,
    }
}

/// Marshal a (raw key, region) pair into a single cache key.
pub fn marshal(raw_key: &str, region: Option<&str>) -> String {
    let region = region_or_default(region);
    let key = raw_key.trim();
    format!("r{}:{}:{}", region.len(), region, key)
}

/// Recover `(raw_key, region)` from a marshaled cache key.
///
/// Returns `None` for strings not produced by [`marshal`].
pub fn unmarshal(cache_key: &str) -> Option<(String, String)> {
    let rest = cache_key.strip_prefix('r')?;
    let (len_str, rest) = rest.split_once(':')?;
    let region_len: usize = len_str.parse().ok()?;

    let (region, rest) = rest.split_at_checked(region_len)?;
    let raw_key = rest.strip_prefix(':')?;

    Some((raw_key.to_string(), region.to_string()))
}
