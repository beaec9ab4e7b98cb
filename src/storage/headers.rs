//! Flattened header encoding for durable records.
//!
//! Headers are stored as `key:value` pairs joined by commas. The format has no
//! escaping: a value containing a comma is split on replay. None of the
//! headers the pipeline sends carry commas.

/// Joins headers into `key:value,key:value`.
pub fn flatten_headers(headers: &[(String, String)]) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses the output of `flatten_headers`.
///
/// Splits each pair on its first colon, so values may contain colons.
/// Malformed fragments without a colon are skipped with a warning.
pub fn parse_flattened_headers(flattened: &str) -> Vec<(String, String)> {
    flattened
        .split(',')
        .filter(|pair| !pair.trim().is_empty())
        .filter_map(|pair| match pair.split_once(':') {
            Some((name, value)) => Some((name.trim().to_string(), value.trim().to_string())),
            None => {
                log::warn!("Skipping malformed stored header fragment: {pair}");
                None
            }
        })
        .collect()
}
