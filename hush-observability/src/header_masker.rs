//! Header and query-parameter masking.
//!
//! Names are matched case-insensitively. Every value of a multi-valued
//! header or parameter is replaced; entries keep their original order.
//!
//! ```
//! use hush_observability::header_masker::mask_query_string;
//!
//! let names = vec!["token".to_string()];
//! assert_eq!(mask_query_string("TOKEN=abc&page=2", &names), "TOKEN=***&page=2");
//! ```

use crate::body_masker::{MASK, decode_component};
use hush_core::HeaderList;

fn is_masked(name: &str, names: &[String]) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}

/// Mask header values whose name is in `names`.
pub fn mask_headers(headers: &HeaderList, names: &[String]) -> HeaderList {
    headers
        .iter()
        .map(|(name, values)| {
            if is_masked(name, names) {
                (name.clone(), vec![MASK.to_string(); values.len()])
            } else {
                (name.clone(), values.clone())
            }
        })
        .collect()
}

/// Mask already-decoded query parameters.
pub fn mask_query_params(params: &[(String, String)], names: &[String]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| {
            if is_masked(k, names) {
                (k.clone(), MASK.to_string())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

/// Mask a raw query string (no leading `?`). Names are compared after
/// percent-decoding; unmatched pairs are left byte-for-byte.
pub fn mask_query_string(query: &str, names: &[String]) -> String {
    if names.is_empty() {
        return query.to_string();
    }
    query
        .split('&')
        .map(|pair| {
            let raw_key = pair.split_once('=').map_or(pair, |(k, _)| k);
            if !pair.is_empty() && is_masked(&decode_component(raw_key), names) {
                format!("{raw_key}={MASK}")
            } else {
                pair.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Path plus masked query.
pub fn mask_uri(path: &str, query: Option<&str>, names: &[String]) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{path}?{}", mask_query_string(q, names)),
        _ => path.to_string(),
    }
}
