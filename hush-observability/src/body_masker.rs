//! Body masking for logged payloads.
//!
//! JSON bodies are masked structurally and recursively: a matching key is
//! replaced at any depth, including inside arrays, and its whole value
//! (scalar, object or array) becomes [`MASK`]. Form bodies are masked pair by
//! pair. Body keys are compared exactly (case-sensitive).
//!
//! Numbers keep their original text, so values that are not masked come out
//! exactly as they went in. A document that repeats a key inside one object
//! would lose the duplicate on a structural pass, so it is treated like a
//! malformed one.
//!
//! Nothing here fails. A body that cannot be parsed is masked with a
//! best-effort pass over `"key": value` pairs instead.
//!
//! ```
//! use hush_core::BodyType;
//! use hush_observability::body_masker::mask;
//!
//! let keys = vec!["password".to_string()];
//! let masked = mask(r#"{"password":"1234","user":"bob"}"#, BodyType::Json, &keys);
//! assert_eq!(masked, r#"{"password":"***","user":"bob"}"#);
//! ```

use crate::multipart;
use hush_core::{BodyType, HushError, LogSettings};
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Replacement for every masked value.
pub const MASK: &str = "***";

type MaskFn = fn(&str, &[String]) -> String;

// Strategy table: one masking function per body encoding.
fn strategy(body_type: BodyType) -> MaskFn {
    match body_type {
        BodyType::Json => mask_json,
        BodyType::Form => mask_form,
        BodyType::Multipart | BodyType::Other => passthrough,
    }
}

fn passthrough(body: &str, _keys: &[String]) -> String {
    body.to_string()
}

/// Mask `body` according to its type. Idempotent.
pub fn mask(body: &str, body_type: BodyType, keys: &[String]) -> String {
    if keys.is_empty() || body.is_empty() {
        return body.to_string();
    }
    strategy(body_type)(body, keys)
}

/// Truncate to `max_body_size` bytes, mask, then append the truncation marker.
///
/// Multipart bodies need their boundary; use [`render_body`] for those.
pub fn mask_body(body: &[u8], body_type: BodyType, keys: &[String], max_body_size: usize) -> String {
    let (text, truncated) = truncate(body, max_body_size);
    let mut out = mask(&text, body_type, keys);
    if truncated {
        out.push_str(&truncation_marker(body.len()));
    }
    out
}

/// Render a captured body for one side of an exchange, honouring the side's
/// size limit and mask keys.
pub fn render_body(body: &[u8], content_type: Option<&str>, settings: &LogSettings) -> String {
    let body_type = BodyType::from_content_type(content_type);
    let keys = settings.mask.body_keys_for(body_type);

    if body_type == BodyType::Multipart {
        if let Some(boundary) = multipart::boundary(content_type) {
            return multipart::render(body, &boundary, keys, settings.max_body_size);
        }
        debug!("multipart body without boundary, logging as text");
    }

    mask_body(body, body_type, keys, settings.max_body_size)
}

/// Render the first bytes of a body whose rest was never captured. `total`
/// is the full length when the adapter knew it.
pub fn render_body_prefix(
    prefix: &[u8],
    total: Option<usize>,
    content_type: Option<&str>,
    settings: &LogSettings,
) -> String {
    let (text, _) = truncate(prefix, settings.max_body_size);
    let mut out = render_body(text.as_bytes(), content_type, settings);
    match total {
        Some(total) => out.push_str(&truncation_marker(total)),
        None => out.push_str(&format!(" <TRUNCATED {}+ bytes>", prefix.len())),
    }
    out
}

/// ` <TRUNCATED n bytes>`, where `n` is the full body length.
pub fn truncation_marker(full_len: usize) -> String {
    format!(" <TRUNCATED {full_len} bytes>")
}

/// Cut to at most `max` bytes without splitting a UTF-8 sequence.
pub(crate) fn truncate(body: &[u8], max: usize) -> (Cow<'_, str>, bool) {
    if body.len() <= max {
        return (String::from_utf8_lossy(body), false);
    }
    let mut cut = &body[..max];
    if let Err(e) = std::str::from_utf8(cut) {
        if e.error_len().is_none() {
            cut = &cut[..e.valid_up_to()];
        }
    }
    (String::from_utf8_lossy(cut), true)
}

// ── JSON ──────────────────────────────────────────────────────

/// Structural JSON masking. Fails on malformed input and on objects with a
/// repeated key.
pub fn try_mask_json(body: &str, keys: &[String]) -> Result<String, HushError> {
    serde_json::from_str::<UniqueKeys>(body)
        .map_err(|e| HushError::body_parse(BodyType::Json, e.to_string()))?;
    let mut value: Value =
        serde_json::from_str(body).map_err(|e| HushError::body_parse(BodyType::Json, e.to_string()))?;
    mask_value(&mut value, keys);
    Ok(serde_json::to_string(&value)?)
}

/// Walks a JSON document and rejects any object that repeats a key.
struct UniqueKeys;

impl<'de> Deserialize<'de> for UniqueKeys {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(UniqueKeysVisitor)
    }
}

struct UniqueKeysVisitor;

impl<'de> Visitor<'de> for UniqueKeysVisitor {
    type Value = UniqueKeys;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_unit<E: de::Error>(self) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<UniqueKeys, A::Error> {
        while seq.next_element::<UniqueKeys>()?.is_some() {}
        Ok(UniqueKeys)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<UniqueKeys, A::Error> {
        let mut seen = HashSet::new();
        while let Some(key) = map.next_key::<String>()? {
            if seen.contains(&key) {
                return Err(de::Error::custom(format!("duplicate key `{key}`")));
            }
            map.next_value::<UniqueKeys>()?;
            seen.insert(key);
        }
        Ok(UniqueKeys)
    }
}

fn mask_json(body: &str, keys: &[String]) -> String {
    match try_mask_json(body, keys) {
        Ok(masked) => masked,
        Err(e) => {
            debug!(error = %e, "JSON body not parseable, using regex masking");
            mask_json_fallback(body, keys)
        }
    }
}

fn mask_value(value: &mut Value, keys: &[String]) {
    match value {
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                if keys.iter().any(|m| m == k) {
                    *v = Value::String(MASK.to_string());
                } else {
                    mask_value(v, keys);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                mask_value(item, keys);
            }
        }
        _ => {}
    }
}

/// Masking for JSON that does not parse, e.g. a body cut by truncation.
/// A regex finds each `"key":` and the value after it is skipped by hand:
/// strings to their closing quote, objects and arrays to the matching
/// bracket, either one to the end of input when it is cut off.
fn mask_json_fallback(body: &str, keys: &[String]) -> String {
    let alternatives = keys
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    let re = match Regex::new(&format!(r#""(?P<key>{alternatives})"\s*:\s*"#)) {
        Ok(re) => re,
        Err(e) => {
            debug!(error = %e, "could not build fallback mask pattern");
            return body.to_string();
        }
    };

    let mut out = String::with_capacity(body.len());
    let mut pos = 0;
    while let Some(caps) = re.captures_at(body, pos) {
        let Some(found) = caps.get(0) else { break };
        out.push_str(&body[pos..found.start()]);
        out.push_str(&format!("\"{}\":\"{MASK}\"", &caps["key"]));
        pos = found.end() + json_value_len(&body[found.end()..]);
    }
    out.push_str(&body[pos..]);
    out
}

/// Byte length of the JSON value at the start of `rest`.
fn json_value_len(rest: &str) -> usize {
    let bytes = rest.as_bytes();
    match bytes.first() {
        None => 0,
        Some(b'"') => string_len(bytes),
        Some(b'{' | b'[') => {
            let mut depth = 0usize;
            let mut i = 0;
            while i < bytes.len() {
                match bytes[i] {
                    b'"' => {
                        i += string_len(&bytes[i..]);
                        continue;
                    }
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            return i + 1;
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
            bytes.len()
        }
        Some(_) => bytes
            .iter()
            .position(|b| matches!(b, b',' | b'}' | b']') || b.is_ascii_whitespace())
            .unwrap_or(bytes.len()),
    }
}

/// Length of the string literal opening `bytes`, closing quote included.
fn string_len(bytes: &[u8]) -> usize {
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

// ── Form ──────────────────────────────────────────────────────

/// Mask `application/x-www-form-urlencoded` pairs. Keys are compared after
/// percent-decoding; unmatched pairs keep their raw text and order.
pub fn mask_form(body: &str, keys: &[String]) -> String {
    body.split('&')
        .map(|pair| {
            if pair.is_empty() {
                return Cow::Borrowed(pair);
            }
            let raw_key = pair.split_once('=').map_or(pair, |(k, _)| k);
            let key = decode_component(raw_key);
            if keys.iter().any(|m| *m == key) {
                Cow::Owned(format!("{raw_key}={MASK}"))
            } else {
                Cow::Borrowed(pair)
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Decode one `application/x-www-form-urlencoded` component.
pub(crate) fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(k: &[&str]) -> Vec<String> {
        k.iter().map(|s| s.to_string()).collect()
    }

    // ── JSON ─────────────────────────────────────────────────────

    #[test]
    fn json_top_level_key_is_masked() {
        let out = mask(r#"{"password":"1234","user":"bob"}"#, BodyType::Json, &keys(&["password"]));
        assert_eq!(out, r#"{"password":"***","user":"bob"}"#);
    }

    #[test]
    fn json_nested_and_array_keys_are_masked() {
        let body = r#"{"user":{"name":"bob","token":"t1"},"items":[{"token":"t2"},{"id":3}]}"#;
        let out = mask(body, BodyType::Json, &keys(&["token"]));
        assert_eq!(
            out,
            r#"{"user":{"name":"bob","token":"***"},"items":[{"token":"***"},{"id":3}]}"#
        );
    }

    #[test]
    fn json_object_value_is_masked_whole() {
        let out = mask(r#"{"secret":{"a":1},"n":2}"#, BodyType::Json, &keys(&["secret"]));
        assert_eq!(out, r#"{"secret":"***","n":2}"#);
    }

    #[test]
    fn json_keys_are_case_sensitive() {
        let out = mask(r#"{"Password":"x"}"#, BodyType::Json, &keys(&["password"]));
        assert_eq!(out, r#"{"Password":"x"}"#);
    }

    #[test]
    fn json_preserves_field_order() {
        let out = mask(r#"{"z":1,"password":"p","a":2}"#, BodyType::Json, &keys(&["password"]));
        assert_eq!(out, r#"{"z":1,"password":"***","a":2}"#);
    }

    #[test]
    fn json_output_stays_valid() {
        let out = mask(r#"{"code":123,"list":[1,2]}"#, BodyType::Json, &keys(&["code"]));
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["code"], "***");
        assert_eq!(parsed["list"], serde_json::json!([1, 2]));
    }

    #[test]
    fn malformed_json_uses_regex_fallback() {
        let out = mask(r#"{"password": "1234", "user": "bob""#, BodyType::Json, &keys(&["password"]));
        assert_eq!(out, r#"{"password":"***", "user": "bob""#);
    }

    #[test]
    fn fallback_masks_unterminated_string() {
        let out = mask(r#"{"user":"bob","token":"abcd"#, BodyType::Json, &keys(&["token"]));
        assert_eq!(out, r#"{"user":"bob","token":"***""#);
    }

    #[test]
    fn fallback_masks_bare_values() {
        let out = mask(r#"{"code": 42, "x": 1"#, BodyType::Json, &keys(&["code"]));
        assert_eq!(out, r#"{"code":"***", "x": 1"#);
    }

    #[test]
    fn fallback_masks_object_and_array_values_whole() {
        let out = mask(
            r#"{"secret": {"pin": 1234, "note": "a}b"}, "token": [1, [2]], "x": 1"#,
            BodyType::Json,
            &keys(&["secret", "token"]),
        );
        assert_eq!(out, r#"{"secret":"***", "token":"***", "x": 1"#);
    }

    #[test]
    fn fallback_masks_cut_off_object_to_end() {
        let out = mask(r#"{"user":"bob","secret":{"pin":1234,"cvv""#, BodyType::Json, &keys(&["secret"]));
        assert_eq!(out, r#"{"user":"bob","secret":"***""#);
    }

    #[test]
    fn json_numbers_keep_their_text() {
        let body = r#"{"id":123456789012345678901234567890,"amount":0.1000000000000000055511151231257827,"password":"p"}"#;
        let out = mask(body, BodyType::Json, &keys(&["password"]));
        assert_eq!(
            out,
            r#"{"id":123456789012345678901234567890,"amount":0.1000000000000000055511151231257827,"password":"***"}"#
        );
    }

    #[test]
    fn duplicate_keys_are_all_kept() {
        let out = mask(r#"{"a":1,"a":2,"password":"p"}"#, BodyType::Json, &keys(&["password"]));
        assert_eq!(out, r#"{"a":1,"a":2,"password":"***"}"#);
    }

    #[test]
    fn nested_duplicate_keys_use_fallback() {
        let out = mask(
            r#"{"user":{"token":"x","token":"y"},"n":1}"#,
            BodyType::Json,
            &keys(&["token"]),
        );
        assert_eq!(out, r#"{"user":{"token":"***","token":"***"},"n":1}"#);
        assert_eq!(try_mask_json(r#"{"a":{"b":1,"b":2}}"#, &keys(&["x"])).unwrap_err().kind(), "body_parse");
    }

    #[test]
    fn try_mask_json_reports_body_parse() {
        let err = try_mask_json("{", &keys(&["a"])).unwrap_err();
        assert_eq!(err.kind(), "body_parse");
    }

    // ── Form ─────────────────────────────────────────────────────

    #[test]
    fn form_masks_matching_pairs_in_order() {
        let out = mask("user=bob&password=1234&x=%20y", BodyType::Form, &keys(&["password"]));
        assert_eq!(out, "user=bob&password=***&x=%20y");
    }

    #[test]
    fn form_compares_decoded_keys() {
        let out = mask("my+key=v&pass%77ord=p", BodyType::Form, &keys(&["my key", "password"]));
        assert_eq!(out, "my+key=***&pass%77ord=***");
    }

    #[test]
    fn form_preserves_pair_count() {
        let body = "a=1&&token&b=2";
        let out = mask(body, BodyType::Form, &keys(&["token"]));
        assert_eq!(out, "a=1&&token=***&b=2");
        assert_eq!(out.split('&').count(), body.split('&').count());
    }

    // ── Shared behaviour ─────────────────────────────────────────

    #[test]
    fn masking_is_idempotent() {
        let k = keys(&["password", "token"]);
        for (body, bt) in [
            (r#"{"password":"1","nested":{"token":[1,2]}}"#, BodyType::Json),
            (r#"{"password":"1","token":"ab"#, BodyType::Json),
            ("password=1&token=2&z=3", BodyType::Form),
        ] {
            let once = mask(body, bt, &k);
            assert_eq!(mask(&once, bt, &k), once);
        }
    }

    #[test]
    fn other_bodies_pass_through() {
        assert_eq!(mask("password=1", BodyType::Other, &keys(&["password"])), "password=1");
    }

    #[test]
    fn empty_keys_leave_body_alone() {
        assert_eq!(mask(r#"{"password":"1"}"#, BodyType::Json, &[]), r#"{"password":"1"}"#);
    }

    // ── Truncation ───────────────────────────────────────────────

    #[test]
    fn truncates_before_marker() {
        let out = mask_body(b"abcdefgh", BodyType::Other, &[], 5);
        assert_eq!(out, "abcde <TRUNCATED 8 bytes>");
    }

    #[test]
    fn no_marker_within_limit() {
        assert_eq!(mask_body(b"abc", BodyType::Other, &[], 3), "abc");
    }

    #[test]
    fn truncation_respects_utf8_boundaries() {
        // "é" is two bytes; cutting at 2 would split it
        let (text, truncated) = truncate("aé".as_bytes(), 2);
        assert!(truncated);
        assert_eq!(text, "a");
    }

    #[test]
    fn truncated_json_is_still_masked() {
        let body = br#"{"user":"bob","password":"supersecret"}"#;
        let out = mask_body(body, BodyType::Json, &keys(&["password"]), 30);
        assert!(out.starts_with(r#"{"user":"bob","password":"***""#));
        assert!(!out.contains("supersecret"));
        assert!(out.ends_with(" <TRUNCATED 39 bytes>"));
    }

    #[test]
    fn prefix_is_masked_and_marked_with_full_length() {
        let settings = LogSettings::request_default();
        let out = render_body_prefix(
            br#"{"user":"bob","password":"hunt"#,
            Some(4096),
            Some("application/json"),
            &settings,
        );
        assert_eq!(out, r#"{"user":"bob","password":"***" <TRUNCATED 4096 bytes>"#);

        let open = render_body_prefix(b"abcdef", None, Some("text/plain"), &settings);
        assert_eq!(open, "abcdef <TRUNCATED 6+ bytes>");
    }

    #[test]
    fn prefix_longer_than_log_limit_is_cut_again() {
        let mut settings = LogSettings::request_default();
        settings.max_body_size = 3;
        let out = render_body_prefix(b"abcdef", Some(100), None, &settings);
        assert_eq!(out, "abc <TRUNCATED 100 bytes>");
    }

    #[test]
    fn render_body_uses_side_settings() {
        let settings = LogSettings::request_default();
        let out = render_body(br#"{"token":"t"}"#, Some("application/json"), &settings);
        assert_eq!(out, r#"{"token":"***"}"#);
        let form = render_body(b"code=9", Some("application/x-www-form-urlencoded"), &settings);
        assert_eq!(form, "code=***");
    }
}
