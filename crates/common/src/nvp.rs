//! Name-value-pair (NVP) wire codec.
//!
//! Requests and responses are flat `key=value` pairs joined by `&`, encoded as
//! `application/x-www-form-urlencoded`. There is no nesting, no arrays and no
//! repeated keys on the way out.

use std::collections::BTreeMap;

use thiserror::Error;
use url::form_urlencoded;

/// Flat, key-unique NVP mapping.
pub type NvpMap = BTreeMap<String, String>;

/// A response body that is not a valid NVP document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NvpError {
    #[error("response body is empty")]
    Empty,

    #[error("response body is not valid UTF-8")]
    NotUtf8,

    /// A segment has no `=` separator.
    #[error("segment {0:?} is not a key=value pair")]
    MissingSeparator(String),

    #[error("segment {0:?} has an empty key")]
    EmptyKey(String),
}

/// Encode ordered pairs as a form-urlencoded body.
pub fn encode<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Decode a form-urlencoded body into a flat map.
///
/// Empty segments (`a=1&&b=2`, trailing `&`) are skipped. When a key repeats
/// the last value wins.
///
/// # Errors
///
/// Returns an [`NvpError`] if the body is empty, not UTF-8, or contains a
/// segment without `=` or with an empty key.
pub fn decode(body: &[u8]) -> Result<NvpMap, NvpError> {
    let text = std::str::from_utf8(body).map_err(|_| NvpError::NotUtf8)?;
    let text = text.trim_matches(|c: char| c.is_ascii_whitespace());
    if text.is_empty() {
        return Err(NvpError::Empty);
    }

    for segment in text.split('&').filter(|s| !s.is_empty()) {
        match segment.split_once('=') {
            None => return Err(NvpError::MissingSeparator(truncate(segment))),
            Some(("", _)) => return Err(NvpError::EmptyKey(truncate(segment))),
            Some(_) => {}
        }
    }

    Ok(form_urlencoded::parse(text.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect())
}

// Keep error messages bounded when the remote sends something huge.
fn truncate(segment: &str) -> String {
    const MAX: usize = 64;
    match segment.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &segment[..idx]),
        None => segment.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_percent_encodes_reserved_characters() {
        let body = encode([
            ("RETURNURL", "http://x/ok?a=1&b=2"),
            ("DESC", "two words"),
        ]);
        assert_eq!(body, "RETURNURL=http%3A%2F%2Fx%2Fok%3Fa%3D1%26b%3D2&DESC=two+words");
    }

    #[test]
    fn encode_preserves_pair_order() {
        let body = encode([("METHOD", "X"), ("VERSION", "74.0"), ("AMT", "1.00")]);
        assert_eq!(body, "METHOD=X&VERSION=74.0&AMT=1.00");
    }

    #[test]
    fn decode_typical_response() {
        let map = decode(b"TOKEN=EC%2d1&ACK=Success&TIMESTAMP=2012%2d01%2d01T00%3a00%3a00Z").unwrap();
        assert_eq!(map["TOKEN"], "EC-1");
        assert_eq!(map["ACK"], "Success");
        assert_eq!(map["TIMESTAMP"], "2012-01-01T00:00:00Z");
    }

    #[test]
    fn round_trip_flat_map() {
        let mut original = NvpMap::new();
        original.insert("PAYMENTREQUEST_0_AMT".into(), "299.00".into());
        original.insert("DESC".into(), "Blue widget, size L (x2)".into());
        original.insert("EMAIL".into(), "buyer+test@example.com".into());
        original.insert("NOTE".into(), "ünïcödé €".into());
        original.insert("EMPTY".into(), String::new());

        let body = encode(original.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        assert_eq!(decode(body.as_bytes()).unwrap(), original);
    }

    proptest! {
        #[test]
        fn any_flat_map_survives_encode_then_decode(
            original in prop::collection::btree_map("\\PC{1,16}", "\\PC{0,24}", 1..8)
        ) {
            let body = encode(original.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            prop_assert_eq!(decode(body.as_bytes()).unwrap(), original);
        }
    }

    #[test]
    fn duplicate_keys_last_wins() {
        let map = decode(b"ACK=Failure&ACK=Success").unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["ACK"], "Success");
    }

    #[test]
    fn empty_segments_are_skipped() {
        let map = decode(b"A=1&&B=2&").unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn value_may_be_empty() {
        let map = decode(b"L_ERRORCODE0=&ACK=Failure").unwrap();
        assert_eq!(map["L_ERRORCODE0"], "");
    }

    #[test]
    fn rejects_empty_body() {
        assert_eq!(decode(b""), Err(NvpError::Empty));
        assert_eq!(decode(b" \r\n"), Err(NvpError::Empty));
    }

    #[test]
    fn rejects_html_error_page() {
        let err = decode(b"<html><body>502 Bad Gateway</body></html>").unwrap_err();
        assert!(matches!(err, NvpError::MissingSeparator(_)));
    }

    #[test]
    fn rejects_empty_key() {
        assert!(matches!(decode(b"=orphan"), Err(NvpError::EmptyKey(_))));
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert_eq!(decode(&[0x41, 0x3d, 0xff, 0xfe]), Err(NvpError::NotUtf8));
    }

    #[test]
    fn long_segments_are_truncated_in_errors() {
        let body = "x".repeat(500);
        match decode(body.as_bytes()) {
            Err(NvpError::MissingSeparator(s)) => assert!(s.len() < 100),
            other => panic!("unexpected {other:?}"),
        }
    }
}
