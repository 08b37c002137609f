//! Utility functions for clustertopo

use chrono::{DateTime, TimeZone, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Percent-encoding set for path segments (includes /, %, and control chars)
const SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'%')
    .add(b' ')
    .add(b'?')
    .add(b'#')
    .add(b'&');

/// Encode a single path segment so it cannot address a sibling subtree
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT_ENCODE_SET).to_string()
}

/// Decode a percent-encoded path segment
pub fn decode_segment(encoded: &str) -> crate::Result<String> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.to_string())
        .map_err(|e| crate::Error::malformed(encoded, format!("bad segment encoding: {}", e)))
}

/// Parse duration string (e.g., "30s", "5m", "1h", "7d")
pub fn parse_duration(s: &str) -> crate::Result<std::time::Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidConfig("empty duration".into()));
    }

    let (num_str, unit) = if let Some(num) = s.strip_suffix("ms") {
        (num, "ms")
    } else {
        let split = s.len() - s.chars().last().map(char::len_utf8).unwrap_or(0);
        (&s[..split], &s[split..])
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let secs_per_unit = match unit {
        "ms" => return Ok(std::time::Duration::from_millis(num)),
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => {
            return Err(crate::Error::InvalidConfig(format!(
                "unknown duration unit: {}",
                unit
            )))
        }
    };

    let secs = num
        .checked_mul(secs_per_unit)
        .ok_or_else(|| crate::Error::InvalidConfig(format!("duration out of range: {}", s)))?;
    Ok(std::time::Duration::from_secs(secs))
}

/// Parse a heartbeat timestamp: RFC 3339 string or epoch milliseconds
pub fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Split a registered endpoint into (protocol, address)
///
/// `ssl` (and `https`) map to `https`; every other scheme, or none at all,
/// is served over `http`. `None` when there is no address.
pub fn split_endpoint(endpoint: &str) -> Option<(String, String)> {
    let (scheme, address) = endpoint.split_once("://").unwrap_or(("", endpoint));
    let address = address.trim_end_matches('/');
    if address.is_empty() {
        return None;
    }
    let protocol = match scheme.to_ascii_lowercase().as_str() {
        "ssl" | "https" => "https",
        _ => "http",
    };
    Some((protocol.to_string(), address.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_segment() {
        let id = "db/with slash";
        let encoded = encode_segment(id);
        assert!(encoded.contains("%2F"));
        assert!(!encoded.contains('/'));

        let decoded = decode_segment(&encoded).unwrap();
        assert_eq!(decoded, id);
        assert_eq!(encode_segment("pavel"), "pavel");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            parse_duration("500ms").unwrap(),
            std::time::Duration::from_millis(500)
        );
        assert_eq!(
            parse_duration("30s").unwrap(),
            std::time::Duration::from_secs(30)
        );
        assert_eq!(
            parse_duration("5m").unwrap(),
            std::time::Duration::from_secs(300)
        );
        assert_eq!(
            parse_duration("1h").unwrap(),
            std::time::Duration::from_secs(3600)
        );
        assert_eq!(
            parse_duration("7d").unwrap(),
            std::time::Duration::from_secs(604800)
        );
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert!(matches!(
            parse_duration("400000000000000000m"),
            Err(crate::Error::InvalidConfig(_))
        ));
        assert!(parse_duration("300000000000000h").is_err());
        assert!(parse_duration("300000000000000d").is_err());
        assert_eq!(
            parse_duration("18446744073709551615s").unwrap(),
            std::time::Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn test_parse_timestamp() {
        let t = parse_timestamp(&serde_json::json!("2024-03-01T10:00:00Z")).unwrap();
        assert_eq!(t.timestamp(), 1_709_287_200);

        let t = parse_timestamp(&serde_json::json!(1_709_287_200_000i64)).unwrap();
        assert_eq!(t.timestamp(), 1_709_287_200);

        assert!(parse_timestamp(&serde_json::json!("yesterday")).is_none());
        assert!(parse_timestamp(&serde_json::json!(true)).is_none());
    }

    #[test]
    fn test_split_endpoint() {
        assert_eq!(
            split_endpoint("tcp://127.0.0.1:8629"),
            Some(("http".to_string(), "127.0.0.1:8629".to_string()))
        );
        assert_eq!(
            split_endpoint("ssl://db1.local:8530"),
            Some(("https".to_string(), "db1.local:8530".to_string()))
        );
        assert_eq!(
            split_endpoint("http://localhost:8530/"),
            Some(("http".to_string(), "localhost:8530".to_string()))
        );
        assert_eq!(
            split_endpoint("localhost:8530"),
            Some(("http".to_string(), "localhost:8530".to_string()))
        );
        assert_eq!(
            split_endpoint("unix:///tmp/arangod.sock").map(|(p, _)| p),
            Some("http".to_string())
        );
        assert_eq!(split_endpoint("tcp://"), None);
        assert_eq!(split_endpoint(""), None);
    }
}
