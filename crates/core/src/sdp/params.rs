//! `a=fmtp` parameter lists and payload-type lists.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single codec parameter value.
///
/// Numeric values are kept as integers so that comparisons like
/// `packetization-mode == 1` or `apt == 96` work regardless of whether the
/// value came from SDP text or a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Number(i64),
    Text(String),
}

impl ParameterValue {
    /// Coerce SDP text: integers whose canonical form round-trips become numbers.
    pub fn from_sdp(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(n) if n.to_string() == raw => Self::Number(n),
            _ => Self::Text(raw.to_string()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<u8> for ParameterValue {
    fn from(n: u8) -> Self {
        Self::Number(n.into())
    }
}

impl From<u32> for ParameterValue {
    fn from(n: u32) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for ParameterValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Codec specific parameters (`a=fmtp` content). Some of them
/// (`packetization-mode`, `profile-level-id`, `profile-id`, `apt`) drive
/// codec matching.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodecParameters(BTreeMap<String, ParameterValue>);

impl CodecParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParameterValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Integer parameter, also accepting numeric text.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            ParameterValue::Number(n) => Some(*n),
            ParameterValue::Text(s) => s.parse().ok(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>, V: Into<ParameterValue>> FromIterator<(K, V)> for CodecParameters {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Parse an fmtp config such as `minptime=10;useinbandfec=1`.
pub fn parse_params(config: &str) -> CodecParameters {
    let mut params = CodecParameters::new();
    for part in config.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.split_once('=') {
            Some((key, value)) => {
                params.insert(key.trim(), ParameterValue::from_sdp(value.trim()));
            }
            None => {
                params.insert(part, ParameterValue::Text(String::new()));
            }
        }
    }
    params
}

/// Inverse of [`parse_params`]. Keys with an empty text value are written bare.
pub fn write_params(params: &CodecParameters) -> String {
    params
        .iter()
        .map(|(key, value)| match value {
            ParameterValue::Text(s) if s.is_empty() => key.clone(),
            _ => format!("{key}={value}"),
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Parse the payload list of an `m=` line (`"111 103 9"`).
pub fn parse_payloads(payloads: &str) -> Vec<u8> {
    payloads
        .split_whitespace()
        .filter_map(|pt| pt.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_params() {
        let params = parse_params("profile-level-id=42e01f;packetization-mode=1;level-asymmetry-allowed=1");
        assert_eq!(params.get_i64("packetization-mode"), Some(1));
        assert_eq!(
            params.get("profile-level-id"),
            Some(&ParameterValue::Text("42e01f".into()))
        );
    }

    #[test]
    fn leading_zero_stays_text() {
        assert_eq!(ParameterValue::from_sdp("01"), ParameterValue::Text("01".into()));
        assert_eq!(ParameterValue::from_sdp("0"), ParameterValue::Number(0));
    }

    #[test]
    fn write_params_is_inverse() {
        let params = parse_params("minptime=10;useinbandfec=1;flag");
        assert_eq!(parse_params(&write_params(&params)), params);
        assert!(write_params(&params).contains("flag"));
    }

    #[test]
    fn payload_list() {
        assert_eq!(parse_payloads("111 103  9"), vec![111, 103, 9]);
    }
}
