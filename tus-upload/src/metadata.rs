//! `Upload-Metadata` codec.
//!
//! On the wire custom metadata is a comma-separated list of `key base64(value)`
//! pairs; a bare `key` means an empty value. The engine only ever sees the
//! decoded map, so the header format stays at this boundary.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::{UploadError, UploadResult};

/// Client-supplied key/value pairs, round-tripped verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMetadata(BTreeMap<String, String>);

impl UploadMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an `Upload-Metadata` header value.
    ///
    /// Absent or blank input decodes to an empty map.
    pub fn decode(header: Option<&str>) -> UploadResult<Self> {
        let mut entries = BTreeMap::new();
        let Some(header) = header else {
            return Ok(Self(entries));
        };

        for pair in header.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let mut parts = pair.split_whitespace();
            let key = parts.next().unwrap_or_default();
            let encoded = parts.next();
            if parts.next().is_some() {
                return Err(UploadError::invalid(format!(
                    "metadata entry '{}' has more than a key and a value",
                    key
                )));
            }

            let value = match encoded {
                Some(encoded) => {
                    let raw = STANDARD.decode(encoded).map_err(|e| {
                        UploadError::invalid(format!("metadata value for '{}' is not base64: {}", key, e))
                    })?;
                    String::from_utf8(raw).map_err(|_| {
                        UploadError::invalid(format!("metadata value for '{}' is not UTF-8", key))
                    })?
                }
                None => String::new(),
            };

            if entries.insert(key.to_string(), value).is_some() {
                return Err(UploadError::invalid(format!("duplicate metadata key '{}'", key)));
            }
        }

        Ok(Self(entries))
    }

    /// Encode back into header form; `None` when there is nothing to send.
    pub fn encode(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .0
            .iter()
            .map(|(key, value)| {
                if value.is_empty() {
                    key.clone()
                } else {
                    format!("{} {}", key, STANDARD.encode(value.as_bytes()))
                }
            })
            .collect();
        Some(pairs.join(","))
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_or_blank_header_is_empty() {
        assert!(UploadMetadata::decode(None).unwrap().is_empty());
        assert!(UploadMetadata::decode(Some("")).unwrap().is_empty());
        assert!(UploadMetadata::decode(Some(" , ")).unwrap().is_empty());
    }

    #[test]
    fn decodes_pairs_and_bare_keys() {
        // "world_domination_plan.pdf", "text/plain"
        let header = "filename d29ybGRfZG9taW5hdGlvbl9wbGFuLnBkZg==, filetype dGV4dC9wbGFpbg==,is_confidential";
        let meta = UploadMetadata::decode(Some(header)).unwrap();

        assert_eq!(meta.len(), 3);
        assert_eq!(meta.get("filename"), Some("world_domination_plan.pdf"));
        assert_eq!(meta.get("filetype"), Some("text/plain"));
        assert_eq!(meta.get("is_confidential"), Some(""));
    }

    #[test]
    fn encode_matches_wire_format() {
        let meta = UploadMetadata::new()
            .with("filename", "a.txt")
            .with("flag", "");
        assert_eq!(meta.encode().as_deref(), Some("filename YS50eHQ=,flag"));
        assert_eq!(UploadMetadata::new().encode(), None);
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(UploadMetadata::decode(Some("filename not*base64")).is_err());
        assert!(UploadMetadata::decode(Some("a YQ== extra")).is_err());
        assert!(UploadMetadata::decode(Some("a YQ==,a Yg==")).is_err());
        // 0xff is not valid UTF-8
        assert!(UploadMetadata::decode(Some("bin /w==")).is_err());
    }
}
