// src/loader/index.rs

//! Bundle index documents
//!
//! A remote publishes one JSON document mapping bundle ids to the archives
//! available for them:
//!
//! ```json
//! {
//!   "example/neurons": {"1": "neurons-1.tar.xz", "2": "https://cdn.example.org/n2.tar.xz"},
//!   "example/retired": null
//! }
//! ```
//!
//! `null` marks a bundle as known but unavailable. Version keys that are
//! not positive integers are skipped with a warning.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleIndex {
    bundles: BTreeMap<String, Option<BTreeMap<u64, String>>>,
}

impl BundleIndex {
    /// Parse an index document
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(data)?;
        let Value::Object(entries) = value else {
            return Err(Error::ParseError(
                "bundle index must be a JSON object".to_string(),
            ));
        };

        let mut bundles = BTreeMap::new();
        for (bundle, entry) in entries {
            let versions = match entry {
                Value::Null => None,
                Value::Object(versions) => Some(parse_versions(&bundle, versions)),
                other => {
                    warn!(
                        "Ignoring index entry for {}: expected an object or null, got {}",
                        bundle, other
                    );
                    continue;
                }
            };
            bundles.insert(bundle, versions);
        }

        Ok(Self { bundles })
    }

    pub fn insert(&mut self, bundle: &str, version: u64, location: &str) {
        self.bundles
            .entry(bundle.to_string())
            .or_insert_with(|| Some(BTreeMap::new()))
            .get_or_insert_with(BTreeMap::new)
            .insert(version, location.to_string());
    }

    /// Serialize back to the JSON document form
    pub fn to_json(&self) -> Result<String> {
        let doc: BTreeMap<&str, Option<BTreeMap<String, &str>>> = self
            .bundles
            .iter()
            .map(|(bundle, versions)| {
                let versions = versions.as_ref().map(|v| {
                    v.iter()
                        .map(|(ver, loc)| (ver.to_string(), loc.as_str()))
                        .collect()
                });
                (bundle.as_str(), versions)
            })
            .collect();
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Available versions of `bundle`, ascending
    pub fn versions(&self, bundle: &str) -> Vec<u64> {
        match self.bundles.get(bundle) {
            Some(Some(versions)) => versions.keys().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// True if `bundle` (at `version`, when given) can be retrieved
    pub fn can_load(&self, bundle: &str, version: Option<u64>) -> bool {
        match (self.bundles.get(bundle), version) {
            (Some(Some(versions)), Some(v)) => versions.contains_key(&v),
            (Some(Some(versions)), None) => !versions.is_empty(),
            _ => false,
        }
    }

    /// Archive location of `bundle` at `version`, or a load failure naming
    /// what was missing
    pub fn location(&self, loader: &str, bundle: &str, version: u64) -> Result<&str> {
        let failed = |reason: String| Error::LoadFailed {
            bundle: bundle.to_string(),
            loader: loader.to_string(),
            reason,
        };
        match self.bundles.get(bundle) {
            None => Err(failed("bundle is not in the index".to_string())),
            Some(None) => Err(failed("bundle is listed as unavailable".to_string())),
            Some(Some(versions)) => versions
                .get(&version)
                .map(String::as_str)
                .ok_or_else(|| failed(format!("version {} is not in the index", version))),
        }
    }
}

fn parse_versions(bundle: &str, versions: serde_json::Map<String, Value>) -> BTreeMap<u64, String> {
    let mut parsed = BTreeMap::new();
    for (key, location) in versions {
        let version = match key.parse::<u64>() {
            Ok(v) if v > 0 => v,
            _ => {
                warn!(
                    "Got a non-numeric bundle version '{}' in the index for {}",
                    key, bundle
                );
                continue;
            }
        };
        match location {
            Value::String(loc) => {
                parsed.insert(version, loc);
            }
            other => warn!(
                "Ignoring version {} of {}: location must be a string, got {}",
                version, bundle, other
            ),
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "ex/a": {"1": "a-1.tar.xz", "10": "a-10.tar.xz", "2": "a-2.tar.xz", "latest": "a.tar.xz"},
        "ex/gone": null,
        "ex/odd": 7
    }"#;

    #[test]
    fn test_parse_and_query() {
        let index = BundleIndex::from_json(DOC.as_bytes()).unwrap();
        assert_eq!(index.versions("ex/a"), vec![1, 2, 10]);
        assert!(index.can_load("ex/a", None));
        assert!(!index.can_load("ex/odd", None));
        assert!(index.versions("ex/gone").is_empty());
        assert!(index.can_load("ex/a", Some(2)));
        assert!(!index.can_load("ex/a", Some(3)));
        assert!(!index.can_load("ex/gone", None));
        assert_eq!(index.location("l", "ex/a", 10).unwrap(), "a-10.tar.xz");
    }

    #[test]
    fn test_location_failures() {
        let index = BundleIndex::from_json(DOC.as_bytes()).unwrap();
        for (bundle, version) in [("ex/none", 1), ("ex/gone", 1), ("ex/a", 3)] {
            match index.location("loader", bundle, version) {
                Err(Error::LoadFailed { bundle: b, .. }) => assert_eq!(b, bundle),
                other => panic!("expected LoadFailed, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(BundleIndex::from_json(b"[1, 2]").is_err());
        assert!(BundleIndex::from_json(b"not json").is_err());
    }

    #[test]
    fn test_insert_and_serialize() {
        let mut index = BundleIndex::default();
        index.insert("ex/b", 3, "b-3.tar.xz");
        let again = BundleIndex::from_json(index.to_json().unwrap().as_bytes()).unwrap();
        assert_eq!(again, index);
    }
}
