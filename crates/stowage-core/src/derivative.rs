//! Derivative keys and the per-file tracked set.
//!
//! A derivative key is the canonical string `<W|AUTO>_<H|AUTO>[@2x][:webp]`.
//! The part before `:webp` is also the filename suffix used by the address
//! scheme; `:webp` never appears in filenames because WebP derivatives carry
//! the `webp` extension instead.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::transform::Transform;

const AUTO: &str = "AUTO";

/// Identity of one generated derivative of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DerivativeKey {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub two_x: bool,
    pub webp: bool,
}

impl DerivativeKey {
    /// Key for a transform's variant. Width/height of zero map to `AUTO`.
    pub fn new(transform: &Transform, two_x: bool, webp: bool) -> Self {
        DerivativeKey {
            width: (transform.width > 0).then_some(transform.width),
            height: (transform.height > 0).then_some(transform.height),
            two_x,
            webp,
        }
    }

    /// The `<W|AUTO>_<H|AUTO>[@2x]` part shared with physical filenames.
    pub fn filename_suffix(&self) -> String {
        format!(
            "{}_{}{}",
            self.width.map_or(AUTO.to_string(), |w| w.to_string()),
            self.height.map_or(AUTO.to_string(), |h| h.to_string()),
            if self.two_x { "@2x" } else { "" }
        )
    }

    /// Extension the physical derivative carries, given the original's.
    pub fn extension<'a>(&self, original_ext: &'a str) -> &'a str {
        if self.webp {
            "webp"
        } else {
            original_ext
        }
    }
}

impl fmt::Display for DerivativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.filename_suffix(),
            if self.webp { ":webp" } else { "" }
        )
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid derivative key: {0}")]
pub struct ParseKeyError(String);

impl FromStr for DerivativeKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseKeyError(s.to_string());

        let (body, webp) = match s.strip_suffix(":webp") {
            Some(body) => (body, true),
            None => (s, false),
        };
        let (body, two_x) = match body.strip_suffix("@2x") {
            Some(body) => (body, true),
            None => (body, false),
        };

        let (w, h) = body.split_once('_').ok_or_else(bad)?;
        let parse_axis = |axis: &str| -> Result<Option<u32>, ParseKeyError> {
            if axis == AUTO {
                Ok(None)
            } else {
                axis.parse::<u32>().map(Some).map_err(|_| bad())
            }
        };

        Ok(DerivativeKey {
            width: parse_axis(w)?,
            height: parse_axis(h)?,
            two_x,
            webp,
        })
    }
}

impl Serialize for DerivativeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DerivativeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Set of derivative keys currently believed to exist for one file.
///
/// The engine only ever talks to this set through add/remove/contains; the
/// persistence layer serializes it as a plain list of key strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivativeSet(BTreeSet<DerivativeKey>);

impl DerivativeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: DerivativeKey) -> bool {
        self.0.insert(key)
    }

    pub fn remove(&mut self, key: &DerivativeKey) -> bool {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &DerivativeKey) -> bool {
        self.0.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivativeKey> {
        self.0.iter()
    }
}

impl FromIterator<DerivativeKey> for DerivativeSet {
    fn from_iter<I: IntoIterator<Item = DerivativeKey>>(iter: I) -> Self {
        DerivativeSet(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::FitMode;

    fn transform(width: u32, height: u32) -> Transform {
        Transform::new(width, height, FitMode::Auto)
    }

    #[test]
    fn test_key_rendering() {
        let t = transform(380, 250);
        assert_eq!(DerivativeKey::new(&t, false, false).to_string(), "380_250");
        assert_eq!(
            DerivativeKey::new(&t, true, false).to_string(),
            "380_250@2x"
        );
        assert_eq!(
            DerivativeKey::new(&t, false, true).to_string(),
            "380_250:webp"
        );
        assert_eq!(
            DerivativeKey::new(&t, true, true).to_string(),
            "380_250@2x:webp"
        );
    }

    #[test]
    fn test_unconstrained_axis_renders_auto() {
        assert_eq!(
            DerivativeKey::new(&transform(1920, 0), false, false).to_string(),
            "1920_AUTO"
        );
        assert_eq!(
            DerivativeKey::new(&transform(0, 600), false, false).to_string(),
            "AUTO_600"
        );
    }

    #[test]
    fn test_round_trip() {
        for s in ["380_250", "380_250@2x", "AUTO_600:webp", "1920_AUTO@2x:webp"] {
            let key: DerivativeKey = s.parse().unwrap();
            assert_eq!(key.to_string(), s);
        }
    }

    #[test]
    fn test_distinct_variants_produce_distinct_keys() {
        // Every (dims, 2x, webp) combination maps to its own string.
        let mut seen = std::collections::HashSet::new();
        for w in [0u32, 1, 380, 10_000] {
            for h in [0u32, 1, 250, 10_000] {
                for two_x in [false, true] {
                    for webp in [false, true] {
                        let key = DerivativeKey::new(&transform(w, h), two_x, webp);
                        assert!(seen.insert(key.to_string()), "collision for {key}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("380x250".parse::<DerivativeKey>().is_err());
        assert!("_".parse::<DerivativeKey>().is_err());
        assert!("abc_def".parse::<DerivativeKey>().is_err());
    }

    #[test]
    fn test_webp_extension() {
        let t = transform(380, 250);
        assert_eq!(DerivativeKey::new(&t, false, true).extension("jpg"), "webp");
        assert_eq!(DerivativeKey::new(&t, false, false).extension("jpg"), "jpg");
    }

    #[test]
    fn test_set_serializes_as_string_list() {
        let mut set = DerivativeSet::new();
        set.add(DerivativeKey::new(&transform(380, 250), false, false));
        set.add(DerivativeKey::new(&transform(380, 250), true, true));

        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["380_250","380_250@2x:webp"]"#);

        let back: DerivativeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
