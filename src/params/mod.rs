//! Canonical Parameter Serializer
//!
//! The single sorted, type-normalized key/value representation shared by
//! the signer and the multipart body builder. What gets signed must be
//! byte-identical to what gets sent (modulo the signature field itself),
//! so both consume the same [`ParamMap`] and the same rendering rules:
//!
//! - `BTreeMap` keys give stable, case-sensitive ordinal ordering
//! - empty strings and empty collections are omitted
//! - booleans render as the literals `true` / `false`
//! - datetimes render as `yyyy-MM-ddTHH:mm:ssZ` in UTC
//! - lists render as one comma-joined string for signature bases and
//!   query values, and expand to repeated `key[]` fields in bodies

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// A normalized parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Verbatim string
    Str(String),
    /// Boolean, rendered as `true`/`false`
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float, trailing zeros trimmed
    Float(f64),
    /// Collection, comma-joined when flattened and `key[]`-expanded in bodies
    List(Vec<String>),
    /// Dictionary, rendered as `k=v` pairs pipe-joined
    Map(BTreeMap<String, String>),
    /// UTC timestamp
    DateTime(DateTime<Utc>),
}

impl ParamValue {
    /// Render the single-string form used for signature bases and query
    /// values. Returns `None` for values that are omitted entirely.
    pub fn flatten(&self) -> Option<String> {
        match self {
            Self::Str(s) if s.is_empty() => None,
            Self::Str(s) => Some(s.clone()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(trim_float(*f)),
            Self::List(items) if items.is_empty() => None,
            Self::List(items) => Some(items.join(",")),
            Self::Map(map) if map.is_empty() => None,
            Self::Map(map) => Some(
                map.iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join("|"),
            ),
            Self::DateTime(dt) => Some(dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        }
    }

    /// The repeated-field expansion used by multipart bodies: lists become
    /// one `key[]` part per element, everything else flattens to a single
    /// `key` part.
    pub fn multipart_fields(&self, key: &str) -> Vec<(String, String)> {
        match self {
            Self::List(items) => items
                .iter()
                .map(|item| (format!("{key}[]"), item.clone()))
                .collect(),
            other => other
                .flatten()
                .map(|v| vec![(key.to_string(), v)])
                .unwrap_or_default(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for ParamValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u64> for ParamValue {
    fn from(i: u64) -> Self {
        Self::Int(i as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<DateTime<Utc>> for ParamValue {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

/// The canonical sorted parameter map
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Build the `k1=v1&k2=v2&...` base string the request signer hashes.
/// Keys are iterated in sorted order; excluded keys and empty values are
/// skipped.
pub fn signing_base(params: &ParamMap, exclude: &[&str]) -> String {
    params
        .iter()
        .filter(|(k, _)| !exclude.contains(&k.as_str()))
        .filter_map(|(k, v)| v.flatten().map(|v| format!("{k}={v}")))
        .collect::<Vec<_>>()
        .join("&")
}

/// Flatten a whole map into multipart fields, preserving sorted key order
pub fn multipart_fields(params: &ParamMap) -> Vec<(String, String)> {
    params
        .iter()
        .flat_map(|(k, v)| v.multipart_fields(k))
        .collect()
}

fn trim_float(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("public_id".into(), "sample".into());
        params.insert("tags".into(), vec!["a".to_string(), "b".to_string()].into());
        params.insert("overwrite".into(), true.into());
        params.insert("timestamp".into(), 1_315_060_510i64.into());
        params
    }

    #[test]
    fn signing_base_sorts_and_joins() {
        let base = signing_base(&sample(), &[]);
        assert_eq!(
            base,
            "overwrite=true&public_id=sample&tags=a,b&timestamp=1315060510"
        );
    }

    #[test]
    fn signing_base_honors_exclusions() {
        let mut params = sample();
        params.insert("api_key".into(), "123".into());
        params.insert("file".into(), "ignored".into());
        let base = signing_base(&params, &["api_key", "file", "resource_type", "signature"]);
        assert!(!base.contains("api_key"));
        assert!(!base.contains("file"));
    }

    #[test]
    fn empty_values_are_omitted() {
        let mut params = ParamMap::new();
        params.insert("a".into(), "".into());
        params.insert("b".into(), ParamValue::List(vec![]));
        params.insert("c".into(), "keep".into());
        assert_eq!(signing_base(&params, &[]), "c=keep");
    }

    #[test]
    fn datetime_renders_invariant_utc() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 9, 8, 7, 6).unwrap();
        assert_eq!(
            ParamValue::from(dt).flatten().as_deref(),
            Some("2024-03-09T08:07:06Z")
        );
    }

    #[test]
    fn lists_expand_to_repeated_multipart_fields() {
        let fields = ParamValue::List(vec!["x".into(), "y".into()]).multipart_fields("tags");
        assert_eq!(
            fields,
            vec![("tags[]".to_string(), "x".to_string()), ("tags[]".to_string(), "y".to_string())]
        );
    }

    #[test]
    fn map_values_render_pipe_joined_pairs() {
        let mut ctx = BTreeMap::new();
        ctx.insert("alt".to_string(), "My image".to_string());
        ctx.insert("caption".to_string(), "Profile".to_string());
        assert_eq!(
            ParamValue::Map(ctx).flatten().as_deref(),
            Some("alt=My image|caption=Profile")
        );
    }

    #[test]
    fn bools_render_as_literals() {
        assert_eq!(ParamValue::from(false).flatten().as_deref(), Some("false"));
    }
}
