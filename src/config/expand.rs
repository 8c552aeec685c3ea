//! Placeholder expansion for option values.
//!
//! # Syntax
//! - `${name}` is replaced by the value of property `name`
//! - `${{text}}` is an escape and yields the literal `${text}`
//! - an unterminated `${` is passed through unchanged
//!
//! Expansion runs once per parse. A later property change is only seen by
//! the next parse.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Source of values for `${name}` placeholders.
pub trait PropertySource: Send + Sync {
    fn property(&self, name: &str) -> Option<String>;
}

/// Reads placeholders from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvProperties;

impl PropertySource for EnvProperties {
    fn property(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A settable in-process property table.
#[derive(Debug, Default)]
pub struct MapProperties {
    values: RwLock<HashMap<String, String>>,
}

impl MapProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }
}

impl<K, V> FromIterator<(K, V)> for MapProperties
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: RwLock::new(
                iter.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl PropertySource for MapProperties {
    fn property(&self, name: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

/// Errors raised while expanding a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpandError {
    #[error("no property defined for placeholder ${{{0}}}")]
    Unresolved(String),
}

/// Expand every placeholder in `raw` against `source`.
pub fn expand(raw: &str, source: &dyn PropertySource) -> Result<String, ExpandError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        if let Some(escaped) = after.strip_prefix('{') {
            if let Some(end) = escaped.find("}}") {
                out.push_str("${");
                out.push_str(&escaped[..end]);
                out.push('}');
                rest = &escaped[end + 2..];
                continue;
            }
        }

        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                let value = source
                    .property(name)
                    .ok_or_else(|| ExpandError::Unresolved(name.to_string()))?;
                out.push_str(&value);
                rest = &after[end + 1..];
            }
            None => {
                rest = &rest[start..];
                break;
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> MapProperties {
        [("realm.name", "file"), ("host", "example.com")]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_plain_text_is_untouched() {
        assert_eq!(expand("no placeholders", &props()).unwrap(), "no placeholders");
        assert_eq!(expand("", &props()).unwrap(), "");
    }

    #[test]
    fn test_substitutes_properties() {
        assert_eq!(expand("${realm.name}", &props()).unwrap(), "file");
        assert_eq!(
            expand("https://${host}/realm/${realm.name}", &props()).unwrap(),
            "https://example.com/realm/file"
        );
    }

    #[test]
    fn test_escape_yields_literal_placeholder() {
        assert_eq!(expand("${{x}}", &props()).unwrap(), "${x}");
        assert_eq!(
            expand("${{host}} is ${host}", &props()).unwrap(),
            "${host} is example.com"
        );
    }

    #[test]
    fn test_unresolved_placeholder_is_an_error() {
        assert_eq!(
            expand("${missing}", &props()),
            Err(ExpandError::Unresolved("missing".into()))
        );
        assert_eq!(
            ExpandError::Unresolved("missing".into()).to_string(),
            "no property defined for placeholder ${missing}"
        );
    }

    #[test]
    fn test_unterminated_placeholder_passes_through() {
        assert_eq!(expand("cost: ${host", &props()).unwrap(), "cost: ${host");
    }

    #[test]
    fn test_map_properties_are_settable() {
        let props = MapProperties::new();
        assert!(expand("${k}", &props).is_err());
        props.set("k", "v1");
        assert_eq!(expand("${k}", &props).unwrap(), "v1");
        props.set("k", "v2");
        assert_eq!(expand("${k}", &props).unwrap(), "v2");
        assert_eq!(props.remove("k").as_deref(), Some("v2"));
    }
}
