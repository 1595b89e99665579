//! Typed attribute values

use bnd_version::Version;
use indexmap::IndexMap;
use std::fmt;

pub type Attributes = IndexMap<String, AttrValue>;
pub type Directives = IndexMap<String, String>;

/// A capability attribute value.
///
/// Filter comparisons are driven by the variant: strings compare lexically,
/// numbers numerically and versions by version order. A list matches when any
/// element matches.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    String(String),
    Long(i64),
    Double(f64),
    Version(Version),
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// Parse a raw value for a declared type name such as `Version` or `List<String>`.
    pub fn parse_typed(type_name: &str, raw: &str) -> Option<Self> {
        let type_name = type_name.trim();
        if let Some(inner) = type_name
            .strip_prefix("List<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            let items = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|item| Self::parse_typed(inner, item))
                .collect::<Option<Vec<_>>>()?;
            return Some(AttrValue::List(items));
        }

        match type_name {
            "String" => Some(AttrValue::String(raw.to_string())),
            "Long" => raw.trim().parse().ok().map(AttrValue::Long),
            "Double" => raw.trim().parse().ok().map(AttrValue::Double),
            "Version" => Version::parse(raw).ok().map(AttrValue::Version),
            _ => None,
        }
    }

    /// The declared type name, as used in typed attribute keys.
    pub fn type_name(&self) -> String {
        match self {
            AttrValue::String(_) => "String".to_string(),
            AttrValue::Long(_) => "Long".to_string(),
            AttrValue::Double(_) => "Double".to_string(),
            AttrValue::Version(_) => "Version".to_string(),
            AttrValue::List(items) => {
                let inner = items.first().map(|i| i.type_name()).unwrap_or_else(|| "String".to_string());
                format!("List<{}>", inner)
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_version(&self) -> Option<&Version> {
        match self {
            AttrValue::Version(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            AttrValue::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// Iterate string values of a scalar or list attribute.
    pub fn strings(&self) -> Vec<&str> {
        match self {
            AttrValue::String(s) => vec![s.as_str()],
            AttrValue::List(items) => items.iter().filter_map(AttrValue::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::String(s) => write!(f, "{}", s),
            AttrValue::Long(n) => write!(f, "{}", n),
            AttrValue::Double(d) => write!(f, "{}", d),
            AttrValue::Version(v) => write!(f, "{}", v),
            AttrValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::String(value)
    }
}

impl From<Version> for AttrValue {
    fn from(value: Version) -> Self {
        AttrValue::Version(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Long(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Double(value)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(values: Vec<String>) -> Self {
        AttrValue::List(values.into_iter().map(AttrValue::String).collect())
    }
}
