//! LDAP-style capability filters (RFC 1960)
//!
//! Filters select capabilities by their attributes:
//!
//! ```
//! use bnd_resolve::filter::Filter;
//! use bnd_resolve::resource::{AttrValue, Attributes};
//! use bnd_version::Version;
//!
//! let filter = Filter::parse("(&(osgi.wiring.package=org.example)(version>=1.2))").unwrap();
//!
//! let mut attrs = Attributes::new();
//! attrs.insert("osgi.wiring.package".into(), AttrValue::from("org.example"));
//! attrs.insert("version".into(), AttrValue::Version(Version::new(1, 3, 0)));
//! assert!(filter.matches(&attrs));
//! ```

mod parser;

use bnd_version::Version;
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

use crate::resource::{AttrValue, Attributes};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at position {position} in \"{filter}\"")]
pub struct FilterError {
    pub filter: String,
    pub position: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equal { attr: String, value: String },
    Approx { attr: String, value: String },
    GreaterEq { attr: String, value: String },
    LessEq { attr: String, value: String },
    Present(String),
    Substring {
        attr: String,
        initial: Option<String>,
        any: Vec<String>,
        last: Option<String>,
    },
}

#[derive(Clone, Copy)]
enum Op {
    Equal,
    Approx,
    GreaterEq,
    LessEq,
}

impl Filter {
    pub fn parse(source: &str) -> Result<Self, FilterError> {
        parser::Parser::new(source).parse()
    }

    /// Evaluate against an attribute map. A missing attribute makes its clause false.
    pub fn matches(&self, attrs: &Attributes) -> bool {
        match self {
            Filter::And(operands) => operands.iter().all(|f| f.matches(attrs)),
            Filter::Or(operands) => operands.iter().any(|f| f.matches(attrs)),
            Filter::Not(inner) => !inner.matches(attrs),
            Filter::Present(attr) => attrs.contains_key(attr),
            Filter::Equal { attr, value } => compare_attr(attrs, attr, Op::Equal, value),
            Filter::Approx { attr, value } => compare_attr(attrs, attr, Op::Approx, value),
            Filter::GreaterEq { attr, value } => compare_attr(attrs, attr, Op::GreaterEq, value),
            Filter::LessEq { attr, value } => compare_attr(attrs, attr, Op::LessEq, value),
            Filter::Substring {
                attr,
                initial,
                any,
                last,
            } => attrs
                .get(attr)
                .map(|value| {
                    value
                        .strings()
                        .into_iter()
                        .any(|s| substring_matches(s, initial.as_deref(), any, last.as_deref()))
                })
                .unwrap_or(false),
        }
    }
}

fn compare_attr(attrs: &Attributes, attr: &str, op: Op, operand: &str) -> bool {
    attrs
        .get(attr)
        .map(|value| compare_value(value, op, operand))
        .unwrap_or(false)
}

fn compare_value(value: &AttrValue, op: Op, operand: &str) -> bool {
    match value {
        AttrValue::List(items) => items.iter().any(|item| compare_value(item, op, operand)),
        AttrValue::String(s) => match op {
            Op::Approx => normalize_approx(s) == normalize_approx(operand),
            _ => check_ordering(s.as_str().cmp(operand), op),
        },
        AttrValue::Long(n) => operand
            .trim()
            .parse::<i64>()
            .map(|other| check_ordering(n.cmp(&other), op))
            .unwrap_or(false),
        AttrValue::Double(d) => operand
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|other| d.partial_cmp(&other))
            .map(|ordering| check_ordering(ordering, op))
            .unwrap_or(false),
        AttrValue::Version(v) => Version::parse(operand)
            .map(|other| check_ordering(v.cmp(&other), op))
            .unwrap_or(false),
    }
}

fn check_ordering(ordering: Ordering, op: Op) -> bool {
    match op {
        Op::Equal | Op::Approx => ordering == Ordering::Equal,
        Op::GreaterEq => ordering != Ordering::Less,
        Op::LessEq => ordering != Ordering::Greater,
    }
}

fn normalize_approx(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn substring_matches(value: &str, initial: Option<&str>, any: &[String], last: Option<&str>) -> bool {
    let mut rest = value;
    if let Some(prefix) = initial {
        match rest.strip_prefix(prefix) {
            Some(r) => rest = r,
            None => return false,
        }
    }
    if let Some(suffix) = last {
        match rest.strip_suffix(suffix) {
            Some(r) => rest = r,
            None => return false,
        }
    }
    for part in any {
        match rest.find(part.as_str()) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    true
}

/// Escape a value for use inside a filter expression.
pub fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '*' | '(' | ')') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(operands) | Filter::Or(operands) => {
                write!(f, "({}", if matches!(self, Filter::And(_)) { '&' } else { '|' })?;
                for operand in operands {
                    write!(f, "{}", operand)?;
                }
                write!(f, ")")
            }
            Filter::Not(inner) => write!(f, "(!{})", inner),
            Filter::Equal { attr, value } => write!(f, "({}={})", attr, escape_value(value)),
            Filter::Approx { attr, value } => write!(f, "({}~={})", attr, escape_value(value)),
            Filter::GreaterEq { attr, value } => write!(f, "({}>={})", attr, escape_value(value)),
            Filter::LessEq { attr, value } => write!(f, "({}<={})", attr, escape_value(value)),
            Filter::Present(attr) => write!(f, "({}=*)", attr),
            Filter::Substring {
                attr,
                initial,
                any,
                last,
            } => {
                write!(f, "({}=", attr)?;
                if let Some(initial) = initial {
                    write!(f, "{}", escape_value(initial))?;
                }
                write!(f, "*")?;
                for part in any {
                    write!(f, "{}*", escape_value(part))?;
                }
                if let Some(last) = last {
                    write!(f, "{}", escape_value(last))?;
                }
                write!(f, ")")
            }
        }
    }
}
