//! OSGi version model

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

lazy_static! {
    // major(.minor(.micro(.qualifier)?)?)?
    static ref VERSION_RE: Regex =
        Regex::new(r"^(\d{1,9})(?:\.(\d{1,9})(?:\.(\d{1,9})(?:\.([-_0-9a-zA-Z]+))?)?)?$").unwrap();
}

/// Error type for version and range parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version string \"{0}\"")]
    InvalidVersion(String),
    #[error("Invalid version range \"{range}\": {reason}")]
    InvalidRange { range: String, reason: String },
    #[error("Low bound {low} is higher than high bound {high}")]
    LowAboveHigh { low: String, high: String },
}

/// An OSGi version: `major.minor.micro[.qualifier]`.
///
/// Versions are totally ordered. The numeric parts compare first; an absent
/// qualifier sorts before any present one, and present qualifiers compare
/// lexically. The field order below is what makes the derived ordering correct.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    major: u32,
    minor: u32,
    micro: u32,
    qualifier: Option<String>,
}

impl Version {
    /// The lowest version, `0.0.0`.
    pub const EMPTY: Version = Version::new(0, 0, 0);

    pub const fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: None,
        }
    }

    /// Build a version with a qualifier. An empty qualifier is treated as absent.
    pub fn with_qualifier(major: u32, minor: u32, micro: u32, qualifier: impl Into<String>) -> Self {
        let qualifier = qualifier.into();
        Self {
            major,
            minor,
            micro,
            qualifier: if qualifier.is_empty() { None } else { Some(qualifier) },
        }
    }

    /// Parse a version string.
    ///
    /// Surrounding whitespace is ignored and a blank string yields [`Version::EMPTY`].
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::EMPTY);
        }

        let caps = VERSION_RE
            .captures(trimmed)
            .ok_or_else(|| VersionError::InvalidVersion(input.to_string()))?;

        let number = |idx: usize| -> Result<u32, VersionError> {
            match caps.get(idx) {
                Some(m) => m
                    .as_str()
                    .parse::<u32>()
                    .map_err(|_| VersionError::InvalidVersion(input.to_string())),
                None => Ok(0),
            }
        };

        Ok(Self {
            major: number(1)?,
            minor: number(2)?,
            micro: number(3)?,
            qualifier: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }

    /// Check whether a string is a well-formed version.
    pub fn is_version(input: &str) -> bool {
        VERSION_RE.is_match(input.trim())
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn micro(&self) -> u32 {
        self.micro
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// The same version without its qualifier
    pub fn without_qualifier(&self) -> Self {
        Self::new(self.major, self.minor, self.micro)
    }

    /// True when both versions share major, minor and micro.
    pub fn same_triple(&self, other: &Version) -> bool {
        self.major == other.major && self.minor == other.minor && self.micro == other.micro
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if let Some(q) = &self.qualifier {
            write!(f, ".{}", q)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_partial_versions() {
        assert_eq!(v("1"), Version::new(1, 0, 0));
        assert_eq!(v("1.2"), Version::new(1, 2, 0));
        assert_eq!(v("1.2.3"), Version::new(1, 2, 3));
        assert_eq!(v(" 1.2.3 "), Version::new(1, 2, 3));
        assert_eq!(v("1.2.3.SNAPSHOT"), Version::with_qualifier(1, 2, 3, "SNAPSHOT"));
        assert_eq!(v("4.0.2.201210120843-x_y"), Version::with_qualifier(4, 0, 2, "201210120843-x_y"));
    }

    #[test]
    fn test_parse_blank_is_empty() {
        assert_eq!(v(""), Version::EMPTY);
        assert_eq!(v("   "), Version::EMPTY);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["a", "1.", "1..2", "1.2.3.", "1.2.3.q!", "-1", "1234567890", "1.2.3.4.5", "v1.0"] {
            assert!(Version::parse(bad).is_err(), "{bad} should be rejected");
            assert!(!Version::is_version(bad));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(v("1").to_string(), "1.0.0");
        assert_eq!(v("1.2.3.beta").to_string(), "1.2.3.beta");
    }

    #[test]
    fn test_ordering_numeric_then_qualifier() {
        assert!(v("1.0.0") < v("1.0.1"));
        assert!(v("1.9.0") < v("1.10.0"));
        assert!(v("2.0.0") > v("1.99.99"));
        // absent qualifier sorts before any qualifier
        assert!(v("1.0.0") < v("1.0.0.A"));
        assert!(v("1.0.0.A") < v("1.0.0.B"));
        assert!(v("1.0.0.Z") < v("1.0.1"));
        assert!(v("1.0.0.SNAPSHOT") < v("1.0.0.a"));
    }

    #[test]
    fn test_empty_qualifier_is_absent() {
        assert_eq!(Version::with_qualifier(1, 0, 0, ""), Version::new(1, 0, 0));
        assert_eq!(Version::with_qualifier(1, 0, 0, "").qualifier(), None);
    }

    #[test]
    fn test_same_triple() {
        assert!(v("1.2.3.a").same_triple(&v("1.2.3")));
        assert!(!v("1.2.4").same_triple(&v("1.2.3")));
        assert_eq!(v("1.2.3.a").without_qualifier(), v("1.2.3"));
    }
}
