//! Version ranges in OSGi interval notation

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

use crate::version::{Version, VersionError};

lazy_static! {
    static ref RANGE_RE: Regex =
        Regex::new(r"^([\[(])\s*([^,\s]+)\s*,\s*([^,\s\])]+)\s*([\])])$").unwrap();
}

/// A version interval.
///
/// `[a,b)`, `(a,b]`, `[a,b]` and `(a,b)` denote bounded intervals. A bare
/// version `a` means `a` and everything above it, so `high` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    low: Version,
    low_inclusive: bool,
    high: Option<Version>,
    high_inclusive: bool,
}

impl VersionRange {
    /// Create a bounded range, rejecting `low > high`.
    pub fn new(
        low: Version,
        low_inclusive: bool,
        high: Version,
        high_inclusive: bool,
    ) -> Result<Self, VersionError> {
        if low > high {
            return Err(VersionError::LowAboveHigh {
                low: low.to_string(),
                high: high.to_string(),
            });
        }
        Ok(Self {
            low,
            low_inclusive,
            high: Some(high),
            high_inclusive,
        })
    }

    /// `version` and everything above it
    pub fn at_least(version: Version) -> Self {
        Self {
            low: version,
            low_inclusive: true,
            high: None,
            high_inclusive: false,
        }
    }

    /// `[version,version]`
    pub fn exact(version: Version) -> Self {
        Self {
            low: version.clone(),
            low_inclusive: true,
            high: Some(version),
            high_inclusive: true,
        }
    }

    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();

        if !Self::is_version_range(trimmed) {
            return Version::parse(trimmed)
                .map(Self::at_least)
                .map_err(|_| VersionError::InvalidRange {
                    range: input.to_string(),
                    reason: "not a version".to_string(),
                });
        }

        let caps = RANGE_RE.captures(trimmed).ok_or_else(|| VersionError::InvalidRange {
            range: input.to_string(),
            reason: "expected [low,high], [low,high), (low,high] or (low,high)".to_string(),
        })?;

        let bound = |idx: usize| {
            Version::parse(&caps[idx]).map_err(|e| VersionError::InvalidRange {
                range: input.to_string(),
                reason: e.to_string(),
            })
        };

        Self::new(bound(2)?, &caps[1] == "[", bound(3)?, &caps[4] == "]")
    }

    /// True when the string uses interval notation rather than a bare version.
    pub fn is_version_range(input: &str) -> bool {
        matches!(input.trim_start().chars().next(), Some('[') | Some('('))
    }

    pub fn low(&self) -> &Version {
        &self.low
    }

    pub fn high(&self) -> Option<&Version> {
        self.high.as_ref()
    }

    pub fn includes_low(&self) -> bool {
        self.low_inclusive
    }

    pub fn includes_high(&self) -> bool {
        self.high_inclusive
    }

    /// False for a bare version and for a degenerate interval whose bounds are equal.
    pub fn is_range(&self) -> bool {
        match &self.high {
            Some(high) => *high != self.low,
            None => false,
        }
    }

    pub fn includes(&self, version: &Version) -> bool {
        let above_low = if self.low_inclusive {
            *version >= self.low
        } else {
            *version > self.low
        };
        if !above_low {
            return false;
        }
        match &self.high {
            Some(high) if self.high_inclusive => version <= high,
            Some(high) => version < high,
            None => true,
        }
    }

    /// Render the range as an LDAP filter over the given version attribute.
    pub fn to_filter(&self, attribute: &str) -> String {
        let low = if self.low_inclusive {
            format!("({}>={})", attribute, self.low)
        } else {
            format!("(!({}<={}))", attribute, self.low)
        };

        match &self.high {
            None => low,
            Some(high) => {
                let high = if self.high_inclusive {
                    format!("({}<={})", attribute, high)
                } else {
                    format!("(!({}>={}))", attribute, high)
                };
                format!("(&{}{})", low, high)
            }
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.high {
            None => write!(f, "{}", self.low),
            Some(high) => write!(
                f,
                "{}{},{}{}",
                if self.low_inclusive { '[' } else { '(' },
                self.low,
                high,
                if self.high_inclusive { ']' } else { ')' }
            ),
        }
    }
}

impl FromStr for VersionRange {
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

    fn r(s: &str) -> VersionRange {
        VersionRange::parse(s).unwrap()
    }

    #[test]
    fn test_bare_version_is_open_ended() {
        let range = r("1.2");
        assert!(!range.is_range());
        assert_eq!(range.high(), None);
        assert!(!range.includes(&v("1.1.9")));
        assert!(range.includes(&v("1.2.0")));
        assert!(range.includes(&v("99.0.0")));
    }

    #[test]
    fn test_interval_bounds() {
        let range = r("[1.0,2.0)");
        assert!(range.is_range());
        assert!(range.includes(&v("1.0.0")));
        assert!(range.includes(&v("1.99.99.x")));
        assert!(!range.includes(&v("2.0.0")));

        let range = r("(1.0,2.0]");
        assert!(!range.includes(&v("1.0.0")));
        assert!(range.includes(&v("1.0.0.a")));
        assert!(range.includes(&v("2.0.0")));
        assert!(!range.includes(&v("2.0.0.a")));
    }

    #[test]
    fn test_whitespace_inside_brackets() {
        let range = r(" [ 1.0 , 2.0 ) ");
        assert_eq!(range.low(), &v("1.0.0"));
        assert_eq!(range.high(), Some(&v("2.0.0")));
    }

    #[test]
    fn test_degenerate_range_is_not_a_range() {
        let range = r("[1.0.0,1.0.0]");
        assert!(!range.is_range());
        assert!(range.includes(&v("1.0.0")));
        assert!(!range.includes(&v("1.0.1")));
        assert_eq!(VersionRange::exact(v("1.0.0")), range);
    }

    #[test]
    fn test_low_above_high_rejected() {
        assert!(matches!(
            VersionRange::parse("[2.0,1.0]"),
            Err(VersionError::LowAboveHigh { .. })
        ));
    }

    #[test]
    fn test_malformed_ranges() {
        for bad in ["[1.0", "[1.0,2.0", "[a,b)", "[1.0;2.0)", "foo", "[1.0,2.0,3.0)"] {
            assert!(VersionRange::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_display_round_trips() {
        assert_eq!(r("[1,2)").to_string(), "[1.0.0,2.0.0)");
        assert_eq!(r("(1,2]").to_string(), "(1.0.0,2.0.0]");
        assert_eq!(r("1.5").to_string(), "1.5.0");
    }

    #[test]
    fn test_to_filter() {
        assert_eq!(r("1.0").to_filter("version"), "(version>=1.0.0)");
        assert_eq!(
            r("[1.0,2.0)").to_filter("version"),
            "(&(version>=1.0.0)(!(version>=2.0.0)))"
        );
        assert_eq!(
            r("(1.0,2.0]").to_filter("bundle-version"),
            "(&(!(bundle-version<=1.0.0))(bundle-version<=2.0.0))"
        );
    }

    #[test]
    fn test_is_version_range() {
        assert!(VersionRange::is_version_range("[1,2)"));
        assert!(VersionRange::is_version_range(" (1,2)"));
        assert!(!VersionRange::is_version_range("1.2"));
        assert!(!VersionRange::is_version_range("latest"));
    }
}
