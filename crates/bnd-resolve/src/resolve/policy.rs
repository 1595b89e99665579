//! Candidate exclusion and preference policies.

use std::fmt;
use std::str::FromStr;

use bnd_version::{Version, VersionRange};

use crate::error::{BndError, Result};
use crate::resource::{Requirement, Resource};

/// Splits `bsn;version=...` into the name and optional version text.
fn split_identity(s: &str) -> Result<(String, Option<String>)> {
    let mut parts = s.split(';').map(str::trim);
    let bsn = parts.next().filter(|bsn| !bsn.is_empty()).ok_or_else(|| {
        BndError::Config(format!("missing symbolic name in \"{}\"", s))
    })?;

    let mut version = None;
    for part in parts {
        match part.split_once('=') {
            Some((key, value)) if key.trim() == "version" => {
                version = Some(value.trim().trim_matches('"').to_string());
            }
            _ => return Err(BndError::Config(format!("unsupported attribute \"{}\" in \"{}\"", part, s))),
        }
    }
    Ok((bsn.to_string(), version))
}

/// Resources that must never be offered as candidates.
#[derive(Debug, Clone)]
pub enum BlacklistEntry {
    /// By identity. A bare version excludes exactly that version; a range
    /// excludes the versions inside it; no version excludes every version.
    Identity { bsn: String, range: Option<VersionRange> },
    /// Any resource with a capability matching the requirement
    Requirement(Requirement),
}

impl BlacklistEntry {
    pub fn identity(bsn: impl Into<String>, version: Option<&str>) -> Result<Self> {
        let range = version.map(exact_or_range).transpose()?;
        Ok(Self::Identity { bsn: bsn.into(), range })
    }

    pub fn excludes(&self, resource: &Resource) -> bool {
        match self {
            Self::Identity { bsn, range } => {
                resource.identity() == Some(bsn.as_str())
                    && range.as_ref().map_or(true, |range| range.includes(&resource.version()))
            }
            Self::Requirement(requirement) => resource.capabilities().iter().any(|cap| requirement.matches(cap)),
        }
    }
}

fn exact_or_range(version: &str) -> Result<VersionRange> {
    if VersionRange::is_version_range(version) {
        Ok(VersionRange::parse(version)?)
    } else {
        Ok(VersionRange::exact(Version::parse(version)?))
    }
}

impl FromStr for BlacklistEntry {
    type Err = BndError;

    /// `bsn`, `bsn;version=1.2.3` or `bsn;version="[1,2)"`
    fn from_str(s: &str) -> Result<Self> {
        let (bsn, version) = split_identity(s)?;
        Self::identity(bsn, version.as_deref())
    }
}

/// A resolve preference: resources with this identity rank ahead of others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preference {
    pub bsn: String,
    pub range: Option<VersionRange>,
}

impl Preference {
    pub fn new(bsn: impl Into<String>) -> Self {
        Self {
            bsn: bsn.into(),
            range: None,
        }
    }

    pub fn with_range(mut self, range: VersionRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn matches(&self, resource: &Resource) -> bool {
        resource.identity() == Some(self.bsn.as_str())
            && self
                .range
                .as_ref()
                .map_or(true, |range| range.includes(&resource.version()))
    }
}

impl FromStr for Preference {
    type Err = BndError;

    /// A bare version is a lower bound, as in any version range.
    fn from_str(s: &str) -> Result<Self> {
        let (bsn, version) = split_identity(s)?;
        let range = version.as_deref().map(VersionRange::parse).transpose()?;
        Ok(Self { bsn, range })
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{};version=\"{}\"", self.bsn, range),
            None => f.write_str(&self.bsn),
        }
    }
}
