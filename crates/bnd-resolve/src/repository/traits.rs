use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use bnd_version::Version;

use crate::cache::CachingResourceHandle;
use crate::error::{BndError, Result};
use crate::resource::{CapabilityRef, Requirement, Resource};

/// How to pick among versions that satisfy a range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    Lowest,
    #[default]
    Highest,
    /// The range names a single version
    Exact,
}

impl FromStr for Strategy {
    type Err = BndError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lowest" => Ok(Strategy::Lowest),
            "highest" => Ok(Strategy::Highest),
            "exact" => Ok(Strategy::Exact),
            other => Err(BndError::Config(format!("unknown strategy \"{}\"", other))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Lowest => "lowest",
            Strategy::Highest => "highest",
            Strategy::Exact => "exact",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of storing an artifact in a writable repository
#[derive(Debug, Clone)]
pub struct PutResult {
    /// Where the artifact now lives
    pub artifact: PathBuf,
    /// Hex SHA-256 of the stored artifact
    pub digest: String,
}

/// Repository plugin contract.
///
/// `range` accepts a version range, a bare version, `latest` (highest version)
/// or `project` (never served by a repository). A missing range means `0.0.0`.
pub trait Repository: Send + Sync {
    /// Unique name used for ordering and reporting
    fn name(&self) -> &str;

    /// Symbolic names, optionally narrowed by a glob pattern
    fn list(&self, pattern: Option<&str>) -> Result<Vec<String>>;

    /// All versions of a symbolic name in ascending order
    fn versions(&self, bsn: &str) -> Result<Vec<Version>>;

    /// Select a resource by name and version range.
    fn find_resource(&self, bsn: &str, range: Option<&str>, strategy: Strategy) -> Result<Option<Arc<Resource>>>;

    /// Handle for the selected resource's artifact
    fn get_handle(
        &self,
        bsn: &str,
        range: Option<&str>,
        strategy: Strategy,
        properties: &HashMap<String, String>,
    ) -> Result<Option<CachingResourceHandle>>;

    /// Resolve the artifact to a local file, downloading it if necessary.
    fn get(
        &self,
        bsn: &str,
        range: Option<&str>,
        strategy: Strategy,
        properties: &HashMap<String, String>,
    ) -> Result<Option<PathBuf>> {
        match self.get_handle(bsn, range, strategy, properties)? {
            Some(handle) => handle.request().map(Some),
            None => Ok(None),
        }
    }

    /// Capabilities of this repository matching a requirement
    fn find_providers(&self, requirement: &Requirement) -> Result<Vec<CapabilityRef>>;

    fn can_write(&self) -> bool {
        false
    }

    /// Store an artifact described by `resource`.
    fn put(&self, artifact: &Path, resource: Resource) -> Result<PutResult> {
        let _ = (artifact, resource);
        Err(BndError::ReadOnly {
            name: self.name().to_string(),
        })
    }

    /// Incremented each time the repository's index is rebuilt
    fn generation(&self) -> u64 {
        0
    }
}
