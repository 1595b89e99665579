//! Per-symbolic-name version index

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bnd_version::{Version, VersionRange};

use super::Strategy;
use crate::capability_index::CapabilityIndex;
use crate::error::{BndError, Result};
use crate::resource::{CapabilityRef, Requirement, Resource};

pub const RANGE_LATEST: &str = "latest";
pub const RANGE_PROJECT: &str = "project";

/// Resources of one repository snapshot, addressable by symbolic name and
/// version and by capability.
///
/// Resources live in an arena; the per-name maps hold arena positions.
#[derive(Debug, Default)]
pub struct VersionedRepositoryIndex {
    resources: Vec<Arc<Resource>>,
    by_bsn: HashMap<String, BTreeMap<Version, usize>>,
    capabilities: CapabilityIndex,
}

impl VersionedRepositoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource, keyed by identity and declared version.
    ///
    /// Resources without an identity are skipped. An unparseable version is
    /// indexed as `0.0.0`. A second resource with the same key replaces the first.
    pub fn add_resource(&mut self, resource: Resource) -> Option<Arc<Resource>> {
        let Some(bsn) = resource.identity().map(str::to_string) else {
            log::warn!("Skipping resource without identity");
            return None;
        };
        let version = match resource.declared_version() {
            Ok(v) => v,
            Err(e) => {
                log::warn!("{}: {}; indexing as {}", bsn, e, Version::EMPTY);
                Version::EMPTY
            }
        };

        let resource = Arc::new(resource);
        let existing = self.by_bsn.get(&bsn).and_then(|versions| versions.get(&version)).copied();
        match existing {
            Some(slot) => {
                self.resources[slot] = Arc::clone(&resource);
                self.rebuild_capabilities();
            }
            None => {
                let slot = self.resources.len();
                self.by_bsn.entry(bsn).or_default().insert(version, slot);
                self.resources.push(Arc::clone(&resource));
                self.capabilities.add_resource(&resource);
            }
        }
        Some(resource)
    }

    fn rebuild_capabilities(&mut self) {
        self.capabilities.clear();
        for resource in &self.resources {
            self.capabilities.add_resource(resource);
        }
    }

    /// Select a resource.
    ///
    /// `range` may be `project` (no result), `latest` (highest version), a
    /// version range, or `None` meaning `0.0.0`. `Exact` accepts only a bare
    /// version, so `latest` and real ranges are rejected with it.
    pub fn resolve(&self, bsn: &str, range: Option<&str>, strategy: Strategy) -> Result<Option<Arc<Resource>>> {
        let range = range.map(str::trim).unwrap_or("0.0.0");

        if range == RANGE_PROJECT {
            return Ok(None);
        }

        let Some(versions) = self.by_bsn.get(bsn) else {
            return Ok(None);
        };

        if range == RANGE_LATEST {
            if strategy == Strategy::Exact {
                return Err(BndError::InvalidStrategy {
                    strategy: strategy.to_string(),
                    range: range.to_string(),
                });
            }
            return Ok(versions.values().next_back().map(|&slot| Arc::clone(&self.resources[slot])));
        }

        let parsed = VersionRange::parse(range)?;

        let slot = match strategy {
            Strategy::Exact => {
                if parsed.is_range() {
                    return Err(BndError::InvalidStrategy {
                        strategy: strategy.to_string(),
                        range: range.to_string(),
                    });
                }
                find_version(versions, parsed.low())
            }
            Strategy::Lowest => narrow_versions(versions, &parsed).first().copied(),
            Strategy::Highest => narrow_versions(versions, &parsed).last().copied(),
        };

        Ok(slot.map(|slot| Arc::clone(&self.resources[slot])))
    }

    /// Symbolic names in this index, sorted, optionally narrowed by a glob pattern.
    pub fn list(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let matcher = pattern
            .map(glob::Pattern::new)
            .transpose()
            .map_err(|e| BndError::Config(format!("invalid pattern: {}", e)))?;

        let mut names: Vec<String> = self
            .by_bsn
            .keys()
            .filter(|name| matcher.as_ref().map_or(true, |m| m.matches(name)))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn versions(&self, bsn: &str) -> Vec<Version> {
        self.by_bsn
            .get(bsn)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn find_providers(&self, requirement: &Requirement) -> Vec<CapabilityRef> {
        self.capabilities.find_matching(requirement)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Exact lookup. Without a qualifier, the highest entry sharing major, minor
/// and micro is returned, so `1.2.3` finds `1.2.3.SNAPSHOT`.
fn find_version(versions: &BTreeMap<Version, usize>, wanted: &Version) -> Option<usize> {
    if wanted.qualifier().is_some() {
        return versions.get(wanted).copied();
    }
    versions
        .range(wanted.clone()..)
        .take_while(|(v, _)| v.same_triple(wanted))
        .last()
        .map(|(_, &slot)| slot)
}

/// Arena slots whose version falls in the range, ascending.
fn narrow_versions(versions: &BTreeMap<Version, usize>, range: &VersionRange) -> Vec<usize> {
    let mut matched = Vec::new();
    for (version, &slot) in versions.range(range.low().clone()..) {
        if range.includes(version) {
            matched.push(slot);
        }
        if range.is_range() && range.high().is_some_and(|high| version >= high) {
            break;
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace;
    use crate::resource::{Capability, ResourceBuilder};

    fn resource(bsn: &str, version: &str) -> Resource {
        ResourceBuilder::new()
            .identity(bsn, Version::parse(version).unwrap())
            .build()
    }

    fn index(entries: &[(&str, &str)]) -> VersionedRepositoryIndex {
        let mut index = VersionedRepositoryIndex::new();
        for (bsn, version) in entries {
            index.add_resource(resource(bsn, version));
        }
        index
    }

    fn resolved(index: &VersionedRepositoryIndex, bsn: &str, range: Option<&str>, strategy: Strategy) -> Option<String> {
        index
            .resolve(bsn, range, strategy)
            .unwrap()
            .map(|r| r.version().to_string())
    }

    fn sample() -> VersionedRepositoryIndex {
        index(&[
            ("a", "1.0.0"),
            ("a", "1.1.0"),
            ("a", "1.2.0.SNAPSHOT"),
            ("a", "1.2.0"),
            ("a", "2.0.0"),
            ("b", "0.1.0"),
        ])
    }

    #[test]
    fn test_highest_and_lowest() {
        let idx = sample();
        assert_eq!(resolved(&idx, "a", Some("[1.0,2.0)"), Strategy::Highest).as_deref(), Some("1.2.0"));
        assert_eq!(resolved(&idx, "a", Some("[1.0,2.0)"), Strategy::Lowest).as_deref(), Some("1.0.0"));
        assert_eq!(resolved(&idx, "a", Some("(1.0,2.0]"), Strategy::Lowest).as_deref(), Some("1.1.0"));
        assert_eq!(resolved(&idx, "a", Some("(1.0,2.0]"), Strategy::Highest).as_deref(), Some("2.0.0"));
    }

    #[test]
    fn test_bare_version_is_lower_bound() {
        let idx = sample();
        assert_eq!(resolved(&idx, "a", Some("1.1"), Strategy::Highest).as_deref(), Some("2.0.0"));
        assert_eq!(resolved(&idx, "a", Some("1.1"), Strategy::Lowest).as_deref(), Some("1.1.0"));
    }

    #[test]
    fn test_missing_range_defaults_to_zero() {
        let idx = sample();
        assert_eq!(resolved(&idx, "a", None, Strategy::Highest).as_deref(), Some("2.0.0"));
        assert_eq!(resolved(&idx, "a", None, Strategy::Lowest).as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_latest_and_project() {
        let idx = sample();
        assert_eq!(resolved(&idx, "a", Some("latest"), Strategy::Lowest).as_deref(), Some("2.0.0"));
        assert_eq!(resolved(&idx, "a", Some("project"), Strategy::Highest), None);
        assert_eq!(resolved(&idx, "missing", Some("latest"), Strategy::Highest), None);
    }

    #[test]
    fn test_exact_lookup() {
        let idx = sample();
        assert_eq!(resolved(&idx, "a", Some("1.1.0"), Strategy::Exact).as_deref(), Some("1.1.0"));
        assert_eq!(
            resolved(&idx, "a", Some("1.2.0.SNAPSHOT"), Strategy::Exact).as_deref(),
            Some("1.2.0.SNAPSHOT")
        );
        assert_eq!(resolved(&idx, "a", Some("1.3.0"), Strategy::Exact), None);
        assert_eq!(resolved(&idx, "a", Some("[1.1.0,1.1.0]"), Strategy::Exact).as_deref(), Some("1.1.0"));
    }

    #[test]
    fn test_exact_without_qualifier_takes_highest_qualified() {
        let idx = index(&[("c", "1.0.0.a"), ("c", "1.0.0.b"), ("c", "1.0.1")]);
        assert_eq!(resolved(&idx, "c", Some("1.0.0"), Strategy::Exact).as_deref(), Some("1.0.0.b"));
    }

    #[test]
    fn test_exact_with_interval_is_rejected() {
        let idx = sample();
        assert!(matches!(
            idx.resolve("a", Some("[1.0,2.0)"), Strategy::Exact),
            Err(BndError::InvalidStrategy { .. })
        ));
    }

    #[test]
    fn test_exact_rejects_latest() {
        let idx = sample();
        assert!(matches!(
            idx.resolve("a", Some("latest"), Strategy::Exact),
            Err(BndError::InvalidStrategy { .. })
        ));
        assert!(idx.resolve("a", Some("latest"), Strategy::Lowest).unwrap().is_some());
    }

    #[test]
    fn test_no_match_is_empty() {
        let idx = sample();
        assert_eq!(resolved(&idx, "a", Some("[3.0,4.0)"), Strategy::Highest), None);
        assert_eq!(resolved(&idx, "zzz", Some("1.0"), Strategy::Highest), None);
    }

    #[test]
    fn test_malformed_range_is_error() {
        assert!(sample().resolve("a", Some("[1.0"), Strategy::Highest).is_err());
    }

    #[test]
    fn test_resource_without_identity_skipped() {
        let mut idx = VersionedRepositoryIndex::new();
        assert!(idx.add_resource(Resource::new(vec![Capability::new(namespace::PACKAGE)], vec![])).is_none());
        assert!(idx.is_empty());
    }

    #[test]
    fn test_unparseable_version_indexed_as_zero() {
        let mut idx = VersionedRepositoryIndex::new();
        idx.add_resource(Resource::new(
            vec![Capability::new(namespace::IDENTITY)
                .with_attribute(namespace::IDENTITY, "odd")
                .with_attribute(namespace::VERSION_ATTRIBUTE, "1.x")],
            vec![],
        ));
        assert_eq!(idx.versions("odd"), vec![Version::EMPTY]);
    }

    #[test]
    fn test_duplicate_key_replaces_entry() {
        let mut idx = VersionedRepositoryIndex::new();
        idx.add_resource(
            ResourceBuilder::new()
                .identity("a", Version::new(1, 0, 0))
                .export_package("old.pkg", Version::new(1, 0, 0))
                .build(),
        );
        idx.add_resource(
            ResourceBuilder::new()
                .identity("a", Version::new(1, 0, 0))
                .export_package("new.pkg", Version::new(1, 0, 0))
                .build(),
        );
        assert_eq!(idx.len(), 1);
        let providers = idx.find_providers(&Requirement::new(namespace::PACKAGE));
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].capability().name(), Some("new.pkg"));
    }

    #[test]
    fn test_list_with_glob() {
        let idx = index(&[("org.apache.felix", "1.0"), ("org.apache.aries", "1.0"), ("com.example", "1.0")]);
        assert_eq!(idx.list(None).unwrap(), vec!["com.example", "org.apache.aries", "org.apache.felix"]);
        assert_eq!(idx.list(Some("org.apache.*")).unwrap(), vec!["org.apache.aries", "org.apache.felix"]);
        assert!(idx.list(Some("[")).is_err());
    }

    #[test]
    fn test_versions_sorted() {
        let idx = index(&[("a", "2.0"), ("a", "1.0"), ("a", "1.5")]);
        assert_eq!(
            idx.versions("a"),
            vec![Version::new(1, 0, 0), Version::new(1, 5, 0), Version::new(2, 0, 0)]
        );
        assert!(idx.versions("none").is_empty());
    }
}
