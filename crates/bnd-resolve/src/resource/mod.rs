//! Resource model: resources, capabilities and requirements.

mod attrs;
mod builder;
mod capability;

pub use attrs::{AttrValue, Attributes, Directives};
pub use builder::ResourceBuilder;
pub use capability::{Capability, Requirement};

use bnd_version::{Version, VersionError};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::namespace;

/// An installable unit described by its capabilities and requirements.
///
/// Two resources are equal when their identity and version match, wherever
/// they came from.
#[derive(Debug, Clone, Default)]
pub struct Resource {
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
}

impl Resource {
    pub fn new(capabilities: Vec<Capability>, requirements: Vec<Requirement>) -> Self {
        Self {
            capabilities,
            requirements,
        }
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Capabilities in one namespace, with their positions in [`Resource::capabilities`].
    pub fn capabilities_in<'a>(&'a self, ns: &'a str) -> impl Iterator<Item = (usize, &'a Capability)> + 'a {
        self.capabilities
            .iter()
            .enumerate()
            .filter(move |(_, cap)| cap.namespace() == ns)
    }

    fn identity_capabilities(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities
            .iter()
            .filter(|cap| cap.namespace() == namespace::IDENTITY)
    }

    /// Number of `osgi.identity` capabilities; well-formed resources have one.
    pub fn identity_count(&self) -> usize {
        self.identity_capabilities().count()
    }

    /// The symbolic name from the first identity capability
    pub fn identity(&self) -> Option<&str> {
        self.identity_capabilities().next().and_then(Capability::name)
    }

    /// The declared identity version.
    ///
    /// A missing version is `0.0.0`; a version given as an unparseable string is an error.
    pub fn declared_version(&self) -> Result<Version, VersionError> {
        let attr = self
            .identity_capabilities()
            .next()
            .and_then(|cap| cap.attribute(namespace::VERSION_ATTRIBUTE));
        match attr {
            Some(AttrValue::Version(v)) => Ok(v.clone()),
            Some(AttrValue::String(s)) => Version::parse(s),
            _ => Ok(Version::EMPTY),
        }
    }

    /// The identity version, falling back to `0.0.0`.
    pub fn version(&self) -> Version {
        self.declared_version().unwrap_or(Version::EMPTY)
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.identity_capabilities()
            .next()
            .and_then(|cap| cap.attribute(namespace::TYPE_ATTRIBUTE))
            .and_then(AttrValue::as_str)
    }

    fn content_capability(&self) -> Option<&Capability> {
        self.capabilities
            .iter()
            .find(|cap| cap.namespace() == namespace::CONTENT)
    }

    pub fn content_url(&self) -> Option<&str> {
        self.content_capability()
            .and_then(|cap| cap.attribute(namespace::CONTENT_URL_ATTRIBUTE))
            .and_then(AttrValue::as_str)
    }

    /// SHA-256 of the artifact, hex encoded
    pub fn content_sha256(&self) -> Option<&str> {
        self.content_capability().and_then(Capability::name)
    }

    /// True when the resource exports the given package.
    pub fn exports_package(&self, package: &str) -> bool {
        self.capabilities_in(namespace::PACKAGE)
            .any(|(_, cap)| cap.name() == Some(package))
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity() && self.version() == other.version()
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
        self.version().hash(state);
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity() {
            Some(bsn) => write!(f, "{};version={}", bsn, self.version()),
            None => write!(f, "<anonymous resource>"),
        }
    }
}

/// A capability addressed through its owning resource.
///
/// Equality is by owner instance and position, so the same bundle served by
/// two repositories yields two distinct references.
#[derive(Debug, Clone)]
pub struct CapabilityRef {
    resource: Arc<Resource>,
    index: usize,
}

impl CapabilityRef {
    /// Returns `None` if `index` is out of bounds.
    pub fn new(resource: Arc<Resource>, index: usize) -> Option<Self> {
        if index < resource.capabilities.len() {
            Some(Self { resource, index })
        } else {
            None
        }
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capability(&self) -> &Capability {
        &self.resource.capabilities[self.index]
    }

    pub fn namespace(&self) -> &str {
        self.capability().namespace()
    }

    /// All capabilities of a resource in one namespace
    pub fn all_in(resource: &Arc<Resource>, ns: &str) -> Vec<CapabilityRef> {
        resource
            .capabilities_in(ns)
            .map(|(index, _)| CapabilityRef {
                resource: Arc::clone(resource),
                index,
            })
            .collect()
    }
}

impl PartialEq for CapabilityRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.resource, &other.resource) && self.index == other.index
    }
}

impl Eq for CapabilityRef {}

impl Hash for CapabilityRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.resource) as usize).hash(state);
        self.index.hash(state);
    }
}

impl fmt::Display for CapabilityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cap = self.capability();
        write!(f, "{}", cap.namespace())?;
        for (key, value) in cap.attributes() {
            write!(f, ";{}={}", key, value)?;
        }
        write!(f, " [{}]", self.resource)
    }
}
