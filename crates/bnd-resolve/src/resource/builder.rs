use bnd_version::{Version, VersionRange};

use super::{Capability, Requirement, Resource};
use crate::filter::escape_value;
use crate::namespace;

/// Incrementally assembles a [`Resource`].
#[derive(Debug, Default)]
pub struct ResourceBuilder {
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
}

impl ResourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an `osgi.identity` capability of type `osgi.bundle`
    pub fn identity(self, bsn: &str, version: Version) -> Self {
        self.typed_identity(bsn, version, namespace::TYPE_BUNDLE)
    }

    pub fn typed_identity(self, bsn: &str, version: Version, resource_type: &str) -> Self {
        self.capability(
            Capability::new(namespace::IDENTITY)
                .with_attribute(namespace::IDENTITY, bsn)
                .with_attribute(namespace::VERSION_ATTRIBUTE, version)
                .with_attribute(namespace::TYPE_ATTRIBUTE, resource_type),
        )
    }

    /// Identity plus the bundle and host capabilities a regular bundle provides.
    pub fn bundle(self, bsn: &str, version: Version) -> Self {
        let wiring = |ns: &str| {
            Capability::new(ns)
                .with_attribute(ns, bsn)
                .with_attribute(namespace::BUNDLE_VERSION_ATTRIBUTE, version.clone())
        };
        let bundle = wiring(namespace::BUNDLE);
        let host = wiring(namespace::HOST);
        self.identity(bsn, version.clone())
            .capability(bundle)
            .capability(host)
    }

    /// Add an `osgi.content` capability; `sha256` becomes the capability's name attribute.
    pub fn content(self, url: &str, sha256: Option<&str>, size: Option<u64>) -> Self {
        let mut cap = Capability::new(namespace::CONTENT)
            .with_attribute(namespace::CONTENT_URL_ATTRIBUTE, url)
            .with_attribute(namespace::CONTENT_MIME_ATTRIBUTE, namespace::MIME_JAR);
        if let Some(sha) = sha256 {
            cap = cap.with_attribute(namespace::CONTENT, sha);
        }
        if let Some(size) = size {
            cap = cap.with_attribute(namespace::CONTENT_SIZE_ATTRIBUTE, size as i64);
        }
        self.capability(cap)
    }

    pub fn export_package(self, package: &str, version: Version) -> Self {
        self.capability(
            Capability::new(namespace::PACKAGE)
                .with_attribute(namespace::PACKAGE, package)
                .with_attribute(namespace::VERSION_ATTRIBUTE, version),
        )
    }

    pub fn import_package(self, package: &str, range: Option<&VersionRange>, optional: bool) -> Self {
        let requirement = name_requirement(namespace::PACKAGE, package, namespace::VERSION_ATTRIBUTE, range);
        self.requirement(if optional {
            requirement.with_directive(namespace::RESOLUTION_DIRECTIVE, namespace::RESOLUTION_OPTIONAL)
        } else {
            requirement
        })
    }

    pub fn require_bundle(self, bsn: &str, range: Option<&VersionRange>) -> Self {
        self.requirement(name_requirement(
            namespace::BUNDLE,
            bsn,
            namespace::BUNDLE_VERSION_ATTRIBUTE,
            range,
        ))
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn build(self) -> Resource {
        Resource::new(self.capabilities, self.requirements)
    }
}

fn name_requirement(ns: &str, name: &str, version_attr: &str, range: Option<&VersionRange>) -> Requirement {
    let name_filter = format!("({}={})", ns, escape_value(name));
    let filter = match range {
        Some(range) => format!("(&{}{})", name_filter, range.to_filter(version_attr)),
        None => name_filter,
    };
    Requirement::new(ns).with_directive(namespace::FILTER_DIRECTIVE, filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_adds_wiring_capabilities() {
        let r = ResourceBuilder::new().bundle("org.example", Version::new(1, 0, 0)).build();
        let namespaces: Vec<_> = r.capabilities().iter().map(Capability::namespace).collect();
        assert_eq!(namespaces, vec![namespace::IDENTITY, namespace::BUNDLE, namespace::HOST]);
    }

    #[test]
    fn test_import_package_filter() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        let r = ResourceBuilder::new()
            .identity("consumer", Version::new(1, 0, 0))
            .import_package("org.example", Some(&range), true)
            .build();
        let req = &r.requirements()[0];
        assert_eq!(
            req.filter_source(),
            Some("(&(osgi.wiring.package=org.example)(&(version>=1.0.0)(!(version>=2.0.0))))")
        );
        assert!(req.is_optional());

        let provider = ResourceBuilder::new()
            .export_package("org.example", Version::new(1, 5, 0))
            .build();
        assert!(req.matches(&provider.capabilities()[0]));
    }

    #[test]
    fn test_content_capability() {
        let r = ResourceBuilder::new()
            .identity("a", Version::new(1, 0, 0))
            .content("http://example.com/a.jar", Some("abc123"), Some(42))
            .build();
        assert_eq!(r.content_url(), Some("http://example.com/a.jar"));
        assert_eq!(r.content_sha256(), Some("abc123"));
    }
}
