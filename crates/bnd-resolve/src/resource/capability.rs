use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use bnd_version::VersionRange;

use super::attrs::{AttrValue, Attributes, Directives};
use crate::filter::{escape_value, Filter, FilterError};
use crate::namespace;

/// A typed, namespaced provision offered by a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    namespace: String,
    attributes: Attributes,
    directives: Directives,
}

impl Capability {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            attributes: Attributes::new(),
            directives: Directives::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_directive(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.directives.insert(key.into(), value.into());
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    pub fn attribute(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    pub fn directive(&self, key: &str) -> Option<&str> {
        self.directives.get(key).map(String::as_str)
    }

    /// The value of the attribute named after the namespace, e.g. the package name
    /// of an `osgi.wiring.package` capability.
    pub fn name(&self) -> Option<&str> {
        self.attribute(&self.namespace).and_then(AttrValue::as_str)
    }

    /// Whether this capability may satisfy a requirement with the given
    /// `effective` directive. Capabilities without one, or with `resolve`,
    /// always qualify.
    pub fn is_effective_for(&self, requirement: &Requirement) -> bool {
        match self.directive(namespace::EFFECTIVE_DIRECTIVE) {
            None | Some(namespace::EFFECTIVE_RESOLVE) => true,
            Some(effective) => requirement.directive(namespace::EFFECTIVE_DIRECTIVE) == Some(effective),
        }
    }
}

#[derive(Debug, Clone)]
enum FilterState {
    Absent,
    Parsed(Filter),
    Invalid,
}

/// A namespaced demand, optionally narrowed by a `filter` directive.
#[derive(Debug, Clone)]
pub struct Requirement {
    namespace: String,
    directives: Directives,
    filter: OnceLock<FilterState>,
}

impl Requirement {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            directives: Directives::new(),
            filter: OnceLock::new(),
        }
    }

    /// Create a requirement with a filter, validating the filter eagerly.
    pub fn with_filter(namespace: impl Into<String>, filter: &str) -> Result<Self, FilterError> {
        let parsed = Filter::parse(filter)?;
        let requirement = Self::new(namespace).with_directive(namespace::FILTER_DIRECTIVE, filter);
        let _ = requirement.filter.set(FilterState::Parsed(parsed));
        Ok(requirement)
    }

    /// Requirement on `osgi.identity`, optionally narrowed to a version range.
    pub fn identity(bsn: &str, range: Option<&VersionRange>) -> Self {
        let name = format!("({}={})", namespace::IDENTITY, escape_value(bsn));
        let filter = match range {
            Some(range) => format!("(&{}{})", name, range.to_filter(namespace::VERSION_ATTRIBUTE)),
            None => name,
        };
        Self::new(namespace::IDENTITY).with_directive(namespace::FILTER_DIRECTIVE, filter)
    }

    pub fn with_directive(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if key == namespace::FILTER_DIRECTIVE {
            self.filter = OnceLock::new();
        }
        self.directives.insert(key, value.into());
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    pub fn directive(&self, key: &str) -> Option<&str> {
        self.directives.get(key).map(String::as_str)
    }

    pub fn filter_source(&self) -> Option<&str> {
        self.directive(namespace::FILTER_DIRECTIVE)
    }

    /// The parsed filter. `Ok(None)` when the requirement has no filter.
    pub fn filter(&self) -> Result<Option<&Filter>, FilterError> {
        match self.filter_state() {
            FilterState::Absent => Ok(None),
            FilterState::Parsed(filter) => Ok(Some(filter)),
            FilterState::Invalid => match self.filter_source().map(Filter::parse) {
                Some(Err(e)) => Err(e),
                _ => Ok(None),
            },
        }
    }

    fn filter_state(&self) -> &FilterState {
        self.filter.get_or_init(|| match self.filter_source() {
            None => FilterState::Absent,
            Some(source) => match Filter::parse(source) {
                Ok(filter) => FilterState::Parsed(filter),
                Err(e) => {
                    log::warn!("Ignoring requirement in {} with invalid filter: {}", self.namespace, e);
                    FilterState::Invalid
                }
            },
        })
    }

    /// True when the capability is in this namespace and passes the filter.
    /// A requirement without a filter matches every capability in its namespace;
    /// one with an unparseable filter matches nothing.
    pub fn matches(&self, capability: &Capability) -> bool {
        if capability.namespace() != self.namespace {
            return false;
        }
        match self.filter_state() {
            FilterState::Absent => true,
            FilterState::Parsed(filter) => filter.matches(capability.attributes()),
            FilterState::Invalid => false,
        }
    }

    pub fn is_optional(&self) -> bool {
        self.directive(namespace::RESOLUTION_DIRECTIVE) == Some(namespace::RESOLUTION_OPTIONAL)
    }

    /// The `effective` directive, if declared
    pub fn effective(&self) -> Option<&str> {
        self.directive(namespace::EFFECTIVE_DIRECTIVE)
    }
}

impl PartialEq for Requirement {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.directives == other.directives
    }
}

impl Eq for Requirement {}

impl Hash for Requirement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        let mut directives: Vec<_> = self.directives.iter().collect();
        directives.sort();
        directives.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bnd_version::Version;

    fn package(name: &str, version: &str) -> Capability {
        Capability::new(namespace::PACKAGE)
            .with_attribute(namespace::PACKAGE, name)
            .with_attribute(namespace::VERSION_ATTRIBUTE, Version::parse(version).unwrap())
    }

    #[test]
    fn test_requirement_without_filter_matches_namespace() {
        let req = Requirement::new(namespace::PACKAGE);
        assert!(req.matches(&package("org.example", "1.0")));
        assert!(!req.matches(&Capability::new(namespace::BUNDLE)));
    }

    #[test]
    fn test_requirement_with_invalid_filter_matches_nothing() {
        let req = Requirement::new(namespace::PACKAGE).with_directive("filter", "(broken");
        assert!(!req.matches(&package("org.example", "1.0")));
        assert!(req.filter().is_err());
    }

    #[test]
    fn test_with_filter_validates_eagerly() {
        assert!(Requirement::with_filter(namespace::PACKAGE, "(&(a=b)").is_err());
        let req = Requirement::with_filter(namespace::PACKAGE, "(osgi.wiring.package=org.example)").unwrap();
        assert!(req.matches(&package("org.example", "1.0")));
        assert!(!req.matches(&package("org.other", "1.0")));
    }

    #[test]
    fn test_identity_requirement_with_range() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        let req = Requirement::identity("org.example", Some(&range));
        let cap = |v: &str| {
            Capability::new(namespace::IDENTITY)
                .with_attribute(namespace::IDENTITY, "org.example")
                .with_attribute(namespace::VERSION_ATTRIBUTE, Version::parse(v).unwrap())
        };
        assert!(req.matches(&cap("1.5")));
        assert!(!req.matches(&cap("2.0")));
    }

    #[test]
    fn test_effective_matching() {
        let active_req = Requirement::new("x").with_directive("effective", "active");
        let plain_req = Requirement::new("x");
        let active_cap = Capability::new("x").with_directive("effective", "active");
        let resolve_cap = Capability::new("x").with_directive("effective", "resolve");

        assert!(active_cap.is_effective_for(&active_req));
        assert!(!active_cap.is_effective_for(&plain_req));
        assert!(resolve_cap.is_effective_for(&plain_req));
        assert!(Capability::new("x").is_effective_for(&active_req));
    }

    #[test]
    fn test_requirement_equality_ignores_directive_order() {
        let a = Requirement::new("ns").with_directive("a", "1").with_directive("b", "2");
        let b = Requirement::new("ns").with_directive("b", "2").with_directive("a", "1");
        assert_eq!(a, b);
    }
}
