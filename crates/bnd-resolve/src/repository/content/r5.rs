//! R5 style index: generic capabilities and requirements.
//!
//! ```json
//! {
//!   "repository": {
//!     "name": "Central",
//!     "increment": 1,
//!     "referrals": [{ "url": "nested/index.json", "depth": 1 }],
//!     "resources": [{
//!       "capabilities": [{
//!         "namespace": "osgi.identity",
//!         "attributes": { "osgi.identity": "org.example", "version:Version": "1.0.0" }
//!       }],
//!       "requirements": [{
//!         "namespace": "osgi.wiring.package",
//!         "directives": { "filter": "(osgi.wiring.package=org.dep)" }
//!       }]
//!     }]
//!   }
//! }
//! ```
//!
//! Attribute keys may carry a type suffix (`name:Version`, `name:Long`,
//! `name:List<String>`); untyped JSON strings, integers, floats and arrays map
//! to the corresponding attribute types.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::ops::ControlFlow;
use std::sync::Arc;
use url::Url;

use super::{resolve_url, CheckResult, IndexProcessor, Referral};
use crate::error::{BndError, Result};
use crate::namespace;
use crate::resource::{AttrValue, Capability, Requirement, Resource};

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    repository: RepositoryElement,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RepositoryElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    increment: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    referrals: Vec<ReferralElement>,
    #[serde(default)]
    resources: Vec<ResourceElement>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReferralElement {
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    depth: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ResourceElement {
    #[serde(default)]
    capabilities: Vec<CapabilityElement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    requirements: Vec<RequirementElement>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CapabilityElement {
    namespace: String,
    #[serde(default)]
    attributes: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    directives: IndexMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RequirementElement {
    namespace: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    directives: IndexMap<String, String>,
}

pub(super) fn check(document: &Value) -> CheckResult {
    match document.get("repository") {
        Some(Value::Object(_)) => CheckResult::Accept,
        Some(_) => CheckResult::Reject,
        None if document.get("resources").is_some() => CheckResult::Reject,
        None => CheckResult::Undecided,
    }
}

pub(super) fn parse(document: &Value, base: &Url, processor: &mut dyn IndexProcessor) -> Result<()> {
    let document = Document::deserialize(document).map_err(|e| BndError::InvalidIndex {
        location: base.to_string(),
        reason: e.to_string(),
    })?;

    for referral in document.repository.referrals {
        let url = match resolve_url(base, &referral.url) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Ignoring referral {} in {}: {}", referral.url, base, e);
                continue;
            }
        };
        let referral = Referral {
            url,
            max_depth: referral.depth.unwrap_or(1),
        };
        if processor.process_referral(referral).is_break() {
            return Ok(());
        }
    }

    for element in document.repository.resources {
        if processor.process_resource(build_resource(element, base)).is_break() {
            break;
        }
    }
    Ok(())
}

fn build_resource(element: ResourceElement, base: &Url) -> Resource {
    let capabilities = element
        .capabilities
        .into_iter()
        .map(|cap| {
            let mut capability = Capability::new(cap.namespace.clone());
            for (key, value) in &cap.attributes {
                match parse_attribute(key, value) {
                    Some((name, parsed)) => {
                        let parsed = absolutize_content_url(&cap.namespace, &name, parsed, base);
                        capability = capability.with_attribute(name, parsed);
                    }
                    None => log::warn!("Skipping malformed attribute {} in {} capability", key, cap.namespace),
                }
            }
            for (key, value) in cap.directives {
                capability = capability.with_directive(key, value);
            }
            capability
        })
        .collect();

    let requirements = element
        .requirements
        .into_iter()
        .map(|req| {
            req.directives
                .into_iter()
                .fold(Requirement::new(req.namespace), |r, (k, v)| r.with_directive(k, v))
        })
        .collect();

    Resource::new(capabilities, requirements)
}

fn absolutize_content_url(ns: &str, name: &str, value: AttrValue, base: &Url) -> AttrValue {
    if ns != namespace::CONTENT || name != namespace::CONTENT_URL_ATTRIBUTE {
        return value;
    }
    match &value {
        AttrValue::String(s) => match resolve_url(base, s) {
            Ok(url) => AttrValue::String(url.to_string()),
            Err(_) => value,
        },
        _ => value,
    }
}

fn parse_attribute(key: &str, value: &Value) -> Option<(String, AttrValue)> {
    let (name, type_name) = match key.split_once(':') {
        Some((name, type_name)) => (name, Some(type_name)),
        None => (key, None),
    };

    let parsed = match type_name {
        Some(type_name) => AttrValue::parse_typed(type_name, &raw_string(value)?)?,
        None => untyped(value)?,
    };
    Some((name.to_string(), parsed))
}

fn raw_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items
            .iter()
            .map(raw_string)
            .collect::<Option<Vec<_>>>()
            .map(|items| items.join(",")),
        _ => None,
    }
}

fn untyped(value: &Value) -> Option<AttrValue> {
    match value {
        Value::String(s) => Some(AttrValue::String(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .map(AttrValue::Long)
            .or_else(|| n.as_f64().map(AttrValue::Double)),
        Value::Bool(b) => Some(AttrValue::String(b.to_string())),
        Value::Array(items) => items
            .iter()
            .map(untyped)
            .collect::<Option<Vec<_>>>()
            .map(AttrValue::List),
        _ => None,
    }
}

fn render_attribute(name: &str, value: &AttrValue) -> (String, Value) {
    match value {
        AttrValue::String(s) => (name.to_string(), Value::String(s.clone())),
        AttrValue::Long(n) => (name.to_string(), Value::Number((*n).into())),
        AttrValue::Double(d) => match Number::from_f64(*d) {
            Some(number) => (name.to_string(), Value::Number(number)),
            None => (format!("{}:Double", name), Value::String(d.to_string())),
        },
        other => (format!("{}:{}", name, other.type_name()), Value::String(other.to_string())),
    }
}

/// Render resources as an R5 index document.
pub fn generate_index(name: &str, increment: i64, resources: &[Arc<Resource>]) -> Value {
    let resources = resources
        .iter()
        .map(|resource| ResourceElement {
            capabilities: resource
                .capabilities()
                .iter()
                .map(|cap| CapabilityElement {
                    namespace: cap.namespace().to_string(),
                    attributes: cap
                        .attributes()
                        .iter()
                        .map(|(k, v)| render_attribute(k, v))
                        .collect(),
                    directives: cap.directives().clone(),
                })
                .collect(),
            requirements: resource
                .requirements()
                .iter()
                .map(|req| RequirementElement {
                    namespace: req.namespace().to_string(),
                    directives: req.directives().clone(),
                })
                .collect(),
        })
        .collect();

    let document = Document {
        repository: RepositoryElement {
            name: Some(name.to_string()),
            increment: Some(increment),
            referrals: Vec::new(),
            resources,
        },
    };
    serde_json::to_value(document).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceBuilder;
    use bnd_version::Version;
    use serde_json::json;

    #[derive(Default)]
    struct Collector {
        resources: Vec<Resource>,
        referrals: Vec<Referral>,
        stop_after: Option<usize>,
    }

    impl IndexProcessor for Collector {
        fn process_resource(&mut self, resource: Resource) -> ControlFlow<()> {
            self.resources.push(resource);
            match self.stop_after {
                Some(n) if self.resources.len() >= n => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            }
        }

        fn process_referral(&mut self, referral: Referral) -> ControlFlow<()> {
            self.referrals.push(referral);
            ControlFlow::Continue(())
        }
    }

    fn base() -> Url {
        Url::parse("http://repo.example.com/r5/index.json").unwrap()
    }

    fn sample() -> Value {
        json!({
            "repository": {
                "name": "Sample",
                "referrals": [{"url": "../other/index.json", "depth": 2}],
                "resources": [
                    {
                        "capabilities": [
                            {"namespace": "osgi.identity", "attributes": {
                                "osgi.identity": "org.example.a",
                                "version:Version": "1.2.3",
                                "type": "osgi.bundle"
                            }},
                            {"namespace": "osgi.content", "attributes": {
                                "osgi.content": "abc",
                                "url": "jars/a.jar",
                                "size": 100
                            }},
                            {"namespace": "osgi.wiring.package", "attributes": {
                                "osgi.wiring.package": "org.example.a",
                                "version:Version": "1.0",
                                "tags:List<String>": "x,y"
                            }, "directives": {"uses": "org.dep"}}
                        ],
                        "requirements": [
                            {"namespace": "osgi.wiring.package", "directives": {"filter": "(osgi.wiring.package=org.dep)"}}
                        ]
                    },
                    {
                        "capabilities": [
                            {"namespace": "osgi.identity", "attributes": {"osgi.identity": "org.example.b", "version:Version": "2.0"}}
                        ]
                    }
                ]
            }
        })
    }

    #[test]
    fn test_check() {
        assert_eq!(check(&sample()), CheckResult::Accept);
        assert_eq!(check(&json!({"resources": []})), CheckResult::Reject);
        assert_eq!(check(&json!({"repository": 1})), CheckResult::Reject);
        assert_eq!(check(&json!({})), CheckResult::Undecided);
    }

    #[test]
    fn test_parse_resources_and_referrals() {
        let mut collector = Collector::default();
        parse(&sample(), &base(), &mut collector).unwrap();

        assert_eq!(collector.referrals.len(), 1);
        assert_eq!(collector.referrals[0].url.as_str(), "http://repo.example.com/other/index.json");
        assert_eq!(collector.referrals[0].max_depth, 2);

        assert_eq!(collector.resources.len(), 2);
        let a = &collector.resources[0];
        assert_eq!(a.identity(), Some("org.example.a"));
        assert_eq!(a.version(), Version::new(1, 2, 3));
        assert_eq!(a.content_url(), Some("http://repo.example.com/r5/jars/a.jar"));
        assert_eq!(a.content_sha256(), Some("abc"));

        let pkg = &a.capabilities()[2];
        assert_eq!(pkg.attribute("version"), Some(&AttrValue::Version(Version::new(1, 0, 0))));
        assert_eq!(pkg.attribute("tags").unwrap().strings(), vec!["x", "y"]);
        assert_eq!(pkg.directive("uses"), Some("org.dep"));
        assert_eq!(a.capabilities()[1].attribute("size"), Some(&AttrValue::Long(100)));
        assert_eq!(a.requirements()[0].filter_source(), Some("(osgi.wiring.package=org.dep)"));
    }

    #[test]
    fn test_early_termination() {
        let mut collector = Collector {
            stop_after: Some(1),
            ..Default::default()
        };
        parse(&sample(), &base(), &mut collector).unwrap();
        assert_eq!(collector.resources.len(), 1);
    }

    #[test]
    fn test_malformed_document() {
        let mut collector = Collector::default();
        let result = parse(&json!({"repository": {"resources": "nope"}}), &base(), &mut collector);
        assert!(matches!(result, Err(BndError::InvalidIndex { .. })));
    }

    #[test]
    fn test_malformed_attribute_skipped() {
        let doc = json!({"repository": {"resources": [{"capabilities": [
            {"namespace": "osgi.identity", "attributes": {"osgi.identity": "x", "version:Version": "not.a.version!"}}
        ]}]}});
        let mut collector = Collector::default();
        parse(&doc, &base(), &mut collector).unwrap();
        let resource = &collector.resources[0];
        assert_eq!(resource.identity(), Some("x"));
        assert!(resource.capabilities()[0].attribute("version").is_none());
    }

    #[test]
    fn test_generated_index_parses_back() {
        let resource = Arc::new(
            ResourceBuilder::new()
                .bundle("org.example", Version::with_qualifier(1, 0, 0, "v1"))
                .content("http://repo.example.com/r5/org.example.jar", Some("ff"), Some(12))
                .export_package("org.example.api", Version::new(1, 0, 0))
                .import_package("org.dep", None, true)
                .build(),
        );
        let document = generate_index("Local", 7, &[Arc::clone(&resource)]);
        assert_eq!(document["repository"]["increment"], json!(7));

        let mut collector = Collector::default();
        parse(&document, &base(), &mut collector).unwrap();
        let parsed = &collector.resources[0];
        assert_eq!(parsed, resource.as_ref());
        assert_eq!(parsed.capabilities(), resource.capabilities());
        assert_eq!(parsed.requirements(), resource.requirements());
    }
}
