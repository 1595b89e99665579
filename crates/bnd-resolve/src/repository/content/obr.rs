//! OBR style index: bundle-centric records.
//!
//! ```json
//! {
//!   "name": "Legacy",
//!   "referrals": [{ "url": "more.json", "depth": 1 }],
//!   "resources": [{
//!     "symbolicname": "org.example",
//!     "version": "1.0.0",
//!     "uri": "org.example-1.0.0.jar",
//!     "sha256": "…",
//!     "exports": [{ "package": "org.example.api", "version": "1.0.0" }],
//!     "imports": [{ "package": "org.dep", "version": "[1,2)", "optional": true }],
//!     "requires-bundle": [{ "bundle": "org.other", "version": "1.0" }]
//!   }]
//! }
//! ```
//!
//! Records are translated into identity, content, bundle and package
//! capabilities and the matching requirements.

use serde::Deserialize;
use serde_json::Value;
use std::ops::ControlFlow;
use url::Url;

use bnd_version::{Version, VersionRange};

use super::{resolve_url, CheckResult, IndexProcessor, Referral};
use crate::error::{BndError, Result};
use crate::namespace;
use crate::resource::{Resource, ResourceBuilder};

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    referrals: Vec<ReferralElement>,
    #[serde(default)]
    resources: Vec<ResourceElement>,
}

#[derive(Debug, Deserialize)]
struct ReferralElement {
    url: String,
    #[serde(default)]
    depth: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ResourceElement {
    symbolicname: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    fragment: bool,
    #[serde(default)]
    exports: Vec<ExportElement>,
    #[serde(default)]
    imports: Vec<ImportElement>,
    #[serde(default)]
    requires_bundle: Vec<RequireBundleElement>,
}

#[derive(Debug, Deserialize)]
struct ExportElement {
    package: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImportElement {
    package: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    optional: bool,
}

#[derive(Debug, Deserialize)]
struct RequireBundleElement {
    bundle: String,
    #[serde(default)]
    version: Option<String>,
}

pub(super) fn check(document: &Value) -> CheckResult {
    match (document.get("resources"), document.get("repository")) {
        (_, Some(_)) => CheckResult::Reject,
        (Some(Value::Array(_)), None) => CheckResult::Accept,
        (Some(_), None) => CheckResult::Reject,
        (None, None) => CheckResult::Undecided,
    }
}

pub(super) fn parse(document: &Value, base: &Url, processor: &mut dyn IndexProcessor) -> Result<()> {
    let document = Document::deserialize(document).map_err(|e| BndError::InvalidIndex {
        location: base.to_string(),
        reason: e.to_string(),
    })?;

    for referral in document.referrals {
        match resolve_url(base, &referral.url) {
            Ok(url) => {
                let referral = Referral {
                    url,
                    max_depth: referral.depth.unwrap_or(1),
                };
                if processor.process_referral(referral).is_break() {
                    return Ok(());
                }
            }
            Err(e) => log::warn!("Ignoring referral {} in {}: {}", referral.url, base, e),
        }
    }

    for element in document.resources {
        if processor.process_resource(build_resource(element, base)).is_break() {
            break;
        }
    }
    Ok(())
}

fn parse_version(bsn: &str, raw: Option<&str>) -> Version {
    let raw = raw.unwrap_or_default();
    Version::parse(raw).unwrap_or_else(|e| {
        log::warn!("{}: {}; using {}", bsn, e, Version::EMPTY);
        Version::EMPTY
    })
}

fn parse_range(bsn: &str, raw: Option<&str>) -> Option<VersionRange> {
    let raw = raw?;
    match VersionRange::parse(raw) {
        Ok(range) => Some(range),
        Err(e) => {
            log::warn!("{}: ignoring version range: {}", bsn, e);
            None
        }
    }
}

fn build_resource(element: ResourceElement, base: &Url) -> Resource {
    let bsn = element.symbolicname;
    let version = parse_version(&bsn, element.version.as_deref());

    let mut builder = if element.fragment {
        ResourceBuilder::new().typed_identity(&bsn, version.clone(), namespace::TYPE_FRAGMENT)
    } else {
        ResourceBuilder::new().bundle(&bsn, version.clone())
    };

    if let Some(uri) = &element.uri {
        match resolve_url(base, uri) {
            Ok(url) => builder = builder.content(url.as_str(), element.sha256.as_deref(), element.size),
            Err(e) => log::warn!("{}: ignoring content uri {}: {}", bsn, uri, e),
        }
    }

    for export in &element.exports {
        builder = builder.export_package(&export.package, parse_version(&bsn, export.version.as_deref()));
    }
    for import in &element.imports {
        let range = parse_range(&bsn, import.version.as_deref());
        builder = builder.import_package(&import.package, range.as_ref(), import.optional);
    }
    for required in &element.requires_bundle {
        let range = parse_range(&bsn, required.version.as_deref());
        builder = builder.require_bundle(&required.bundle, range.as_ref());
    }

    builder.build()
}
