//! Index document formats.
//!
//! Index documents are JSON, optionally gzip compressed. Each [`ContentProvider`]
//! inspects a decoded document, reports whether it recognizes the format and
//! streams the resources and referrals it contains to an [`IndexProcessor`].

mod obr;
mod r5;

use flate2::read::GzDecoder;
use serde_json::Value;
use std::fmt;
use std::io::Read;
use std::ops::ControlFlow;
use std::str::FromStr;
use url::Url;

use crate::error::{BndError, Result};
use crate::resource::Resource;

pub use r5::generate_index;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A pointer from one index to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Referral {
    /// Absolute URL, resolved against the referring document
    pub url: Url,
    /// How many further levels of referrals may be followed from the target
    pub max_depth: u32,
}

/// Receives the contents of an index document as it is parsed.
///
/// Returning [`ControlFlow::Break`] skips the rest of the document.
pub trait IndexProcessor {
    fn process_resource(&mut self, resource: Resource) -> ControlFlow<()>;
    fn process_referral(&mut self, referral: Referral) -> ControlFlow<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    Accept,
    Undecided,
    Reject,
}

/// Supported index formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentProvider {
    R5,
    Obr,
}

impl ContentProvider {
    pub fn name(&self) -> &'static str {
        match self {
            ContentProvider::R5 => "R5",
            ContentProvider::Obr => "OBR",
        }
    }

    /// Parse a `|` separated list of provider names.
    pub fn parse_list(names: &str) -> Result<Vec<ContentProvider>> {
        names
            .split('|')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ContentProvider::from_str)
            .collect()
    }

    pub fn check(&self, document: &Value) -> CheckResult {
        match self {
            ContentProvider::R5 => r5::check(document),
            ContentProvider::Obr => obr::check(document),
        }
    }

    pub fn parse(&self, document: &Value, base: &Url, processor: &mut dyn IndexProcessor) -> Result<()> {
        match self {
            ContentProvider::R5 => r5::parse(document, base, processor),
            ContentProvider::Obr => obr::parse(document, base, processor),
        }
    }

    /// Pick the provider for a document: the first that accepts it, else the
    /// first that is undecided.
    pub fn select<'a>(providers: &'a [ContentProvider], document: &Value) -> Option<&'a ContentProvider> {
        let mut undecided = None;
        for provider in providers {
            match provider.check(document) {
                CheckResult::Accept => return Some(provider),
                CheckResult::Undecided if undecided.is_none() => undecided = Some(provider),
                _ => {}
            }
        }
        undecided
    }
}

impl FromStr for ContentProvider {
    type Err = BndError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "R5" => Ok(ContentProvider::R5),
            "OBR" => Ok(ContentProvider::Obr),
            _ => Err(BndError::UnknownContentProvider(s.to_string())),
        }
    }
}

impl fmt::Display for ContentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Decode raw index bytes, transparently inflating gzip.
pub fn decode_document(bytes: &[u8]) -> Result<Value> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut inflated)?;
        Ok(serde_json::from_slice(&inflated)?)
    } else {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Resolve a possibly relative URL against the document it appeared in.
pub(crate) fn resolve_url(base: &Url, reference: &str) -> Result<Url> {
    Ok(base.join(reference)?)
}
