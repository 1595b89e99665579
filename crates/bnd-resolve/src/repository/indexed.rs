//! Repositories backed by one or more index documents.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use bnd_version::Version;
use url::Url;

use super::content::{decode_document, ContentProvider, IndexProcessor, Referral};
use super::traits::{Repository, Strategy};
use super::versioned_index::VersionedRepositoryIndex;
use crate::cache::{CachingMode, CachingResourceHandle};
use crate::error::{BndError, Result};
use crate::http::UrlConnector;
use crate::resource::{CapabilityRef, Requirement, Resource};

#[derive(Default)]
struct IndexState {
    initialised: bool,
    generation: u64,
    index: Arc<VersionedRepositoryIndex>,
}

/// A read-only repository assembled from index documents.
///
/// The index is loaded lazily on first use. Loading is serialized and runs
/// once until [`IndexedRepository::reset`]. A location or referral that fails
/// to load is logged and skipped, so a broken index degrades to fewer (or no)
/// resources rather than an error.
pub struct IndexedRepository {
    name: String,
    locations: Vec<Url>,
    providers: Vec<ContentProvider>,
    cache_dir: Option<PathBuf>,
    connector: Arc<dyn UrlConnector>,
    index_mode: CachingMode,
    state: Mutex<IndexState>,
}

impl IndexedRepository {
    pub fn new(name: impl Into<String>, locations: Vec<Url>, connector: Arc<dyn UrlConnector>) -> Self {
        Self {
            name: name.into(),
            locations,
            providers: vec![ContentProvider::R5],
            cache_dir: None,
            connector,
            index_mode: CachingMode::PreferRemote,
            state: Mutex::new(IndexState::default()),
        }
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    /// Content providers to try for each document, in order
    pub fn with_content_providers(mut self, providers: Vec<ContentProvider>) -> Self {
        self.providers = providers;
        self
    }

    /// Caching mode used for index documents. Artifacts always prefer the cache.
    pub fn with_index_caching_mode(mut self, mode: CachingMode) -> Self {
        self.index_mode = mode;
        self
    }

    pub fn locations(&self) -> &[Url] {
        &self.locations
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    fn lock_state(&self) -> MutexGuard<'_, IndexState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Load the index if needed and return the current snapshot.
    pub fn init(&self) -> Result<Arc<VersionedRepositoryIndex>> {
        let mut state = self.lock_state();
        if !state.initialised {
            let index = self.load_all();
            log::debug!("Repository {} indexed {} resources", self.name, index.len());
            state.index = Arc::new(index);
            state.generation += 1;
            state.initialised = true;
        }
        Ok(Arc::clone(&state.index))
    }

    /// Mark the index stale; the next access reloads everything.
    pub fn reset(&self) {
        self.lock_state().initialised = false;
    }

    pub fn refresh(&self) -> Result<Arc<VersionedRepositoryIndex>> {
        self.reset();
        self.init()
    }

    fn load_all(&self) -> VersionedRepositoryIndex {
        let mut loader = Loader {
            repository: self,
            index: VersionedRepositoryIndex::new(),
            visited: HashSet::new(),
            referrals: Vec::new(),
        };
        for location in &self.locations {
            loader.load(location, u32::MAX, 0);
        }
        loader.index
    }

    fn fetch_document(&self, url: &Url) -> Result<serde_json::Value> {
        let handle = CachingResourceHandle::new(
            url.clone(),
            self.cache_dir.as_deref(),
            Arc::clone(&self.connector),
            self.index_mode,
        )?;
        let path = handle.request()?;
        decode_document(&fs::read(path)?)
    }

    /// Map a resource to a handle on its artifact.
    pub fn handle_for(&self, resource: &Resource) -> Result<CachingResourceHandle> {
        artifact_handle(resource, self.cache_dir.as_deref(), Arc::clone(&self.connector))
    }
}

/// Handle for a resource's `osgi.content` URL, checked against its SHA-256 when known.
pub(crate) fn artifact_handle(
    resource: &Resource,
    cache_dir: Option<&Path>,
    connector: Arc<dyn UrlConnector>,
) -> Result<CachingResourceHandle> {
    let url = resource
        .content_url()
        .ok_or_else(|| BndError::Repository(format!("{} has no content URL", resource)))?;
    let handle = CachingResourceHandle::new(Url::parse(url)?, cache_dir, connector, CachingMode::PreferCache)?;
    Ok(match resource.content_sha256() {
        Some(sha) => handle.with_sha256(sha),
        None => handle,
    })
}

struct Loader<'a> {
    repository: &'a IndexedRepository,
    index: VersionedRepositoryIndex,
    visited: HashSet<Url>,
    referrals: Vec<Referral>,
}

impl Loader<'_> {
    /// Load one document. `budget` is the referral depth allowed by the
    /// referring chain; `depth` is how deep this document already is.
    fn load(&mut self, url: &Url, budget: u32, depth: u32) {
        if !self.visited.insert(url.clone()) {
            log::debug!("Index {} already loaded", url);
            return;
        }

        let document = match self.repository.fetch_document(url) {
            Ok(document) => document,
            Err(e) => {
                log::warn!("Repository {}: failed to load index {}: {}", self.repository.name, url, e);
                return;
            }
        };

        let Some(provider) = ContentProvider::select(&self.repository.providers, &document).copied() else {
            log::warn!(
                "Repository {}: {}",
                self.repository.name,
                BndError::NoContentProvider { location: url.to_string() }
            );
            return;
        };

        let outer = std::mem::take(&mut self.referrals);
        if let Err(e) = provider.parse(&document, url, self) {
            log::warn!("Repository {}: failed to read index {}: {}", self.repository.name, url, e);
        }
        let referrals = std::mem::replace(&mut self.referrals, outer);

        for referral in referrals {
            let allowed = referral.max_depth.min(budget);
            if allowed > depth {
                self.load(&referral.url, allowed, depth + 1);
            } else {
                log::debug!("Not following referral {} beyond depth {}", referral.url, allowed);
            }
        }
    }
}

impl IndexProcessor for Loader<'_> {
    fn process_resource(&mut self, resource: Resource) -> ControlFlow<()> {
        self.index.add_resource(resource);
        ControlFlow::Continue(())
    }

    fn process_referral(&mut self, referral: Referral) -> ControlFlow<()> {
        self.referrals.push(referral);
        ControlFlow::Continue(())
    }
}

impl Repository for IndexedRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn list(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        self.init()?.list(pattern)
    }

    fn versions(&self, bsn: &str) -> Result<Vec<Version>> {
        Ok(self.init()?.versions(bsn))
    }

    fn find_resource(&self, bsn: &str, range: Option<&str>, strategy: Strategy) -> Result<Option<Arc<Resource>>> {
        self.init()?.resolve(bsn, range, strategy)
    }

    fn get_handle(
        &self,
        bsn: &str,
        range: Option<&str>,
        strategy: Strategy,
        _properties: &HashMap<String, String>,
    ) -> Result<Option<CachingResourceHandle>> {
        match self.find_resource(bsn, range, strategy)? {
            Some(resource) => self.handle_for(&resource).map(Some),
            None => Ok(None),
        }
    }

    fn find_providers(&self, requirement: &Requirement) -> Result<Vec<CapabilityRef>> {
        Ok(self.init()?.find_providers(requirement))
    }

    fn generation(&self) -> u64 {
        self.lock_state().generation
    }
}
