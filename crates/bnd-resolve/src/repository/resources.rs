use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use bnd_version::Version;

use super::indexed::artifact_handle;
use super::traits::{Repository, Strategy};
use super::versioned_index::VersionedRepositoryIndex;
use crate::cache::CachingResourceHandle;
use crate::error::Result;
use crate::http::{OfflineConnector, UrlConnector};
use crate::resource::{CapabilityRef, Requirement, Resource};

/// In-memory repository of resources added programmatically.
pub struct ResourcesRepository {
    name: String,
    index: RwLock<VersionedRepositoryIndex>,
    generation: AtomicU64,
    connector: Arc<dyn UrlConnector>,
}

impl ResourcesRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: RwLock::new(VersionedRepositoryIndex::new()),
            generation: AtomicU64::new(0),
            connector: Arc::new(OfflineConnector),
        }
    }

    pub fn with_resources(name: impl Into<String>, resources: impl IntoIterator<Item = Resource>) -> Self {
        let repository = Self::new(name);
        for resource in resources {
            repository.add(resource);
        }
        repository
    }

    /// Connector used to fetch artifacts of remote content URLs
    pub fn with_connector(mut self, connector: Arc<dyn UrlConnector>) -> Self {
        self.connector = connector;
        self
    }

    /// Add a resource. Returns `None` when it has no identity.
    pub fn add(&self, resource: Resource) -> Option<Arc<Resource>> {
        let mut index = self.index.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let added = index.add_resource(resource)?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Some(added)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, VersionedRepositoryIndex> {
        self.index.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Repository for ResourcesRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn list(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        self.read().list(pattern)
    }

    fn versions(&self, bsn: &str) -> Result<Vec<Version>> {
        Ok(self.read().versions(bsn))
    }

    fn find_resource(&self, bsn: &str, range: Option<&str>, strategy: Strategy) -> Result<Option<Arc<Resource>>> {
        self.read().resolve(bsn, range, strategy)
    }

    fn get_handle(
        &self,
        bsn: &str,
        range: Option<&str>,
        strategy: Strategy,
        _properties: &HashMap<String, String>,
    ) -> Result<Option<CachingResourceHandle>> {
        match self.find_resource(bsn, range, strategy)? {
            Some(resource) => artifact_handle(&resource, None, Arc::clone(&self.connector)).map(Some),
            None => Ok(None),
        }
    }

    fn find_providers(&self, requirement: &Requirement) -> Result<Vec<CapabilityRef>> {
        Ok(self.read().find_providers(requirement))
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
