use std::collections::HashSet;
use std::sync::Arc;

use super::traits::{Repository, Strategy};
use crate::error::Result;
use crate::resource::{CapabilityRef, Requirement, Resource};

/// Repositories in priority order (first = highest priority)
#[derive(Default, Clone)]
pub struct RepositoryManager {
    repositories: Vec<Arc<dyn Repository>>,
}

impl RepositoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a repository with the lowest priority so far
    pub fn add_repository(&mut self, repository: Arc<dyn Repository>) {
        self.repositories.push(repository);
    }

    /// Insert a repository at a specific position (0 = highest priority)
    pub fn insert_repository(&mut self, index: usize, repository: Arc<dyn Repository>) {
        let index = index.min(self.repositories.len());
        self.repositories.insert(index, repository);
    }

    pub fn repositories(&self) -> &[Arc<dyn Repository>] {
        &self.repositories
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Repository>> {
        self.repositories.iter().find(|r| r.name() == name)
    }

    /// Repositories in the order named by `names`.
    ///
    /// Without a list every repository is returned in registration order.
    /// Unknown names are logged and skipped; repositories not named are left out.
    pub fn ordered(&self, names: Option<&[String]>) -> Vec<Arc<dyn Repository>> {
        let Some(names) = names else {
            return self.repositories.clone();
        };

        let mut seen = HashSet::new();
        let mut ordered = Vec::with_capacity(names.len());
        for name in names {
            if !seen.insert(name.as_str()) {
                continue;
            }
            match self.get(name) {
                Some(repository) => ordered.push(Arc::clone(repository)),
                None => log::warn!("Repository {} is not configured", name),
            }
        }
        ordered
    }

    /// First resource found for `bsn` in priority order.
    pub fn find_resource(&self, bsn: &str, range: Option<&str>, strategy: Strategy) -> Result<Option<Arc<Resource>>> {
        for repository in &self.repositories {
            if let Some(resource) = repository.find_resource(bsn, range, strategy)? {
                return Ok(Some(resource));
            }
        }
        Ok(None)
    }

    /// Providers from every repository, concatenated in priority order.
    ///
    /// A repository that fails is logged and contributes nothing.
    pub fn find_providers(&self, requirement: &Requirement) -> Vec<CapabilityRef> {
        let mut providers = Vec::new();
        for repository in &self.repositories {
            match repository.find_providers(requirement) {
                Ok(found) => providers.extend(found),
                Err(e) => log::warn!("Repository {} failed to find providers: {}", repository.name(), e),
            }
        }
        providers
    }

    /// Symbolic names across all repositories, sorted and deduplicated
    pub fn list(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for repository in &self.repositories {
            names.extend(repository.list(pattern)?);
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

impl FromIterator<Arc<dyn Repository>> for RepositoryManager {
    fn from_iter<T: IntoIterator<Item = Arc<dyn Repository>>>(iter: T) -> Self {
        Self {
            repositories: iter.into_iter().collect(),
        }
    }
}
