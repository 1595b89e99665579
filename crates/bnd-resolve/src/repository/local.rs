//! Writable repository on the local filesystem.
//!
//! Artifacts are stored as `<storage>/<bsn>/<bsn>-<version>.jar` and published
//! through an R5 `index.json` at the storage root. New artifacts are staged by
//! [`Repository::put`] and only become visible after [`LocalIndexedRepository::commit`].

use std::collections::HashMap;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use bnd_version::Version;
use url::Url;

use super::content::{decode_document, generate_index, ContentProvider, IndexProcessor, Referral};
use super::indexed::artifact_handle;
use super::transaction::{StagedArtifact, Transaction};
use super::traits::{PutResult, Repository, Strategy};
use super::versioned_index::VersionedRepositoryIndex;
use crate::cache::{sha256_hex, write_atomic, CachingResourceHandle};
use crate::error::{BndError, Result};
use crate::http::{OfflineConnector, UrlConnector};
use crate::namespace;
use crate::resource::{CapabilityRef, Requirement, Resource, ResourceBuilder};

pub const INDEX_FILE: &str = "index.json";

#[derive(Default)]
struct LocalState {
    loaded: bool,
    generation: u64,
    increment: i64,
    index: Arc<VersionedRepositoryIndex>,
}

pub struct LocalIndexedRepository {
    name: String,
    storage: PathBuf,
    connector: Arc<dyn UrlConnector>,
    state: Mutex<LocalState>,
    transaction: Mutex<Transaction>,
}

impl LocalIndexedRepository {
    /// Open (creating if needed) a repository rooted at `storage`.
    pub fn open(name: impl Into<String>, storage: impl Into<PathBuf>) -> Result<Self> {
        let storage = storage.into();
        fs::create_dir_all(&storage)?;
        Ok(Self {
            name: name.into(),
            storage,
            connector: Arc::new(OfflineConnector),
            state: Mutex::new(LocalState::default()),
            transaction: Mutex::new(Transaction::new()),
        })
    }

    pub fn storage(&self) -> &Path {
        &self.storage
    }

    pub fn index_file(&self) -> PathBuf {
        self.storage.join(INDEX_FILE)
    }

    fn lock_state(&self) -> MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_transaction(&self) -> MutexGuard<'_, Transaction> {
        self.transaction.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn index(&self) -> Result<Arc<VersionedRepositoryIndex>> {
        let mut state = self.lock_state();
        self.ensure_loaded(&mut state)?;
        Ok(Arc::clone(&state.index))
    }

    fn ensure_loaded(&self, state: &mut LocalState) -> Result<()> {
        if state.loaded {
            return Ok(());
        }

        let mut collector = Collector::default();
        let index_file = self.index_file();
        if index_file.is_file() {
            let document = decode_document(&fs::read(&index_file)?)?;
            state.increment = document["repository"]["increment"].as_i64().unwrap_or(0);
            let base = Url::from_file_path(&index_file)
                .map_err(|_| BndError::Config(format!("invalid storage path {}", index_file.display())))?;
            ContentProvider::R5.parse(&document, &base, &mut collector)?;
        }

        state.index = Arc::new(collector.index);
        state.generation += 1;
        state.loaded = true;
        Ok(())
    }

    /// Forget the in-memory index; the next access rereads `index.json`.
    pub fn reset(&self) {
        self.lock_state().loaded = false;
    }

    /// Publish every staged artifact. Returns how many were published.
    pub fn commit(&self) -> Result<usize> {
        let mut transaction = self.lock_transaction();
        if transaction.is_empty() {
            return Ok(0);
        }
        let staged = transaction.take();

        let result = self.publish(&staged);
        if result.is_err() {
            for artifact in staged {
                transaction.stage(artifact);
            }
        }
        result
    }

    fn publish(&self, staged: &[StagedArtifact]) -> Result<usize> {
        let mut state = self.lock_state();
        self.ensure_loaded(&mut state)?;

        let mut index = VersionedRepositoryIndex::new();
        for resource in state.index.resources() {
            index.add_resource(resource.as_ref().clone());
        }
        for artifact in staged {
            index.add_resource(artifact.resource.clone());
        }

        let resources: Vec<Arc<Resource>> = index.resources().cloned().collect();
        let increment = state.increment + 1;
        let document = generate_index(&self.name, increment, &resources);
        write_atomic(&self.index_file(), &serde_json::to_vec_pretty(&document)?)?;

        log::debug!("Repository {} committed {} artifacts", self.name, staged.len());
        state.index = Arc::new(index);
        state.increment = increment;
        state.generation += 1;
        Ok(staged.len())
    }

    /// Discard staged artifacts, deleting the files written for them.
    pub fn rollback(&self) -> Result<usize> {
        Ok(self.lock_transaction().rollback()?)
    }

    pub fn staged(&self) -> usize {
        self.lock_transaction().staged().len()
    }
}

#[derive(Default)]
struct Collector {
    index: VersionedRepositoryIndex,
}

impl IndexProcessor for Collector {
    fn process_resource(&mut self, resource: Resource) -> ControlFlow<()> {
        self.index.add_resource(resource);
        ControlFlow::Continue(())
    }

    fn process_referral(&mut self, referral: Referral) -> ControlFlow<()> {
        log::debug!("Ignoring referral {} in local index", referral.url);
        ControlFlow::Continue(())
    }
}

impl Repository for LocalIndexedRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn list(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        self.index()?.list(pattern)
    }

    fn versions(&self, bsn: &str) -> Result<Vec<Version>> {
        Ok(self.index()?.versions(bsn))
    }

    fn find_resource(&self, bsn: &str, range: Option<&str>, strategy: Strategy) -> Result<Option<Arc<Resource>>> {
        self.index()?.resolve(bsn, range, strategy)
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
        Ok(self.index()?.find_providers(requirement))
    }

    fn can_write(&self) -> bool {
        true
    }

    fn put(&self, artifact: &Path, resource: Resource) -> Result<PutResult> {
        let bsn = resource.identity().ok_or(BndError::MissingIdentity)?.to_string();
        let version = resource.version();
        let target = self.storage.join(&bsn).join(format!("{}-{}.jar", bsn, version));

        let mut transaction = self.lock_transaction();
        if target.exists() && !transaction.is_staged(&target) {
            return Err(BndError::Repository(format!(
                "{} already contains {};version={}",
                self.name, bsn, version
            )));
        }

        let bytes = fs::read(artifact)?;
        let digest = sha256_hex(&bytes);
        write_atomic(&target, &bytes)?;

        let url = Url::from_file_path(&target)
            .map_err(|_| BndError::Config(format!("invalid storage path {}", target.display())))?;
        let published = resource
            .capabilities()
            .iter()
            .filter(|cap| cap.namespace() != namespace::CONTENT)
            .cloned()
            .fold(ResourceBuilder::new(), ResourceBuilder::capability);
        let published = resource
            .requirements()
            .iter()
            .cloned()
            .fold(published, ResourceBuilder::requirement)
            .content(url.as_str(), Some(&digest), Some(bytes.len() as u64))
            .build();

        transaction.stage(StagedArtifact {
            path: target.clone(),
            resource: published,
        });

        Ok(PutResult {
            artifact: target,
            digest,
        })
    }

    fn generation(&self) -> u64 {
        self.lock_state().generation
    }
}
