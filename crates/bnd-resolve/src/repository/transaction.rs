use std::fs;
use std::io;
use std::path::PathBuf;

use crate::resource::Resource;

/// An artifact written to storage but not yet published in the index
#[derive(Debug, Clone)]
pub struct StagedArtifact {
    pub path: PathBuf,
    pub resource: Resource,
}

/// Changes staged by a writable repository since the last commit or rollback.
#[derive(Debug, Default)]
pub struct Transaction {
    staged: Vec<StagedArtifact>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an artifact. Staging the same path again replaces the earlier entry.
    pub fn stage(&mut self, artifact: StagedArtifact) {
        match self.staged.iter_mut().find(|a| a.path == artifact.path) {
            Some(existing) => existing.resource = artifact.resource,
            None => self.staged.push(artifact),
        }
    }

    pub fn staged(&self) -> &[StagedArtifact] {
        &self.staged
    }

    pub fn is_staged(&self, path: &std::path::Path) -> bool {
        self.staged.iter().any(|a| a.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Hand the staged changes over for publishing and start afresh.
    pub fn take(&mut self) -> Vec<StagedArtifact> {
        std::mem::take(&mut self.staged)
    }

    /// Delete every file staged in this transaction and nothing else.
    ///
    /// Returns the number of files removed.
    pub fn rollback(&mut self) -> io::Result<usize> {
        let mut removed = 0;
        for artifact in self.take() {
            match fs::remove_file(&artifact.path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
            log::debug!("Rolled back {}", artifact.path.display());
        }
        Ok(removed)
    }
}
