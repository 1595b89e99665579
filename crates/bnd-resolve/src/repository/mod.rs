pub mod content;
mod indexed;
mod local;
mod manager;
mod resources;
mod traits;
mod transaction;
mod versioned_index;

pub use indexed::IndexedRepository;
pub use local::{LocalIndexedRepository, INDEX_FILE};
pub use manager::RepositoryManager;
pub use resources::ResourcesRepository;
pub use traits::{PutResult, Repository, Strategy};
pub use transaction::{StagedArtifact, Transaction};
pub use versioned_index::{VersionedRepositoryIndex, RANGE_LATEST, RANGE_PROJECT};
