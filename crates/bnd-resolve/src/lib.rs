//! OSGi repository indexing, artifact caching and resolve context.
//!
//! Repositories expose resources (capabilities and requirements) read from
//! R5 or OBR indexes. Artifacts are downloaded through a [`http::UrlConnector`]
//! into a content-addressed cache. A [`resolve::ResolveContext`] turns a run
//! configuration and an ordered set of repositories into ranked provider
//! lists for an external resolver.

pub mod cache;
pub mod capability_index;
pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod namespace;
pub mod repository;
pub mod resolve;
pub mod resource;

#[cfg(test)]
mod testing;

pub use error::{BndError, Result};
pub use repository::{IndexedRepository, LocalIndexedRepository, Repository, RepositoryManager, ResourcesRepository, Strategy};
pub use resolve::{ResolveContext, ResolveContextBuilder};
pub use resource::{Capability, CapabilityRef, Requirement, Resource, ResourceBuilder};
