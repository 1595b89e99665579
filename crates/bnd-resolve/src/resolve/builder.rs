use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bnd_version::{Version, VersionRange};

use super::context::{ContextState, ResolveContext};
use super::ee::ExecutionEnvironment;
use super::hook::ResolverHook;
use super::policy::{BlacklistEntry, Preference};
use crate::capability_index::CapabilityIndex;
use crate::config::{BlacklistConfig, RunConfig};
use crate::error::{BndError, Result};
use crate::namespace;
use crate::repository::{Repository, RepositoryManager, Strategy, RANGE_LATEST, RANGE_PROJECT};
use crate::resource::{AttrValue, Capability, Requirement, Resource, ResourceBuilder};

/// Identity of the system resource when no framework is selected
pub const SYSTEM_IDENTITY: &str = "<<SYSTEM>>";
/// Identity of the resource carrying the input requirements
pub const INITIAL_IDENTITY: &str = "<<INITIAL>>";
/// Framework name that disables framework selection
pub const NO_FRAMEWORK: &str = "none";

#[derive(Default)]
pub struct ResolveContextBuilder {
    repositories: Vec<Arc<dyn Repository>>,
    framework: Option<(String, Option<VersionRange>)>,
    ee: ExecutionEnvironment,
    system_packages: Vec<(String, Version)>,
    system_capabilities: Vec<Capability>,
    provided_capabilities: Vec<Capability>,
    blacklist: Vec<BlacklistEntry>,
    preferences: Vec<Preference>,
    effective: HashMap<String, HashSet<String>>,
    hooks: Vec<Arc<dyn ResolverHook>>,
    requirements: Vec<Requirement>,
    optional_roots: Vec<Resource>,
}

impl ResolveContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a repository with the lowest priority so far
    pub fn repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repositories.push(repository);
        self
    }

    pub fn repositories(mut self, repositories: impl IntoIterator<Item = Arc<dyn Repository>>) -> Self {
        self.repositories.extend(repositories);
        self
    }

    /// Select the highest version of `bsn` within `range` as framework.
    pub fn framework(mut self, bsn: impl Into<String>, range: Option<VersionRange>) -> Self {
        self.framework = Some((bsn.into(), range));
        self
    }

    pub fn execution_environment(mut self, ee: ExecutionEnvironment) -> Self {
        self.ee = ee;
        self
    }

    pub fn system_package(mut self, name: impl Into<String>, version: Version) -> Self {
        self.system_packages.push((name.into(), version));
        self
    }

    pub fn system_capability(mut self, capability: Capability) -> Self {
        self.system_capabilities.push(capability);
        self
    }

    /// A capability supplied by the runtime rather than the framework
    pub fn provided_capability(mut self, capability: Capability) -> Self {
        self.provided_capabilities.push(capability);
        self
    }

    pub fn blacklist(mut self, entry: BlacklistEntry) -> Self {
        self.blacklist.push(entry);
        self
    }

    /// Add a preference; earlier preferences rank higher.
    pub fn preference(mut self, preference: Preference) -> Self {
        self.preferences.push(preference);
        self
    }

    /// Treat requirements with `effective:=<name>` as effective, except in
    /// the `skip` namespaces.
    pub fn effective(mut self, name: impl Into<String>, skip: impl IntoIterator<Item = String>) -> Self {
        self.effective.entry(name.into()).or_default().extend(skip);
        self
    }

    pub fn hook(mut self, hook: impl ResolverHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// An input requirement, carried by the initial resource
    pub fn require(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn optional_root(mut self, resource: Resource) -> Self {
        self.optional_roots.push(resource);
        self
    }

    /// Configure a builder from run instructions.
    ///
    /// Repositories come from `manager`, ordered and narrowed by
    /// `config.repositories` when given.
    pub fn from_run_config(config: &RunConfig, manager: &RepositoryManager) -> Result<Self> {
        let mut builder = Self::new().repositories(manager.ordered(config.repositories.as_deref()));

        if let Some(framework) = &config.framework {
            let range = framework.version.as_deref().map(VersionRange::parse).transpose()?;
            builder = builder.framework(framework.bsn.clone(), range);
        }
        if let Some(ee) = &config.ee {
            builder = builder.execution_environment(ee.parse()?);
        }

        for entry in &config.blacklist {
            builder = builder.blacklist(match entry {
                BlacklistConfig::Identity(text) => text.parse()?,
                BlacklistConfig::Requirement(requirement) => {
                    BlacklistEntry::Requirement(requirement.to_requirement()?)
                }
            });
        }
        for preference in &config.preferences {
            builder = builder.preference(preference.parse()?);
        }
        for (name, effective) in &config.effective {
            builder = builder.effective(name.clone(), effective.skip.iter().cloned());
        }

        for package in &config.system_packages {
            let version = match &package.version {
                Some(version) => Version::parse(version)?,
                None => Version::EMPTY,
            };
            builder = builder.system_package(package.name.clone(), version);
        }
        for capability in &config.system_capabilities {
            builder = builder.system_capability(capability.to_capability()?);
        }
        for capability in &config.provided_capabilities {
            builder = builder.provided_capability(capability.to_capability()?);
        }
        for requirement in &config.requires {
            builder = builder.require(requirement.to_requirement()?);
        }

        for root in &config.optional_roots {
            let strategy = match &root.version {
                Some(version)
                    if !VersionRange::is_version_range(version)
                        && !matches!(version.trim(), RANGE_LATEST | RANGE_PROJECT) =>
                {
                    Strategy::Exact
                }
                _ => Strategy::Highest,
            };
            match manager.find_resource(&root.bsn, root.version.as_deref(), strategy)? {
                Some(resource) => builder = builder.optional_root(resource.as_ref().clone()),
                None => log::warn!("Optional root {} not found in any repository", root.bsn),
            }
        }

        Ok(builder)
    }

    pub fn build(self) -> Result<ResolveContext> {
        let framework = self.select_framework()?;
        let system = Arc::new(self.system_resource(framework.as_deref()));

        let input = Arc::new(
            self.requirements
                .iter()
                .cloned()
                .fold(
                    ResourceBuilder::new().identity(INITIAL_IDENTITY, Version::EMPTY),
                    ResourceBuilder::requirement,
                )
                .build(),
        );

        let mut system_index = CapabilityIndex::new();
        system_index.add_resource(&system);
        let generations = self.repositories.iter().map(|r| r.generation()).collect();

        Ok(ResolveContext {
            repositories: self.repositories,
            system,
            framework,
            input,
            system_index,
            blacklist: self.blacklist,
            preferences: self.preferences,
            effective: self.effective,
            hooks: self.hooks,
            optional_roots: self.optional_roots,
            state: ContextState::new(generations),
        })
    }

    /// The highest framework version across repositories, ties going to the
    /// earlier repository. Blacklisted resources are skipped.
    fn select_framework(&self) -> Result<Option<Arc<Resource>>> {
        let Some((bsn, range)) = &self.framework else {
            log::warn!("No framework configured");
            return Ok(None);
        };
        if bsn == NO_FRAMEWORK {
            return Ok(None);
        }

        let requirement = Requirement::identity(bsn, range.as_ref());
        let mut selected: Option<Arc<Resource>> = None;
        for repository in &self.repositories {
            let providers = match repository.find_providers(&requirement) {
                Ok(providers) => providers,
                Err(e) => {
                    log::warn!("Repository {} failed to find providers: {}", repository.name(), e);
                    continue;
                }
            };
            for capability in providers {
                let resource = capability.resource();
                if self.blacklist.iter().any(|entry| entry.excludes(resource)) {
                    continue;
                }
                if selected.as_ref().map_or(true, |s| resource.version() > s.version()) {
                    selected = Some(Arc::clone(resource));
                }
            }
        }

        match &selected {
            Some(framework) => log::info!("Using framework {}", framework),
            None => {
                let range = range.as_ref().map(ToString::to_string).unwrap_or_default();
                log::error!("{}", BndError::Repository(format!("cannot find framework {};{}", bsn, range)));
            }
        }
        Ok(selected)
    }

    fn system_resource(&self, framework: Option<&Resource>) -> Resource {
        let mut system = ResourceBuilder::new();
        match framework {
            Some(framework) => {
                for capability in framework.capabilities() {
                    system = system.capability(with_system_bundle_alias(capability));
                }
            }
            None => system = system.identity(SYSTEM_IDENTITY, Version::EMPTY),
        }

        for package in self.ee.packages() {
            system = system.export_package(package, Version::EMPTY);
        }
        for capability in self.ee.capabilities() {
            system = system.capability(capability);
        }
        for (name, version) in &self.system_packages {
            system = system.export_package(name, version.clone());
        }
        for capability in self.system_capabilities.iter().chain(&self.provided_capabilities) {
            system = system.capability(capability.clone());
        }

        system.build()
    }
}

/// Framework bundle and host capabilities also answer to `system.bundle`.
fn with_system_bundle_alias(capability: &Capability) -> Capability {
    let ns = capability.namespace();
    if ns != namespace::BUNDLE && ns != namespace::HOST {
        return capability.clone();
    }

    let mut names: Vec<String> = capability
        .attribute(ns)
        .map(|value| value.strings().into_iter().map(str::to_string).collect())
        .unwrap_or_default();
    if names.iter().any(|name| name == namespace::SYSTEM_BUNDLE_ALIAS) {
        return capability.clone();
    }
    names.push(namespace::SYSTEM_BUNDLE_ALIAS.to_string());

    let mut aliased = capability.clone();
    aliased.attributes_mut().insert(ns.to_string(), AttrValue::from(names));
    aliased
}
