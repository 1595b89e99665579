use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use bnd_version::Version;

use super::hook::ResolverHook;
use super::policy::{BlacklistEntry, Preference};
use crate::capability_index::CapabilityIndex;
use crate::namespace;
use crate::repository::Repository;
use crate::resource::{CapabilityRef, Requirement, Resource};

/// Identity of a resource as used for priorities and cache keys
type ResourceKey = (String, Version);

fn resource_key(resource: &Resource) -> Option<ResourceKey> {
    resource.identity().map(|bsn| (bsn.to_string(), resource.version()))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    namespace: String,
    directives: Vec<(String, String)>,
    requirer: Option<ResourceKey>,
}

impl CacheKey {
    fn new(requirement: &Requirement, requirer: Option<&Arc<Resource>>) -> Self {
        Self {
            namespace: requirement.namespace().to_string(),
            directives: requirement
                .directives()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            requirer: requirer.and_then(|r| resource_key(r)),
        }
    }
}

#[derive(Default)]
pub(super) struct ContextState {
    generations: Vec<u64>,
    providers: HashMap<CacheKey, Vec<CapabilityRef>>,
    priorities: HashMap<ResourceKey, usize>,
    failed: Vec<Requirement>,
}

impl ContextState {
    /// Fresh state for repositories currently at `generations`
    pub(super) fn new(generations: Vec<u64>) -> Mutex<Self> {
        Mutex::new(Self {
            generations,
            ..Self::default()
        })
    }
}

/// Decides which capabilities are offered to the resolver for a requirement,
/// and in which order.
///
/// Candidates come in two stages. The protected stage holds capabilities of
/// the system resource, the requiring resource and the input resource; it is
/// never filtered. The discretionary stage holds repository capabilities,
/// which are subject to the blacklist, resolver hooks and ranking.
///
/// Built with [`ResolveContextBuilder`](super::ResolveContextBuilder).
pub struct ResolveContext {
    pub(super) repositories: Vec<Arc<dyn Repository>>,
    pub(super) system: Arc<Resource>,
    pub(super) framework: Option<Arc<Resource>>,
    pub(super) input: Arc<Resource>,
    pub(super) system_index: CapabilityIndex,
    pub(super) blacklist: Vec<BlacklistEntry>,
    pub(super) preferences: Vec<Preference>,
    pub(super) effective: HashMap<String, HashSet<String>>,
    pub(super) hooks: Vec<Arc<dyn ResolverHook>>,
    pub(super) optional_roots: Vec<Resource>,
    pub(super) state: Mutex<ContextState>,
}

impl ResolveContext {
    fn lock_state(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn repositories(&self) -> &[Arc<dyn Repository>] {
        &self.repositories
    }

    /// The synthetic resource carrying framework, EE and system capabilities
    pub fn system_resource(&self) -> &Arc<Resource> {
        &self.system
    }

    /// The selected framework, if one was configured and found
    pub fn framework(&self) -> Option<&Arc<Resource>> {
        self.framework.as_ref()
    }

    /// The synthetic resource holding the input requirements
    pub fn input_resource(&self) -> &Arc<Resource> {
        &self.input
    }

    /// Resources that take part in every resolution.
    pub fn mandatory_resources(&self) -> Vec<Arc<Resource>> {
        let mut resources = vec![Arc::clone(&self.system)];
        resources.extend(self.framework.iter().cloned());
        resources.push(Arc::clone(&self.input));
        resources
    }

    pub fn is_system_resource(&self, resource: &Resource) -> bool {
        std::ptr::eq(resource, self.system.as_ref())
    }

    /// Whether a requirement takes part in this resolve.
    ///
    /// Requirements without an `effective` directive, or with `resolve`, always
    /// do. Any other value must be enabled, and the requirement's namespace
    /// must not be in that value's skip list.
    pub fn is_effective(&self, requirement: &Requirement) -> bool {
        match requirement.effective() {
            None | Some(namespace::EFFECTIVE_RESOLVE) => true,
            Some(effective) => self
                .effective
                .get(effective)
                .map_or(false, |skip| !skip.contains(requirement.namespace())),
        }
    }

    /// Requirements for which no provider was found so far
    pub fn failed(&self) -> Vec<Requirement> {
        self.lock_state().failed.clone()
    }

    /// Candidates for `requirement`, best first.
    ///
    /// `requirer` is the resource declaring the requirement; its own matching
    /// capabilities are offered ahead of repository candidates. An empty
    /// result is not an error; it is recorded in [`ResolveContext::failed`].
    pub fn find_providers(&self, requirement: &Requirement, requirer: Option<&Arc<Resource>>) -> Vec<CapabilityRef> {
        if !self.is_effective(requirement) {
            log::debug!(
                "Requirement {} effective:={:?} is not effective",
                requirement.namespace(),
                requirement.effective()
            );
            return Vec::new();
        }

        let key = CacheKey::new(requirement, requirer);
        let generations: Vec<u64> = self.repositories.iter().map(|r| r.generation()).collect();
        {
            let mut state = self.lock_state();
            if state.generations != generations {
                log::debug!("Repository contents changed, dropping cached providers");
                state.providers.clear();
                state.priorities.clear();
                state.generations = generations;
            }
            if let Some(cached) = state.providers.get(&key) {
                return cached.clone();
            }
        }

        let (providers, priorities) = self.compute_providers(requirement, requirer);
        log::debug!(
            "For {} {} found {} providers",
            requirement.namespace(),
            requirement.filter_source().unwrap_or("(no filter)"),
            providers.len()
        );

        let mut state = self.lock_state();
        for (resource, priority) in priorities {
            state.priorities.entry(resource).or_insert(priority);
        }
        if providers.is_empty() && !state.failed.contains(requirement) {
            state.failed.push(requirement.clone());
        }
        state.providers.insert(key, providers.clone());
        providers
    }

    fn compute_providers(
        &self,
        requirement: &Requirement,
        requirer: Option<&Arc<Resource>>,
    ) -> (Vec<CapabilityRef>, Vec<(ResourceKey, usize)>) {
        let mut protected = Vec::new();
        self.system_index.append_matching_capabilities(requirement, &mut protected);
        if let Some(requirer) = requirer {
            append_own_capabilities(requirer, requirement, &mut protected);
        }
        append_own_capabilities(&self.input, requirement, &mut protected);
        dedup_in_order(&mut protected);

        let optional_root = requirer.map_or(false, |r| self.optional_roots.iter().any(|root| root == r.as_ref()));
        if requirement.is_optional() && !optional_root {
            return (protected, Vec::new());
        }

        let mut order: HashMap<CapabilityRef, usize> = HashMap::new();
        let mut priorities = Vec::new();
        let mut candidates = Vec::new();
        for (position, repository) in self.repositories.iter().enumerate() {
            let found = match repository.find_providers(requirement) {
                Ok(found) => found,
                Err(e) => {
                    log::warn!("Repository {} failed to find providers: {}", repository.name(), e);
                    continue;
                }
            };
            for capability in found {
                if protected.contains(&capability) || order.contains_key(&capability) {
                    continue;
                }
                let resource = capability.resource();
                if self.is_blacklisted(resource) || !is_permitted(resource) {
                    continue;
                }
                if !capability.capability().is_effective_for(requirement) {
                    continue;
                }
                if let Some(key) = resource_key(resource) {
                    priorities.push((key, position));
                }
                order.insert(capability.clone(), position);
                candidates.push(capability);
            }
        }

        for hook in &self.hooks {
            hook.filter_matches(requirement, &mut candidates);
        }

        self.rank_candidates(&mut candidates, &order);

        protected.extend(candidates);
        (protected, priorities)
    }

    fn is_blacklisted(&self, resource: &Resource) -> bool {
        self.blacklist.iter().any(|entry| entry.excludes(resource))
    }

    fn preference_rank(&self, resource: &Resource) -> usize {
        self.preferences
            .iter()
            .position(|preference| preference.matches(resource))
            .unwrap_or(usize::MAX)
    }

    /// Order discretionary candidates.
    ///
    /// Preference first, then fewer requirements, then more capabilities, then
    /// repository order. Candidates sharing an identity and preference are then
    /// rearranged by descending version within the positions they already hold.
    fn rank_candidates(&self, candidates: &mut [CapabilityRef], order: &HashMap<CapabilityRef, usize>) {
        candidates.sort_by_cached_key(|candidate| {
            let resource = candidate.resource();
            (
                self.preference_rank(resource),
                resource.requirements().len(),
                Reverse(resource.capabilities().len()),
                order.get(candidate).copied().unwrap_or(usize::MAX),
            )
        });

        let mut groups: HashMap<(String, usize), Vec<usize>> = HashMap::new();
        for (slot, candidate) in candidates.iter().enumerate() {
            let resource = candidate.resource();
            if let Some(identity) = resource.identity() {
                groups
                    .entry((identity.to_string(), self.preference_rank(resource)))
                    .or_default()
                    .push(slot);
            }
        }

        for slots in groups.into_values().filter(|slots| slots.len() > 1) {
            let mut members: Vec<CapabilityRef> = slots.iter().map(|&slot| candidates[slot].clone()).collect();
            members.sort_by(|a, b| b.resource().version().cmp(&a.resource().version()));
            for (slot, member) in slots.into_iter().zip(members) {
                candidates[slot] = member;
            }
        }
    }

    /// Insert a hosted capability into `capabilities` by repository priority.
    ///
    /// It goes before the first capability whose resource came from a lower
    /// priority repository. Returns the insertion index.
    pub fn insert_hosted_capability(&self, capabilities: &mut Vec<CapabilityRef>, hosted: CapabilityRef) -> usize {
        let state = self.lock_state();
        let priority_of = |resource: &Resource, default: usize| {
            resource_key(resource)
                .and_then(|key| state.priorities.get(&key).copied())
                .unwrap_or(default)
        };

        let priority = priority_of(hosted.resource(), usize::MAX);
        let index = capabilities
            .iter()
            .position(|other| priority_of(other.resource(), 0) > priority)
            .unwrap_or(capabilities.len());
        capabilities.insert(index, hosted);
        index
    }
}

fn append_own_capabilities(resource: &Arc<Resource>, requirement: &Requirement, out: &mut Vec<CapabilityRef>) {
    out.extend(
        CapabilityRef::all_in(resource, requirement.namespace())
            .into_iter()
            .filter(|cap| requirement.matches(cap.capability())),
    );
}

fn dedup_in_order(capabilities: &mut Vec<CapabilityRef>) {
    let mut seen = HashSet::new();
    capabilities.retain(|cap| seen.insert(cap.clone()));
}

/// Repository resources that may be offered at all.
///
/// Frameworks (anything exporting `org.osgi.framework`) only take part
/// through the system resource. Execution environment pseudo bundles and
/// resources without exactly one identity are never candidates.
fn is_permitted(resource: &Resource) -> bool {
    if resource.exports_package(namespace::FRAMEWORK_PACKAGE) {
        return false;
    }
    if resource.identity_count() != 1 {
        log::error!("Resource {} does not have exactly one identity capability", resource);
        return false;
    }
    match resource.identity() {
        Some(identity) => !identity.starts_with(namespace::EE_IDENTITY_PREFIX),
        None => {
            log::error!("Resource is missing an identity");
            false
        }
    }
}
