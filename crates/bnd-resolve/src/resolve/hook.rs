use crate::resource::{CapabilityRef, Requirement};

/// Narrows the candidates offered for a requirement.
///
/// Hooks only see candidates contributed by repositories. Capabilities of the
/// system resource, the requiring resource and the input resource are added
/// back afterwards, so a hook cannot remove them.
pub trait ResolverHook: Send + Sync {
    fn filter_matches(&self, requirement: &Requirement, candidates: &mut Vec<CapabilityRef>);
}

impl<F> ResolverHook for F
where
    F: Fn(&Requirement, &mut Vec<CapabilityRef>) + Send + Sync,
{
    fn filter_matches(&self, requirement: &Requirement, candidates: &mut Vec<CapabilityRef>) {
        self(requirement, candidates)
    }
}
