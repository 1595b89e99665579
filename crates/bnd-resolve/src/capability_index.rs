//! Namespace-keyed capability lookup

use std::collections::HashMap;
use std::sync::Arc;

use crate::resource::{CapabilityRef, Requirement, Resource};

/// Capabilities of a set of resources, grouped by namespace in insertion order.
#[derive(Debug, Default, Clone)]
pub struct CapabilityIndex {
    by_namespace: HashMap<String, Vec<CapabilityRef>>,
}

impl CapabilityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every capability of the resource under its namespace.
    pub fn add_resource(&mut self, resource: &Arc<Resource>) {
        for (index, cap) in resource.capabilities().iter().enumerate() {
            if let Some(cap_ref) = CapabilityRef::new(Arc::clone(resource), index) {
                self.by_namespace
                    .entry(cap.namespace().to_string())
                    .or_default()
                    .push(cap_ref);
            }
        }
    }

    /// Append the capabilities matching the requirement to `out`, in insertion order.
    ///
    /// Without a filter every capability of the namespace matches.
    pub fn append_matching_capabilities(&self, requirement: &Requirement, out: &mut Vec<CapabilityRef>) {
        let Some(candidates) = self.by_namespace.get(requirement.namespace()) else {
            return;
        };
        out.extend(
            candidates
                .iter()
                .filter(|cap| requirement.matches(cap.capability()))
                .cloned(),
        );
    }

    pub fn find_matching(&self, requirement: &Requirement) -> Vec<CapabilityRef> {
        let mut out = Vec::new();
        self.append_matching_capabilities(requirement, &mut out);
        out
    }

    pub fn clear(&mut self) {
        self.by_namespace.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.by_namespace.values().all(Vec::is_empty)
    }
}
