//! Candidate discovery for an external resolver.

mod builder;
mod context;
mod ee;
mod hook;
mod policy;

pub use builder::{ResolveContextBuilder, INITIAL_IDENTITY, NO_FRAMEWORK, SYSTEM_IDENTITY};
pub use context::ResolveContext;
pub use ee::ExecutionEnvironment;
pub use hook::ResolverHook;
pub use policy::{BlacklistEntry, Preference};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace;
    use crate::repository::{Repository, ResourcesRepository};
    use crate::resource::{Capability, CapabilityRef, Requirement, Resource, ResourceBuilder};
    use bnd_version::Version;
    use std::sync::Arc;

    fn repo(name: &str, resources: Vec<Resource>) -> Arc<ResourcesRepository> {
        Arc::new(ResourcesRepository::with_resources(name, resources))
    }

    fn identities(providers: &[CapabilityRef]) -> Vec<String> {
        providers
            .iter()
            .map(|p| p.resource().identity().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_effective_defaults() {
        let context = ResolveContextBuilder::new().build().unwrap();
        let resolve = Requirement::new("dummy.ns").with_directive("effective", "resolve");
        let active = Requirement::new("dummy.ns").with_directive("effective", "active");
        let plain = Requirement::new("dummy.ns");

        assert!(context.is_effective(&resolve));
        assert!(!context.is_effective(&active));
        assert!(context.is_effective(&plain));
    }

    #[test]
    fn test_effective_configured() {
        let context = ResolveContextBuilder::new()
            .effective("active", Vec::new())
            .effective("arbitrary", vec!["skipped.ns".to_string()])
            .build()
            .unwrap();

        let with = |ns: &str, effective: &str| Requirement::new(ns).with_directive("effective", effective);
        assert!(context.is_effective(&with("dummy.ns", "active")));
        assert!(context.is_effective(&with("dummy.ns", "arbitrary")));
        assert!(!context.is_effective(&with("skipped.ns", "arbitrary")));
        assert!(!context.is_effective(&with("dummy.ns", "VeryArbitrary")));
    }

    #[test]
    fn test_ineffective_requirement_has_no_providers() {
        let repository = repo("r", vec![ResourceBuilder::new().bundle("a", Version::new(1, 0, 0)).build()]);
        let context = ResolveContextBuilder::new().repository(repository).build().unwrap();
        let req = Requirement::identity("a", None).with_directive("effective", "active");
        assert!(context.find_providers(&req, None).is_empty());
        assert!(context.failed().is_empty());
    }

    #[test]
    fn test_permitted_filters_frameworks_and_ee_bundles() {
        let resources = vec![
            ResourceBuilder::new()
                .bundle("osgi.core", Version::new(4, 3, 0))
                .export_package(namespace::FRAMEWORK_PACKAGE, Version::new(1, 6, 0))
                .export_package("p", Version::EMPTY)
                .build(),
            ResourceBuilder::new()
                .bundle("ee.minimum", Version::new(1, 0, 0))
                .export_package("p", Version::EMPTY)
                .build(),
            ResourceBuilder::new()
                .bundle("good", Version::new(1, 0, 0))
                .export_package("p", Version::EMPTY)
                .build(),
        ];
        let context = ResolveContextBuilder::new()
            .repository(repo("r", resources))
            .build()
            .unwrap();

        let req = Requirement::with_filter(namespace::PACKAGE, "(osgi.wiring.package=p)").unwrap();
        assert_eq!(identities(&context.find_providers(&req, None)), vec!["good"]);
    }

    #[test]
    fn test_self_capability_comes_first() {
        let shared = |bsn: &str| {
            ResourceBuilder::new()
                .bundle(bsn, Version::new(1, 0, 0))
                .export_package("shared", Version::new(1, 0, 0))
                .build()
        };
        let repository = repo("r", vec![shared("other"), shared("me")]);
        let me = repository.find_resource("me", None, crate::repository::Strategy::Highest).unwrap().unwrap();
        let context = ResolveContextBuilder::new().repository(repository).build().unwrap();

        let req = Requirement::with_filter(namespace::PACKAGE, "(osgi.wiring.package=shared)").unwrap();
        let providers = context.find_providers(&req, Some(&me));
        assert_eq!(identities(&providers), vec!["me", "other"]);

        let providers = context.find_providers(&req, None);
        assert_eq!(providers.len(), 2);
    }

    #[test]
    fn test_optional_requirement_only_sees_protected_stage() {
        let repository = repo(
            "r",
            vec![ResourceBuilder::new()
                .bundle("a", Version::new(1, 0, 0))
                .export_package("opt", Version::EMPTY)
                .build()],
        );
        let requirer = Arc::new(
            ResourceBuilder::new()
                .bundle("root", Version::new(1, 0, 0))
                .import_package("opt", None, true)
                .build(),
        );
        let req = requirer.requirements()[0].clone();

        let context = ResolveContextBuilder::new().repository(repository.clone()).build().unwrap();
        assert!(context.find_providers(&req, Some(&requirer)).is_empty());

        let context = ResolveContextBuilder::new()
            .repository(repository)
            .optional_root(requirer.as_ref().clone())
            .build()
            .unwrap();
        assert_eq!(identities(&context.find_providers(&req, Some(&requirer))), vec!["a"]);
    }

    #[test]
    fn test_capability_effective_directive() {
        let repository = repo(
            "r",
            vec![ResourceBuilder::new()
                .bundle("a", Version::new(1, 0, 0))
                .capability(Capability::new("x").with_attribute("x", "y").with_directive("effective", "active"))
                .build()],
        );
        let context = ResolveContextBuilder::new()
            .repository(repository)
            .effective("active", Vec::new())
            .build()
            .unwrap();

        let plain = Requirement::with_filter("x", "(x=y)").unwrap();
        assert!(context.find_providers(&plain, None).is_empty());
        let active = plain.clone().with_directive("effective", "active");
        assert_eq!(context.find_providers(&active, None).len(), 1);
    }

    #[test]
    fn test_failed_requirements_are_recorded_once() {
        let context = ResolveContextBuilder::new().build().unwrap();
        let req = Requirement::identity("missing", None);
        assert!(context.find_providers(&req, None).is_empty());
        assert!(context.find_providers(&req, None).is_empty());
        assert_eq!(context.failed(), vec![req]);
    }

    #[test]
    fn test_provider_cache_follows_repository_generation() {
        let repository = repo("r", Vec::new());
        let context = ResolveContextBuilder::new().repository(repository.clone()).build().unwrap();
        let req = Requirement::identity("late", None);
        assert!(context.find_providers(&req, None).is_empty());

        repository.add(ResourceBuilder::new().bundle("late", Version::new(1, 0, 0)).build());
        assert_eq!(context.find_providers(&req, None).len(), 1);
    }

    #[test]
    fn test_same_identity_higher_version_first() {
        let repository = repo(
            "r",
            vec![
                ResourceBuilder::new().bundle("a", Version::new(1, 0, 0)).build(),
                ResourceBuilder::new().bundle("a", Version::new(2, 0, 0)).build(),
            ],
        );
        let context = ResolveContextBuilder::new().repository(repository).build().unwrap();
        let providers = context.find_providers(&Requirement::identity("a", None), None);
        let versions: Vec<Version> = providers.iter().map(|p| p.resource().version()).collect();
        assert_eq!(versions, vec![Version::new(2, 0, 0), Version::new(1, 0, 0)]);
    }

    #[test]
    fn test_insert_hosted_capability_by_priority() {
        let bundle = |bsn: &str| {
            ResourceBuilder::new()
                .bundle(bsn, Version::new(1, 0, 0))
                .export_package("p", Version::EMPTY)
                .build()
        };
        let high = repo("high", vec![bundle("h")]);
        let low = repo("low", vec![bundle("l")]);
        let hosted_repo = repo("hosted", vec![bundle("fragment")]);
        let context = ResolveContextBuilder::new()
            .repository(high)
            .repository(hosted_repo.clone())
            .repository(low)
            .build()
            .unwrap();

        let req = Requirement::with_filter(namespace::PACKAGE, "(osgi.wiring.package=p)").unwrap();
        let mut providers = context.find_providers(&req, None);
        let hosted = providers.remove(1);
        assert_eq!(hosted.resource().identity(), Some("fragment"));

        assert_eq!(context.insert_hosted_capability(&mut providers, hosted), 1);
        assert_eq!(identities(&providers), vec!["h", "fragment", "l"]);
    }
}
