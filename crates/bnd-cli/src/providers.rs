//! Providers command - run candidate discovery for one requirement.

use anyhow::{Context, Result};
use bnd_resolve::namespace;
use bnd_resolve::resolve::{ResolveContext, ResolveContextBuilder};
use bnd_resolve::{CapabilityRef, Requirement};
use clap::Args;
use console::style;

use crate::config::BndConfig;

#[derive(Args, Debug)]
pub struct ProvidersArgs {
    /// Requirement namespace, e.g. osgi.wiring.package
    pub namespace: String,

    /// LDAP filter narrowing the requirement
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Value of the requirement's effective directive
    #[arg(short, long)]
    pub effective: Option<String>,

    /// Treat the requirement as optional
    #[arg(long)]
    pub optional: bool,
}

pub(crate) fn build_context(config: &BndConfig) -> Result<ResolveContext> {
    let manager = config.repository_manager()?;
    let context = ResolveContextBuilder::from_run_config(&config.run, &manager)
        .context("Invalid run configuration")?
        .build()?;
    Ok(context)
}

fn describe(context: &ResolveContext, provider: &CapabilityRef) -> String {
    let resource = provider.resource();
    let origin = if context.is_system_resource(resource) {
        style("system").magenta().to_string()
    } else {
        format!(
            "{} {}",
            resource.identity().unwrap_or("<anonymous>"),
            style(resource.version()).dim()
        )
    };

    let attributes: Vec<String> = provider
        .capability()
        .attributes()
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    format!("{} {}", origin, style(attributes.join("; ")).cyan())
}

pub fn execute(args: ProvidersArgs, config: &BndConfig) -> Result<i32> {
    let mut requirement = match &args.filter {
        Some(filter) => Requirement::with_filter(args.namespace.as_str(), filter)
            .with_context(|| format!("Invalid filter {}", filter))?,
        None => Requirement::new(args.namespace.as_str()),
    };
    if let Some(effective) = &args.effective {
        requirement = requirement.with_directive(namespace::EFFECTIVE_DIRECTIVE, effective.as_str());
    }
    if args.optional {
        requirement = requirement.with_directive(namespace::RESOLUTION_DIRECTIVE, namespace::RESOLUTION_OPTIONAL);
    }

    let context = build_context(config)?;
    if !context.is_effective(&requirement) {
        eprintln!(
            "{} requirement is not effective for this run",
            style("Warning:").yellow()
        );
    }

    let providers = context.find_providers(&requirement, None);
    if providers.is_empty() {
        println!("No providers found");
        return Ok(1);
    }

    for (index, provider) in providers.iter().enumerate() {
        println!("{:>3}. {}", index + 1, describe(&context, provider));
    }
    Ok(0)
}
