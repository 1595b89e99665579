//! Get command - download an artifact into the cache.

use anyhow::{Context, Result};
use bnd_resolve::Strategy;
use clap::Args;
use console::style;
use std::collections::HashMap;

use crate::config::BndConfig;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Bundle symbolic name
    pub bsn: String,

    /// Version range, bare version, "latest" or "project"
    #[arg(long)]
    pub range: Option<String>,

    /// Selection strategy: lowest, highest or exact
    #[arg(long, default_value = "highest")]
    pub strategy: Strategy,

    /// Only search this repository
    #[arg(long)]
    pub repository: Option<String>,
}

pub fn execute(args: GetArgs, config: &BndConfig) -> Result<i32> {
    let manager = config.repository_manager()?;
    let repositories = match &args.repository {
        Some(name) => vec![manager
            .get(name)
            .cloned()
            .with_context(|| format!("Unknown repository {}", name))?],
        None => manager.repositories().to_vec(),
    };

    let properties = HashMap::new();
    for repository in repositories {
        let fetched = repository
            .get(&args.bsn, args.range.as_deref(), args.strategy, &properties)
            .with_context(|| format!("Failed to get {} from {}", args.bsn, repository.name()))?;
        if let Some(path) = fetched {
            println!("{}", path.display());
            return Ok(0);
        }
    }

    eprintln!(
        "{} no artifact for {} {} ({})",
        style("Warning:").yellow(),
        args.bsn,
        args.range.as_deref().unwrap_or("0.0.0"),
        args.strategy
    );
    Ok(1)
}
