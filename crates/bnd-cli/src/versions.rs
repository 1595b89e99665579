use anyhow::Result;
use clap::Args;
use console::style;

use crate::config::BndConfig;

#[derive(Args, Debug)]
pub struct VersionsArgs {
    /// Bundle symbolic name
    pub bsn: String,
}

pub fn execute(args: VersionsArgs, config: &BndConfig) -> Result<i32> {
    let manager = config.repository_manager()?;

    let mut found = false;
    for repository in manager.repositories() {
        let versions = repository.versions(&args.bsn)?;
        if versions.is_empty() {
            continue;
        }
        found = true;
        let versions: Vec<String> = versions.iter().map(ToString::to_string).collect();
        println!("{}: {}", style(repository.name()).green(), versions.join(", "));
    }

    if !found {
        eprintln!("{} {} not found in any repository", style("Warning:").yellow(), args.bsn);
        return Ok(1);
    }
    Ok(0)
}
