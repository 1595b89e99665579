//! Repos command - list configured repositories.

use anyhow::Result;
use clap::Args;
use console::style;

use crate::config::BndConfig;

#[derive(Args, Debug)]
pub struct ReposArgs {
    /// Also count the symbolic names each repository holds
    #[arg(long)]
    pub count: bool,
}

pub fn execute(args: ReposArgs, config: &BndConfig) -> Result<i32> {
    let manager = config.repository_manager()?;
    if manager.is_empty() {
        println!("{} No repositories configured", style("Info:").cyan());
        return Ok(0);
    }

    for repository in manager.repositories() {
        let mode = if repository.can_write() { "rw" } else { "ro" };
        if args.count {
            match repository.list(None) {
                Ok(names) => println!("{} [{}] {} bundles", style(repository.name()).green(), mode, names.len()),
                Err(e) => println!("{} [{}] {}", style(repository.name()).green(), mode, style(e).red()),
            }
        } else {
            println!("{} [{}]", style(repository.name()).green(), mode);
        }
    }
    Ok(0)
}
