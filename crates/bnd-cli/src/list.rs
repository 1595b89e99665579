use anyhow::Result;
use clap::Args;

use crate::config::BndConfig;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Glob pattern on symbolic names, e.g. "org.apache.*"
    pub pattern: Option<String>,
}

pub fn execute(args: ListArgs, config: &BndConfig) -> Result<i32> {
    let manager = config.repository_manager()?;
    for name in manager.list(args.pattern.as_deref())? {
        println!("{}", name);
    }
    Ok(0)
}
