use anyhow::Result;
use clap::Args;
use console::style;

use crate::config::BndConfig;
use crate::providers::build_context;

#[derive(Args, Debug)]
pub struct MandatoryArgs {
    /// List every capability of each resource
    #[arg(long)]
    pub capabilities: bool,
}

pub fn execute(args: MandatoryArgs, config: &BndConfig) -> Result<i32> {
    let context = build_context(config)?;

    match context.framework() {
        Some(framework) => println!("{} {}", style("Framework:").bold(), framework),
        None => println!("{} none", style("Framework:").bold()),
    }

    for resource in context.mandatory_resources() {
        println!(
            "{} ({} capabilities, {} requirements)",
            style(resource.to_string()).green(),
            resource.capabilities().len(),
            resource.requirements().len()
        );
        if args.capabilities {
            for capability in resource.capabilities() {
                let attributes: Vec<String> = capability
                    .attributes()
                    .iter()
                    .map(|(key, value)| format!("{}={}", key, value))
                    .collect();
                println!("    {} {}", capability.namespace(), attributes.join("; "));
            }
        }
    }
    Ok(0)
}
