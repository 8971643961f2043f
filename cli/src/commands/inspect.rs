//! `mlist inspect` command - show an image or manifest list from a registry.

use clap::Args;
use mlist_core::config::DEFAULT_FETCH_CONCURRENCY;
use mlist_registry::oci::{inspect_with, ImageReference, RegistryResolver};

use super::GlobalArgs;
use crate::output;

#[derive(Args)]
pub struct InspectArgs {
    /// Image or manifest list reference
    pub image: String,

    /// Print the report as JSON
    #[arg(long)]
    pub raw: bool,

    /// Child manifests fetched in parallel when inspecting a list
    #[arg(long, default_value_t = DEFAULT_FETCH_CONCURRENCY)]
    pub max_concurrent_fetches: usize,
}

pub async fn execute(
    args: InspectArgs,
    global: &GlobalArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let reference = ImageReference::parse(&args.image)?;
    let resolver =
        RegistryResolver::new(&global.registry_config(), &[reference.registry.as_str()])?;

    let report = inspect_with(&resolver, &reference, args.max_concurrent_fetches).await?;

    if args.raw {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", output::render_report(&report));
    }
    Ok(())
}
