//! `mlist push` command - assemble and push a manifest list or image index.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use mlist_core::{ListKind, PushOptions};
use mlist_registry::oci::{push_manifest_list, ImageReference, ListSpec, RegistryResolver};

use super::GlobalArgs;
use crate::spec;

#[derive(Args)]
pub struct PushArgs {
    #[command(subcommand)]
    pub source: PushSource,
}

/// Where the list definition comes from.
#[derive(Subcommand)]
pub enum PushSource {
    /// Push a manifest list described by a YAML file
    FromSpec(FromSpecArgs),
    /// Push a manifest list built from a platform list and an image name template
    FromArgs(FromArgsArgs),
}

#[derive(Args)]
pub struct FromSpecArgs {
    /// Path to the YAML list definition
    pub file: PathBuf,

    #[command(flatten)]
    pub flags: PushFlags,
}

#[derive(Args)]
pub struct FromArgsArgs {
    /// Comma-separated platforms, e.g. linux/amd64,linux/arm/v7
    #[arg(long)]
    pub platforms: String,

    /// Source image pattern; OS, ARCH and VARIANT are replaced per platform
    #[arg(long)]
    pub template: String,

    /// Name of the manifest list to produce
    #[arg(long)]
    pub target: String,

    /// Additional tags for the manifest list (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    #[command(flatten)]
    pub flags: PushFlags,
}

/// Options shared by both push sources.
#[derive(Args, Debug, Clone)]
pub struct PushFlags {
    /// Only warn on member images that do not exist
    #[arg(long)]
    pub ignore_missing: bool,

    /// Schema of the pushed list: docker (manifest list) or oci (image index)
    #[arg(long = "type", default_value_t = ListKind::Docker)]
    pub kind: ListKind,
}

impl PushArgs {
    /// Push options selected on the command line.
    pub fn options(&self) -> PushOptions {
        let flags = match &self.source {
            PushSource::FromSpec(args) => &args.flags,
            PushSource::FromArgs(args) => &args.flags,
        };
        PushOptions {
            kind: flags.kind,
            ignore_missing: flags.ignore_missing,
            ..Default::default()
        }
    }

    fn list_spec(&self) -> Result<ListSpec, Box<dyn std::error::Error>> {
        let list = match &self.source {
            PushSource::FromSpec(args) => spec::load_spec(&args.file)?,
            PushSource::FromArgs(args) => {
                spec::spec_from_args(&args.platforms, &args.template, &args.target, &args.tags)?
            }
        };
        Ok(list)
    }
}

pub async fn execute(args: PushArgs, global: &GlobalArgs) -> Result<(), Box<dyn std::error::Error>> {
    let list = args.list_spec()?;
    let options = args.options();

    let target = ImageReference::parse_qualified(&list.image)?;
    let resolver = RegistryResolver::new(&global.registry_config(), &[target.registry.as_str()])?;

    let cancel = super::cancel_on_ctrl_c();
    let result = push_manifest_list(&resolver, &list, &options, &cancel).await?;

    println!("Digest: {} {}", result.digest, result.size);
    Ok(())
}
