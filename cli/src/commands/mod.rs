//! CLI command definitions and dispatch.

mod inspect;
mod push;
mod version;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use mlist_core::RegistryConfig;
use tokio_util::sync::CancellationToken;

/// mlist - assemble, push and inspect multi-platform manifest lists.
#[derive(Parser)]
#[command(name = "mlist", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Accept invalid TLS certificates from the registry
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Talk to the registry over plain HTTP
    #[arg(long, global = true)]
    pub plain_http: bool,

    /// Registry username
    #[arg(long, global = true)]
    pub username: Option<String>,

    /// Registry password
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Docker config directory (or config.json path) used for credentials [default: ~/.docker]
    #[arg(long = "docker-cfg", global = true)]
    pub docker_cfg: Option<PathBuf>,
}

impl GlobalArgs {
    /// Registry settings derived from the global flags.
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            username: self.username.clone(),
            password: self.password.clone(),
            docker_config: self.docker_cfg.clone(),
            insecure: self.insecure,
            plain_http: self.plain_http,
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Push a manifest list or image index to a registry
    Push(push::PushArgs),
    /// Fetch and display an image or manifest list from a registry
    Inspect(inspect::InspectArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Push(args) => push::execute(args, &cli.global).await,
        Command::Inspect(args) => inspect::execute(args, &cli.global).await,
        Command::Version(args) => version::execute(args).await,
    }
}

/// Token cancelled on the first Ctrl-C.
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling");
            child.cancel();
        }
    });
    token
}
