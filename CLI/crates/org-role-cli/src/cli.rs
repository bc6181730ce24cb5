use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "org-role", version, about = "Resolve per-organization roles from IdP user info")]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve organization roles from a user info JSON document
    Resolve(ResolveArgs),
    /// Validate an org mapping configuration file
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Org mapping configuration (YAML)
    #[arg(short, long, env = "ORG_ROLE_CONFIG")]
    pub config: PathBuf,

    /// User info JSON document returned by the identity provider
    #[arg(long)]
    pub claims: PathBuf,

    /// Organization list (JSON) used instead of the configured registry
    #[arg(long)]
    pub orgs: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Org mapping configuration (YAML)
    #[arg(short, long, env = "ORG_ROLE_CONFIG")]
    pub config: PathBuf,
}
