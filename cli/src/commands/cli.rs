use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "sandgate",
    about = "Submit files and links to a malware-scanning service under a daily quota"
)]
pub struct Args {
    /// Path to the configuration file (defaults to ./config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the service with a console-driven operator session.
    Serve(ServeArgs),
    /// Query the scanning service health once and exit.
    Healthcheck,
}

#[derive(Debug, Default, clap::Args)]
pub struct ServeArgs {
    /// Operator id the console session acts as; defaults to the bootstrap
    /// operator.
    #[arg(long)]
    pub operator: Option<i64>,
}
