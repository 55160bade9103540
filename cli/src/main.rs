use clap::Parser;

mod commands;
mod console;
mod scheduler;

use commands::cli::{Args, Commands, ServeArgs};
use sandgate_core::api::{load_default, load_from, LoggingConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = Args::parse();
    let cfg = match &args.config {
        Some(path) => load_from(path)?,
        None => load_default()?,
    };
    cfg.validate()?;

    let _log_guard = init_tracing(&cfg.logging);

    match args.command.take() {
        Some(Commands::Healthcheck) => commands::healthcheck::run(cfg).await,
        Some(Commands::Serve(serve_args)) => commands::serve::run(cfg, serve_args).await,
        None => commands::serve::run(cfg, ServeArgs::default()).await,
    }
}

fn init_tracing(cfg: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.level.clone()));
    match &cfg.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "sandgate.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}
