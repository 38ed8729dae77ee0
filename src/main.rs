// src/main.rs

use anyhow::Result;
use clap::Parser;
use rdfbundle::Settings;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load(&cli.project_dir)?;
    if let Some(dir) = cli.bundles_dir {
        settings.bundles_directory = dir;
    }
    let ctx = commands::Context {
        project_dir: cli.project_dir,
        settings,
    };

    match cli.command {
        Commands::Install {
            descriptor,
            source,
            source_dir,
            imports_context,
            default_context,
        } => commands::cmd_install(
            &ctx,
            &descriptor,
            &source,
            &source_dir,
            imports_context,
            default_context,
        ),
        Commands::Fetch { bundle, version } => commands::cmd_fetch(&ctx, &bundle, version),
        Commands::Contexts { bundle, version } => commands::cmd_contexts(&ctx, &bundle, version),
        Commands::Versions { bundle, remote } => commands::cmd_versions(&ctx, &bundle, remote),
        Commands::Pack {
            bundle,
            version,
            output,
        } => commands::cmd_pack(&ctx, &bundle, version, &output),
        Commands::Verify { bundle, version } => commands::cmd_verify(&ctx, &bundle, version),
        Commands::RemoteAdd { name, url } => commands::cmd_remote_add(&ctx, &name, &url),
        Commands::RemoteList => commands::cmd_remote_list(&ctx),
    }
}
