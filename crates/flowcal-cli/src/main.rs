use clap::Parser;
use flowcal_cli::cli::{Cli, Commands};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;
mod commands;

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let result = match &cli.command {
        Some(Commands::Run {
            config,
            start,
            end,
            out,
            threads,
        }) => commands::run::handle(config, start, end.as_deref(), out.as_deref(), *threads),
        Some(Commands::Errors {
            measured,
            modelled,
            nan_policy,
            out,
        }) => commands::errors::handle(measured, modelled, (*nan_policy).into(), out.as_deref()),
        Some(Commands::Calibrate {
            config,
            start,
            end,
            workers,
            manifest,
            threads,
        }) => commands::calibrate::handle(
            config,
            start,
            end.as_deref(),
            *workers,
            manifest,
            *threads,
        ),
        Some(Commands::Topology { command }) => commands::topology::handle(command),
        None => {
            info!("No subcommand provided. Use `flowcal --help` for more information.");
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("flowcal failed: {:?}", e);
        std::process::exit(1);
    }
}
