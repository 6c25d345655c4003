mod cli;
mod logging;
mod settings;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use fourget_engine::{Harvester, RunStatus, ThreadRef};
use fourget_logging::{level_for_verbosity, log_error, log_info};

use crate::cli::Cli;
use crate::settings::AppSettings;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::initialize(
        level_for_verbosity(cli.verbose, cli.quiet),
        cli.log_file.as_deref(),
    ) {
        eprintln!("Error: {err:#}");
        return ExitCode::from(RunStatus::Failed.exit_code());
    }

    match run(&cli) {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(err) => {
            log_error!("{err:#}");
            ExitCode::from(RunStatus::Failed.exit_code())
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<RunStatus> {
    let settings = match &cli.config {
        Some(path) => AppSettings::load(path)?,
        None => AppSettings::default(),
    };
    let thread = ThreadRef::from_url(&cli.url)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("could not start the async runtime")?;
    let _entered = runtime.enter();
    let harvester = Harvester::new(settings.harvest_config(cli))
        .context("could not set up the HTTP client")?;
    let report = runtime.block_on(harvester.run(thread))?;

    let status = report.status();
    match &status {
        RunStatus::NewData => log_info!(
            "Downloaded {} bytes, {} bytes already present",
            report.tally.transferred,
            report.tally.present
        ),
        RunStatus::NoOp => log_info!("Nothing new to download"),
        RunStatus::Stopped(_) | RunStatus::Failed => {}
    }
    Ok(status)
}
