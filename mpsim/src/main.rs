use std::path::PathBuf;

use clap::Parser;
use mpbase::param::Parameters;
use mpsched::registry::Registry;
use tracing_subscriber::prelude::*;

mod error;
mod report;
mod scenario;
mod sim;

use error::Error;
use scenario::Scenario;
use sim::Simulation;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Options {
    #[arg(help = "Scenario to simulate, JSON", value_name = "PATH")]
    scenario: PathBuf,
    #[arg(long, short, default_value = "ecf", help = "Scheduler to drive")]
    scheduler: String,
    #[arg(long, help = "ECF r_beta, overrides the one of the scenario")]
    r_beta: Option<u32>,
    #[arg(long, help = "Print the report as JSON")]
    json: bool,
    #[arg(
        long,
        default_value = "true",
        action = clap::ArgAction::Set,
        help = "Enable ANSI color output in logs"
    )]
    ansi: bool,
}

fn main() {
    let options = Options::parse();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(options.ansi)
                .with_filter(
                    tracing_subscriber::EnvFilter::builder()
                        .with_default_directive(tracing::level_filters::LevelFilter::WARN.into())
                        .from_env_lossy(),
                ),
        )
        .init();

    if let Err(error) = run(options) {
        tracing::error!(?error);
        std::process::exit(1);
    }
}

fn run(options: Options) -> Result<(), Error> {
    let scenario = Scenario::from_file(&options.scenario)?;
    let params = match options.r_beta {
        Some(r_beta) => Parameters::builder().r_beta(r_beta).build()?,
        None => scenario.params,
    };
    params.apply()?;

    let registry = Registry::builtin();
    let scheduler = registry.create(&options.scheduler)?;
    tracing::info!(target: "sim", scheduler = %options.scheduler, r_beta = params.r_beta(), "start");

    let report = Simulation::new(&scenario, scheduler)?.run();
    if !report.is_complete() {
        tracing::warn!(
            target: "sim",
            delivered = report.delivered_bytes,
            "duration limit reached before the transfer completed"
        );
    }
    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}
