use capsplit::configuration::config::{Args, Config};
use capsplit::error_handling::types::{ExitReason, PipelineError};
use capsplit::pipeline::Pipeline;
use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG overrides the default level
    // https://docs.rs/env_logger/latest/env_logger/
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .parse_default_env()
        .init();

    println!(
        "
==============================================================================
          capsplit v{}: capture once, split traffic four ways
==============================================================================
",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();

    info!("Importing configuration");
    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            return ExitReason::Configuration.into();
        }
    };
    info!("Configuration imported successfully");

    let pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => return fail(e),
    };

    match pipeline.run().await {
        Ok(summary) => {
            println!("{}", summary);
            let reason = summary.exit_reason();
            if reason != ExitReason::Success {
                error!("Exiting with status {}", reason.code());
            }
            reason.into()
        }
        Err(e) => fail(e),
    }
}

fn fail(e: PipelineError) -> ExitCode {
    let reason = e.exit_reason();
    error!("{}, exiting with status {}", e, reason.code());
    reason.into()
}
