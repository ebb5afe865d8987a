use crate::config::Config;
use crate::runner::{RunSummary, Runner};
use crate::scenario::Scenario;
use crate::telemetry::{JsonLineSink, SampleSink};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct RunArgs {
    /// Path to the configuration file (TOML or JSON).
    pub config: PathBuf,

    /// Path to the command scenario to execute (TOML or JSON).
    pub script: PathBuf,

    /// Pace polls against the wall clock instead of free-running.
    #[arg(long)]
    pub realtime: bool,

    /// Suppress telemetry output; log the summary only.
    #[arg(long)]
    pub quiet: bool,
}

impl RunArgs {
    pub fn run(&self) -> Result<()> {
        // Initialize tracing
        tracing_subscriber::fmt::init();

        let config = Config::from_file(&self.config)?;
        let scenario = Scenario::from_file(&self.script)?;
        let mut runner = Runner::from_config(&config)?;

        tracing::info!(
            controllers = config.controllers.len(),
            events = scenario.events.len(),
            poll_period = config.sim.poll_period,
            "starting simulation"
        );

        let mut sink: Box<dyn SampleSink> = if self.quiet {
            Box::new(JsonLineSink::new(std::io::sink()))
        } else {
            Box::new(JsonLineSink::new(std::io::stdout().lock()))
        };

        let summary = if self.realtime {
            paced(&mut runner, &scenario, sink.as_mut())?
        } else {
            runner.run(&scenario, sink.as_mut())?
        };

        tracing::info!(
            simulated_time = summary.simulated_time,
            dispatched = summary.dispatched,
            rejected = summary.rejected,
            "simulation finished"
        );
        Ok(())
    }
}

/// Wall-clock pacing needs a reactor; the free-running path does not.
#[tokio::main]
async fn paced(
    runner: &mut Runner,
    scenario: &Scenario,
    sink: &mut dyn SampleSink,
) -> Result<RunSummary> {
    runner.run_paced(scenario, sink).await
}
