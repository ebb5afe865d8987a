use crate::config::Config;
use crate::runner::Runner;
use crate::scenario::Scenario;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct CheckArgs {
    /// Path to the configuration file (TOML or JSON).
    pub config: PathBuf,

    /// Optional scenario to validate against the configuration.
    #[arg(long)]
    pub script: Option<PathBuf>,
}

impl CheckArgs {
    pub fn run(&self) -> Result<()> {
        let config = Config::from_file(&self.config)?;
        config.validate()?;
        let axes: usize = config.controllers.iter().map(|c| c.axes.len()).sum();
        println!(
            "configuration ok: {} controller(s), {} axis(es)",
            config.controllers.len(),
            axes
        );

        if let Some(script) = &self.script {
            let scenario = Scenario::from_file(script)?;
            // Building the runner checks axis geometry; resolving the
            // scenario checks controller names and axis indices.
            let runner = Runner::from_config(&config)?;
            let events = runner.validate_scenario(&scenario)?;
            println!("scenario ok: {events} event(s)");
        }

        Ok(())
    }
}
