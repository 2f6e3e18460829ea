mod cli;
mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use engine_logging::{engine_error, engine_info, engine_warn};
use harvester_core::Cursor;
use harvester_engine::{
    CsvRecordStore, FileCheckpointStore, HarvestLoop, HarvestReport, HarvestSettings,
    HttpPageSource, ListingExtractor, ListingSchema, PageSource, ReplaySource,
};
use serde::Serialize;

use crate::cli::Cli;
use crate::config::HarvestConfig;
use crate::logging::LogDestination;

const EXIT_ABORTED: u8 = 1;
const EXIT_INTERRUPTED: u8 = 130;

/// What the binary reports once a run is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct RunSummary {
    output: PathBuf,
    new_records: usize,
    final_cursor: Cursor,
    steps_run: u64,
    /// Why the harvest stopped, or `interrupted`.
    reason: String,
    aborted: bool,
    interrupted: bool,
    cleanup_completed: bool,
}

impl RunSummary {
    fn from_report(output: PathBuf, report: &HarvestReport) -> Self {
        Self {
            output,
            new_records: report.new_records,
            final_cursor: report.final_cursor,
            steps_run: report.steps_run,
            reason: report.reason.to_string(),
            aborted: report.reason.is_abort(),
            interrupted: false,
            cleanup_completed: report.cleanup_completed,
        }
    }

    fn interrupted(output: PathBuf, harvest: &HarvestLoop, cleanup_completed: bool) -> Self {
        let state = harvest.state();
        Self {
            output,
            new_records: harvest.store().appended(),
            final_cursor: state.cursor(),
            steps_run: state.steps_run(),
            reason: "interrupted".to_string(),
            aborted: false,
            interrupted: true,
            cleanup_completed,
        }
    }

    fn exit_code(&self) -> ExitCode {
        if self.interrupted {
            ExitCode::from(EXIT_INTERRUPTED)
        } else if self.aborted || !self.cleanup_completed {
            ExitCode::from(EXIT_ABORTED)
        } else {
            ExitCode::SUCCESS
        }
    }

    fn render(&self, json: bool) -> Result<String> {
        if json {
            return serde_json::to_string_pretty(self).context("serializing run summary");
        }
        Ok(format!(
            "{} new records written to {} ({}; cursor {}, {} steps, cleanup {})",
            self.new_records,
            self.output.display(),
            self.reason,
            self.final_cursor,
            self.steps_run,
            if self.cleanup_completed {
                "completed"
            } else {
                "incomplete"
            }
        ))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::initialize(
        LogDestination::from_option(cli.log_file.as_deref()),
        logging::level(cli.verbose),
    );

    let summary = match run(&cli).await {
        Ok(summary) => summary,
        Err(err) => {
            engine_error!("Harvest failed: {:#}", err);
            return ExitCode::from(EXIT_ABORTED);
        }
    };
    match summary.render(cli.json) {
        Ok(text) => println!("{text}"),
        Err(err) => engine_error!("{:#}", err),
    }
    summary.exit_code()
}

async fn run(cli: &Cli) -> Result<RunSummary> {
    let config = HarvestConfig::load(cli.config.as_deref())?;
    let target = config.search_target(&cli.keyword, &cli.location)?;
    let pattern = config.resource_pattern();
    let pacing = config.pacing();

    let source: Box<dyn PageSource> = match &cli.replay {
        Some(dir) => Box::new(
            ReplaySource::from_dir(dir)
                .with_context(|| format!("loading replay frames from {}", dir.display()))?,
        ),
        None => Box::new(HttpPageSource::new(
            config.http_settings(&cli.keyword, &cli.location)?,
            pacing,
        )?),
    };
    let schema = ListingSchema::from_config(&config.selectors)?;
    let extractor = ListingExtractor::new(schema, pattern.clone());
    let store = CsvRecordStore::open(&cli.output, pattern)
        .with_context(|| format!("opening {}", cli.output.display()))?;
    let checkpoint = FileCheckpointStore::new(cli.checkpoint_path());

    engine_info!(
        "Harvesting {:?} in {:?} into {}",
        cli.keyword,
        cli.location,
        cli.output.display()
    );
    let settings = HarvestSettings {
        target,
        limits: config.limits(cli.max_steps),
        pacing,
    };
    let mut harvest = HarvestLoop::new(
        source,
        Box::new(extractor),
        Box::new(store),
        Box::new(checkpoint),
        settings,
    );

    let finished = tokio::select! {
        result = harvest.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    match finished {
        Some(result) => {
            let report = result?;
            Ok(RunSummary::from_report(cli.output.clone(), &report))
        }
        None => {
            engine_warn!("Interrupted; closing the feed and the record file");
            let cleanup_completed = harvest.shutdown().await;
            Ok(RunSummary::interrupted(
                cli.output.clone(),
                &harvest,
                cleanup_completed,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_core::StopReason;
    use pretty_assertions::assert_eq;

    fn report(reason: StopReason, cleanup_completed: bool) -> HarvestReport {
        HarvestReport {
            new_records: 0,
            final_cursor: 7,
            steps_run: 7,
            reason,
            cleanup_completed,
        }
    }

    #[test]
    fn zero_new_records_is_a_successful_run() {
        let summary = RunSummary::from_report("jobs.csv".into(), &report(StopReason::Stalled, true));
        assert_eq!(summary.exit_code(), ExitCode::SUCCESS);
        assert_eq!(
            summary.render(false).unwrap(),
            "0 new records written to jobs.csv (stalled; cursor 7, 7 steps, cleanup completed)"
        );
    }

    #[test]
    fn aborted_or_unclean_runs_fail() {
        let aborted =
            RunSummary::from_report("jobs.csv".into(), &report(StopReason::SourceFault, true));
        assert_eq!(aborted.exit_code(), ExitCode::from(EXIT_ABORTED));
        let unclean = RunSummary::from_report("jobs.csv".into(), &report(StopReason::MaxSteps, false));
        assert_eq!(unclean.exit_code(), ExitCode::from(EXIT_ABORTED));
    }

    #[test]
    fn json_summary_names_every_field() {
        let summary = RunSummary::from_report("jobs.csv".into(), &report(StopReason::MaxSteps, true));
        let value: serde_json::Value =
            serde_json::from_str(&summary.render(true).unwrap()).unwrap();
        assert_eq!(value["reason"], "max steps reached");
        assert_eq!(value["final_cursor"], 7);
        assert_eq!(value["cleanup_completed"], true);
    }
}
