use std::path::PathBuf;

use clap::Parser;

/// Resumable, deduplicating harvester for paginated listing feeds.
#[derive(Parser, Debug, Clone)]
#[command(name = "harvester", version, about)]
pub struct Cli {
    /// Search keywords
    #[arg(long, env = "HARVESTER_KEYWORD", default_value = "Data Analyst")]
    pub keyword: String,

    /// Search location
    #[arg(long, env = "HARVESTER_LOCATION", default_value = "Saudi Arabia")]
    pub location: String,

    /// CSV file records are appended to
    #[arg(long, env = "HARVESTER_OUTPUT", default_value = "harvest.csv")]
    pub output: PathBuf,

    /// Highest pagination step to run
    #[arg(long, env = "HARVESTER_MAX_STEPS", default_value_t = 1000)]
    pub max_steps: u64,

    /// Progress file; defaults to `<output>.progress`
    #[arg(long, env = "HARVESTER_CHECKPOINT")]
    pub checkpoint: Option<PathBuf>,

    /// RON configuration file with selectors, pacing and HTTP settings
    #[arg(long, env = "HARVESTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Replay saved `*.html` frames from this directory instead of fetching
    #[arg(long, env = "HARVESTER_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, env = "HARVESTER_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Log debug output
    #[arg(long, short, env = "HARVESTER_VERBOSE")]
    pub verbose: bool,

    /// Print the run summary as JSON
    #[arg(long, env = "HARVESTER_JSON")]
    pub json: bool,
}

impl Cli {
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint.clone().unwrap_or_else(|| {
            let mut name = self.output.clone().into_os_string();
            name.push(".progress");
            PathBuf::from(name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_and_checkpoint_path() {
        let cli = Cli::parse_from(["harvester", "--output", "out/jobs.csv"]);
        assert_eq!(cli.max_steps, 1000);
        assert_eq!(cli.checkpoint_path(), PathBuf::from("out/jobs.csv.progress"));
        assert!(!cli.json);
    }

    #[test]
    fn explicit_checkpoint_wins() {
        let cli = Cli::parse_from([
            "harvester",
            "--keyword",
            "Rust",
            "--checkpoint",
            "state.txt",
            "--max-steps",
            "7",
        ]);
        assert_eq!(cli.keyword, "Rust");
        assert_eq!(cli.max_steps, 7);
        assert_eq!(cli.checkpoint_path(), PathBuf::from("state.txt"));
    }
}
