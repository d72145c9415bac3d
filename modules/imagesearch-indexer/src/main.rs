use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use imagesearch_common::{ExecutionMode, JobConfig, OutputMode, DEFAULT_MAX_ATTEMPTS};
use imagesearch_indexer::JobRunner;

#[derive(Parser)]
#[command(name = "imagesearch-indexer", about = "Deduplicate and merge image and page captures from web archives")]
struct Cli {
    /// Collection name stamped on every record
    #[arg(long, env = "IMAGESEARCH_COLLECTION")]
    collection: String,

    /// Archive list file (local) or archive directory (distributed)
    #[arg(long, env = "IMAGESEARCH_INPUT")]
    input: PathBuf,

    /// Directory receiving the `<ts>_dups` and `<ts>_nodups` outputs
    #[arg(long, env = "IMAGESEARCH_OUTPUT")]
    output: PathBuf,

    /// Archive files per map work unit
    #[arg(long, env = "IMAGESEARCH_ARCHIVES_PER_UNIT", default_value_t = 1)]
    archives_per_unit: usize,

    /// Number of reduce partitions
    #[arg(long, env = "IMAGESEARCH_REDUCERS", default_value_t = 1)]
    reducers: usize,

    /// Output shape: legacy, full or compact
    #[arg(long, env = "IMAGESEARCH_OUTPUT_MODE", default_value = "compact")]
    output_mode: OutputMode,

    /// Input interpretation: local or hdfs/distributed
    #[arg(long, env = "IMAGESEARCH_EXECUTION_MODE", default_value = "local")]
    execution_mode: ExecutionMode,

    /// Attempts per map work unit before the job fails
    #[arg(long, env = "IMAGESEARCH_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Emit logs as JSON
    #[arg(long, env = "IMAGESEARCH_JSON_LOGS")]
    json_logs: bool,
}

impl Cli {
    fn into_config(self) -> JobConfig {
        let mut config = JobConfig::new(self.collection, self.input, self.output);
        config.archives_per_work_unit = self.archives_per_unit;
        config.reducer_count = self.reducers;
        config.output_mode = self.output_mode;
        config.execution_mode = self.execution_mode;
        config.max_attempts = self.max_attempts;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::from_default_env().add_directive("imagesearch=info".parse()?);
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Image search indexer starting...");

    let config = cli.into_config();
    config.validate().context("Invalid job configuration")?;

    let summary = JobRunner::new(config).run().await?;
    summary.log();

    Ok(())
}
