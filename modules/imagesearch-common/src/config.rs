use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Default number of attempts for a failed map work unit.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;

/// Shape of the final output records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Flat records in the single-phase indexer's format.
    Legacy,
    /// Every field of the merged record.
    Full,
    /// Field subset for direct index ingestion.
    #[default]
    Compact,
}

impl FromStr for OutputMode {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(OutputMode::Legacy),
            "full" => Ok(OutputMode::Full),
            "compact" => Ok(OutputMode::Compact),
            other => Err(IndexError::Config(format!("unknown output mode: {other}"))),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Legacy => write!(f, "legacy"),
            OutputMode::Full => write!(f, "full"),
            OutputMode::Compact => write!(f, "compact"),
        }
    }
}

/// How the input path is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Input is a text file listing archive paths, one per line.
    #[default]
    LocalFilesystem,
    /// Input is a directory tree of archives.
    DistributedFilesystem,
}

impl FromStr for ExecutionMode {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "local-filesystem" | "local_filesystem" => Ok(ExecutionMode::LocalFilesystem),
            "hdfs" | "distributed" | "distributed-filesystem" | "distributed_filesystem" => {
                Ok(ExecutionMode::DistributedFilesystem)
            }
            other => Err(IndexError::Config(format!("unknown execution mode: {other}"))),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::LocalFilesystem => write!(f, "local"),
            ExecutionMode::DistributedFilesystem => write!(f, "distributed"),
        }
    }
}

/// Job configuration, threaded explicitly into every worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Tag stamped on every record.
    pub collection: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Archive files handled by one map task.
    pub archives_per_work_unit: usize,
    pub reducer_count: usize,
    pub output_mode: OutputMode,
    pub execution_mode: ExecutionMode,
    pub max_attempts: u32,
}

impl JobConfig {
    pub fn new(collection: impl Into<String>, input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            collection: collection.into(),
            input_path: input_path.into(),
            output_path: output_path.into(),
            archives_per_work_unit: 1,
            reducer_count: 1,
            output_mode: OutputMode::default(),
            execution_mode: ExecutionMode::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(IndexError::Config("collection must not be empty".into()));
        }
        if self.reducer_count == 0 {
            return Err(IndexError::Config("reducer count must be at least 1".into()));
        }
        if self.archives_per_work_unit == 0 {
            return Err(IndexError::Config("archives per work unit must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(IndexError::Config("max attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Log the non-secret parts of the configuration.
    pub fn log_summary(&self) {
        tracing::info!(
            collection = %self.collection,
            input = %self.input_path.display(),
            output = %self.output_path.display(),
            archives_per_work_unit = self.archives_per_work_unit,
            reducers = self.reducer_count,
            output_mode = %self.output_mode,
            execution_mode = %self.execution_mode,
            max_attempts = self.max_attempts,
            "Job configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse_case_insensitively() {
        assert_eq!("LEGACY".parse::<OutputMode>().unwrap(), OutputMode::Legacy);
        assert_eq!("Compact".parse::<OutputMode>().unwrap(), OutputMode::Compact);
        assert_eq!("hdfs".parse::<ExecutionMode>().unwrap(), ExecutionMode::DistributedFilesystem);
        assert_eq!("Local".parse::<ExecutionMode>().unwrap(), ExecutionMode::LocalFilesystem);
        assert!("solr".parse::<OutputMode>().is_err());
    }

    #[test]
    fn validation_rejects_degenerate_jobs() {
        let ok = JobConfig::new("AWP", "in.txt", "out");
        assert!(ok.validate().is_ok());

        let mut no_reducers = ok.clone();
        no_reducers.reducer_count = 0;
        assert!(no_reducers.validate().is_err());

        let mut no_collection = ok.clone();
        no_collection.collection = " ".into();
        assert!(no_collection.validate().is_err());

        let mut no_units = ok;
        no_units.archives_per_work_unit = 0;
        assert!(matches!(no_units.validate(), Err(IndexError::Config(_))));
    }
}
