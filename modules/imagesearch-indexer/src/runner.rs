//! Local execution of the two-stage indexing job.
//!
//! map (extract) → shuffle by canonical key → partition reduce → `<ts>_dups/`
//! → shuffle by digest → digest reduce → `<ts>_nodups/`.
//!
//! Work units and reducer partitions run on the blocking pool with bounded
//! concurrency. A failed map unit is retried up to `max_attempts` times.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use imagesearch_archive::{is_archive_path, ArchiveError, ArchiveFileReader, CaptureReader, ExtractStats, Extractor};
use imagesearch_common::wire::{decode_all, encode_frame};
use imagesearch_common::{ExecutionMode, JobConfig, OutputMode, Record};

use crate::digest::reduce_digest;
use crate::output::to_json_line;
use crate::partition::reduce_key;
use crate::stats::{DigestStats, PartitionStats};

type Partition = Vec<(String, Record)>;

/// What a finished job produced.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub dups_dir: PathBuf,
    pub nodups_dir: PathBuf,
    pub archives: usize,
    pub failed_archives: u64,
    pub extract: ExtractStats,
    pub partition: PartitionStats,
    pub digest: DigestStats,
}

/// Output of one successful map work unit.
struct MapOutput {
    partitions: Vec<Partition>,
    stats: ExtractStats,
    failed_archives: u64,
}

pub struct JobRunner {
    config: JobConfig,
    reader: Arc<dyn CaptureReader>,
    extractor: Arc<Extractor>,
    job_timestamp: String,
    concurrency: usize,
}

impl JobRunner {
    pub fn new(config: JobConfig) -> Self {
        let extractor = Arc::new(Extractor::new(config.collection.clone()));
        let concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            config,
            reader: Arc::new(ArchiveFileReader),
            extractor,
            job_timestamp: chrono::Utc::now().format("%Y%m%d%H%M%S").to_string(),
            concurrency,
        }
    }

    pub fn with_reader(mut self, reader: Arc<dyn CaptureReader>) -> Self {
        self.reader = reader;
        self
    }

    /// Fix the timestamp used to name the output directories.
    pub fn with_job_timestamp(mut self, job_timestamp: impl Into<String>) -> Self {
        self.job_timestamp = job_timestamp.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn dups_dir(&self) -> PathBuf {
        self.config.output_path.join(format!("{}_dups", self.job_timestamp))
    }

    pub fn nodups_dir(&self) -> PathBuf {
        self.config.output_path.join(format!("{}_nodups", self.job_timestamp))
    }

    pub async fn run(&self) -> Result<JobSummary> {
        self.config.validate().context("Invalid job configuration")?;
        self.config.log_summary();

        let inputs = self.discover_inputs().await?;
        info!(archives = inputs.len(), "Input archives discovered");

        let (shuffled, extract, failed_archives) = self.map_phase(&inputs).await?;
        extract.log();

        let dups_dir = self.dups_dir();
        let partition = self.partition_phase(shuffled, &dups_dir).await?;
        partition.log();

        let nodups_dir = self.nodups_dir();
        let digest = self.digest_phase(&dups_dir, &nodups_dir).await?;
        digest.log();

        Ok(JobSummary {
            dups_dir,
            nodups_dir,
            archives: inputs.len(),
            failed_archives,
            extract,
            partition,
            digest,
        })
    }

    /// Archive paths to process, in a stable order.
    pub async fn discover_inputs(&self) -> Result<Vec<PathBuf>> {
        let input = self.config.input_path.clone();
        match self.config.execution_mode {
            ExecutionMode::LocalFilesystem => {
                let listing = tokio::fs::read_to_string(&input)
                    .await
                    .with_context(|| format!("Failed to read archive list {}", input.display()))?;
                Ok(listing
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(PathBuf::from)
                    .collect())
            }
            ExecutionMode::DistributedFilesystem => {
                let found = tokio::task::spawn_blocking(move || walk_archives(&input)).await??;
                Ok(found)
            }
        }
    }

    // ---------------------------------------------------------------------------
    // Map
    // ---------------------------------------------------------------------------

    async fn map_phase(&self, inputs: &[PathBuf]) -> Result<(Vec<Partition>, ExtractStats, u64)> {
        let units: Vec<Vec<PathBuf>> = inputs
            .chunks(self.config.archives_per_work_unit)
            .map(<[PathBuf]>::to_vec)
            .collect();
        info!(units = units.len(), "Starting map phase");

        let results: Vec<Result<MapOutput>> = stream::iter(
            units
                .into_iter()
                .enumerate()
                .map(|(index, unit)| self.run_unit(index, unit)),
        )
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        let mut shuffled: Vec<Partition> = vec![Vec::new(); self.config.reducer_count];
        let mut stats = ExtractStats::default();
        let mut failed_archives = 0;
        for result in results {
            let output = result?;
            for (slot, part) in shuffled.iter_mut().zip(output.partitions) {
                slot.extend(part);
            }
            stats.add(&output.stats);
            failed_archives += output.failed_archives;
        }
        Ok((shuffled, stats, failed_archives))
    }

    async fn run_unit(&self, index: usize, archives: Vec<PathBuf>) -> Result<MapOutput> {
        let max_attempts = self.config.max_attempts;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let reader = self.reader.clone();
            let extractor = self.extractor.clone();
            let unit = archives.clone();
            let reducers = self.config.reducer_count;

            let outcome = tokio::task::spawn_blocking(move || map_unit(reader.as_ref(), &extractor, &unit, reducers))
                .await
                .map_err(anyhow::Error::from)
                .and_then(|r| r.map_err(anyhow::Error::from));

            match outcome {
                Ok(output) => {
                    debug!(unit = index, attempt, "Map work unit finished");
                    return Ok(output);
                }
                Err(e) if attempt < max_attempts => {
                    warn!(unit = index, attempt, error = %e, "Map work unit failed, retrying");
                }
                Err(e) => {
                    return Err(e.context(format!("Map work unit {index} failed after {attempt} attempts")));
                }
            }
        }
    }

    // ---------------------------------------------------------------------------
    // Stage 1: partition reduce
    // ---------------------------------------------------------------------------

    async fn partition_phase(&self, shuffled: Vec<Partition>, dir: &Path) -> Result<PartitionStats> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let reducers = self.config.reducer_count;
        let results: Vec<Result<(usize, BytesMut, PartitionStats)>> = stream::iter(shuffled.into_iter().enumerate().map(
            |(index, partition)| async move {
                let (buf, stats) = tokio::task::spawn_blocking(move || reduce_partition(partition, reducers)).await??;
                Ok::<_, anyhow::Error>((index, buf, stats))
            },
        ))
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        let mut stats = PartitionStats::default();
        for result in results {
            let (index, buf, part_stats) = result?;
            let path = dir.join(part_name(index));
            tokio::fs::write(&path, &buf)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            stats.add(&part_stats);
        }
        Ok(stats)
    }

    // ---------------------------------------------------------------------------
    // Stage 2: digest re-merge
    // ---------------------------------------------------------------------------

    async fn digest_phase(&self, dups_dir: &Path, nodups_dir: &Path) -> Result<DigestStats> {
        tokio::fs::create_dir_all(nodups_dir)
            .await
            .with_context(|| format!("Failed to create {}", nodups_dir.display()))?;

        let reducers = self.config.reducer_count;
        let mut shuffled: Vec<Partition> = vec![Vec::new(); reducers];
        for path in part_files(dups_dir).await? {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let frames = decode_all(Bytes::from(data)).with_context(|| format!("Corrupt frames in {}", path.display()))?;
            for frame in frames {
                shuffled[partition_of(&frame.key, reducers)].push((frame.key, frame.record));
            }
        }

        let mode = self.config.output_mode;
        let results: Vec<Result<(usize, String, DigestStats)>> = stream::iter(shuffled.into_iter().enumerate().map(
            |(index, partition)| async move {
                let (lines, stats) = tokio::task::spawn_blocking(move || reduce_digests(partition, mode)).await??;
                Ok::<_, anyhow::Error>((index, lines, stats))
            },
        ))
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        let mut stats = DigestStats::default();
        for result in results {
            let (index, lines, part_stats) = result?;
            let path = nodups_dir.join(part_name(index));
            tokio::fs::write(&path, lines)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            stats.add(&part_stats);
        }
        Ok(stats)
    }
}

impl JobSummary {
    pub fn log(&self) {
        info!(
            archives = self.archives,
            failed_archives = self.failed_archives,
            captures = self.extract.captures,
            merged_records = self.partition.merged_records,
            documents = self.partition.documents,
            emitted = self.digest.emitted,
            output = %self.nodups_dir.display(),
            "Indexing job complete"
        );
    }
}

/// Extract every archive of a work unit into per-reducer partitions.
/// I/O failures fail the unit; malformed archives are skipped.
fn map_unit(
    reader: &dyn CaptureReader,
    extractor: &Extractor,
    archives: &[PathBuf],
    reducers: usize,
) -> std::result::Result<MapOutput, ArchiveError> {
    let mut partitions: Vec<Partition> = vec![Vec::new(); reducers];
    let mut stats = ExtractStats::default();
    let mut failed_archives = 0;

    for archive in archives {
        let read = reader.read_captures(archive, &mut |capture| {
            for (key, record) in extractor.extract(&capture, &mut stats) {
                partitions[partition_of(&key, reducers)].push((key, record));
            }
        });
        match read {
            Ok(captures) => debug!(archive = %archive.display(), captures, "Archive processed"),
            Err(ArchiveError::Io(e)) => return Err(ArchiveError::Io(e)),
            Err(e) => {
                warn!(archive = %archive.display(), error = %e, "Skipping rest of malformed archive");
                failed_archives += 1;
            }
        }
    }

    Ok(MapOutput {
        partitions,
        stats,
        failed_archives,
    })
}

fn reduce_partition(partition: Partition, reducers: usize) -> Result<(BytesMut, PartitionStats)> {
    let mut stats = PartitionStats::default();
    let mut buf = BytesMut::new();
    for (key, records) in group_by_key(partition) {
        for (digest, record) in reduce_key(&key, records, &mut stats) {
            encode_frame(&digest, &record, &mut buf)?;
        }
    }
    debug!(reducers, bytes = buf.len(), "Partition reduced");
    Ok((buf, stats))
}

fn reduce_digests(partition: Partition, mode: OutputMode) -> Result<(String, DigestStats)> {
    let mut stats = DigestStats::default();
    let mut lines = String::new();
    for (_, records) in group_by_key(partition) {
        if let Some(representative) = reduce_digest(records, &mut stats) {
            lines.push_str(&to_json_line(&representative, mode)?);
            lines.push('\n');
        }
    }
    Ok((lines, stats))
}

fn group_by_key(partition: Partition) -> BTreeMap<String, Vec<Record>> {
    let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for (key, record) in partition {
        groups.entry(key).or_default().push(record);
    }
    groups
}

/// Reducer index for `key`: FNV-1a, stable across runs and platforms.
pub fn partition_of(key: &str, reducers: usize) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (hash % reducers.max(1) as u64) as usize
}

fn part_name(index: usize) -> String {
    format!("part-r-{index:05}")
}

async fn part_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().starts_with("part-r-") {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn walk_archives(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(anyhow!("Input directory {} does not exist", root.display()));
    }
    let mut found: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable input entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_archive_path(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    found.sort();
    Ok(found)
}
