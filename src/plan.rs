//! Data model: `Workload`, `Plan`, `PreparedFile`, and their results.
//!
//! Follows the familiar shape of a config enum with `Serialize`/
//! `Deserialize` derives and an explicit `validate()` method, narrowed to
//! exactly the fields a single-file, single-pattern workload needs — no
//! distribution/completion-mode/think-time surface, which has no
//! counterpart here.

use crate::aggregate::{aggregate_latency, bootstrap_confidence_interval, mean, stddev};
use crate::error::BenchError;
use crate::histogram::LatencySummary;
use crate::prepare::{prepare_file, sector_sizes, FillPattern, PrepareRequest};
use crate::sink::Sink;
use crate::timeseries::ThroughputSample;
use crate::trial::TrialExecutor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How a workload walks through its region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessPattern {
    Sequential,
    Random,
}

/// When to flush (fsync) a workload's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlushPolicy {
    None,
    AtEnd,
    Interval,
    EveryIO,
}

/// The byte range within a file that a workload is confined to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub offset: u64,
    /// Length of the region in bytes. `0` means "to the end of the file" —
    /// callers resolve this against the file's actual size before handing
    /// a `Region` to [`crate::offsets::OffsetGenerator`].
    pub length: u64,
}

/// One workload: a single file, accessed with one access pattern, one
/// read/write mix, at one queue depth, by one or more threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workload {
    pub path: PathBuf,
    pub file_size: u64,
    pub block_size: u64,
    pub access_pattern: AccessPattern,
    /// Percentage of operations that are writes, 0..=100.
    pub write_fraction: u8,
    pub queue_depth: u32,
    pub thread_count: u32,
    pub region: Option<Region>,
    pub flush_policy: FlushPolicy,
    pub flush_interval: Option<Duration>,
    pub bypass_cache: bool,
    pub write_through: bool,
    pub name: String,
}

impl Workload {
    /// The region this workload actually operates over, resolved against
    /// its own `file_size` when no explicit region was given or the region
    /// length was left as `0` ("to end of file").
    pub fn resolved_region(&self) -> Region {
        match self.region {
            Some(r) if r.length > 0 => r,
            Some(r) => Region {
                offset: r.offset,
                length: self.file_size.saturating_sub(r.offset),
            },
            None => Region {
                offset: 0,
                length: self.file_size,
            },
        }
    }

    /// Validate the fields that can be checked without touching the
    /// filesystem (the `InvalidPlan` conditions). Alignment-dependent
    /// `InvalidWorkload` checks need the device's logical sector size and
    /// happen in [`Workload::validate_alignment`] once that's known.
    pub fn validate_shape(&self) -> Result<(), BenchError> {
        if self.file_size == 0 {
            return self.invalid("file_size must be greater than zero");
        }
        if self.block_size == 0 {
            return self.invalid("block_size must be greater than zero");
        }
        if self.queue_depth == 0 {
            return self.invalid("queue_depth must be greater than zero");
        }
        if self.thread_count == 0 {
            return self.invalid("thread_count must be greater than zero");
        }
        if self.write_fraction > 100 {
            return self.invalid("write_fraction must be between 0 and 100");
        }
        if self.path.as_os_str().is_empty() {
            return self.invalid("path must not be empty");
        }
        Ok(())
    }

    /// Alignment checks that require knowing the target's logical sector
    /// size (only meaningful once the file has been probed/prepared).
    pub fn validate_alignment(&self, logical_sector_size: u64) -> Result<(), BenchError> {
        if !self.bypass_cache {
            return Ok(());
        }
        if self.block_size % logical_sector_size != 0 {
            return Err(BenchError::InvalidWorkload {
                name: self.name.clone(),
                reason: format!(
                    "block_size {} is not a multiple of logical sector size {logical_sector_size}",
                    self.block_size
                ),
            });
        }
        let region = self.resolved_region();
        if region.offset % logical_sector_size != 0 {
            return Err(BenchError::InvalidWorkload {
                name: self.name.clone(),
                reason: format!(
                    "region offset {} is not a multiple of logical sector size {logical_sector_size}",
                    region.offset
                ),
            });
        }
        if region.length < self.block_size {
            return Err(BenchError::InvalidWorkload {
                name: self.name.clone(),
                reason: format!(
                    "region of {} bytes is smaller than one block ({} bytes)",
                    region.length, self.block_size
                ),
            });
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> Result<(), BenchError> {
        Err(BenchError::InvalidPlan(format!(
            "workload {:?}: {reason}",
            self.name
        )))
    }
}

/// An ordered set of workloads and the trial parameters applied to all of
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub workloads: Vec<Workload>,
    pub trials_per_workload: u32,
    pub warmup_duration: Duration,
    pub measured_duration: Duration,
    /// `0` means "pick one" — the plan runner substitutes a value derived
    /// from the current time before any trial seed is computed.
    pub seed: u64,
    pub collect_time_series: bool,
    pub compute_confidence_intervals: bool,
    pub track_allocations: bool,
    pub reuse_existing_files: bool,
    pub delete_on_complete: bool,
    pub bootstrap_iterations: u32,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            workloads: Vec::new(),
            trials_per_workload: 1,
            warmup_duration: Duration::from_secs(0),
            measured_duration: Duration::from_secs(10),
            seed: 0,
            collect_time_series: false,
            compute_confidence_intervals: false,
            track_allocations: false,
            reuse_existing_files: false,
            delete_on_complete: false,
            bootstrap_iterations: 10_000,
        }
    }
}

impl Plan {
    /// Validate everything that does not require touching the filesystem.
    /// Rejects on the first violation rather than collecting every one.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.workloads.is_empty() {
            return Err(BenchError::InvalidPlan("plan has no workloads".into()));
        }
        if self.trials_per_workload == 0 {
            return Err(BenchError::InvalidPlan(
                "trials_per_workload must be at least 1".into(),
            ));
        }
        if self.measured_duration.is_zero() {
            return Err(BenchError::InvalidPlan(
                "measured_duration must be greater than zero".into(),
            ));
        }
        for workload in &self.workloads {
            workload.validate_shape()?;
        }
        Ok(())
    }

    /// The effective seed for a given workload index and trial number,
    /// distinct and reproducible per workload/trial pair.
    pub fn effective_seed(&self, workload_index: usize, trial_number: u32) -> u64 {
        self.seed
            .wrapping_add(workload_index as u64 * 1000)
            .wrapping_add(trial_number as u64)
    }
}

/// Resolves `Plan::seed == 0` ("pick one") to a time- and process-derived
/// value so a `Plan` left at its documented default doesn't reproduce the
/// same offsets, write decisions, and fill pattern on every run. Any
/// nonzero seed passes through unchanged.
fn resolve_seed(seed: u64) -> u64 {
    if seed != 0 {
        return seed;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    // `max(1)` keeps the resolved value out of the "still unset" sentinel
    // space in case the xor ever lands on exactly zero.
    (nanos ^ (std::process::id() as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)).max(1)
}

/// Runs every workload in `plan` in order against the filesystem, forwarding
/// every event to `sink`, and returns the aggregated result.
///
/// Follows strict program order: `on_benchmark_start`, then for each
/// workload `on_workload_start` -> (prepare its file) -> trials
/// (`on_trial_start`/`on_trial_progress`*/`on_trial_complete`) ->
/// `on_workload_complete`, then `on_benchmark_complete`. `cancel` is checked
/// at every workload and trial boundary (and inside each trial itself); a
/// cancelled run returns `Err(BenchError::Cancelled)` without emitting that
/// workload's `on_workload_complete`.
pub fn run_plan(
    plan: &Plan,
    sink: &mut dyn Sink,
    cancel: &AtomicBool,
) -> Result<BenchmarkResult, BenchError> {
    plan.validate()?;

    // `seed == 0` means "pick one"; resolve it to a real value once, up
    // front, so every workload/trial in this run draws from the same
    // substituted seed and the event the sink observes reflects what was
    // actually used.
    let mut resolved_plan = plan.clone();
    resolved_plan.seed = resolve_seed(plan.seed);
    let plan = &resolved_plan;

    sink.on_benchmark_start(plan);

    let start_time = chrono::Utc::now();
    let mut workload_results = Vec::with_capacity(plan.workloads.len());
    let mut cleanup_dirs: BTreeSet<PathBuf> = BTreeSet::new();

    for (workload_index, workload) in plan.workloads.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return Err(BenchError::Cancelled);
        }
        sink.on_workload_start(workload, workload_index, plan.workloads.len());

        // Probe the logical sector size from the target's parent directory
        // so an alignment violation is caught before the target file is
        // created or materialized.
        let parent = workload
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let (logical_sector_size, _) = sector_sizes(parent).unwrap_or((512, 512));
        workload.validate_alignment(logical_sector_size)?;

        let prepared = prepare_file(PrepareRequest {
            path: &workload.path,
            file_size: workload.file_size,
            reuse_if_exists: plan.reuse_existing_files,
            fill_pattern: FillPattern::PseudoRandom(plan.seed.wrapping_add(workload_index as u64)),
        })?;
        for warning in &prepared.warnings {
            sink.on_warning(warning);
        }

        // `delete_on_complete`: open the file once, unlink its path
        // immediately, and keep this handle alive for every trial of this
        // workload. The inode is reclaimed by the OS as soon as every fd
        // referencing it closes — including on a crash or kill mid-trial —
        // rather than only on a clean `remove_file` after the last trial
        // returns.
        let mut delete_on_close_handle: Option<std::fs::File> = None;
        if plan.delete_on_complete {
            let mut open_options = OpenOptions::new();
            open_options.read(true).write(true);
            open_options.custom_flags(crate::trial::open_flags_for(workload));
            match open_options.open(&workload.path) {
                Ok(handle) => {
                    if let Err(e) = std::fs::remove_file(&workload.path) {
                        sink.on_warning(&format!(
                            "could not unlink {:?} for delete-on-complete: {e}",
                            workload.path
                        ));
                    } else if let Some(dir) = workload.path.parent() {
                        cleanup_dirs.insert(dir.to_path_buf());
                    }
                    delete_on_close_handle = Some(handle);
                }
                Err(e) => {
                    sink.on_warning(&format!(
                        "could not open {:?} for delete-on-complete: {e}",
                        workload.path
                    ));
                }
            }
        }

        let mut trials = Vec::with_capacity(plan.trials_per_workload as usize);
        for trial_number in 1..=plan.trials_per_workload {
            if cancel.load(Ordering::Relaxed) {
                return Err(BenchError::Cancelled);
            }
            sink.on_trial_start(workload, trial_number, plan.trials_per_workload);
            let seed = plan.effective_seed(workload_index, trial_number);
            let mut executor = TrialExecutor::new(
                workload,
                &prepared,
                trial_number,
                seed,
                plan.warmup_duration,
                plan.measured_duration,
                plan.collect_time_series,
            )
            .with_allocation_tracking(plan.track_allocations);
            if let Some(handle) = &delete_on_close_handle {
                executor = executor.with_existing_fd(handle.as_raw_fd());
            }

            let result = executor.run(cancel, |progress| {
                sink.on_trial_progress(workload, trial_number, progress);
            })?;
            for warning in &result.warnings {
                sink.on_warning(warning);
            }
            sink.on_trial_complete(workload, trial_number, &result);
            trials.push(result);
        }

        // `delete_on_close_handle` drops here, closing the last reference
        // to the already-unlinked inode for this workload.
        drop(delete_on_close_handle);

        let workload_result = aggregate_workload(workload.clone(), trials, plan);
        sink.on_workload_complete(workload, &workload_result);
        workload_results.push(workload_result);
    }

    if plan.delete_on_complete {
        cleanup_dirs_best_effort(&cleanup_dirs);
    }

    let end_time = chrono::Utc::now();
    let result = BenchmarkResult {
        workloads: workload_results,
        start_time,
        end_time,
        system_info: SystemInfo::collect(),
    };
    sink.on_benchmark_complete(&result);
    Ok(result)
}

/// Folds one workload's trials into a `WorkloadResult`. Confidence intervals
/// are only computed when the plan asked for them *and* there are at least
/// two trials to resample across — a single trial has no distribution to
/// bootstrap.
fn aggregate_workload(workload: Workload, trials: Vec<TrialResult>, plan: &Plan) -> WorkloadResult {
    let throughputs: Vec<f64> = trials
        .iter()
        .map(|t| t.total_bytes as f64 / t.measured_duration.as_secs_f64())
        .collect();
    let iops: Vec<f64> = trials
        .iter()
        .map(|t| t.total_ops as f64 / t.measured_duration.as_secs_f64())
        .collect();
    let latencies: Vec<LatencySummary> = trials.iter().map(|t| t.latency).collect();

    let mean_bytes_per_second = mean(&throughputs);
    let std_dev_bytes_per_second = stddev(&throughputs);
    let mean_iops = mean(&iops);
    let std_dev_iops = stddev(&iops);
    let mean_latency = aggregate_latency(&latencies);

    let compute_ci = plan.compute_confidence_intervals && trials.len() >= 2;
    let throughput_ci =
        compute_ci.then(|| bootstrap_confidence_interval(&throughputs, plan.bootstrap_iterations));
    let iops_ci = compute_ci.then(|| bootstrap_confidence_interval(&iops, plan.bootstrap_iterations));

    WorkloadResult {
        workload,
        trials,
        mean_bytes_per_second,
        std_dev_bytes_per_second,
        mean_iops,
        std_dev_iops,
        mean_latency,
        throughput_ci,
        iops_ci,
    }
}

/// Best-effort `delete_on_complete` cleanup, run once after every workload
/// has finished. Target files are already gone by this point — they were
/// unlinked as soon as each workload's delete-on-close handle was opened —
/// so this only `rmdir`s the directories that held them, deepest first, so
/// a now-empty child clears before its parent is attempted. A non-empty or
/// still-in-use directory is left alone.
fn cleanup_dirs_best_effort(dirs: &BTreeSet<PathBuf>) {
    let mut dirs: Vec<PathBuf> = dirs.iter().cloned().collect();
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
    for dir in dirs {
        let _ = std::fs::remove_dir(dir);
    }
}

/// The result of bringing a workload's target file to a ready state.
#[derive(Debug, Clone)]
pub struct PreparedFile {
    pub path: PathBuf,
    pub actual_size: u64,
    pub logical_sector_size: u64,
    pub physical_sector_size: u64,
    pub was_reused: bool,
    pub fast_allocation_used: bool,
    pub warnings: Vec<String>,
}

/// The outcome of one trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_number: u32,
    pub total_bytes: u64,
    pub total_ops: u64,
    pub read_ops: u64,
    pub write_ops: u64,
    pub measured_duration: Duration,
    pub latency: LatencySummary,
    pub time_series: Option<Vec<ThroughputSample>>,
    pub bytes_allocated: Option<u64>,
    pub warnings: Vec<String>,
}

/// A 95% confidence interval, `(lower, upper)`.
pub type ConfidenceInterval = (f64, f64);

/// The aggregated outcome of every trial run for one workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadResult {
    pub workload: Workload,
    pub trials: Vec<TrialResult>,
    #[serde(rename = "meanBytesPerSecond")]
    pub mean_bytes_per_second: f64,
    #[serde(rename = "stdDevBytesPerSecond")]
    pub std_dev_bytes_per_second: f64,
    #[serde(rename = "meanIops")]
    pub mean_iops: f64,
    #[serde(rename = "stdDevIops")]
    pub std_dev_iops: f64,
    #[serde(rename = "meanLatency")]
    pub mean_latency: LatencySummary,
    #[serde(rename = "throughputCI", skip_serializing_if = "Option::is_none")]
    pub throughput_ci: Option<ConfidenceInterval>,
    #[serde(rename = "iopsCI", skip_serializing_if = "Option::is_none")]
    pub iops_ci: Option<ConfidenceInterval>,
}

/// The outcome of an entire benchmark run (every workload in a `Plan`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub workloads: Vec<WorkloadResult>,
    #[serde(rename = "startTime")]
    pub start_time: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "endTime")]
    pub end_time: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "systemInfo")]
    pub system_info: SystemInfo,
}

/// Static information about the machine the benchmark ran on, attached to
/// the result for later comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub cpu_count: usize,
}

impl SystemInfo {
    pub fn collect() -> Self {
        Self {
            cpu_count: num_cpus::get(),
        }
    }
}
