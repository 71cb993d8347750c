//! The observer interface a caller implements to receive benchmark
//! telemetry.
//!
//! Telemetry rendering is kept as a concern entirely separate from
//! execution, reshaped here into a capability set of callbacks rather than
//! a renderer: nothing here needs dynamic-dispatch polymorphism beyond
//! "call the right callback," so `Sink` is a plain trait with default no-op
//! methods — a caller overrides only the events it cares about.

use crate::plan::{BenchmarkResult, Plan, TrialResult, Workload, WorkloadResult};
use std::time::Duration;

/// A snapshot of in-progress trial state, emitted roughly every 250ms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialProgress {
    pub is_warmup: bool,
    pub is_finalizing: bool,
    pub elapsed: Duration,
    pub duration: Duration,
    pub current_bytes_per_second: f64,
    pub current_iops: f64,
    pub total_bytes: u64,
    pub total_ops: u64,
}

/// Receives every event a benchmark run produces, in strict program order:
/// `on_benchmark_start` -> (`on_workload_start` -> (`on_trial_start` ->
/// `on_trial_progress`* -> `on_trial_complete`)* -> `on_workload_complete`)*
/// -> `on_benchmark_complete`.
///
/// Every method has a no-op default; implementors only override the events
/// they want. Methods are invoked synchronously from the thread driving the
/// run (the plan runner, or — when a workload fans across threads — a
/// single forwarding point the plan runner owns), so an implementation only
/// needs to be `Send + Sync` if the embedding application shares one `Sink`
/// across concurrent runs.
#[allow(unused_variables)]
pub trait Sink {
    fn on_benchmark_start(&mut self, plan: &Plan) {}
    fn on_workload_start(&mut self, workload: &Workload, index: usize, total: usize) {}
    fn on_trial_start(&mut self, workload: &Workload, trial_number: u32, total_trials: u32) {}
    fn on_trial_progress(&mut self, workload: &Workload, trial_number: u32, progress: TrialProgress) {}
    fn on_trial_complete(&mut self, workload: &Workload, trial_number: u32, result: &TrialResult) {}
    fn on_workload_complete(&mut self, workload: &Workload, result: &WorkloadResult) {}
    fn on_benchmark_complete(&mut self, result: &BenchmarkResult) {}
    fn on_warning(&mut self, message: &str) {}
    fn on_error(&mut self, message: &str, cause: Option<&anyhow::Error>) {}
}

/// A `Sink` that discards every event. Useful for tests and for callers who
/// only want the returned `BenchmarkResult`.
#[derive(Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {}

/// A `Sink` that records every event it receives, for tests that assert on
/// the exact order and content of the event stream.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<String>,
}

impl Sink for RecordingSink {
    fn on_benchmark_start(&mut self, _plan: &Plan) {
        self.events.push("benchmark_start".to_string());
    }
    fn on_workload_start(&mut self, workload: &Workload, index: usize, total: usize) {
        self.events
            .push(format!("workload_start({},{}/{})", workload.name, index, total));
    }
    fn on_trial_start(&mut self, _workload: &Workload, trial_number: u32, _total_trials: u32) {
        self.events.push(format!("trial_start({trial_number})"));
    }
    fn on_trial_progress(&mut self, _workload: &Workload, trial_number: u32, _progress: TrialProgress) {
        self.events.push(format!("trial_progress({trial_number})"));
    }
    fn on_trial_complete(&mut self, _workload: &Workload, trial_number: u32, _result: &TrialResult) {
        self.events.push(format!("trial_complete({trial_number})"));
    }
    fn on_workload_complete(&mut self, workload: &Workload, _result: &WorkloadResult) {
        self.events.push(format!("workload_complete({})", workload.name));
    }
    fn on_benchmark_complete(&mut self, _result: &BenchmarkResult) {
        self.events.push("benchmark_complete".to_string());
    }
    fn on_warning(&mut self, message: &str) {
        self.events.push(format!("warning({message})"));
    }
    fn on_error(&mut self, message: &str, _cause: Option<&anyhow::Error>) {
        self.events.push(format!("error({message})"));
    }
}
