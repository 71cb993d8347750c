//! blockbench-core: the trial engine and measurement pipeline for local
//! block-storage benchmarking.
//!
//! This crate is deliberately narrow. It owns the hard, performance-critical
//! part of a storage benchmark — submitting overlapped direct I/O against a
//! prepared file at a fixed queue depth, collecting latency and throughput
//! samples without allocating in the hot path, and turning a set of trials
//! into trustworthy aggregate statistics. Argument parsing, report
//! rendering, drive enumeration, and anything resembling a UI are left to
//! the embedding application; the [`sink::Sink`] trait is this crate's only
//! outbound interface, and [`device::DeviceIdentity`] its only inbound one.
//!
//! # Layout
//!
//! - [`time`] — monotonic tick source.
//! - [`histogram`] — fixed-bucket, zero-allocation latency histogram.
//! - [`timeseries`] — per-second throughput accumulator.
//! - [`offsets`] — sequential/random offset generation.
//! - [`slots`] — the aligned I/O buffer pool.
//! - [`reactor`] — the completion-queue façade (`io_uring` and a blocking
//!   fallback).
//! - [`prepare`] — brings a workload's target file to a ready state.
//! - [`trial`] — the warmup/measured/drain phase machine for one trial.
//! - [`plan`] — the `Plan`/`Workload` data model, validation, and the plan
//!   runner that orchestrates a whole benchmark run.
//! - [`aggregate`] — cross-trial statistics (mean, stddev, bootstrap CI).
//! - [`sink`] — the observer trait a caller implements for telemetry.
//! - [`device`] — device-identity queries used for validation/display.
//! - [`alloc_tracking`] — optional global-allocator hook for
//!   `track_allocations`.
//! - [`error`] — [`error::BenchError`], the public error type.

pub mod aggregate;
pub mod alloc_tracking;
pub mod device;
pub mod error;
pub mod histogram;
pub mod offsets;
pub mod plan;
pub mod prepare;
pub mod reactor;
pub mod sink;
pub mod slots;
pub mod time;
pub mod timeseries;
pub mod trial;

pub use error::{BenchError, Result};
pub use plan::{Plan, Workload};
pub use sink::Sink;
