//! Concurrent ingestion pipeline.
//!
//! [`FetchWorker`] turns one company into grouped lines and registry
//! tuples; [`Coordinator`] runs a worker task per company and merges the
//! results into [`DestinationSink`] files and one registry set.

pub mod coordinator;
pub mod progress;
pub mod sink;
pub mod worker;

pub use coordinator::Coordinator;
pub use sink::DestinationSink;
pub use worker::FetchWorker;

use std::path::PathBuf;
use thiserror::Error;

/// Run-level failures. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to prepare output folder {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to append to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fetch task for {ticker} aborted: {message}")]
    TaskAborted { ticker: String, message: String },
}
