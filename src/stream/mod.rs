//! # Stream Mode
//!
//! Line-oriented job protocol on stdin, status lines on stdout.
//!
//! ## Components:
//! - **channel**: splits the control channel into lines, UTF-16 aware
//! - **job**: control line grammar and `JobDecoder`
//! - **report**: `QUEUED` / `SUCCESS` / `ERROR` lines and the report channel
//! - **processor**: control loop, job queue and the single synthesis worker

pub mod channel;
pub mod job;
pub mod processor;
pub mod report;

pub use job::{ControlLine, Job, JobDecoder};
pub use processor::{ProcessorState, StreamCommandProcessor, StreamSummary};
pub use report::{ConsoleReporter, Status, StatusSink};
