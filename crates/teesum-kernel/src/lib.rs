//! teesum-kernel: single-pass, fan-out/fan-in stream processing.
//!
//! A byte stream is read exactly once and handed, without per-consumer
//! copying, to any number of concurrent workers, each producing a
//! fragment of one composite result. Re-reading a large input to derive
//! several values (multiple digests, a per-segment digest, piping
//! through an external command) wastes I/O; here the single read overlaps
//! the workers' computation.
//!
//! This crate provides:
//!
//! - **Conductor**: double-buffered reads and the fan-out/fan-in protocol
//! - **Worker**: the contract every stream consumer implements
//! - **Workers**: whole-stream digest, segmented digest, subprocess pipe
//! - **Pump**: the read-until-end copy loop draining subprocess output
//! - **Checksum**: the standard multi-digest suite over a reader or file

pub mod checksum;
pub mod conductor;
pub mod error;
pub mod frame;
pub mod pump;
pub mod worker;
pub mod workers;

pub use checksum::{checksum_file, checksum_reader, checksum_reader_with, DEFAULT_BUFSIZE};
pub use conductor::{Conductor, FRAGMENT_SEPARATOR};
pub use error::{Error, Result};
pub use frame::{Frame, WorkerReceiver, WorkerSender};
pub use worker::Worker;
pub use workers::{DigestWorker, SegmentedDigestWorker, ShellWorker};
