//! Worker implementations.
//!
//! Only the per-chunk folding and the finalization differ between
//! variants; the loop shape is the contract from
//! [`worker`](crate::worker).

mod digest;
mod segmented;
mod shell;

pub use digest::DigestWorker;
pub use segmented::SegmentedDigestWorker;
pub use shell::{ShellWorker, Sink};
