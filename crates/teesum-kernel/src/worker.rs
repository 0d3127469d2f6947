//! The contract every stream consumer implements.

use async_trait::async_trait;

use crate::frame::{WorkerReceiver, WorkerSender};

/// A stream consumer driven by the [`Conductor`](crate::conductor::Conductor).
///
/// A worker is a small state machine: `AwaitingWork` → `Processing` →
/// `AwaitingWork` … until it either finishes normally or aborts on
/// malformed input. Every implementation must satisfy this contract:
///
/// 1. On start, before consuming anything, send exactly one
///    [`Frame::Ready`](crate::frame::Frame::Ready) on `output`. This
///    declares "I hold no buffer reference" and is what lets the
///    conductor's acknowledgment barrier treat the first round like every
///    other one.
/// 2. Then, repeatedly receive one frame on `input`:
///    - [`Frame::Chunk`](crate::frame::Frame::Chunk): fold the payload
///      into internal state, **drop the payload**, then send `Ready`.
///      Holding the payload past that acknowledgment is a contract
///      violation the conductor detects when it fails to reclaim the
///      slot.
///    - [`Frame::Terminate`](crate::frame::Frame::Terminate): finalize
///      internal state into a result fragment, send exactly one
///      [`Frame::Finished`](crate::frame::Frame::Finished) carrying it,
///      and return.
///    - [`Frame::Error`](crate::frame::Frame::Error): return immediately
///      without reading the payload and without sending anything. All
///      accumulated state is void.
///    - Anything else: return immediately without sending anything.
///
/// A worker aborts *silently*: it never reports failure on its channels.
/// The conductor turns the resulting closed channel into a fatal
/// [`Error::Protocol`](crate::error::Error::Protocol) for the whole run.
#[async_trait]
pub trait Worker: Send {
    /// Run the worker loop over one receive/send endpoint pair.
    async fn run(self: Box<Self>, input: WorkerReceiver, output: WorkerSender);
}
