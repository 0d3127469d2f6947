//! The transfer message exchanged between the conductor and its workers.
//!
//! One `Frame` type flows in both directions of a worker's channel pair;
//! each side only ever sends the variants the contract in
//! [`Worker`](crate::worker::Worker) allows it. A frame has no identity
//! beyond a single exchange.

use bytes::Bytes;
use tokio::sync::mpsc;

/// One message on a conductor↔worker channel.
#[derive(Debug)]
pub enum Frame {
    /// Worker → conductor: "I hold no reference to any buffer slot."
    ///
    /// Sent exactly once before the first chunk, then once after folding
    /// each chunk. This is the acknowledgment the conductor's barrier
    /// counts before it reuses a slot.
    Ready,

    /// Conductor → worker: a read-only view of the freshly filled slot.
    ///
    /// The view is a cheap reference-counted handle; the worker must drop
    /// it before acknowledging with [`Frame::Ready`].
    Chunk(Bytes),

    /// Conductor → worker: end of input. The worker finalizes and replies
    /// with [`Frame::Finished`].
    Terminate,

    /// Worker → conductor: the final result fragment. Terminal.
    Finished(Vec<u8>),

    /// Invalidates all of the receiving worker's accumulated state. The
    /// payload, if any, must never be read. The conductor never sends
    /// this; it is reserved for callers driving a worker directly.
    Error(Option<Bytes>),
}

/// Endpoint a worker receives chunks and control frames on.
pub type WorkerReceiver = mpsc::Receiver<Frame>;

/// Endpoint a worker reports readiness and its final fragment on.
pub type WorkerSender = mpsc::Sender<Frame>;
