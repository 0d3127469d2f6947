//! The conductor: double-buffered reads fanned out to every worker.
//!
//! One producer task (the caller) reads the input exactly once; each
//! registered worker runs on its own task and sees every chunk through a
//! cheap reference-counted view. The conductor alternates between two
//! buffer slots so the next chunk's read overlaps the current chunk's
//! fan-out:
//!
//! ```text
//!                        ┌──▶ worker 0 ──┐
//!   input ──▶ [slot A|B] ┼──▶ worker 1 ──┼──▶ fragments, in
//!              (read one,└──▶ worker N ──┘    registration order
//!               fan out the other)
//! ```
//!
//! A slot is refilled only after every worker has acknowledged the slot's
//! previous contents; that acknowledgment barrier is the sole mechanism
//! keeping a worker from observing memory being overwritten. The barrier
//! is enforced, not just documented: the sent view is a [`Bytes`] handle,
//! and reclaiming the slot with [`Bytes::try_into_mut`] fails if any
//! worker kept a reference past its acknowledgment.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::worker::Worker;

/// Separator between result fragments in the composite result.
pub const FRAGMENT_SEPARATOR: &[u8] = b",\n";

/// Channel pair for one registered worker. The lane's index in the list
/// is the worker's position in the composite result; the worker itself
/// never learns it.
struct Lane {
    input: mpsc::Sender<Frame>,
    output: mpsc::Receiver<Frame>,
}

/// Runs the fan-out/fan-in protocol over a set of registered workers.
///
/// Worker count and identity are fixed for the lifetime of one run; a
/// conductor does not retry failed workers, and any protocol violation is
/// fatal to the whole run.
pub struct Conductor {
    bufsize: usize,
}

impl Conductor {
    /// Create a conductor that reads chunks of at most `bufsize` bytes.
    pub fn new(bufsize: usize) -> Self {
        Self { bufsize }
    }

    /// Read `input` exactly once, handing every chunk to every worker and
    /// collecting one result fragment from each.
    ///
    /// Fragments come back joined with [`FRAGMENT_SEPARATOR`] in
    /// registration order, regardless of completion order. The caller is
    /// responsible for wrapping the composite in an enclosing object.
    pub async fn run<R>(&self, mut input: R, workers: Vec<Box<dyn Worker>>) -> Result<Vec<u8>>
    where
        R: AsyncRead + Unpin,
    {
        if self.bufsize == 0 {
            return Err(Error::Config("read chunk size must be positive".into()));
        }

        let mut lanes = Vec::with_capacity(workers.len());
        for worker in workers {
            let (in_tx, in_rx) = mpsc::channel(1);
            let (out_tx, out_rx) = mpsc::channel(1);
            tokio::spawn(worker.run(in_rx, out_tx));
            lanes.push(Lane {
                input: in_tx,
                output: out_rx,
            });
        }
        tracing::debug!(workers = lanes.len(), bufsize = self.bufsize, "run started");

        // Two fixed slots alternate for the whole run. `slot` is the one
        // being read into; `pending` is the master handle of the one
        // currently fanned out. The second slot comes into existence at
        // the first handoff.
        let mut slot = BytesMut::zeroed(self.bufsize);
        let mut pending: Option<Bytes> = None;

        loop {
            slot.resize(self.bufsize, 0);
            let n = input.read(&mut slot).await.map_err(Error::Read)?;
            slot.truncate(n);

            // The read above ran while the workers were still free to be
            // chewing on `pending`. Collect one acknowledgment per worker
            // (the initial readiness, on the first round) before touching
            // them again.
            drain_ready(&mut lanes).await?;
            let next = match pending.take() {
                Some(sent) => sent.try_into_mut().map_err(|_| Error::SlotRetained)?,
                None => BytesMut::zeroed(self.bufsize),
            };

            if n == 0 {
                for lane in &lanes {
                    lane.input
                        .send(Frame::Terminate)
                        .await
                        .map_err(|_| Error::Protocol("worker exited before end of input"))?;
                }
                break;
            }

            tracing::trace!(len = n, "fanning out chunk");
            let chunk = slot.freeze();
            for lane in &lanes {
                lane.input
                    .send(Frame::Chunk(chunk.clone()))
                    .await
                    .map_err(|_| Error::Protocol("worker exited before end of input"))?;
            }
            pending = Some(chunk);
            slot = next;
        }

        // Fan in: exactly one fragment per worker, in registration order.
        let mut composite = Vec::new();
        for (index, lane) in lanes.iter_mut().enumerate() {
            match lane.output.recv().await {
                Some(Frame::Finished(fragment)) => {
                    if index > 0 {
                        composite.extend_from_slice(FRAGMENT_SEPARATOR);
                    }
                    composite.extend_from_slice(&fragment);
                }
                Some(_) => return Err(Error::Protocol("expected a result fragment")),
                None => return Err(Error::Protocol("worker exited without a result fragment")),
            }
        }
        tracing::debug!(len = composite.len(), "run finished");
        Ok(composite)
    }
}

/// The acknowledgment barrier: one `Ready` from every lane. A slot may be
/// reused only after this returns.
async fn drain_ready(lanes: &mut [Lane]) -> Result<()> {
    for lane in lanes.iter_mut() {
        match lane.output.recv().await {
            Some(Frame::Ready) => {}
            Some(_) => return Err(Error::Protocol("expected an acknowledgment")),
            None => return Err(Error::Protocol("worker exited mid-stream")),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::frame::{WorkerReceiver, WorkerSender};

    /// Accumulates every byte it sees; its fragment is the raw bytes.
    struct CollectWorker {
        delay: Option<Duration>,
        seen: Vec<u8>,
    }

    impl CollectWorker {
        fn new() -> Self {
            Self {
                delay: None,
                seen: Vec::new(),
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                seen: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Worker for CollectWorker {
        async fn run(mut self: Box<Self>, mut input: WorkerReceiver, output: WorkerSender) {
            if output.send(Frame::Ready).await.is_err() {
                return;
            }
            while let Some(frame) = input.recv().await {
                match frame {
                    Frame::Chunk(chunk) => {
                        if let Some(delay) = self.delay {
                            tokio::time::sleep(delay).await;
                        }
                        self.seen.extend_from_slice(&chunk);
                        drop(chunk);
                        if output.send(Frame::Ready).await.is_err() {
                            return;
                        }
                    }
                    Frame::Terminate => {
                        let _ = output.send(Frame::Finished(self.seen)).await;
                        return;
                    }
                    _ => return,
                }
            }
        }
    }

    /// Violates the contract by acknowledging with the wrong frame.
    struct RogueWorker;

    #[async_trait]
    impl Worker for RogueWorker {
        async fn run(self: Box<Self>, mut input: WorkerReceiver, output: WorkerSender) {
            if output.send(Frame::Ready).await.is_err() {
                return;
            }
            while let Some(frame) = input.recv().await {
                match frame {
                    Frame::Chunk(_) => {
                        if output.send(Frame::Finished(Vec::new())).await.is_err() {
                            return;
                        }
                    }
                    _ => return,
                }
            }
        }
    }

    /// Violates the contract by keeping its chunk view past the ack.
    struct RetainingWorker {
        held: Vec<Bytes>,
    }

    #[async_trait]
    impl Worker for RetainingWorker {
        async fn run(mut self: Box<Self>, mut input: WorkerReceiver, output: WorkerSender) {
            if output.send(Frame::Ready).await.is_err() {
                return;
            }
            while let Some(frame) = input.recv().await {
                match frame {
                    Frame::Chunk(chunk) => {
                        self.held.push(chunk);
                        if output.send(Frame::Ready).await.is_err() {
                            return;
                        }
                    }
                    Frame::Terminate => {
                        let _ = output.send(Frame::Finished(Vec::new())).await;
                        return;
                    }
                    _ => return,
                }
            }
        }
    }

    #[tokio::test]
    async fn single_worker_sees_whole_stream() {
        let input: Vec<u8> = (0u8..=255).cycle().take(10_000).collect();
        let workers: Vec<Box<dyn Worker>> = vec![Box::new(CollectWorker::new())];

        let composite = Conductor::new(64).run(&input[..], workers).await.unwrap();
        assert_eq!(composite, input);
    }

    #[tokio::test]
    async fn fragments_follow_registration_order_not_completion_order() {
        let input = b"ordering test payload".repeat(50);
        // The slow worker is registered first; if completion order leaked
        // into the composite, the fast worker's fragment would come first.
        let workers: Vec<Box<dyn Worker>> = vec![
            Box::new(CollectWorker::slow(Duration::from_millis(20))),
            Box::new(CollectWorker::new()),
        ];

        let composite = Conductor::new(128).run(&input[..], workers).await.unwrap();
        let mut expected = input.clone();
        expected.extend_from_slice(FRAGMENT_SEPARATOR);
        expected.extend_from_slice(&input);
        assert_eq!(composite, expected);
    }

    #[tokio::test]
    async fn empty_input_terminates_immediately() {
        let workers: Vec<Box<dyn Worker>> =
            vec![Box::new(CollectWorker::new()), Box::new(CollectWorker::new())];

        let composite = Conductor::new(1024).run(&b""[..], workers).await.unwrap();
        assert_eq!(composite, FRAGMENT_SEPARATOR);
    }

    #[tokio::test]
    async fn chunking_never_changes_the_result() {
        let input: Vec<u8> = (0u8..=255).cycle().take(4096 + 17).collect();
        let mut results = Vec::new();
        for bufsize in [1, 7, 512, 4096, 1 << 16] {
            let workers: Vec<Box<dyn Worker>> = vec![Box::new(CollectWorker::new())];
            results.push(Conductor::new(bufsize).run(&input[..], workers).await.unwrap());
        }
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn wrong_ack_frame_is_fatal() {
        let input = vec![0u8; 4096];
        let workers: Vec<Box<dyn Worker>> =
            vec![Box::new(CollectWorker::new()), Box::new(RogueWorker)];

        let err = Conductor::new(64).run(&input[..], workers).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn retained_slot_view_is_fatal() {
        let input = vec![1u8; 4096];
        let workers: Vec<Box<dyn Worker>> =
            vec![Box::new(RetainingWorker { held: Vec::new() })];

        let err = Conductor::new(64).run(&input[..], workers).await.unwrap_err();
        assert!(matches!(err, Error::SlotRetained));
    }

    #[tokio::test]
    async fn zero_chunk_size_is_rejected() {
        let workers: Vec<Box<dyn Worker>> = vec![Box::new(CollectWorker::new())];
        let err = Conductor::new(0).run(&b"x"[..], workers).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
