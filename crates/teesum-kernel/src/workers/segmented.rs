//! Rolling, segment-boundary-aware digest worker.
//!
//! Produces one digest per fixed-size byte-count segment instead of one
//! digest for the whole stream, e.g. to verify the parts of a multipart
//! upload independently.

use async_trait::async_trait;
use digest::{Digest, FixedOutputReset};

use crate::frame::{Frame, WorkerReceiver, WorkerSender};
use crate::worker::Worker;

/// Computes a digest per `rollover`-byte segment of the stream.
///
/// The fragment is `"name":["hexdigest0","hexdigest1",...]`, one entry per
/// segment in stream order. The tail of the stream always yields a final
/// segment, even when it is empty.
///
/// The boundary logic handles at most one rollover crossing per chunk, so
/// it is correct only when the conductor's read chunk size does not exceed
/// `rollover`. Feeding larger chunks silently merges segments; callers
/// depending on published digests for a given chunk size are the reason
/// this is a documented precondition rather than a generalized algorithm.
pub struct SegmentedDigestWorker<D: Digest> {
    name: String,
    hasher: D,
    rollover: u64,
    total: u64,
    segments: Vec<String>,
}

impl<D: Digest> SegmentedDigestWorker<D> {
    /// Create a worker closing one segment every `rollover` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `rollover` is zero.
    pub fn new(name: impl Into<String>, rollover: u64) -> Self {
        assert!(rollover > 0, "segment size must be positive");
        Self {
            name: name.into(),
            hasher: D::new(),
            rollover,
            total: 0,
            segments: Vec::new(),
        }
    }
}

impl<D: Digest + FixedOutputReset> SegmentedDigestWorker<D> {
    fn fold(&mut self, chunk: &[u8]) {
        let len = chunk.len() as u64;
        if (self.total + len) / self.rollover == self.total / self.rollover {
            Digest::update(&mut self.hasher, chunk);
        } else {
            // The chunk straddles a segment boundary: close the current
            // segment on its exact byte and start the next one with the
            // remainder.
            let split = (self.rollover - self.total % self.rollover) as usize;
            Digest::update(&mut self.hasher, &chunk[..split]);
            self.segments.push(hex::encode(self.hasher.finalize_reset()));
            Digest::update(&mut self.hasher, &chunk[split..]);
        }
        self.total += len;
    }
}

#[async_trait]
impl<D> Worker for SegmentedDigestWorker<D>
where
    D: Digest + FixedOutputReset + Send + 'static,
{
    async fn run(mut self: Box<Self>, mut input: WorkerReceiver, output: WorkerSender) {
        if output.send(Frame::Ready).await.is_err() {
            return;
        }
        while let Some(frame) = input.recv().await {
            match frame {
                Frame::Chunk(chunk) => {
                    self.fold(&chunk);
                    drop(chunk);
                    if output.send(Frame::Ready).await.is_err() {
                        return;
                    }
                }
                Frame::Terminate => {
                    let Self {
                        name,
                        hasher,
                        mut segments,
                        ..
                    } = *self;
                    segments.push(hex::encode(hasher.finalize()));

                    let mut fragment = format!("\"{name}\":[");
                    for (index, segment) in segments.iter().enumerate() {
                        if index > 0 {
                            fragment.push(',');
                        }
                        fragment.push('"');
                        fragment.push_str(segment);
                        fragment.push('"');
                    }
                    fragment.push(']');
                    let _ = output.send(Frame::Finished(fragment.into_bytes())).await;
                    return;
                }
                _ => return,
            }
        }
    }
}
