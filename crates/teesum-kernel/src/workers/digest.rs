//! Whole-stream digest worker.
//!
//! The baseline worker variant and the correctness reference for the
//! contract: fold every chunk into one incremental hasher, emit the
//! hex-encoded final value.

use async_trait::async_trait;
use digest::Digest;

use crate::frame::{Frame, WorkerReceiver, WorkerSender};
use crate::worker::Worker;

/// Computes one cryptographic digest over the whole stream.
///
/// The fragment is `"name":"hexdigest"`.
pub struct DigestWorker<D: Digest> {
    name: String,
    hasher: D,
}

impl<D: Digest> DigestWorker<D> {
    /// Create a worker whose fragment is keyed by `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hasher: D::new(),
        }
    }
}

#[async_trait]
impl<D> Worker for DigestWorker<D>
where
    D: Digest + Send + 'static,
{
    async fn run(mut self: Box<Self>, mut input: WorkerReceiver, output: WorkerSender) {
        if output.send(Frame::Ready).await.is_err() {
            return;
        }
        while let Some(frame) = input.recv().await {
            match frame {
                Frame::Chunk(chunk) => {
                    self.hasher.update(&chunk);
                    // Release the slot view before acknowledging.
                    drop(chunk);
                    if output.send(Frame::Ready).await.is_err() {
                        return;
                    }
                }
                Frame::Terminate => {
                    let Self { name, hasher } = *self;
                    let fragment = format!("\"{}\":\"{}\"", name, hex::encode(hasher.finalize()));
                    let _ = output.send(Frame::Finished(fragment.into_bytes())).await;
                    return;
                }
                _ => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use md5::Md5;
    use sha1::Sha1;
    use tokio::sync::mpsc;

    use super::*;

    async fn drive(worker: Box<dyn Worker>, chunks: &[&[u8]]) -> Option<Vec<u8>> {
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(1);
        tokio::spawn(worker.run(in_rx, out_tx));

        assert!(matches!(out_rx.recv().await, Some(Frame::Ready)));
        for chunk in chunks {
            in_tx
                .send(Frame::Chunk(bytes::Bytes::copy_from_slice(chunk)))
                .await
                .unwrap();
            assert!(matches!(out_rx.recv().await, Some(Frame::Ready)));
        }
        in_tx.send(Frame::Terminate).await.unwrap();
        match out_rx.recv().await {
            Some(Frame::Finished(fragment)) => Some(fragment),
            _ => None,
        }
    }

    #[tokio::test]
    async fn digest_matches_direct_computation() {
        let fragment = drive(
            Box::new(DigestWorker::<Md5>::new("md5")),
            &[&b"hello "[..], &b"world"[..]],
        )
        .await
        .unwrap();

        let expected = format!("\"md5\":\"{}\"", hex::encode(Md5::digest(b"hello world")));
        assert_eq!(fragment, expected.into_bytes());
    }

    #[tokio::test]
    async fn empty_stream_digests_the_empty_input() {
        let fragment = drive(Box::new(DigestWorker::<Sha1>::new("sha1")), &[])
            .await
            .unwrap();

        let expected = format!("\"sha1\":\"{}\"", hex::encode(Sha1::digest(b"")));
        assert_eq!(fragment, expected.into_bytes());
    }

    #[tokio::test]
    async fn error_frame_aborts_without_a_fragment() {
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(1);
        let worker: Box<dyn Worker> = Box::new(DigestWorker::<Md5>::new("md5"));
        tokio::spawn(worker.run(in_rx, out_tx));

        assert!(matches!(out_rx.recv().await, Some(Frame::Ready)));
        in_tx
            .send(Frame::Error(Some(bytes::Bytes::from_static(b"poisoned"))))
            .await
            .unwrap();

        // Silent abort: the channel closes with no further frames.
        assert!(out_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn unexpected_frame_aborts_without_a_fragment() {
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(1);
        let worker: Box<dyn Worker> = Box::new(DigestWorker::<Md5>::new("md5"));
        tokio::spawn(worker.run(in_rx, out_tx));

        assert!(matches!(out_rx.recv().await, Some(Frame::Ready)));
        in_tx.send(Frame::Ready).await.unwrap();
        assert!(out_rx.recv().await.is_none());
    }
}
