//! Subprocess-pipe worker: stream the input into an external command.
//!
//! Chunks are forwarded to the child's standard input while two pumps
//! drain its standard output and standard error concurrently:
//!
//! ```text
//!   chunks ──▶ child stdin      child stdout ──▶ pump ──▶ sink
//!                               child stderr ──▶ pump ──▶ sink
//! ```
//!
//! Each sink is either a caller-supplied file or an in-memory capture;
//! only captures contribute to the result fragment. The pumps signal
//! completion on private single-use channels, nested concurrency the
//! conductor never sees.

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::oneshot;

use crate::frame::{Frame, WorkerReceiver, WorkerSender};
use crate::pump::pump;
use crate::worker::Worker;

/// Where a pump deposits one of the child's output streams.
pub enum Sink {
    /// Caller-supplied redirect target; contributes nothing to the
    /// result fragment.
    File(File),
    /// In-memory capture used to build the result fragment.
    Capture(Vec<u8>),
}

impl AsyncWrite for Sink {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Sink::File(file) => Pin::new(file).poll_write(cx, buf),
            Sink::Capture(captured) => {
                captured.extend_from_slice(buf);
                Poll::Ready(Ok(buf.len()))
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Sink::File(file) => Pin::new(file).poll_flush(cx),
            Sink::Capture(_) => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Sink::File(file) => Pin::new(file).poll_shutdown(cx),
            Sink::Capture(_) => Poll::Ready(Ok(())),
        }
    }
}

/// Pipes the stream through an external process.
///
/// The fragment is whatever the in-memory sinks captured: the stderr
/// capture followed by the stdout capture, raw. With both streams
/// redirected to files the fragment is empty.
pub struct ShellWorker {
    command: String,
    args: Vec<String>,
    stdout_path: Option<PathBuf>,
    stderr_path: Option<PathBuf>,
}

impl ShellWorker {
    /// Create a worker running `command` with no arguments.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            stdout_path: None,
            stderr_path: None,
        }
    }

    /// Append arguments to the command line.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Redirect the child's standard output to a file instead of
    /// capturing it for the fragment.
    pub fn stdout_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_path = Some(path.into());
        self
    }

    /// Redirect the child's standard error to a file instead of
    /// capturing it for the fragment.
    pub fn stderr_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr_path = Some(path.into());
        self
    }

    async fn serve(self, mut input: WorkerReceiver, output: WorkerSender) -> io::Result<()> {
        let stdout_sink = match &self.stdout_path {
            Some(path) => Sink::File(File::create(path).await?),
            None => Sink::Capture(Vec::new()),
        };
        let stderr_sink = match &self.stderr_path {
            Some(path) => Sink::File(File::create(path).await?),
            None => Sink::Capture(Vec::new()),
        };

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        tracing::debug!(command = %self.command, "child spawned");

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("child stdin was not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("child stderr was not piped"))?;

        let (stdout_done_tx, stdout_done) = oneshot::channel();
        let (stderr_done_tx, stderr_done) = oneshot::channel();
        tokio::spawn(pump(stdout, stdout_sink, stdout_done_tx));
        tokio::spawn(pump(stderr, stderr_sink, stderr_done_tx));

        if output.send(Frame::Ready).await.is_err() {
            return Ok(());
        }

        let mut stdin = Some(stdin);
        while let Some(frame) = input.recv().await {
            match frame {
                Frame::Chunk(chunk) => {
                    if let Some(writer) = stdin.as_mut() {
                        match writer.write_all(&chunk).await {
                            Ok(()) => {}
                            // The child stopped reading; keep consuming
                            // chunks so the rest of the run can finish.
                            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => stdin = None,
                            Err(e) => return Err(e),
                        }
                    }
                    drop(chunk);
                    if output.send(Frame::Ready).await.is_err() {
                        return Ok(());
                    }
                }
                Frame::Terminate => {
                    // Closing stdin lets the child see EOF and drain.
                    drop(stdin.take());
                    let (stdout_sink, stderr_sink) = match tokio::try_join!(stdout_done, stderr_done)
                    {
                        Ok((stdout_sink, stderr_sink)) => (stdout_sink?, stderr_sink?),
                        Err(_) => return Err(io::Error::other("pump exited without reporting")),
                    };
                    let status = child.wait().await?;
                    tracing::debug!(command = %self.command, %status, "child exited");

                    let mut fragment = Vec::new();
                    if let Sink::Capture(captured) = stderr_sink {
                        fragment.extend_from_slice(&captured);
                    }
                    if let Sink::Capture(captured) = stdout_sink {
                        fragment.extend_from_slice(&captured);
                    }
                    let _ = output.send(Frame::Finished(fragment)).await;
                    return Ok(());
                }
                _ => return Ok(()),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Worker for ShellWorker {
    async fn run(self: Box<Self>, input: WorkerReceiver, output: WorkerSender) {
        // Contract: internal failures abort silently on the channels; the
        // conductor turns the dropped endpoints into a fatal protocol
        // violation for the whole run.
        if let Err(e) = (*self).serve(input, output).await {
            tracing::error!(error = %e, "subprocess worker aborted");
        }
    }
}
