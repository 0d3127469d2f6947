//! The byte-copy pump: a one-directional copy loop from a readable source
//! to a writable sink.
//!
//! Purely mechanical: no state beyond the loop. The source ending and the
//! sink reporting a closed pipe both end the copy normally; every other
//! I/O error is a failure the owner must treat as fatal. Completion is
//! reported through a single-use channel that also hands the sink back to
//! the owner.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;

/// Size of the pump's internal copy buffer.
const PUMP_BUFFER_SIZE: usize = 64 * 1024;

/// Copy `source` into `sink` until the source ends or the sink closes,
/// then report through `done`, returning the sink to the owner.
pub async fn pump<R, W>(mut source: R, mut sink: W, done: oneshot::Sender<io::Result<W>>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let result = copy_until_closed(&mut source, &mut sink).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "pump stopped on an unexpected I/O error");
    }
    // The owner may already be gone; nothing left to notify then.
    let _ = done.send(result.map(|_| sink));
}

async fn copy_until_closed<R, W>(source: &mut R, sink: &mut W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; PUMP_BUFFER_SIZE];
    loop {
        let n = source.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        match sink.write_all(&buf[..n]).await {
            Ok(()) => {}
            // A closed sink ends the pump the same way source EOF does.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}
