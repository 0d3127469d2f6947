//! The standard multi-digest checksum suite.
//!
//! Producing several checksums of a large file is I/O bound; reading once
//! and fanning the bytes out to one worker per algorithm turns it into a
//! single pass. The segmented variants exist for stores that checksum
//! uploads per part (the rollover is the part size).

use std::path::Path;

use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;
use sha3::{Sha3_256, Sha3_512};
use tokio::fs::File;
use tokio::io::AsyncRead;

use crate::conductor::Conductor;
use crate::error::{Error, Result};
use crate::worker::Worker;
use crate::workers::{DigestWorker, SegmentedDigestWorker};

/// Read chunk size used by the standard suite.
pub const DEFAULT_BUFSIZE: usize = 32 * 1024;

/// Digest `input` once with the standard suite: sha3-512, sha3-256,
/// sha256, sha1 (whole and per-segment) and md5 (whole and per-segment),
/// segments closing every `rollover` bytes.
///
/// Returns the composite result; the caller wraps it in an enclosing
/// object.
pub async fn checksum_reader<R>(input: R, rollover: u64) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    checksum_reader_with(input, rollover, DEFAULT_BUFSIZE).await
}

/// [`checksum_reader`] with an explicit read chunk size.
///
/// The chunk size must not exceed `rollover`: the segmented workers
/// handle at most one segment boundary per chunk, and silently merged
/// segments would change published digests. Misconfiguration is refused.
pub async fn checksum_reader_with<R>(input: R, rollover: u64, bufsize: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    if rollover == 0 {
        return Err(Error::Config("rollover must be positive".into()));
    }
    if bufsize as u64 > rollover {
        return Err(Error::Config(format!(
            "read chunk size ({bufsize}) must not exceed the rollover ({rollover})"
        )));
    }

    let workers: Vec<Box<dyn Worker>> = vec![
        Box::new(DigestWorker::<Sha3_512>::new("sha3-512")),
        Box::new(DigestWorker::<Sha3_256>::new("sha3-256")),
        Box::new(DigestWorker::<Sha256>::new("sha256")),
        Box::new(SegmentedDigestWorker::<Sha1>::new("sha1segs", rollover)),
        Box::new(DigestWorker::<Sha1>::new("sha1")),
        Box::new(DigestWorker::<Md5>::new("md5")),
        Box::new(SegmentedDigestWorker::<Md5>::new("md5segs", rollover)),
    ];
    Conductor::new(bufsize).run(input, workers).await
}

/// Open `path` and run [`checksum_reader`] over it.
pub async fn checksum_file(path: impl AsRef<Path>, rollover: u64) -> Result<Vec<u8>> {
    let file = File::open(path).await.map_err(Error::Read)?;
    checksum_reader(file, rollover).await
}
