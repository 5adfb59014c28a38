//! Streaming body-to-file transfer with inline SHA-1

use std::fmt::Write as _;
use std::path::Path;

use futures::StreamExt;
use sha1::{Digest, Sha1};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::errors::RemoteError;

/// Stream a response body into `target`, hashing the bytes as they pass.
/// Returns the byte count and the lowercase SHA-1 hex of exactly what was
/// written. The file handle is closed on every exit path.
pub async fn stream_to_file(
    response: reqwest::Response,
    target: &Path,
) -> Result<(u64, String), RemoteError> {
    let mut file = File::create(target).await?;
    let mut hasher = Sha1::new();
    let mut written = 0u64;

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(RemoteError::transient)?;
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok((written, to_hex(&hasher.finalize())))
}

/// SHA-1 of a byte slice, for tests and verification paths.
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    to_hex(&hasher.finalize())
}

fn to_hex(digest: &[u8]) -> String {
    digest.iter().fold(String::with_capacity(40), |mut acc, b| {
        write!(&mut acc, "{b:02x}").unwrap();
        acc
    })
}
