//! MD5 digests of object content, rendered as ETag-style integrity tags.
//!
//! Files are streamed in fixed-size chunks so hashing a large object never
//! buffers it in memory.

use crate::errors::{StorageError, StorageResult};
use base64::{Engine as _, engine::general_purpose};
use md5::{Context, Digest};
use std::{
    fmt,
    fs::File,
    io::{self, Read},
    path::Path,
};

const CHUNK_SIZE: usize = 64 * 1024;

/// A 128-bit MD5 content digest.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ContentDigest(Digest);

impl ContentDigest {
    /// Lowercase hexadecimal form.
    pub fn hex(&self) -> String {
        format!("{:x}", self.0)
    }

    /// Standard base64 form, as carried by a `Content-MD5` header.
    pub fn base64(&self) -> String {
        general_purpose::STANDARD.encode(self.0.0)
    }

    /// Quoted hex form used as an entity tag: `"<hex>"`.
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.hex())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

/// Digest an in-memory buffer.
pub fn hash_bytes(data: &[u8]) -> ContentDigest {
    ContentDigest(md5::compute(data))
}

/// Digest everything a reader yields until EOF.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<ContentDigest> {
    let mut context = Context::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => context.consume(&buf[..n]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(ContentDigest(context.compute()))
}

/// Digest the file at `path`.
///
/// Fails with [`StorageError::Io`] if the file cannot be opened or fully read.
pub fn hash_file(path: &Path) -> StorageResult<ContentDigest> {
    let file = File::open(path).map_err(|source| StorageError::io("open", path, source))?;
    hash_reader(file).map_err(|source| StorageError::io("hash", path, source))
}
