use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tracing::debug;

use super::{HDR_LEN, HandshakeError, RECORD_TYPE_HANDSHAKE, TYPE_CLIENT_HELLO, VERSION_RANGE};

/// Read buffer size during hello ingestion
pub(crate) const BUF_LEN: usize = 2048;

/// Per-read deadline while collecting the hello record
const READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Refill attempts after the record header before giving up
const READ_TRIES: usize = 10;

/// TLS record payload ceiling (RFC 8446 §5.1)
const MAX_FRAGMENT: usize = 1 << 14;

/// Collects the first TLS record from the wire into an append-only buffer.
///
/// Issues at most `1 + READ_TRIES` socket reads, each under its own
/// [`READ_TIMEOUT`], and never reads past the record end.
pub(crate) struct HelloReader<'a, S> {
    stream: &'a mut S,
    buf: BytesMut,
    chunk: [u8; BUF_LEN],
    version: Option<u16>,
}

impl<'a, S: AsyncRead + Unpin> HelloReader<'a, S> {
    pub(crate) fn new(stream: &'a mut S) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(BUF_LEN),
            chunk: [0; BUF_LEN],
            version: None,
        }
    }

    /// Record version, once the header has been read and validated.
    pub(crate) fn version(&self) -> Option<u16> {
        self.version
    }

    /// Buffered record and its version after a successful [`fill`].
    pub(crate) fn finish(self) -> (BytesMut, u16) {
        debug_assert!(self.version.is_some());
        (self.buf, self.version.unwrap_or_default())
    }

    /// Ingest the full hello record.
    pub(crate) async fn fill(&mut self) -> Result<(), HandshakeError> {
        let n = self.read_tmo(HDR_LEN).await?;
        if n != HDR_LEN {
            return Err(HandshakeError::ShortHeader);
        }

        // SSL 2.0 compatible ClientHello: high bit set on the two-byte
        // record length, message type in the third byte (RFC 5246 E.2)
        if self.buf[0] & 0x80 != 0 && self.buf[2] == TYPE_CLIENT_HELLO {
            return Err(HandshakeError::Sslv2);
        }
        if self.buf[0] != RECORD_TYPE_HANDSHAKE {
            return Err(HandshakeError::NotHandshake);
        }
        // the observed version is kept even when it fails the range check,
        // so the rejection alert can echo it
        let version = u16::from_be_bytes([self.buf[1], self.buf[2]]);
        self.version = Some(version);
        if !VERSION_RANGE.contains(&version) {
            return Err(HandshakeError::BadVersion(version));
        }

        let fragment = u16::from_be_bytes([self.buf[3], self.buf[4]]) as usize;
        if fragment > MAX_FRAGMENT {
            return Err(HandshakeError::Oversized(fragment));
        }
        let total = fragment + HDR_LEN;

        for _ in 0..READ_TRIES {
            let need = (total - self.buf.len()).min(BUF_LEN);
            if need == 0 {
                break;
            }
            self.read_tmo(need).await?;
        }
        if self.buf.len() < total {
            return Err(HandshakeError::Truncated);
        }
        debug!(total, version, "client hello record buffered");
        Ok(())
    }

    /// One read of up to `n` bytes under a fresh deadline, appended to the
    /// record buffer.
    async fn read_tmo(&mut self, n: usize) -> Result<usize, HandshakeError> {
        let read = self.stream.read(&mut self.chunk[..n]);
        let got = timeout(READ_TIMEOUT, read)
            .await
            .map_err(|_| HandshakeError::Timeout)??;
        if got == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        self.buf.extend_from_slice(&self.chunk[..got]);
        Ok(got)
    }
}
