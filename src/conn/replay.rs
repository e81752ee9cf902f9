use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

pin_project! {
    /// Connection wrapper that replays a captured prefix before live reads.
    ///
    /// Reads drain the prefix first; once it is exhausted they forward to
    /// the inner stream. Writes, flushes and shutdown always pass through.
    /// The prefix is an immutable, reference-counted copy taken at
    /// construction time.
    #[derive(Debug)]
    pub struct ReplayStream<S> {
        #[pin]
        inner: S,
        prefix: Bytes,
    }
}

impl<S> ReplayStream<S> {
    pub fn new(inner: S, prefix: Bytes) -> Self {
        Self { inner, prefix }
    }

    /// Captured bytes not yet handed to a reader.
    pub fn remaining_prefix(&self) -> usize {
        self.prefix.len()
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead> AsyncRead for ReplayStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        if !this.prefix.is_empty() && buf.remaining() > 0 {
            let n = this.prefix.len().min(buf.remaining());
            buf.put_slice(&this.prefix[..n]);
            this.prefix.advance(n);
            return Poll::Ready(Ok(()));
        }
        this.inner.poll_read(cx, buf)
    }
}

impl<S: AsyncWrite> AsyncWrite for ReplayStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.project().inner.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        self.project().inner.poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    #[tokio::test]
    async fn test_prefix_served_before_live_reads() {
        let (mut remote, local) = duplex(1024);
        remote.write_all(b" live").await.unwrap();
        drop(remote);

        let mut rs = ReplayStream::new(local, Bytes::from_static(b"captured"));
        let mut out = Vec::new();
        rs.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"captured live");
        assert_eq!(rs.remaining_prefix(), 0);
    }

    #[tokio::test]
    async fn test_prefix_drained_in_small_reads() {
        let (remote, local) = duplex(1024);
        let mut rs = ReplayStream::new(local, Bytes::from_static(b"abcdef"));
        let mut chunk = [0u8; 4];

        let n = rs.read(&mut chunk).await.unwrap();
        assert_eq!(&chunk[..n], b"abcd");
        let n = rs.read(&mut chunk).await.unwrap();
        assert_eq!(&chunk[..n], b"ef");
        drop(remote);
        assert_eq!(rs.read(&mut chunk).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_writes_pass_through() {
        let (mut remote, local) = duplex(1024);
        let mut rs = ReplayStream::new(local, Bytes::from_static(b"prefix"));
        rs.write_all(b"outbound").await.unwrap();
        rs.shutdown().await.unwrap();

        let mut seen = Vec::new();
        remote.read_to_end(&mut seen).await.unwrap();
        // the prefix never leaks into the write direction
        assert_eq!(seen, b"outbound");
    }

    #[tokio::test]
    async fn test_empty_prefix_is_transparent() {
        let (mut remote, local) = duplex(1024);
        remote.write_all(b"only live").await.unwrap();
        drop(remote);

        let mut rs = ReplayStream::new(local, Bytes::new());
        let mut out = Vec::new();
        rs.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"only live");
    }
}
