use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use pin_project_lite::pin_project;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tracing::debug;

use super::replay::ReplayStream;
use crate::dial::{self, DialError, Resolver};
use crate::hello::{ALERT_CLOSE_NOTIFY, alert_record};
use crate::relay::{self, AuthChecker, RelayError};

/// Error returned by [`TlsConn::proxy_sni`].
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Dial(#[from] DialError),
    #[error(transparent)]
    Relay(#[from] RelayError),
}

fn closed_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "connection closed")
}

pin_project! {
    /// Inbound connection handle with the SNI already peeled.
    ///
    /// Produced by [`read_hello`](crate::hello::read_hello). Reads replay
    /// the captured hello record before live socket data, so the origin
    /// observes the client's byte stream from offset zero. Close is
    /// idempotent and emits a fatal close_notify alert at most once.
    #[derive(Debug)]
    pub struct TlsConn<S> {
        #[pin]
        stream: ReplayStream<S>,
        sni: String,
        version: u16,
        closed: AtomicBool,
        no_alert: AtomicBool,
    }
}

impl<S> TlsConn<S> {
    pub(crate) fn new(stream: S, captured: Bytes, sni: String, version: u16) -> Self {
        Self {
            stream: ReplayStream::new(stream, captured),
            sni,
            version,
            closed: AtomicBool::new(false),
            no_alert: AtomicBool::new(false),
        }
    }

    /// Normalized SNI host from the ClientHello.
    pub fn sni(&self) -> &str {
        &self.sni
    }

    /// Legacy version from the captured record header, used for alerts.
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Suppress the TLS alert on the next [`close`](TlsConn::close).
    pub fn no_alert(&self) {
        self.no_alert.store(true, Ordering::Relaxed);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }
}

impl<S> TlsConn<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Close the inbound connection.
    ///
    /// The first call writes the fatal close_notify alert (unless
    /// suppressed), ignoring write failures, then shuts the socket down.
    /// Every later call returns the closed-pipe error.
    pub async fn close(&mut self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(closed_pipe());
        }
        if !self.no_alert.load(Ordering::Relaxed) {
            let alert = alert_record(self.version, ALERT_CLOSE_NOTIFY);
            let _ = self.stream.write_all(&alert).await;
        }
        let _ = self.stream.shutdown().await;
        Ok(())
    }

    /// Dial the origin named by the SNI and relay ciphertext both ways
    /// until either side ends or `tmo` passes without progress.
    ///
    /// On dial failure the inbound side is closed (with alert) before the
    /// error is returned. After the relay winds down both sides are closed.
    pub async fn proxy_sni(
        &mut self,
        tmo: Duration,
        resolver: Option<&dyn Resolver>,
        auth: Option<&dyn AuthChecker>,
    ) -> Result<(), ProxyError> {
        let mut origin = match dial::dial_sni(&self.sni, resolver).await {
            Ok(cn) => cn,
            Err(e) => {
                let _ = self.close().await;
                return Err(e.into());
            }
        };
        debug!(sni = %self.sni, "origin connected, relaying");
        let res = relay::relay(self, &mut origin, tmo, auth).await;
        let _ = self.close().await;
        let _ = origin.shutdown().await;
        res.map_err(ProxyError::from)
    }
}

impl TlsConn<TcpStream> {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.get_ref().local_addr()
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.get_ref().peer_addr()
    }
}

impl<S: AsyncRead> AsyncRead for TlsConn<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.closed.load(Ordering::Relaxed) {
            return Poll::Ready(Err(closed_pipe()));
        }
        self.project().stream.poll_read(cx, buf)
    }
}

impl<S: AsyncWrite> AsyncWrite for TlsConn<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.closed.load(Ordering::Relaxed) {
            return Poll::Ready(Err(closed_pipe()));
        }
        self.project().stream.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.closed.load(Ordering::Relaxed) {
            return Poll::Ready(Err(closed_pipe()));
        }
        self.project().stream.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().stream.poll_shutdown(cx)
    }
}
