use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::debug;

/// Buffer size owned by each relay direction
const PIPE_BUF: usize = 2048;

/// Failure that ended a relay session.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay i/o error: {0}")]
    Io(#[from] io::Error),

    /// A direction made no progress within the idle timeout
    #[error("idle timeout")]
    IdleTimeout,

    /// The [`AuthChecker`] collaborator revoked the session
    #[error("session timeout")]
    SessionTimeout,
}

/// Session gate polled before every relay read; `false` aborts the session.
pub trait AuthChecker: Send + Sync {
    fn is_auth(&self) -> bool;
}

/// Relay bytes between `inner` (the inbound side) and `outer` (the origin)
/// until one direction ends, errors, or sits idle for `tmo`.
///
/// The two directions run as symmetric copiers; the first one to finish
/// decides the outcome, the sibling is cancelled, and both write halves are
/// shut down before this returns. A clean EOF on either side is a normal
/// end. Within one direction byte order is preserved; the directions are
/// independent of each other.
pub async fn relay<A, B>(
    inner: &mut A,
    outer: &mut B,
    tmo: Duration,
    auth: Option<&dyn AuthChecker>,
) -> Result<(), RelayError>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut inner_rd, mut inner_wr) = tokio::io::split(inner);
    let (mut outer_rd, mut outer_wr) = tokio::io::split(outer);

    let first = {
        let up = pipe_one(&mut inner_rd, &mut outer_wr, tmo, auth, "client->origin");
        let down = pipe_one(&mut outer_rd, &mut inner_wr, tmo, auth, "origin->client");
        tokio::pin!(up, down);
        tokio::select! {
            res = &mut up => res,
            res = &mut down => res,
        }
    };

    // the losing direction was cancelled above; tear down both endpoints
    let _ = inner_wr.shutdown().await;
    let _ = outer_wr.shutdown().await;
    first
}

/// One copy direction with per-operation deadlines and a short-write loop
/// (via `write_all`).
async fn pipe_one<R, W>(
    src: &mut R,
    dst: &mut W,
    tmo: Duration,
    auth: Option<&dyn AuthChecker>,
    dir: &'static str,
) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; PIPE_BUF];
    let mut total = 0u64;
    loop {
        if let Some(ac) = auth {
            if !ac.is_auth() {
                debug!(dir, total, "session revoked");
                return Err(RelayError::SessionTimeout);
            }
        }
        let n = match timeout(tmo, src.read(&mut buf)).await {
            Ok(Ok(0)) => {
                debug!(dir, total, "relay direction finished");
                return Ok(());
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(RelayError::IdleTimeout),
        };
        match timeout(tmo, dst.write_all(&buf[..n])).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(RelayError::IdleTimeout),
        }
        total += n as u64;
    }
}
