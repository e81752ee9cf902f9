mod cursor;
mod parser;
mod reader;

#[cfg(test)]
pub(crate) mod testdata;

pub use cursor::{ByteCursor, Underflow};
pub use parser::parse_client_hello;

use std::io;
use std::ops::RangeInclusive;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::conn::TlsConn;

/// TLS record header length
pub(crate) const HDR_LEN: usize = 5;
pub(crate) const RECORD_TYPE_HANDSHAKE: u8 = 22;
pub(crate) const RECORD_TYPE_ALERT: u8 = 21;
pub(crate) const TYPE_CLIENT_HELLO: u8 = 1;
pub(crate) const RANDOM_LEN: usize = 32;
pub(crate) const EXT_SERVER_NAME: u16 = 0;
pub(crate) const NAME_TYPE_HOST: u8 = 0;

/// Acceptable legacy record versions, TLS 1.0 through 1.3
pub(crate) const VERSION_RANGE: RangeInclusive<u16> = 0x0301..=0x0304;
/// Oldest client_version still accepted inside the hello body (SSL 3.0)
pub(crate) const MIN_CLIENT_VERSION: u16 = 0x0300;

const ALERT_LEVEL_FATAL: u8 = 2;
pub(crate) const ALERT_CLOSE_NOTIFY: u8 = 0;
pub(crate) const ALERT_HANDSHAKE_FAILURE: u8 = 0x28;

/// Build the 7-byte fatal alert record sent before closing the inbound side.
pub(crate) fn alert_record(version: u16, description: u8) -> [u8; 7] {
    let [hi, lo] = version.to_be_bytes();
    [
        RECORD_TYPE_ALERT,
        hi,
        lo,
        0x00,
        0x02,
        ALERT_LEVEL_FATAL,
        description,
    ]
}

/// Failure while reading or parsing the opening ClientHello.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The first read did not produce a full 5-byte record header
    #[error("handshake error: short record header")]
    ShortHeader,
    #[error("handshake error: ssl 2.0 client hello")]
    Sslv2,
    #[error("handshake error: not a handshake record")]
    NotHandshake,
    #[error("handshake error: unsupported record version {0:#06x}")]
    BadVersion(u16),
    #[error("handshake error: record length {0} over limit")]
    Oversized(usize),
    /// The record did not complete within the read attempt budget
    #[error("handshake error: record truncated")]
    Truncated,
    #[error("handshake error: read timed out")]
    Timeout,
    #[error("handshake error: not a client hello")]
    NotClientHello,
    #[error("handshake error: malformed client hello")]
    Malformed,
    #[error("handshake error: no server name")]
    NoServerName,
    #[error("handshake error: {0}")]
    Io(#[from] io::Error),
}

impl From<Underflow> for HandshakeError {
    fn from(_: Underflow) -> Self {
        HandshakeError::Malformed
    }
}

/// Peek the SNI from an inbound TLS connection without consuming it.
///
/// Reads the first handshake record, extracts the normalized SNI and hands
/// back a [`TlsConn`] whose reads replay the captured record before live
/// socket data. On failure the peer receives a fatal handshake_failure
/// alert (when the record version is known) and the stream is shut down.
pub async fn read_hello<S>(mut stream: S) -> Result<TlsConn<S>, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut rd = reader::HelloReader::new(&mut stream);
    match rd.fill().await {
        Ok(()) => {
            let (buf, version) = rd.finish();
            match parse_client_hello(&buf[HDR_LEN..]) {
                Ok(sni) => {
                    debug!(sni = %sni, version, "sni peeled from client hello");
                    Ok(TlsConn::new(stream, buf.freeze(), sni, version))
                }
                Err(e) => {
                    reject(&mut stream, Some(version), &e).await;
                    Err(e)
                }
            }
        }
        Err(e) => {
            let version = rd.version();
            reject(&mut stream, version, &e).await;
            Err(e)
        }
    }
}

/// Best-effort alert emission and shutdown on a rejected hello.
async fn reject<S>(stream: &mut S, version: Option<u16>, err: &HandshakeError)
where
    S: AsyncWrite + Unpin,
{
    warn!(error = %err, "client hello rejected");
    if let Some(version) = version {
        let _ = stream
            .write_all(&alert_record(version, ALERT_HANDSHAKE_FAILURE))
            .await;
    }
    let _ = stream.shutdown().await;
}
