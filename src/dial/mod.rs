use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Overall budget for resolving the SNI host and connecting to the origin
const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Origin port for proxied TLS traffic
const TLS_PORT: u16 = 443;

/// Failure while resolving or connecting to the origin.
#[derive(Debug, Error)]
pub enum DialError {
    /// DNS produced no usable address for the SNI host
    #[error("host {0} not found")]
    NotFound(String),

    #[error("resolve {host}: {source}")]
    Resolve { host: String, source: io::Error },

    #[error("connect {addr}: {source}")]
    Connect { addr: SocketAddr, source: io::Error },

    #[error("dial {0}: timed out")]
    Timeout(String),
}

/// Hostname to IPv4 resolution contract.
///
/// The proxy core only needs this one lookup; hosts can plug in a custom
/// resolver (for example one that rotates across a static list of DNS
/// servers) or fall back to [`SystemResolver`].
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn lookup_ip4(&self, host: &str) -> io::Result<Vec<Ipv4Addr>>;
}

/// Resolver backed by the runtime's host lookup.
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup_ip4(&self, host: &str) -> io::Result<Vec<Ipv4Addr>> {
        let addrs = tokio::net::lookup_host((host, TLS_PORT)).await?;
        Ok(addrs
            .filter_map(|sa| match sa.ip() {
                IpAddr::V4(ip) => Some(ip),
                IpAddr::V6(_) => None,
            })
            .collect())
    }
}

// Fast xorshift random - no allocation, no syscall. Load spread across
// resolved addresses does not need to be uniform.
#[inline]
fn fast_random() -> u32 {
    use std::cell::Cell;
    thread_local! {
        static STATE: Cell<u32> = Cell::new(0xDEADBEEF);
    }
    STATE.with(|state| {
        let mut x = state.get();
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state.set(x);
        x
    })
}

/// Resolve the SNI host and open the origin connection on port 443,
/// all within a single 5-second budget.
pub async fn dial_sni(host: &str, resolver: Option<&dyn Resolver>) -> Result<TcpStream, DialError> {
    match timeout(DIAL_TIMEOUT, dial_inner(host, resolver)).await {
        Ok(res) => res,
        Err(_) => Err(DialError::Timeout(host.to_string())),
    }
}

async fn dial_inner(host: &str, resolver: Option<&dyn Resolver>) -> Result<TcpStream, DialError> {
    let ips = match resolver {
        Some(r) => r.lookup_ip4(host).await,
        None => SystemResolver.lookup_ip4(host).await,
    }
    .map_err(|source| DialError::Resolve {
        host: host.to_string(),
        source,
    })?;

    if ips.is_empty() {
        return Err(DialError::NotFound(host.to_string()));
    }
    let ip = ips[fast_random() as usize % ips.len()];
    let addr = SocketAddr::from((ip, TLS_PORT));
    debug!(host, %addr, candidates = ips.len(), "dialing origin");

    TcpStream::connect(addr)
        .await
        .map_err(|source| DialError::Connect { addr, source })
}
