mod replay;
mod tls;

pub use replay::ReplayStream;
pub use tls::{ProxyError, TlsConn};
