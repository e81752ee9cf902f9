pub mod conn;
pub mod dial;
pub mod domain;
pub mod hello;
pub mod relay;

pub use conn::{ProxyError, ReplayStream, TlsConn};
pub use dial::{DialError, Resolver, SystemResolver};
pub use domain::{fix_domain, fix_domains};
pub use hello::{HandshakeError, read_hello};
pub use relay::{AuthChecker, RelayError, relay};
