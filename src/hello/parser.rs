use super::cursor::ByteCursor;
use super::{
    EXT_SERVER_NAME, HandshakeError, MIN_CLIENT_VERSION, NAME_TYPE_HOST, RANDOM_LEN,
    TYPE_CLIENT_HELLO,
};
use crate::domain::fix_domain;

/// Extract the normalized SNI host from a complete ClientHello handshake
/// message (the record payload, without the 5-byte record header).
///
/// The whole ClientHello must live inside this one record; a message that
/// continues in a later record fails the handshake length check.
pub fn parse_client_hello(body: &[u8]) -> Result<String, HandshakeError> {
    let mut cur = ByteCursor::new(body);
    if cur.get_u8()? != TYPE_CLIENT_HELLO {
        return Err(HandshakeError::NotClientHello);
    }
    if cur.get_u24()? as usize != cur.left() {
        return Err(HandshakeError::Malformed);
    }
    if cur.get_u16()? < MIN_CLIENT_VERSION {
        return Err(HandshakeError::Malformed);
    }
    cur.skip(RANDOM_LEN)?;
    cur.skip_l8()?; // session id
    cur.skip_l16()?; // cipher suites
    cur.skip_l8()?; // compression methods

    let mut extensions = cur.nested_l16()?;
    let mut server_name = loop {
        if extensions.left() == 0 {
            return Err(HandshakeError::NoServerName);
        }
        if extensions.get_u16()? == EXT_SERVER_NAME {
            break extensions.nested_l16()?;
        }
        extensions.skip_l16()?;
    };

    let mut names = server_name.nested_l16()?;
    let host = loop {
        if names.left() == 0 {
            return Err(HandshakeError::NoServerName);
        }
        if names.get_u8()? == NAME_TYPE_HOST {
            let len = names.get_u16()? as usize;
            break names.take(len)?;
        }
        names.skip_l16()?;
    };

    let host = std::str::from_utf8(host).map_err(|_| HandshakeError::Malformed)?;
    Ok(fix_domain(host))
}
