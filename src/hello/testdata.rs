//! Hand-built ClientHello bytes shared by the hello, conn and relay tests.

/// server_name extension carrying one host_name entry.
pub(crate) fn sni_extension(host: &str) -> Vec<u8> {
    let name = host.as_bytes();
    let mut list = Vec::new();
    list.push(0x00); // name_type: host_name
    list.extend((name.len() as u16).to_be_bytes());
    list.extend(name);

    let mut ext = Vec::new();
    ext.extend(0u16.to_be_bytes()); // extension_type: server_name
    ext.extend(((list.len() + 2) as u16).to_be_bytes());
    ext.extend((list.len() as u16).to_be_bytes());
    ext.extend(list);
    ext
}

/// padding extension of `len` zero bytes.
pub(crate) fn padding_extension(len: usize) -> Vec<u8> {
    let mut ext = Vec::new();
    ext.extend(21u16.to_be_bytes());
    ext.extend((len as u16).to_be_bytes());
    ext.extend(std::iter::repeat_n(0u8, len));
    ext
}

/// ClientHello handshake message (type + u24 length + body) with one cipher
/// suite, null compression and the given extension block.
pub(crate) fn hello_body(client_version: u16, extensions: &[u8]) -> Vec<u8> {
    let mut ch = Vec::new();
    ch.extend(client_version.to_be_bytes());
    ch.extend([0u8; 32]); // random
    ch.push(0); // empty session id
    ch.extend(2u16.to_be_bytes());
    ch.extend([0x00, 0x2f]); // TLS_RSA_WITH_AES_128_CBC_SHA
    ch.push(1);
    ch.push(0); // null compression
    ch.extend((extensions.len() as u16).to_be_bytes());
    ch.extend(extensions);

    let mut body = vec![0x01]; // client_hello
    body.extend(&(ch.len() as u32).to_be_bytes()[1..]);
    body.extend(ch);
    body
}

/// Handshake record wrapping `body`.
pub(crate) fn record(version: u16, body: &[u8]) -> Vec<u8> {
    let mut rec = vec![0x16];
    rec.extend(version.to_be_bytes());
    rec.extend((body.len() as u16).to_be_bytes());
    rec.extend(body);
    rec
}

/// Complete TLS 1.2 ClientHello record with the given SNI.
pub(crate) fn client_hello(host: &str) -> Vec<u8> {
    record(0x0301, &hello_body(0x0303, &sni_extension(host)))
}
