use std::{net::Ipv4Addr, time::Duration};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

use crate::{error::SessionError, proxy::ProxyEndpoint};

const SOCKS_VERSION: u8 = 0x04;
const CMD_CONNECT: u8 = 0x01;
const REPLY_GRANTED: u8 = 0x5a;

/// Builds a SOCKS4 CONNECT request for the target. Non-IP hostnames use the
/// SOCKS4a form: destination ip 0.0.0.1 with the hostname trailing the
/// user-id field.
pub fn build_connect_request(target_host: &str, target_port: u16) -> Vec<u8> {
    let mut req = Vec::with_capacity(16 + target_host.len());
    req.push(SOCKS_VERSION);
    req.push(CMD_CONNECT);
    req.extend_from_slice(&target_port.to_be_bytes());
    match target_host.parse::<Ipv4Addr>() {
        Ok(ip) => {
            req.extend_from_slice(&ip.octets());
            req.push(0x00); // empty user-id
        }
        Err(_) => {
            req.extend_from_slice(&[0, 0, 0, 1]);
            req.push(0x00); // empty user-id
            req.extend_from_slice(target_host.as_bytes());
            req.push(0x00);
        }
    }
    req
}

pub fn check_reply(reply: &[u8; 8]) -> Result<(), SessionError> {
    match reply[1] {
        REPLY_GRANTED => Ok(()),
        code => Err(SessionError::ProxyConnect { code }),
    }
}

/// Establishes a TCP relay to `(target_host, target_port)` through a SOCKS4
/// proxy. On success the returned stream carries target traffic directly.
pub async fn connect(
    proxy: &ProxyEndpoint,
    target_host: &str,
    target_port: u16,
    deadline: Duration,
) -> Result<TcpStream, SessionError> {
    let mut stream = timeout(
        deadline,
        TcpStream::connect((proxy.host.as_str(), proxy.port)),
    )
    .await??;

    let request = build_connect_request(target_host, target_port);
    timeout(deadline, stream.write_all(&request)).await??;

    let mut reply = [0u8; 8];
    match timeout(deadline, stream.read_exact(&mut reply)).await? {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(SessionError::ProxyReplyTruncated)
        }
        Err(err) => return Err(err.into()),
    }
    check_reply(&reply)?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::{build_connect_request, check_reply};
    use crate::error::SessionError;

    #[test]
    fn connect_request_for_ipv4_target() {
        let req = build_connect_request("192.0.2.10", 25565);
        assert_eq!(
            req,
            [0x04, 0x01, 0x63, 0xdd, 192, 0, 2, 10, 0x00]
        );
    }

    #[test]
    fn connect_request_for_hostname_target() {
        let req = build_connect_request("mc.example.net", 25565);
        assert_eq!(&req[..4], [0x04, 0x01, 0x63, 0xdd]);
        assert_eq!(&req[4..8], [0, 0, 0, 1]);
        assert_eq!(req[8], 0x00);
        assert_eq!(&req[9..req.len() - 1], b"mc.example.net");
        assert_eq!(*req.last().unwrap(), 0x00);
    }

    #[test]
    fn reply_codes() {
        assert!(check_reply(&[0, 0x5a, 0, 0, 0, 0, 0, 0]).is_ok());
        match check_reply(&[0, 0x5b, 0, 0, 0, 0, 0, 0]) {
            Err(SessionError::ProxyConnect { code: 0x5b }) => {}
            other => panic!("unexpected {:?}", other.err()),
        }
    }
}
