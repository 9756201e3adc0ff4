use std::{io::ErrorKind, time::Duration};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    time::timeout,
};

use crate::{
    error::SessionError,
    logging::HordeLogger,
    proto::{
        escape_raw_newlines, motd_from_status_json, strip_legacy_formatting, ClientboundPacket,
        ConnectionState, HandshakeC2s, HandshakeNextState, LoginStartC2s, PacketEncode,
        PacketDecoder, PacketEncoder, PacketFrame, StatusPingC2s, StatusRequestC2s,
    },
    proxy::ProxyEndpoint,
    socks,
};

const MAX_CHUNK_SIZE: usize = 1024;

/// One framed transport connection: split TCP halves plus an incremental
/// decoder, so frames survive partial and merged reads.
pub struct Connection {
    enc: PacketEncoder,
    dec: PacketDecoder,
    read: OwnedReadHalf,
    write: OwnedWriteHalf,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            enc: PacketEncoder::new(),
            dec: PacketDecoder::new(),
            read,
            write,
        }
    }

    pub async fn send<P: PacketEncode>(&mut self, pkt: &P) -> Result<(), SessionError> {
        self.enc.write_packet(pkt)?;
        let bytes = self.enc.take();
        self.write.write_all(&bytes).await?;
        Ok(())
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        self.write.write_all(bytes).await?;
        Ok(())
    }

    /// Next complete frame, or `None` once the peer closes cleanly.
    pub async fn recv_frame(&mut self) -> Result<Option<PacketFrame>, SessionError> {
        loop {
            if let Some(frame) = self.dec.try_next_packet()? {
                return Ok(Some(frame));
            }

            let mut buf = [0u8; MAX_CHUNK_SIZE];
            let n = self.read.read(&mut buf).await?;
            if n == 0 {
                return Ok(None);
            }
            self.dec.queue_slice(&buf[..n]);
        }
    }

    /// Drops buffered bytes after a malformed frame so the session can keep
    /// reading subsequent frames instead of tearing down.
    pub fn resync(&mut self) {
        self.dec.clear();
    }
}

/// One protocol session against the target, bound to at most one transport
/// connection at a time. A probe and a login are two separate connections
/// sharing the same identity and proxy choice.
pub struct Session {
    pub username: String,
    pub target_host: String,
    pub target_port: u16,
    pub proxy: Option<ProxyEndpoint>,
    state: ConnectionState,
    connect_timeout: Duration,
}

impl Session {
    pub fn new(
        username: String,
        target_host: String,
        target_port: u16,
        proxy: Option<ProxyEndpoint>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            username,
            target_host,
            target_port,
            proxy,
            state: ConnectionState::Handshaking,
            connect_timeout,
        }
    }

    async fn open_transport(&self) -> Result<Connection, SessionError> {
        let stream = match &self.proxy {
            Some(proxy) => {
                socks::connect(proxy, &self.target_host, self.target_port, self.connect_timeout)
                    .await?
            }
            None => {
                timeout(
                    self.connect_timeout,
                    TcpStream::connect((self.target_host.as_str(), self.target_port)),
                )
                .await??
            }
        };

        if let Err(err) = stream.set_nodelay(true) {
            log::debug!("Failed to set TCP_NODELAY: {err}");
        }
        Ok(Connection::new(stream))
    }

    /// Status probe: handshake into Status, request, log the MOTD, ping, and
    /// return once the pong lands. A failed JSON parse is logged and the
    /// probe still pings; only transport trouble fails it.
    pub async fn probe(&mut self) -> Result<Option<String>, SessionError> {
        self.state = ConnectionState::Handshaking;
        let mut conn = self.open_transport().await?;
        HordeLogger::probing(&self.username, self.proxy.as_ref());

        conn.send(&HandshakeC2s::new(
            &self.target_host,
            self.target_port,
            HandshakeNextState::Status,
        ))
        .await?;
        self.state = ConnectionState::Status;
        conn.send(&StatusRequestC2s).await?;

        let mut motd = None;
        loop {
            let frame = match conn.recv_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => return Err(SessionError::Io(ErrorKind::UnexpectedEof.into())),
                // Malformed framing is contained: drop the buffered bytes
                // and keep reading. Only transport errors end the probe.
                Err(SessionError::Proto(err)) => {
                    HordeLogger::malformed_frame(&self.username, &err);
                    conn.resync();
                    continue;
                }
                Err(err) => return Err(err),
            };

            match frame.decode_clientbound(self.state) {
                Ok(ClientboundPacket::StatusResponse(resp)) => {
                    let cleaned = escape_raw_newlines(&strip_legacy_formatting(&resp.json));
                    match motd_from_status_json(&cleaned) {
                        Some(text) => {
                            HordeLogger::motd(&text);
                            motd = Some(text);
                        }
                        None => HordeLogger::motd_parse_failed(&cleaned),
                    }
                    conn.send(&StatusPingC2s { payload: 0 }).await?;
                }
                Ok(ClientboundPacket::Pong(_)) => {
                    HordeLogger::probe_completed(&self.username);
                    return Ok(motd);
                }
                Ok(_) => {}
                Err(err) => {
                    HordeLogger::malformed_frame(&self.username, &err);
                    conn.resync();
                }
            }
        }
    }

    /// Login session: handshake into Login, send the username, then sit in
    /// the Play phase echoing keep-alives byte-identically until the server
    /// hangs up. No retry, no reconnect.
    pub async fn login(&mut self) -> Result<(), SessionError> {
        self.state = ConnectionState::Handshaking;
        let mut conn = self.open_transport().await?;

        conn.send(&HandshakeC2s::new(
            &self.target_host,
            self.target_port,
            HandshakeNextState::Login,
        ))
        .await?;
        self.state = ConnectionState::Login;
        conn.send(&LoginStartC2s {
            username: &self.username,
        })
        .await?;
        HordeLogger::session_connected(&self.username, self.proxy.as_ref());
        self.state = ConnectionState::Play;

        loop {
            let frame = match conn.recv_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    HordeLogger::session_closed(&self.username);
                    return Ok(());
                }
                // Same containment as the probe: a malformed frame never
                // takes the session down.
                Err(SessionError::Proto(err)) => {
                    HordeLogger::malformed_frame(&self.username, &err);
                    conn.resync();
                    continue;
                }
                Err(err) => return Err(err),
            };

            match frame.decode_clientbound(self.state) {
                Ok(ClientboundPacket::KeepAlive(ka)) => {
                    conn.send_raw(&frame.to_wire_bytes()?).await?;
                    HordeLogger::keep_alive_echoed(&self.username, ka.keep_alive_id);
                }
                Ok(_) => {}
                Err(err) => {
                    HordeLogger::malformed_frame(&self.username, &err);
                    conn.resync();
                }
            }
        }
    }
}
