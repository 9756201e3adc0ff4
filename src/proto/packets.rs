use super::{
    error::{debug_log_error, ProtoError, Result},
    io::{read_i64_be, read_string, read_string_lossy, write_i64_be, write_string, write_u16_be},
    state::{ConnectionState, HandshakeNextState},
    types::{PacketDecode, PacketEncode, PacketFrame},
    varint::{read_varint, write_varint},
};

/// The one protocol revision this client speaks (1.8.x).
pub const PROTOCOL_VERSION: i32 = 47;

/// Handshake (C2S) packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeC2s<'a> {
    pub protocol_version: i32,
    pub server_address: &'a str,
    pub server_port: u16,
    pub next_state: HandshakeNextState,
}

impl<'a> HandshakeC2s<'a> {
    pub fn new(server_address: &'a str, server_port: u16, next_state: HandshakeNextState) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            server_address,
            server_port,
            next_state,
        }
    }
}

/// Status request (C2S) packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRequestC2s;

/// Status ping (C2S) packet. The payload is opaque to the server; the pong
/// echo is not validated against it, this is a liveness check only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPingC2s {
    pub payload: i64,
}

/// Login start (C2S) packet. Protocol 47 carries the bare username only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginStartC2s<'a> {
    pub username: &'a str,
}

/// Status response (S2C) packet wrapping the status JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponseS2c {
    pub json: String,
}

/// Status pong (S2C) packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPongS2c {
    pub payload: i64,
}

/// Keep-alive (S2C) packet in the Play phase. Trailing body bytes are kept
/// untouched so the echo can be byte-identical regardless of how the server
/// shapes the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveS2c {
    pub keep_alive_id: i32,
}

/// Any clientbound packet this client recognizes, tagged by state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientboundPacket {
    StatusResponse(StatusResponseS2c),
    Pong(StatusPongS2c),
    KeepAlive(KeepAliveS2c),
    /// Anything the per-state dispatch has no decoder for. The session
    /// ignores these rather than failing.
    Unknown { id: i32 },
}

impl PacketFrame {
    pub fn decode_clientbound(&self, state: ConnectionState) -> Result<ClientboundPacket> {
        ClientboundPacket::decode(state, self)
    }
}

impl ClientboundPacket {
    pub fn decode(state: ConnectionState, frame: &PacketFrame) -> Result<Self> {
        let mut input = frame.body.as_slice();
        let packet = match state {
            ConnectionState::Status => match frame.id {
                StatusResponseS2c::ID => {
                    StatusResponseS2c::decode_body(&mut input).map(Self::StatusResponse)
                }
                StatusPongS2c::ID => StatusPongS2c::decode_body(&mut input).map(Self::Pong),
                id => return Ok(Self::Unknown { id }),
            },
            ConnectionState::Play => match frame.id {
                KeepAliveS2c::ID => KeepAliveS2c::decode_body(&mut input).map(Self::KeepAlive),
                id => return Ok(Self::Unknown { id }),
            },
            // No clientbound traffic is expected before the server switches
            // us out of these states; surface whatever shows up as unknown.
            ConnectionState::Handshaking | ConnectionState::Login => {
                return Ok(Self::Unknown { id: frame.id })
            }
        };

        match packet {
            Ok(value) => Ok(value),
            Err(err) => {
                debug_log_error("packet body decode failed", &err);
                Err(err)
            }
        }
    }
}

impl<'a> PacketEncode for HandshakeC2s<'a> {
    const ID: i32 = 0x00;

    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_varint(out, self.protocol_version);
        write_string(out, self.server_address)?;
        write_u16_be(out, self.server_port);
        let next = match self.next_state {
            HandshakeNextState::Status => 1,
            HandshakeNextState::Login => 2,
        };
        write_varint(out, next);
        Ok(())
    }
}

impl<'a> PacketDecode<'a> for HandshakeC2s<'a> {
    const ID: i32 = 0x00;

    fn decode_body(input: &mut &'a [u8]) -> Result<Self> {
        let protocol_version = read_varint(input)?;
        let server_address = read_string(input)?;
        let server_port = super::io::read_u16_be(input)?;
        let next_state = match read_varint(input)? {
            1 => HandshakeNextState::Status,
            2 => HandshakeNextState::Login,
            other => return Err(ProtoError::InvalidHandshakeState(other)),
        };

        Ok(Self {
            protocol_version,
            server_address,
            server_port,
            next_state,
        })
    }
}

impl PacketEncode for StatusRequestC2s {
    const ID: i32 = 0x00;

    fn encode_body(&self, _out: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }
}

impl PacketEncode for StatusPingC2s {
    const ID: i32 = 0x01;

    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_i64_be(out, self.payload);
        Ok(())
    }
}

impl<'a> PacketEncode for LoginStartC2s<'a> {
    const ID: i32 = 0x00;

    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_string(out, self.username)
    }
}

impl<'a> PacketDecode<'a> for LoginStartC2s<'a> {
    const ID: i32 = 0x00;

    fn decode_body(input: &mut &'a [u8]) -> Result<Self> {
        Ok(Self {
            username: read_string(input)?,
        })
    }
}

impl StatusResponseS2c {
    pub const ID: i32 = 0x00;

    pub fn decode_body(input: &mut &[u8]) -> Result<Self> {
        let json = read_string_lossy(input)?;
        if !input.is_empty() {
            return Err(ProtoError::TrailingBytes(input.len()));
        }
        Ok(Self { json })
    }
}

impl PacketEncode for StatusResponseS2c {
    const ID: i32 = StatusResponseS2c::ID;

    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_string(out, &self.json)
    }
}

impl StatusPongS2c {
    pub const ID: i32 = 0x01;

    pub fn decode_body(input: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            payload: read_i64_be(input)?,
        })
    }
}

impl PacketEncode for StatusPongS2c {
    const ID: i32 = StatusPongS2c::ID;

    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_i64_be(out, self.payload);
        Ok(())
    }
}

impl KeepAliveS2c {
    pub const ID: i32 = 0x00;

    pub fn decode_body(input: &mut &[u8]) -> Result<Self> {
        let keep_alive_id = read_varint(input)?;
        // Older servers pad the body; leave the remainder alone, the echo
        // works from the raw frame anyway.
        *input = &[];
        Ok(Self { keep_alive_id })
    }
}
