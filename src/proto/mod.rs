//! Minimal Minecraft protocol framing for handshake, status, login start,
//! and the Play-phase keep-alive echo.

mod error;
mod io;
mod packets;
mod state;
mod text;
mod types;
mod varint;


pub use error::{ProtoError, Result};
pub use packets::{
    ClientboundPacket, HandshakeC2s, KeepAliveS2c, LoginStartC2s, StatusPingC2s, StatusPongS2c,
    StatusRequestC2s, StatusResponseS2c, PROTOCOL_VERSION,
};
pub use state::{ConnectionState, HandshakeNextState};
pub use text::{escape_raw_newlines, motd_from_status_json, strip_legacy_formatting};
pub use types::{
    encode_packet, encode_raw_packet, PacketDecode, PacketDecoder, PacketEncode, PacketEncoder,
    PacketFrame, MAX_PACKET_SIZE,
};
