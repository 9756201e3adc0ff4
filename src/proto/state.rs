/// Protocol state used to select packet IDs. Transitions are one-way within
/// a connection: Handshaking -> Status for a probe, Handshaking -> Login ->
/// Play for a connect session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Handshaking,
    Status,
    Login,
    Play,
}

/// Next state value in the handshake packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeNextState {
    Status,
    Login,
}
