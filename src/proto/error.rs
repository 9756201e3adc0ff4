use std::fmt;

/// Wire decode/encode error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    UnexpectedEof,
    MalformedVarInt,
    PacketTooLarge { len: usize },
    NegativeLength(i32),
    InvalidUtf8,
    LengthTooLarge { max: usize, actual: usize },
    TrailingBytes(usize),
    InvalidHandshakeState(i32),
}

pub type Result<T> = std::result::Result<T, ProtoError>;

pub(crate) fn debug_log_error(context: &str, error: &ProtoError) {
    #[cfg(debug_assertions)]
    {
        log::debug!("{}: {:?}", context, error);
    }
    let _ = context;
    let _ = error;
}

impl fmt::Display for ProtoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for ProtoError {}
