use crate::proto::ProtoError;

/// Everything that can end a single session. Contained per session by
/// policy: the orchestrator logs these and moves on, no error here is ever
/// escalated to the tick loop or to sibling sessions.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("Request timeout (se::rt)")]
    Timeout(#[from] tokio::time::error::Elapsed),
    #[error("Networking error - {0:?} (se::ne)")]
    Io(#[from] tokio::io::Error),
    #[error("Protocol error - {0} (se::pr)")]
    Proto(#[from] ProtoError),
    #[error("Proxy CONNECT refused with code {code:#04x} (se::px)")]
    ProxyConnect { code: u8 },
    #[error("Proxy reply truncated (se::px)")]
    ProxyReplyTruncated,
}
