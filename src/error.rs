use thiserror::Error;

/// Raised when an identifier field does not fit its bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("error code {0:#x} exceeds 3 bits")]
    ErrorCodeOutOfRange(u8),
    #[error("device scope {0:#x} exceeds 4 bits")]
    ScopeOutOfRange(u8),
    #[error("command {0:#x} exceeds 6 bits")]
    CommandOutOfRange(u8),
    #[error("raw identifier {0:#x} is wider than 29 bits")]
    RawOutOfRange(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload too short: needed {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("payload of {0} bytes exceeds the 8 byte frame limit")]
    TooLong(usize),
}

/// Failures while turning a datagram into a [`crate::protocol::Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("datagram length {0} does not match the 13 byte frame layout")]
    InvalidLength(usize),
    #[error("frame does not carry the extended identifier flag")]
    NotExtended,
    #[error("data length code {0} exceeds 8")]
    InvalidDlc(u8),
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bus I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),
    #[error("bus closed")]
    Closed,
    #[error("receiver lagged, {0} frames dropped")]
    Lagged(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("malformed payload for command {command:#04x}: {source}")]
    Payload {
        command: u8,
        #[source]
        source: PayloadError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("module id {0:#04x} outside 0x00..=0x3B")]
    ModuleIdOutOfRange(u8),
    #[error("group id {0:#04x} collides with the broadcast address")]
    GroupIdIsBroadcast(u8),
    #[error("{0} is not a multicast address")]
    NotMulticast(std::net::Ipv4Addr),
    #[error("heartbeat period range {min_ms}..={max_ms} ms is empty")]
    HeartbeatRange { min_ms: u64, max_ms: u64 },
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
