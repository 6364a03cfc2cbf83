pub mod command;
pub mod frame;
pub mod identifier;
pub mod payload;

pub use command::{CommandCode, HEARTBEAT_COMMAND};
pub use frame::{Frame, DATAGRAM_LEN};
pub use identifier::{
    decode_id, encode_id, Identifier, Scope, BROADCAST_ADDRESS, HEARTBEAT_ID_BASE,
    MAX_MODULE_ID, MONITOR_ADDRESS,
};
pub use payload::{Payload, MAX_PAYLOAD_LEN};
