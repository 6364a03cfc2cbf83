//! 29-bit extended identifier used on the module bus.
//!
//! Layout, MSB to LSB:
//!
//! | field        | bits  | width |
//! |--------------|-------|-------|
//! | error code   | 28-26 | 3     |
//! | device scope | 25-22 | 4     |
//! | command      | 21-16 | 6     |
//! | destination  | 15-8  | 8     |
//! | source       | 7-0   | 8     |

use super::command::CommandCode;
use crate::error::IdentifierError;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

pub const ID_MASK: u32 = 0x1FFF_FFFF;

pub const ERROR_CODE_MAX: u8 = 0x07;
pub const SCOPE_MAX: u8 = 0x0F;
pub const COMMAND_MAX: u8 = 0x3F;

const ERROR_CODE_SHIFT: u32 = 26;
const SCOPE_SHIFT: u32 = 22;
const COMMAND_SHIFT: u32 = 16;
const DESTINATION_SHIFT: u32 = 8;

pub const SCOPE_MODULE: u8 = 0x0A;
pub const SCOPE_GROUP: u8 = 0x0B;

/// Destination that every module accepts regardless of scope.
pub const BROADCAST_ADDRESS: u8 = 0x3F;
pub const MAX_MODULE_ID: u8 = 0x3B;
/// Address used by monitoring clients when they issue requests.
pub const MONITOR_ADDRESS: u8 = 0xF0;

/// Heartbeat identifier with the module id left zero. Decodes to error
/// code 1, scope 0x0D, command 0x17, destination 0xF8.
pub const HEARTBEAT_ID_BASE: u32 = 0x0757_F800;

const_assert!(MAX_MODULE_ID < BROADCAST_ADDRESS);
const_assert!(HEARTBEAT_ID_BASE & 0xFF == 0);
const_assert!(HEARTBEAT_ID_BASE <= ID_MASK);

/// Device-scope field of the identifier. Build it with
/// [`Scope::from_code`] to get the canonical variant for a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Scope {
    /// Unicast to one module (0x0A).
    Module,
    /// Multicast to a group of modules (0x0B).
    Group,
    /// Any other 4-bit value, e.g. the heartbeat's reserved pattern.
    Other(u8),
}

impl Scope {
    pub const fn code(self) -> u8 {
        match self {
            Scope::Module => SCOPE_MODULE,
            Scope::Group => SCOPE_GROUP,
            Scope::Other(code) => code,
        }
    }

    pub const fn from_code(code: u8) -> Self {
        match code {
            SCOPE_MODULE => Scope::Module,
            SCOPE_GROUP => Scope::Group,
            other => Scope::Other(other),
        }
    }
}

/// A decoded bus identifier. Fields are validated on construction, so
/// [`Identifier::to_raw`] never loses bits. Serialized as the raw 29-bit
/// value; deserializing goes through [`Identifier::try_from_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Identifier {
    error_code: u8,
    scope: Scope,
    command: u8,
    destination: u8,
    source: u8,
}

impl Identifier {
    pub fn new(
        error_code: u8,
        scope: Scope,
        command: u8,
        destination: u8,
        source: u8,
    ) -> Result<Self, IdentifierError> {
        if error_code > ERROR_CODE_MAX {
            return Err(IdentifierError::ErrorCodeOutOfRange(error_code));
        }
        if scope.code() > SCOPE_MAX {
            return Err(IdentifierError::ScopeOutOfRange(scope.code()));
        }
        if command > COMMAND_MAX {
            return Err(IdentifierError::CommandOutOfRange(command));
        }

        Ok(Self {
            error_code,
            scope: Scope::from_code(scope.code()),
            command,
            destination,
            source,
        })
    }

    /// Normal-traffic request (error code 0).
    pub fn request(
        scope: Scope,
        command: u8,
        destination: u8,
        source: u8,
    ) -> Result<Self, IdentifierError> {
        Self::new(0, scope, command, destination, source)
    }

    /// Request for a known command. Every [`CommandCode`] fits the 6-bit
    /// field, so only the scope needs masking.
    pub const fn for_command(
        scope: Scope,
        command: CommandCode,
        destination: u8,
        source: u8,
    ) -> Self {
        Self {
            error_code: 0,
            scope: Scope::from_code(scope.code() & SCOPE_MAX),
            command: command.code(),
            destination,
            source,
        }
    }

    /// Reply to `request`: unicast scope, echoed command, addressed back to
    /// the requester and sourced from `module_id`.
    pub fn reply_to(request: &Identifier, module_id: u8) -> Self {
        Self {
            error_code: 0,
            scope: Scope::Module,
            command: request.command,
            destination: request.source,
            source: module_id,
        }
    }

    pub const fn heartbeat(module_id: u8) -> Self {
        Self::from_raw(HEARTBEAT_ID_BASE | module_id as u32)
    }

    /// Pure bit extraction. Bits above 28 are ignored.
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            error_code: ((raw >> ERROR_CODE_SHIFT) & ERROR_CODE_MAX as u32) as u8,
            scope: Scope::from_code(((raw >> SCOPE_SHIFT) & SCOPE_MAX as u32) as u8),
            command: ((raw >> COMMAND_SHIFT) & COMMAND_MAX as u32) as u8,
            destination: ((raw >> DESTINATION_SHIFT) & 0xFF) as u8,
            source: (raw & 0xFF) as u8,
        }
    }

    /// Like [`Identifier::from_raw`] but rejects values wider than 29 bits.
    pub fn try_from_raw(raw: u32) -> Result<Self, IdentifierError> {
        if raw > ID_MASK {
            return Err(IdentifierError::RawOutOfRange(raw));
        }
        Ok(Self::from_raw(raw))
    }

    pub const fn to_raw(&self) -> u32 {
        ((self.error_code as u32) << ERROR_CODE_SHIFT)
            | ((self.scope.code() as u32) << SCOPE_SHIFT)
            | ((self.command as u32) << COMMAND_SHIFT)
            | ((self.destination as u32) << DESTINATION_SHIFT)
            | self.source as u32
    }

    pub const fn error_code(&self) -> u8 {
        self.error_code
    }

    pub const fn scope(&self) -> Scope {
        self.scope
    }

    pub const fn command(&self) -> u8 {
        self.command
    }

    pub const fn destination(&self) -> u8 {
        self.destination
    }

    pub const fn source(&self) -> u8 {
        self.source
    }

    pub const fn is_broadcast(&self) -> bool {
        self.destination == BROADCAST_ADDRESS
    }

    /// True when the identifier carries the heartbeat pattern in its upper
    /// 21 bits.
    pub const fn is_heartbeat(&self) -> bool {
        self.to_raw() & !0xFF == HEARTBEAT_ID_BASE
    }
}

impl TryFrom<u32> for Identifier {
    type Error = IdentifierError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::try_from_raw(raw)
    }
}

impl From<Identifier> for u32 {
    fn from(id: Identifier) -> Self {
        id.to_raw()
    }
}

impl core::fmt::Display for Identifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:#010X} (err={} scope={:#04X} cmd={:#04X} dest={:#04X} src={:#04X})",
            self.to_raw(),
            self.error_code,
            self.scope.code(),
            self.command,
            self.destination,
            self.source
        )
    }
}

/// Packs the five fields into a 29-bit identifier, rejecting fields that
/// exceed their declared width.
pub fn encode_id(
    error_code: u8,
    scope: u8,
    command: u8,
    destination: u8,
    source: u8,
) -> Result<u32, IdentifierError> {
    Identifier::new(error_code, Scope::from_code(scope), command, destination, source)
        .map(|id| id.to_raw())
}

/// Splits a raw identifier into `(error_code, scope, command, destination, source)`.
pub const fn decode_id(raw: u32) -> (u8, u8, u8, u8, u8) {
    let id = Identifier::from_raw(raw);
    (
        id.error_code,
        id.scope.code(),
        id.command,
        id.destination,
        id.source,
    )
}
