use serde::{Deserialize, Serialize};

/// Command numbers the module answers to. Anything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandCode {
    ReadSystemFloat = 0x01,
    ReadModuleFloat = 0x03,
    ReadStatus = 0x04,
    ReadSystemFixed = 0x08,
    ReadModuleFixed = 0x09,
    ReadModuleInfo = 0x0A,
    ReadExternalState = 0x0C,
    PowerControl = 0x1A,
    SetOutput = 0x1B,
    SetOutputFixed = 0x1C,
}

/// Command field carried by heartbeat frames.
pub const HEARTBEAT_COMMAND: u8 = 0x17;

impl CommandCode {
    pub const ALL: [CommandCode; 10] = [
        CommandCode::ReadSystemFloat,
        CommandCode::ReadModuleFloat,
        CommandCode::ReadStatus,
        CommandCode::ReadSystemFixed,
        CommandCode::ReadModuleFixed,
        CommandCode::ReadModuleInfo,
        CommandCode::ReadExternalState,
        CommandCode::PowerControl,
        CommandCode::SetOutput,
        CommandCode::SetOutputFixed,
    ];

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|command| command.code() == code)
    }

    pub const fn name(self) -> &'static str {
        match self {
            CommandCode::ReadSystemFloat => "read system voltage/current",
            CommandCode::ReadModuleFloat => "read module voltage/current",
            CommandCode::ReadStatus => "read module status",
            CommandCode::ReadSystemFixed => "read system voltage/current (fixed)",
            CommandCode::ReadModuleFixed => "read module voltage/current (fixed)",
            CommandCode::ReadModuleInfo => "read module info",
            CommandCode::ReadExternalState => "read module external state",
            CommandCode::PowerControl => "power control",
            CommandCode::SetOutput => "set output",
            CommandCode::SetOutputFixed => "set output (fixed)",
        }
    }
}

impl core::fmt::Display for CommandCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#04X} {}", self.code(), self.name())
    }
}
