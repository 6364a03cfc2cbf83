//! Frame-to-command routing.
//!
//! [`CommandRouter`] owns the [`DeviceState`] exclusively: the receive loop
//! is its only writer, so no lock is involved. Readers elsewhere get
//! [`crate::device::ModuleStatus`] snapshots.

use crate::device::DeviceState;
use crate::error::{PayloadError, RouteError};
use crate::protocol::identifier::{BROADCAST_ADDRESS, SCOPE_GROUP, SCOPE_MODULE};
use crate::protocol::payload::{
    pack_f32_pair, pack_u16_quad, pack_u32_pair, to_fixed_u16, to_fixed_u32,
    unpack_u32_pair, Payload,
};
use crate::protocol::{CommandCode, Frame, Identifier, Scope};
use tracing::{debug, info, trace, warn};

const POWER_ON: u8 = 0x00;
const STATE_ON: u8 = 0x00;
const STATE_OFF: u8 = 0x01;

/// Addressing rule: broadcast destination always matches; otherwise the
/// destination must equal the module id under unicast scope or the group
/// id under group scope.
pub fn is_addressed_to(scope: Scope, destination: u8, module_id: u8, group_id: u8) -> bool {
    if destination == BROADCAST_ADDRESS {
        return true;
    }
    match scope.code() {
        SCOPE_MODULE => destination == module_id,
        SCOPE_GROUP => destination == group_id,
        _ => false,
    }
}

#[derive(Debug)]
pub struct CommandRouter {
    device: DeviceState,
}

impl CommandRouter {
    pub fn new(device: DeviceState) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &DeviceState {
        &self.device
    }

    pub fn module_id(&self) -> u8 {
        self.device.module_id()
    }

    pub fn is_for_me(&self, id: &Identifier) -> bool {
        is_addressed_to(
            id.scope(),
            id.destination(),
            self.device.module_id(),
            self.device.group_id(),
        )
    }

    /// Filters, routes and wraps the reply for one inbound frame.
    ///
    /// Frames sourced from this module (its own echo) and frames addressed
    /// elsewhere are dropped. Malformed payloads are logged and produce no
    /// reply.
    pub fn handle_frame(&mut self, frame: &Frame) -> Option<Frame> {
        let id = frame.id();

        if id.source() == self.device.module_id() {
            trace!(id = %id, "dropping own echo");
            return None;
        }
        if !self.is_for_me(id) {
            trace!(id = %id, "frame not addressed to this module");
            return None;
        }

        debug!(
            cmd = id.command(),
            src = id.source(),
            dest = id.destination(),
            "routing frame {}",
            frame
        );

        match self.route(
            id.command(),
            frame.data(),
            id.source(),
            id.scope(),
            id.destination(),
        ) {
            Ok(Some(payload)) => {
                let reply_id = Identifier::reply_to(id, self.device.module_id());
                let reply = Frame::with_payload(reply_id, payload);
                info!(cmd = id.command(), dest = id.source(), "reply {}", reply);
                Some(reply)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(src = id.source(), "rejected frame: {}", e);
                None
            }
        }
    }

    /// Dispatches one command. `Ok(None)` means no reply is due; unknown
    /// commands are ignored.
    pub fn route(
        &mut self,
        command: u8,
        payload: &[u8],
        source: u8,
        scope: Scope,
        destination: u8,
    ) -> Result<Option<Payload>, RouteError> {
        let Some(code) = CommandCode::from_code(command) else {
            debug!(cmd = command, src = source, "ignoring unknown command");
            return Ok(None);
        };

        let reply = match code {
            // Single-module deployment: the system reading is the module reading.
            CommandCode::ReadSystemFloat | CommandCode::ReadModuleFloat => {
                Some(self.measured_float())
            }
            CommandCode::ReadStatus => Some(self.status_payload()),
            CommandCode::ReadSystemFixed | CommandCode::ReadModuleFixed => {
                Some(self.measured_fixed())
            }
            CommandCode::ReadModuleInfo => Some(self.module_info()),
            CommandCode::ReadExternalState => Some(self.external_state()),
            CommandCode::PowerControl => {
                self.power_control(payload)?;
                if scope.code() == SCOPE_MODULE && destination != BROADCAST_ADDRESS {
                    Some(self.power_state())
                } else {
                    None
                }
            }
            CommandCode::SetOutput => {
                self.set_output(code, payload)?;
                Some(self.output_setting())
            }
            // TODO: 0x1B replies even to broadcast while 0x1C stays silent;
            // confirm against the module firmware which one is intended.
            CommandCode::SetOutputFixed => {
                self.set_output(code, payload)?;
                if destination != BROADCAST_ADDRESS {
                    Some(self.output_setting())
                } else {
                    None
                }
            }
        };

        Ok(reply)
    }

    fn measured_float(&self) -> Payload {
        let (voltage, current) = self.device.measured();
        pack_f32_pair(voltage as f32, current as f32)
    }

    fn measured_fixed(&self) -> Payload {
        let (voltage, current) = self.device.measured();
        pack_u32_pair(to_fixed_u32(voltage, 1000.0), to_fixed_u32(current, 1000.0))
    }

    fn status_payload(&self) -> Payload {
        // Bytes 0-3 are the alarm tables, byte 4 the ambient temperature.
        let mut payload: Payload = [0u8; 8].into_iter().collect();
        payload[4] = self.device.ambient_temperature() as u8;
        payload
    }

    fn module_info(&self) -> Payload {
        let caps = self.device.capabilities();
        pack_u16_quad([
            to_fixed_u16(caps.voltage_max, 10.0),
            to_fixed_u16(caps.voltage_min, 10.0),
            to_fixed_u16(caps.max_current, 10.0),
            to_fixed_u16(caps.rated_power / 10.0, 1.0),
        ])
    }

    /// Voltage travels in 0.1 V units in a 16-bit field. A measured voltage
    /// above 6553.5 V saturates to 0xFFFF and is logged.
    fn external_state(&self) -> Payload {
        let (voltage, _) = self.device.measured();
        if voltage * 10.0 > f64::from(u16::MAX) {
            warn!(
                module_id = self.device.module_id(),
                "external voltage {:.1} V exceeds the 16-bit field, reporting 6553.5 V", voltage
            );
        }
        let allowed_current = if self.device.is_powered_on() {
            to_fixed_u16(self.device.capabilities().max_current, 10.0)
        } else {
            0
        };
        pack_u16_quad([to_fixed_u16(voltage, 10.0), allowed_current, 0, 0])
    }

    fn power_control(&mut self, payload: &[u8]) -> Result<(), RouteError> {
        let Some(&switch) = payload.first() else {
            return Err(RouteError::Payload {
                command: CommandCode::PowerControl.code(),
                source: PayloadError::TooShort {
                    needed: 1,
                    actual: 0,
                },
            });
        };

        if switch == POWER_ON {
            self.device.power_on();
            info!(module_id = self.device.module_id(), "power on");
        } else {
            self.device.power_off();
            info!(module_id = self.device.module_id(), "power off");
        }
        Ok(())
    }

    fn power_state(&self) -> Payload {
        let state = if self.device.is_powered_on() {
            STATE_ON
        } else {
            STATE_OFF
        };
        [state, 0, 0, 0, 0, 0, 0, 0].into_iter().collect()
    }

    fn set_output(&mut self, code: CommandCode, payload: &[u8]) -> Result<(), RouteError> {
        let (voltage_mv, current_ma) =
            unpack_u32_pair(payload).map_err(|source| RouteError::Payload {
                command: code.code(),
                source,
            })?;

        self.device.apply_setpoint_fixed(voltage_mv, current_ma);
        let (voltage, current) = self.device.setpoint();
        info!(
            module_id = self.device.module_id(),
            "setpoint {:.3} V / {:.3} A", voltage, current
        );
        Ok(())
    }

    fn output_setting(&self) -> Payload {
        let (voltage_mv, current_ma) = self.device.setpoint_fixed();
        pack_u32_pair(voltage_mv, current_ma)
    }
}
