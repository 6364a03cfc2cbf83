//! Request builders and reply decoders for monitoring clients.
//!
//! Requests and replies go through the same identifier and payload codecs
//! the module uses, so a client built on this module stays symmetric with
//! the simulator.

use crate::error::{PayloadError, TransportError};
use crate::protocol::identifier::MONITOR_ADDRESS;
use crate::protocol::payload::{
    pack_u32_pair, to_fixed_u32, unpack_f32_pair, unpack_u16_quad, unpack_u32_pair, Payload,
    MAX_PAYLOAD_LEN,
};
use crate::protocol::{CommandCode, Frame, Identifier, Scope, BROADCAST_ADDRESS};
use crate::transport::FrameBus;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Who a request is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Target {
    Module(u8),
    Group(u8),
    Broadcast,
}

impl Target {
    pub fn scope(self) -> Scope {
        match self {
            Target::Module(_) | Target::Broadcast => Scope::Module,
            Target::Group(_) => Scope::Group,
        }
    }

    pub fn destination(self) -> u8 {
        match self {
            Target::Module(id) | Target::Group(id) => id,
            Target::Broadcast => BROADCAST_ADDRESS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Request {
    ReadSystem,
    ReadModule,
    ReadStatus,
    ReadSystemFixed,
    ReadModuleFixed,
    ReadInfo,
    ReadExternal,
    PowerOn,
    PowerOff,
    /// Volts and amps, sent as mV/mA.
    SetOutput { voltage: f64, current: f64 },
    SetOutputFixed { voltage: f64, current: f64 },
}

impl Request {
    pub fn command(&self) -> CommandCode {
        match self {
            Request::ReadSystem => CommandCode::ReadSystemFloat,
            Request::ReadModule => CommandCode::ReadModuleFloat,
            Request::ReadStatus => CommandCode::ReadStatus,
            Request::ReadSystemFixed => CommandCode::ReadSystemFixed,
            Request::ReadModuleFixed => CommandCode::ReadModuleFixed,
            Request::ReadInfo => CommandCode::ReadModuleInfo,
            Request::ReadExternal => CommandCode::ReadExternalState,
            Request::PowerOn | Request::PowerOff => CommandCode::PowerControl,
            Request::SetOutput { .. } => CommandCode::SetOutput,
            Request::SetOutputFixed { .. } => CommandCode::SetOutputFixed,
        }
    }

    /// Eight bytes, zero-padded.
    pub fn payload(&self) -> Payload {
        match *self {
            Request::PowerOff => power_payload(false),
            Request::PowerOn => power_payload(true),
            Request::SetOutput { voltage, current }
            | Request::SetOutputFixed { voltage, current } => output_payload(voltage, current),
            _ => [0u8; MAX_PAYLOAD_LEN].into_iter().collect(),
        }
    }

    pub fn frame(&self, target: Target, source: u8) -> Frame {
        let id = Identifier::for_command(
            target.scope(),
            self.command(),
            target.destination(),
            source,
        );
        Frame::with_payload(id, self.payload())
    }
}

fn power_payload(on: bool) -> Payload {
    let switch = if on { 0x00 } else { 0x01 };
    [switch, 0, 0, 0, 0, 0, 0, 0].into_iter().collect()
}

/// Set-output payload: voltage in mV then current in mA, big-endian,
/// rounded to the nearest unit.
pub fn output_payload(voltage: f64, current: f64) -> Payload {
    pack_u32_pair(
        to_fixed_u32((voltage * 1000.0).round(), 1.0),
        to_fixed_u32((current * 1000.0).round(), 1.0),
    )
}

/// A reply payload decoded according to the command it answers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodedReply {
    Measurement { voltage: f32, current: f32 },
    FixedMeasurement { voltage_mv: u32, current_ma: u32 },
    Status { status_bytes: [u8; 4], temperature_c: i8 },
    Info { voltage_max: f64, voltage_min: f64, max_current: f64, rated_power: f64 },
    External { voltage: f64, allowed_current: f64 },
    PowerState { powered_on: bool },
    OutputSetting { voltage_mv: u32, current_ma: u32 },
    Heartbeat { module_id: u8 },
    Unknown { command: u8, data: Payload },
}

impl DecodedReply {
    pub fn decode(frame: &Frame) -> Result<Self, PayloadError> {
        let id = frame.id();
        let data = frame.data();

        if id.is_heartbeat() {
            return Ok(DecodedReply::Heartbeat {
                module_id: id.source(),
            });
        }

        let Some(code) = CommandCode::from_code(id.command()) else {
            return Ok(DecodedReply::Unknown {
                command: id.command(),
                data: frame.payload().clone(),
            });
        };

        let reply = match code {
            CommandCode::ReadSystemFloat | CommandCode::ReadModuleFloat => {
                let (voltage, current) = unpack_f32_pair(data)?;
                DecodedReply::Measurement { voltage, current }
            }
            CommandCode::ReadSystemFixed | CommandCode::ReadModuleFixed => {
                let (voltage_mv, current_ma) = unpack_u32_pair(data)?;
                DecodedReply::FixedMeasurement {
                    voltage_mv,
                    current_ma,
                }
            }
            CommandCode::ReadStatus => {
                ensure(data, 5)?;
                DecodedReply::Status {
                    status_bytes: [data[0], data[1], data[2], data[3]],
                    temperature_c: data[4] as i8,
                }
            }
            CommandCode::ReadModuleInfo => {
                let [vmax, vmin, imax, power] = unpack_u16_quad(data)?;
                DecodedReply::Info {
                    voltage_max: f64::from(vmax) / 10.0,
                    voltage_min: f64::from(vmin) / 10.0,
                    max_current: f64::from(imax) / 10.0,
                    rated_power: f64::from(power) * 10.0,
                }
            }
            CommandCode::ReadExternalState => {
                let [voltage, allowed, _, _] = unpack_u16_quad(data)?;
                DecodedReply::External {
                    voltage: f64::from(voltage) / 10.0,
                    allowed_current: f64::from(allowed) / 10.0,
                }
            }
            CommandCode::PowerControl => {
                ensure(data, 1)?;
                DecodedReply::PowerState {
                    powered_on: data[0] == 0x00,
                }
            }
            CommandCode::SetOutput | CommandCode::SetOutputFixed => {
                let (voltage_mv, current_ma) = unpack_u32_pair(data)?;
                DecodedReply::OutputSetting {
                    voltage_mv,
                    current_ma,
                }
            }
        };
        Ok(reply)
    }
}

impl core::fmt::Display for DecodedReply {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodedReply::Measurement { voltage, current } => {
                write!(f, "voltage {:.1} V, current {:.1} A", voltage, current)
            }
            DecodedReply::FixedMeasurement {
                voltage_mv,
                current_ma,
            } => write!(f, "voltage {} mV, current {} mA", voltage_mv, current_ma),
            DecodedReply::Status {
                status_bytes,
                temperature_c,
            } => {
                let state = if status_bytes.iter().all(|b| *b == 0) {
                    "no alarms"
                } else {
                    "alarms raised"
                };
                write!(f, "ambient {} °C, {}", temperature_c, state)
            }
            DecodedReply::Info {
                voltage_max,
                voltage_min,
                max_current,
                rated_power,
            } => write!(
                f,
                "{:.1}-{:.1} V, max {:.1} A, rated {:.0} W",
                voltage_min, voltage_max, max_current, rated_power
            ),
            DecodedReply::External {
                voltage,
                allowed_current,
            } => write!(
                f,
                "external voltage {:.1} V, allowed current {:.1} A",
                voltage, allowed_current
            ),
            DecodedReply::PowerState { powered_on } => {
                write!(f, "power {}", if *powered_on { "on" } else { "off" })
            }
            DecodedReply::OutputSetting {
                voltage_mv,
                current_ma,
            } => write!(
                f,
                "setpoint {:.1} V / {:.1} A",
                f64::from(*voltage_mv) / 1000.0,
                f64::from(*current_ma) / 1000.0
            ),
            DecodedReply::Heartbeat { module_id } => write!(f, "heartbeat from {:#04X}", module_id),
            DecodedReply::Unknown { command, data } => {
                write!(f, "command {:#04X}, {} data bytes", command, data.len())
            }
        }
    }
}

fn ensure(data: &[u8], needed: usize) -> Result<(), PayloadError> {
    if data.len() < needed {
        return Err(PayloadError::TooShort {
            needed,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Sends requests on a bus and waits for matching replies.
pub struct BusClient<B> {
    bus: Arc<B>,
    source: u8,
}

impl<B: FrameBus> BusClient<B> {
    pub fn new(bus: Arc<B>) -> Self {
        Self::with_source(bus, MONITOR_ADDRESS)
    }

    pub fn with_source(bus: Arc<B>, source: u8) -> Self {
        Self { bus, source }
    }

    pub fn source(&self) -> u8 {
        self.source
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Fire-and-forget send.
    pub async fn send(&self, request: Request, target: Target) -> Result<Frame, TransportError> {
        let frame = request.frame(target, self.source);
        self.bus.send(&frame).await?;
        debug!(target = ?target, "sent {}", frame);
        Ok(frame)
    }

    /// Sends `request` and returns the first reply to it seen within
    /// `wait`, or `None` if the module stayed silent.
    pub async fn request(
        &self,
        request: Request,
        target: Target,
        wait: Duration,
    ) -> Result<Option<Frame>, TransportError> {
        let sent = self.send(request, target).await?;
        let deadline = Instant::now() + wait;

        loop {
            let frame = match tokio::time::timeout_at(deadline, self.bus.recv()).await {
                Err(_) => return Ok(None),
                Ok(Err(TransportError::Closed)) => return Err(TransportError::Closed),
                Ok(Err(e)) => {
                    debug!("skipping unreadable frame: {}", e);
                    continue;
                }
                Ok(Ok(frame)) => frame,
            };

            if self.is_reply_to(&sent, &frame) {
                return Ok(Some(frame));
            }
        }
    }

    fn is_reply_to(&self, request: &Frame, candidate: &Frame) -> bool {
        let id = candidate.id();
        id.scope() == Scope::Module
            && id.destination() == self.source
            && id.source() != self.source
            && id.command() == request.id().command()
            && !id.is_heartbeat()
    }
}
