//! # Charger Module Bus Simulator
//!
//! Simulates one power-conversion module attached to a broadcast frame bus,
//! and provides the client side needed to talk to it.
//!
//! ## Features
//!
//! - **29-bit identifier codec**: error code, device scope, command,
//!   destination and source packed the way the module firmware expects
//! - **Command routing**: unicast, group and broadcast addressing with the
//!   module's echo filtered out
//! - **Heartbeat**: jittered liveness frames plus a listener-side monitor
//! - **Transports**: UDP multicast for real deployments, an in-process
//!   loopback bus for tests
//!
//! ## Quick Start
//!
//! ```rust
//! use chargebus::{CommandRouter, DeviceState, Frame, Identifier, Scope};
//!
//! let mut router = CommandRouter::new(DeviceState::new(0x00, 0x00));
//!
//! // Power on module 0 from the monitor address.
//! let id = Identifier::request(Scope::Module, 0x1A, 0x00, 0xF0).unwrap();
//! let request = Frame::new(id, &[0; 8]).unwrap();
//!
//! let reply = router.handle_frame(&request).unwrap();
//! assert_eq!(reply.data()[0], 0x00);
//! assert!(router.device().is_powered_on());
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - identifier, payload and frame codecs
//! - [`device`] - electrical state of the simulated module
//! - [`router`] - addressing filter and command dispatch
//! - [`heartbeat`] - heartbeat emitter and monitor
//! - [`transport`] - bus abstraction and its implementations
//! - [`agent`] - runs the receive and heartbeat loops together
//! - [`client`] - request builders and reply decoders

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod agent;
pub mod client;
pub mod config;
pub mod device;
pub mod error;
pub mod heartbeat;
pub mod protocol;
pub mod router;
pub mod transport;

// Re-export main public types for convenience
pub use agent::{AgentReport, ModuleAgent, ShutdownHandle};
pub use client::{BusClient, DecodedReply, Request, Target};
pub use config::SimulatorConfig;
pub use device::{DeviceState, ModuleStatus};
pub use heartbeat::{HeartbeatEmitter, HeartbeatMonitor, Liveness};
pub use protocol::{decode_id, encode_id, CommandCode, Frame, Identifier, Scope};
pub use router::CommandRouter;
pub use transport::{FrameBus, LoopbackBus, UdpMulticastBus};
