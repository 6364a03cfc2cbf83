use crate::config::SimulatorConfig;
use crate::device::{DeviceState, ModuleStatus};
use crate::error::{AgentError, TransportError};
use crate::heartbeat::{HeartbeatEmitter, HeartbeatStats};
use crate::router::CommandRouter;
use crate::transport::{FrameBus, UdpMulticastBus};
use rand::rngs::StdRng;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReceiveStats {
    pub frames_received: u64,
    pub replies_sent: u64,
    pub send_failures: u64,
    pub receive_failures: u64,
}

/// Totals reported when the agent stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgentReport {
    pub receive: ReceiveStats,
    pub heartbeat: HeartbeatStats,
}

/// Cooperative stop signal shared with the agent's loops. Each loop
/// notices it at its next wake point.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// One simulated module attached to a bus: a receive/route loop and a
/// heartbeat loop running side by side.
pub struct ModuleAgent<B, R = StdRng> {
    bus: Arc<B>,
    router: CommandRouter,
    heartbeat: HeartbeatEmitter<R>,
    shutdown: Arc<watch::Sender<bool>>,
    status: watch::Sender<ModuleStatus>,
}

impl<B: FrameBus> ModuleAgent<B, StdRng> {
    pub fn new(bus: Arc<B>, device: DeviceState) -> Self {
        let heartbeat = HeartbeatEmitter::new(device.module_id());
        Self::with_heartbeat(bus, device, heartbeat)
    }
}

impl ModuleAgent<UdpMulticastBus, StdRng> {
    /// Validates `config`, joins the multicast bus and builds the agent.
    pub async fn from_config(config: &SimulatorConfig) -> Result<Self, AgentError> {
        config.validate()?;
        let bus = UdpMulticastBus::bind(&config.bus).await?;
        let device = DeviceState::new(config.module_id, config.group_id);
        let heartbeat = HeartbeatEmitter::new(config.module_id).with_config(&config.heartbeat);
        Ok(Self::with_heartbeat(Arc::new(bus), device, heartbeat))
    }
}

impl<B: FrameBus, R: Rng> ModuleAgent<B, R> {
    pub fn with_heartbeat(
        bus: Arc<B>,
        device: DeviceState,
        heartbeat: HeartbeatEmitter<R>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let (status, _) = watch::channel(device.status());
        Self {
            bus,
            router: CommandRouter::new(device),
            heartbeat,
            shutdown: Arc::new(shutdown),
            status,
        }
    }

    pub fn module_id(&self) -> u8 {
        self.router.module_id()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown),
        }
    }

    /// Snapshots of the device, refreshed after every routed frame.
    pub fn status_receiver(&self) -> watch::Receiver<ModuleStatus> {
        self.status.subscribe()
    }

    pub fn get_status(&self) -> ModuleStatus {
        self.router.device().status()
    }

    /// Runs both loops until the shutdown handle is triggered or the bus
    /// closes. Transport failures are logged and counted; they never stop
    /// a loop.
    pub async fn run(self) -> AgentReport {
        let ModuleAgent {
            bus,
            mut router,
            mut heartbeat,
            shutdown,
            status,
        } = self;

        info!(
            module_id = router.module_id(),
            group_id = router.device().group_id(),
            transport = bus.name(),
            "module agent starting"
        );

        let heartbeat_loop = heartbeat.run(bus.as_ref(), shutdown.subscribe());
        let receive_loop = receive_loop(bus.as_ref(), &mut router, &status, &shutdown);
        let (heartbeat, receive) = tokio::join!(heartbeat_loop, receive_loop);

        let report = AgentReport { receive, heartbeat };
        info!(
            module_id = router.module_id(),
            frames = report.receive.frames_received,
            replies = report.receive.replies_sent,
            heartbeats = report.heartbeat.sent,
            "module agent stopped"
        );
        report
    }
}

async fn receive_loop<B: FrameBus + ?Sized>(
    bus: &B,
    router: &mut CommandRouter,
    status: &watch::Sender<ModuleStatus>,
    stop: &watch::Sender<bool>,
) -> ReceiveStats {
    let mut stats = ReceiveStats::default();
    let mut shutdown = stop.subscribe();

    while !*shutdown.borrow() {
        let received = tokio::select! {
            received = bus.recv() => received,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        };

        let frame = match received {
            Ok(frame) => frame,
            Err(TransportError::Closed) => {
                // Nothing more will arrive; take the heartbeat down too.
                warn!("bus closed, stopping module agent");
                stop.send_replace(true);
                break;
            }
            Err(e) => {
                stats.receive_failures += 1;
                warn!("receive failed: {}", e);
                continue;
            }
        };

        stats.frames_received += 1;
        let reply = router.handle_frame(&frame);

        let snapshot = router.device().status();
        status.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });

        if let Some(reply) = reply {
            match bus.send(&reply).await {
                Ok(()) => stats.replies_sent += 1,
                Err(e) => {
                    stats.send_failures += 1;
                    warn!("reply send failed: {}", e);
                }
            }
        }
    }

    stats
}
