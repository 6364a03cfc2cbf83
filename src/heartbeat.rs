//! Heartbeat emission and monitoring.
//!
//! A module broadcasts a liveness frame roughly every 400 ms. The period is
//! drawn uniformly from 390..=410 ms on every cycle, so listeners must treat
//! 400 ms as a tolerance band. [`HeartbeatMonitor`] is the listener side:
//! it only declares a module lost after a much longer silence (1000 ms by
//! default).

use crate::config::HeartbeatConfig;
use crate::protocol::{Frame, Identifier, Payload, MAX_PAYLOAD_LEN};
use crate::transport::FrameBus;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, warn};

pub const HEARTBEAT_NOMINAL_PERIOD: Duration = Duration::from_millis(400);
pub const HEARTBEAT_MIN_PERIOD: Duration = Duration::from_millis(390);
pub const HEARTBEAT_MAX_PERIOD: Duration = Duration::from_millis(410);

pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_millis(1000);
const DEFAULT_HISTORY_LEN: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeartbeatStats {
    pub sent: u64,
    pub send_failures: u64,
}

/// Broadcasts the liveness frame on a jittered period. The random source is
/// injectable so tests can seed it.
#[derive(Debug)]
pub struct HeartbeatEmitter<R = StdRng> {
    module_id: u8,
    min_period: Duration,
    max_period: Duration,
    rng: R,
    stats: HeartbeatStats,
}

impl HeartbeatEmitter<StdRng> {
    pub fn new(module_id: u8) -> Self {
        Self::with_rng(module_id, StdRng::from_entropy())
    }
}

impl<R: Rng> HeartbeatEmitter<R> {
    pub fn with_rng(module_id: u8, rng: R) -> Self {
        Self {
            module_id,
            min_period: HEARTBEAT_MIN_PERIOD,
            max_period: HEARTBEAT_MAX_PERIOD,
            rng,
            stats: HeartbeatStats::default(),
        }
    }

    /// Overrides the jitter band. A reversed range is swapped.
    pub fn with_period_range(mut self, min: Duration, max: Duration) -> Self {
        self.min_period = min.min(max);
        self.max_period = min.max(max);
        self
    }

    pub fn with_config(self, config: &HeartbeatConfig) -> Self {
        self.with_period_range(config.min_period(), config.max_period())
    }

    pub fn module_id(&self) -> u8 {
        self.module_id
    }

    pub fn period_range(&self) -> (Duration, Duration) {
        (self.min_period, self.max_period)
    }

    pub fn stats(&self) -> HeartbeatStats {
        self.stats
    }

    /// Heartbeat identifier with the module id in the low byte and an
    /// all-zero payload.
    pub fn frame(&self) -> Frame {
        let payload: Payload = [0u8; MAX_PAYLOAD_LEN].into_iter().collect();
        Frame::with_payload(Identifier::heartbeat(self.module_id), payload)
    }

    /// Draws the next sleep uniformly from the jitter band.
    pub fn next_period(&mut self) -> Duration {
        self.rng.gen_range(self.min_period..=self.max_period)
    }

    /// Sends one heartbeat. Failures are logged and counted, never fatal.
    pub async fn beat<B: FrameBus + ?Sized>(&mut self, bus: &B) {
        let frame = self.frame();
        match bus.send(&frame).await {
            Ok(()) => {
                self.stats.sent += 1;
                debug!(module_id = self.module_id, "heartbeat {}", frame);
            }
            Err(e) => {
                self.stats.send_failures += 1;
                warn!(module_id = self.module_id, "heartbeat send failed: {}", e);
            }
        }
    }

    /// Beats until `shutdown` turns true or its sender goes away.
    pub async fn run<B: FrameBus + ?Sized>(
        &mut self,
        bus: &B,
        mut shutdown: watch::Receiver<bool>,
    ) -> HeartbeatStats {
        while !*shutdown.borrow() {
            self.beat(bus).await;

            let period = self.next_period();
            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        self.stats
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Liveness {
    NoHeartbeat,
    Alive,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntervalStats {
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub samples: usize,
}

/// Tracks heartbeats from one module: count, recent inter-arrival
/// intervals and whether the module is still considered alive.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    timeout: Duration,
    history_len: usize,
    count: u64,
    last_seen: Option<Instant>,
    intervals: VecDeque<Duration>,
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_TIMEOUT)
    }
}

impl HeartbeatMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            history_len: DEFAULT_HISTORY_LEN,
            count: 0,
            last_seen: None,
            intervals: VecDeque::with_capacity(DEFAULT_HISTORY_LEN),
        }
    }

    pub fn with_history(mut self, history_len: usize) -> Self {
        self.history_len = history_len.max(1);
        while self.intervals.len() > self.history_len {
            self.intervals.pop_front();
        }
        self
    }

    /// Records a heartbeat seen at `at`, returning the interval since the
    /// previous one.
    pub fn record(&mut self, at: Instant) -> Option<Duration> {
        self.count += 1;
        let interval = self
            .last_seen
            .map(|previous| at.saturating_duration_since(previous));
        self.last_seen = Some(at);

        if let Some(interval) = interval {
            if self.intervals.len() == self.history_len {
                self.intervals.pop_front();
            }
            self.intervals.push_back(interval);
        }
        interval
    }

    pub fn liveness(&self, now: Instant) -> Liveness {
        match self.last_seen {
            None => Liveness::NoHeartbeat,
            Some(last) if now.saturating_duration_since(last) > self.timeout => {
                Liveness::TimedOut
            }
            Some(_) => Liveness::Alive,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn last_seen(&self) -> Option<Instant> {
        self.last_seen
    }

    pub fn intervals(&self) -> impl Iterator<Item = Duration> + '_ {
        self.intervals.iter().copied()
    }

    pub fn interval_stats(&self) -> Option<IntervalStats> {
        let samples = self.intervals.len();
        let min = self.intervals.iter().min().copied()?;
        let max = self.intervals.iter().max().copied()?;
        let total: Duration = self.intervals.iter().sum();
        Some(IntervalStats {
            min,
            max,
            mean: total / samples as u32,
            samples,
        })
    }
}
