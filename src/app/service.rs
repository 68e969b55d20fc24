//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the broker session and its [`ConnectionState`], the
//! command dispatcher, and both liveness signalers.  Hardware and sinks are
//! lent to it per iteration, so the whole loop runs against mock adapters
//! on the host.
//!
//! ```text
//!  BrokerPort ──▶ ┌──────────────────────────────┐ ──▶ ActuatorPort
//!                 │          AppService          │ ──▶ SpectralSensorPort
//!       Clock ──▶ │ dispatch · liveness · link   │ ──▶ LocalLogPort
//!                 └──────────────────────────────┘ ──▶ RemoteLogPort
//! ```
//!
//! ## Link state machine
//!
//! ```text
//!   Alive ──(publish/poll/heartbeat error)──▶ Reconnecting{attempt}
//!     ▲                                            │
//!     └──────(connect + resubscribe ok)────────────┘
//! ```
//!
//! Reconnect attempts never block: each one is scheduled on the clock with
//! an exponential backoff, and the sign-of-life indicator keeps ticking in
//! between.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::config::SystemConfig;
use crate::diagnostics::LoopStats;
use crate::error::ConnectivityError;
use crate::liveness::{Heartbeat, SignOfLife};

use super::dispatcher::{CommandDispatcher, DispatchReport, Sinks};
use super::ports::{
    ActuatorPort, BrokerPort, BuzzerPort, Clock, IndicatorPort, LocalLogPort, RemoteLogPort,
    SpectralSensorPort,
};

/// Broker session state.  Only [`AppService`] mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Alive,
    Reconnecting {
        /// Failed attempts so far in this outage.
        attempt: u32,
        /// Clock time at which the next attempt is allowed.
        next_attempt_ms: u64,
    },
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService<B, C, I> {
    broker: B,
    clock: C,
    dispatcher: CommandDispatcher,
    heartbeat: Heartbeat<C>,
    sign_of_life: SignOfLife<C, I>,
    state: ConnectionState,
    stats: LoopStats,
    connect_retry_delay_ms: u32,
    backoff_min_ms: u32,
    backoff_max_ms: u32,
}

impl<B, C, I> AppService<B, C, I>
where
    B: BrokerPort,
    C: Clock + Clone,
    I: IndicatorPort,
{
    /// Construct the service.  Does **not** connect; call [`start`] next.
    ///
    /// [`start`]: Self::start
    pub fn new(
        config: &SystemConfig,
        dispatcher: CommandDispatcher,
        broker: B,
        clock: C,
        indicator: I,
    ) -> Self {
        let heartbeat = Heartbeat::new(
            clock.clone(),
            config.heartbeat_interval_ms,
            dispatcher.topics().heartbeat(),
        );
        let sign_of_life = SignOfLife::new(clock.clone(), config.blink_interval_ms, indicator);
        Self {
            broker,
            clock,
            dispatcher,
            heartbeat,
            sign_of_life,
            state: ConnectionState::Reconnecting {
                attempt: 0,
                next_attempt_ms: 0,
            },
            stats: LoopStats::default(),
            connect_retry_delay_ms: config.connect_retry_delay_ms,
            backoff_min_ms: config.reconnect_backoff_min_ms,
            backoff_max_ms: config.reconnect_backoff_max_ms,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Open the first broker session and subscribe to the command topics.
    ///
    /// A failed connect is retried exactly once after the configured delay;
    /// a second failure is returned to the caller.
    pub fn start(&mut self, delay: &mut impl DelayNs) -> Result<(), ConnectivityError> {
        if let Err(e) = self.broker.connect() {
            warn!(
                "Broker connect failed ({}), retrying in {} ms",
                e, self.connect_retry_delay_ms
            );
            delay.delay_ms(self.connect_retry_delay_ms);
            self.broker.connect()?;
        }
        self.broker.subscribe(self.dispatcher.topics().command_filter())?;
        self.state = ConnectionState::Alive;
        info!(
            "Subscribed to {}",
            self.dispatcher.topics().command_filter()
        );
        Ok(())
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// Run one loop iteration: at most one inbound command, the heartbeat
    /// while the link is alive, a reconnect attempt when one is due, and the
    /// sign-of-life tick regardless.
    pub fn poll_once<H, L, R>(
        &mut self,
        hw: &mut H,
        sinks: &mut Sinks<L, R>,
    ) -> Option<DispatchReport>
    where
        H: ActuatorPort + SpectralSensorPort + BuzzerPort,
        L: LocalLogPort,
        R: RemoteLogPort,
    {
        let mut report = None;

        match self.state {
            ConnectionState::Alive => {
                report = self.poll_command(hw, sinks);
                if self.state == ConnectionState::Alive {
                    if let Err(e) = self.heartbeat.tick(&mut self.broker, &self.stats) {
                        self.link_lost(e);
                    }
                }
            }
            ConnectionState::Reconnecting {
                attempt,
                next_attempt_ms,
            } => {
                if self.clock.now_ms() >= next_attempt_ms {
                    self.try_reconnect(attempt);
                }
            }
        }

        self.sign_of_life.tick();
        report
    }

    fn poll_command<H, L, R>(
        &mut self,
        hw: &mut H,
        sinks: &mut Sinks<L, R>,
    ) -> Option<DispatchReport>
    where
        H: ActuatorPort + SpectralSensorPort + BuzzerPort,
        L: LocalLogPort,
        R: RemoteLogPort,
    {
        let msg = match self.broker.poll() {
            Ok(Some(msg)) => msg,
            Ok(None) => return None,
            Err(e) => {
                self.link_lost(e);
                return None;
            }
        };

        let report =
            self.dispatcher
                .dispatch(&msg.topic, &msg.payload, hw, &mut self.broker, sinks)?;
        self.stats
            .record_command(report.accepted, report.sink_failures());
        if let Some(e) = report.link_lost() {
            self.link_lost(e);
        }
        Some(report)
    }

    // ── Link recovery ─────────────────────────────────────────

    fn link_lost(&mut self, e: ConnectivityError) {
        warn!("Broker link lost: {}", e);
        self.state = ConnectionState::Reconnecting {
            attempt: 0,
            next_attempt_ms: self.clock.now_ms() + u64::from(self.backoff_min_ms),
        };
    }

    fn try_reconnect(&mut self, attempt: u32) {
        let result = self.broker.connect().and_then(|()| {
            self.broker
                .subscribe(self.dispatcher.topics().command_filter())
        });
        match result {
            Ok(()) => {
                self.stats.record_reconnect();
                self.state = ConnectionState::Alive;
                info!("Broker link restored after {} attempt(s)", attempt + 1);
            }
            Err(e) => {
                let next = attempt.saturating_add(1);
                let wait = self.backoff_ms(next);
                warn!("Reconnect attempt {} failed ({}), next in {} ms", next, e, wait);
                self.state = ConnectionState::Reconnecting {
                    attempt: next,
                    next_attempt_ms: self.clock.now_ms() + u64::from(wait),
                };
            }
        }
    }

    /// Backoff before attempt `n`: min × 2ⁿ, capped at max.
    fn backoff_ms(&self, n: u32) -> u32 {
        let ms = u64::from(self.backoff_min_ms) << n.min(32);
        ms.min(u64::from(self.backoff_max_ms)) as u32
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }

    pub fn indicator(&self) -> &I {
        self.sign_of_life.indicator()
    }
}
