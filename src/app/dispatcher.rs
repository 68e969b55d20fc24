//! Command dispatcher — one inbound command through validation, execution
//! and the three telemetry sinks.
//!
//! ```text
//!              ┌─▶ broker publish   (always first)
//!  payload ────┼─▶ local log        (if mounted at boot)
//!              └─▶ remote database  (if provisioned)
//! ```
//!
//! Sinks are independent: a failure in one is logged and the next one
//! still runs.  The payload is serialized once and every sink receives the
//! same bytes.

use log::{debug, error, warn};

use crate::error::{ConnectivityError, SinkError};

use super::executor::Experiment;
use super::ports::{
    ActuatorPort, BrokerPort, BuzzerPort, LocalLogPort, RemoteLogPort, SpectralSensorPort,
};
use super::result::{RemoteDocument, ResultPayload};
use super::topics::Topics;

/// The optional sinks, decided once at boot.
pub struct Sinks<L, R> {
    /// `None` when the local filesystem failed to mount.
    pub local: Option<L>,
    /// `None` when remote credentials were not provisioned.
    pub remote: Option<R>,
}

impl<L, R> Sinks<L, R> {
    pub fn new(local: Option<L>, remote: Option<R>) -> Self {
        Self { local, remote }
    }
}

/// Per-sink result of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOutcome {
    Delivered,
    /// Sink disabled at boot.
    Skipped,
    Failed(SinkError),
}

impl SinkOutcome {
    fn from_result(r: Result<(), SinkError>) -> Self {
        match r {
            Ok(()) => Self::Delivered,
            Err(e) => Self::Failed(e),
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Everything the main loop needs to know about one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// The command produced a measurement.
    pub accepted: bool,
    pub publish: SinkOutcome,
    pub local: SinkOutcome,
    pub remote: SinkOutcome,
}

impl DispatchReport {
    /// The broker link failed during publish.
    pub fn link_lost(&self) -> Option<ConnectivityError> {
        match self.publish {
            SinkOutcome::Failed(SinkError::Publish(e)) => Some(e),
            _ => None,
        }
    }

    pub fn sink_failures(&self) -> u32 {
        [self.publish, self.local, self.remote]
            .into_iter()
            .filter(|o| o.is_failure())
            .count() as u32
    }
}

/// Public device metadata attached to remote documents.
#[derive(Debug, Clone)]
pub struct DeviceLabel {
    pub nickname: heapless::String<32>,
    pub public_id: heapless::String<16>,
}

/// Routes inbound commands and fans their results out to the sinks.
pub struct CommandDispatcher {
    topics: Topics,
    label: DeviceLabel,
}

impl CommandDispatcher {
    pub fn new(topics: Topics, label: DeviceLabel) -> Self {
        Self { topics, label }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Run one command to completion.  Returns `None` when `topic` is not a
    /// command topic for this device.
    pub fn dispatch<H, B, L, R>(
        &self,
        topic: &str,
        raw: &[u8],
        hw: &mut H,
        broker: &mut B,
        sinks: &mut Sinks<L, R>,
    ) -> Option<DispatchReport>
    where
        H: ActuatorPort + SpectralSensorPort + BuzzerPort,
        B: BrokerPort,
        L: LocalLogPort,
        R: RemoteLogPort,
    {
        if !self.topics.is_command(topic) {
            debug!("Ignoring message on {}", topic);
            return None;
        }

        let payload = Experiment::new(hw, sinks.local.is_some()).try_experiment(raw);
        Some(self.fan_out(&payload, broker, sinks))
    }

    fn fan_out<B, L, R>(
        &self,
        payload: &ResultPayload,
        broker: &mut B,
        sinks: &mut Sinks<L, R>,
    ) -> DispatchReport
    where
        B: BrokerPort,
        L: LocalLogPort,
        R: RemoteLogPort,
    {
        let accepted = payload.is_measurement();
        let line = match serde_json::to_string(payload) {
            Ok(line) => line,
            Err(e) => {
                error!("Result encoding failed: {}", e);
                let failed = SinkOutcome::Failed(SinkError::Encode);
                return DispatchReport {
                    accepted,
                    publish: failed,
                    local: failed,
                    remote: failed,
                };
            }
        };

        // 1. Broker, strictly before the other two.
        let publish = SinkOutcome::from_result(
            broker
                .publish(self.topics.results(), line.as_bytes())
                .map_err(SinkError::Publish),
        );
        if let SinkOutcome::Failed(e) = publish {
            warn!("Sink publish: {}", e);
        }

        // 2. Local append log.
        let local = match sinks.local.as_mut() {
            Some(log) => SinkOutcome::from_result(log.append_line(&line)),
            None => SinkOutcome::Skipped,
        };
        if let SinkOutcome::Failed(e) = local {
            warn!("Sink local log: {}", e);
        }

        // 3. Remote database.
        let remote = match sinks.remote.as_mut() {
            Some(db) => SinkOutcome::from_result(db.insert_one(&RemoteDocument {
                payload,
                device_nickname: &self.label.nickname,
                encrypted_device_id_truncated: &self.label.public_id,
            })),
            None => SinkOutcome::Skipped,
        };
        if let SinkOutcome::Failed(e) = remote {
            warn!("Sink remote db: {}", e);
        }

        DispatchReport {
            accepted,
            publish,
            local,
            remote,
        }
    }
}
