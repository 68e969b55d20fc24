//! MQTT broker adapter.
//!
//! ```text
//!   esp-mqtt task ──cb──▶ INBOUND (bounded channel) ──poll()──▶ main loop
//! ```
//!
//! The client's own task runs the event callback, which copies each received
//! message into a bounded `embassy-sync` channel.  The main loop is the
//! channel's only consumer.  Messages that exceed [`MAX_TOPIC_LEN`] /
//! [`MAX_PAYLOAD_LEN`] or arrive while the channel is full are dropped with a
//! warning.
//!
//! All publishes and subscriptions use QoS 0 (at most once).
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//! - **all other targets**: in-process simulation recording every publish,
//!   with [`MqttAdapter::inject`] standing in for the broker.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::ports::{BrokerPort, InboundMessage, MAX_PAYLOAD_LEN, MAX_TOPIC_LEN};
use crate::config::SystemConfig;
use crate::error::ConnectivityError;

/// Depth of the inbound queue.
pub const INBOUND_DEPTH: usize = 4;

pub type InboundChannel = Channel<CriticalSectionRawMutex, InboundMessage, INBOUND_DEPTH>;

/// Inbound queue: client task → main loop.
pub static INBOUND: InboundChannel = Channel::new();

/// Copy one received message into the queue.  Returns `false` when dropped.
pub fn deliver(queue: &InboundChannel, topic: &str, payload: &[u8]) -> bool {
    let Some(msg) = InboundMessage::new(topic, payload) else {
        warn!(
            "MQTT: dropping oversized message on '{}' ({} bytes, limits {}/{})",
            topic,
            payload.len(),
            MAX_TOPIC_LEN,
            MAX_PAYLOAD_LEN
        );
        return false;
    };
    if queue.try_send(msg).is_err() {
        warn!("MQTT: inbound queue full, dropping message on '{}'", topic);
        return false;
    }
    true
}

pub struct MqttAdapter {
    inbound: &'static InboundChannel,
    url: heapless::String<96>,
    client_id: heapless::String<32>,
    keepalive_secs: u16,
    poll_timeout_ms: u32,
    #[cfg(target_os = "espidf")]
    client: Option<esp_idf_svc::mqtt::client::EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    link_up: std::sync::Arc<core::sync::atomic::AtomicBool>,
    #[cfg(not(target_os = "espidf"))]
    sim: sim::Broker,
}

impl MqttAdapter {
    pub fn new(
        config: &SystemConfig,
        client_id: &str,
        inbound: &'static InboundChannel,
    ) -> Self {
        let mut id = heapless::String::new();
        for c in client_id.chars() {
            if id.push(c).is_err() {
                break;
            }
        }
        Self {
            inbound,
            url: config.broker_url.clone(),
            client_id: id,
            keepalive_secs: config.broker_keepalive_secs,
            poll_timeout_ms: config.poll_timeout_ms,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            link_up: std::sync::Arc::new(core::sync::atomic::AtomicBool::new(false)),
            #[cfg(not(target_os = "espidf"))]
            sim: sim::Broker::default(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn drain_stale(&self) {
        while self.inbound.try_receive().is_ok() {}
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF backend
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use core::sync::atomic::Ordering;
    use core::time::Duration;

    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_svc::mqtt::client::{
        EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
    };
    use log::{info, warn};

    use super::{MqttAdapter, deliver};
    use crate::app::ports::{BrokerPort, InboundMessage};
    use crate::error::ConnectivityError;

    /// How long `connect` waits for the CONNACK.
    const CONNECT_WAIT_MS: u32 = 10_000;
    const CONNECT_STEP_MS: u32 = 50;

    impl BrokerPort for MqttAdapter {
        fn connect(&mut self) -> Result<(), ConnectivityError> {
            // Tear down the previous session before opening a new one.
            self.client = None;
            self.link_up.store(false, Ordering::Release);
            self.drain_stale();

            let conf = MqttClientConfiguration {
                client_id: Some(self.client_id.as_str()),
                keep_alive_interval: Some(Duration::from_secs(u64::from(self.keepalive_secs))),
                crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
                ..Default::default()
            };

            let queue = self.inbound;
            let link = self.link_up.clone();
            let client = EspMqttClient::new_cb(&self.url, &conf, move |event| {
                match event.payload() {
                    EventPayload::Connected(_) => link.store(true, Ordering::Release),
                    EventPayload::Disconnected => link.store(false, Ordering::Release),
                    EventPayload::Received {
                        topic: Some(topic),
                        data,
                        ..
                    } => {
                        deliver(queue, topic, data);
                    }
                    EventPayload::Error(e) => warn!("MQTT: client error {:?}", e),
                    _ => {}
                }
            })
            .map_err(|e| {
                warn!("MQTT: client init failed: {}", e);
                ConnectivityError::ConnectFailed
            })?;
            self.client = Some(client);

            let mut waited = 0;
            while !self.link_up.load(Ordering::Acquire) {
                if waited >= CONNECT_WAIT_MS {
                    warn!("MQTT: no CONNACK from {} after {} ms", self.url, waited);
                    self.client = None;
                    return Err(ConnectivityError::ConnectFailed);
                }
                FreeRtos::delay_ms(CONNECT_STEP_MS);
                waited += CONNECT_STEP_MS;
            }
            info!("MQTT: connected to {} as '{}'", self.url, self.client_id);
            Ok(())
        }

        fn subscribe(&mut self, filter: &str) -> Result<(), ConnectivityError> {
            let client = self.client.as_mut().ok_or(ConnectivityError::NotConnected)?;
            client.subscribe(filter, QoS::AtMostOnce).map_err(|e| {
                warn!("MQTT: subscribe '{}' failed: {}", filter, e);
                ConnectivityError::SubscribeFailed
            })?;
            info!("MQTT: subscribed to {}", filter);
            Ok(())
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ConnectivityError> {
            if !self.link_up.load(Ordering::Acquire) {
                return Err(ConnectivityError::NotConnected);
            }
            let client = self.client.as_mut().ok_or(ConnectivityError::NotConnected)?;
            client
                .enqueue(topic, QoS::AtMostOnce, false, payload)
                .map(|_| ())
                .map_err(|e| {
                    warn!("MQTT: publish to '{}' failed: {}", topic, e);
                    ConnectivityError::PublishFailed
                })
        }

        fn poll(&mut self) -> Result<Option<InboundMessage>, ConnectivityError> {
            if let Ok(msg) = self.inbound.try_receive() {
                return Ok(Some(msg));
            }
            if self.client.is_none() {
                return Err(ConnectivityError::NotConnected);
            }
            // Session was up; the client task has since seen a disconnect.
            if !self.link_up.load(Ordering::Acquire) {
                return Err(ConnectivityError::PollFailed);
            }
            if self.poll_timeout_ms > 0 {
                FreeRtos::delay_ms(self.poll_timeout_ms);
            }
            Ok(self.inbound.try_receive().ok())
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    /// Simulated broker session.
    #[derive(Debug, Default)]
    pub struct Broker {
        pub connected: bool,
        /// Number of upcoming connect attempts that fail.
        pub failing_connects: u32,
        pub link_drop_pending: bool,
        pub subscriptions: Vec<String>,
        pub published: Vec<(String, Vec<u8>)>,
    }
}

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    /// Simulation: the broker delivers `payload` on `topic`.
    pub fn inject(&self, topic: &str, payload: &[u8]) -> bool {
        deliver(self.inbound, topic, payload)
    }

    /// Simulation: the link drops on the next poll and the next `failures`
    /// connect attempts fail.
    pub fn sim_drop_link(&mut self, failures: u32) {
        self.sim.link_drop_pending = true;
        self.sim.failing_connects = failures;
    }

    /// Simulation: everything published so far.
    pub fn published(&self) -> &[(String, Vec<u8>)] {
        &self.sim.published
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.sim.subscriptions
    }
}

#[cfg(not(target_os = "espidf"))]
impl BrokerPort for MqttAdapter {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        self.sim.connected = false;
        self.sim.subscriptions.clear();
        self.drain_stale();
        if self.sim.failing_connects > 0 {
            self.sim.failing_connects -= 1;
            warn!("MQTT(sim): connect to {} refused", self.url);
            return Err(ConnectivityError::ConnectFailed);
        }
        self.sim.connected = true;
        log::info!(
            "MQTT(sim): connected to {} as '{}' (keepalive {} s, poll {} ms)",
            self.url, self.client_id, self.keepalive_secs, self.poll_timeout_ms
        );
        Ok(())
    }

    fn subscribe(&mut self, filter: &str) -> Result<(), ConnectivityError> {
        if !self.sim.connected {
            return Err(ConnectivityError::NotConnected);
        }
        self.sim.subscriptions.push(filter.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ConnectivityError> {
        if !self.sim.connected {
            return Err(ConnectivityError::NotConnected);
        }
        self.sim.published.push((topic.to_owned(), payload.to_vec()));
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<InboundMessage>, ConnectivityError> {
        if self.sim.link_drop_pending && self.sim.connected {
            self.sim.link_drop_pending = false;
            self.sim.connected = false;
            return Err(ConnectivityError::PollFailed);
        }
        if !self.sim.connected {
            return Err(ConnectivityError::NotConnected);
        }
        Ok(self.inbound.try_receive().ok())
    }
}
