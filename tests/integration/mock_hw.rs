//! Mock adapters for integration tests.
//!
//! Records every port call so tests can assert on the full command
//! history without touching real RMT/I2C/PWM peripherals or a broker.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use sdl_demo::app::dispatcher::{CommandDispatcher, DeviceLabel};
use sdl_demo::app::ports::{
    ActuatorPort, BrokerPort, BuzzerPort, Clock, InboundMessage, IndicatorPort, LocalLogPort,
    RemoteLogPort, Rgb, SpectralSensorPort,
};
use sdl_demo::app::request::SensorSettings;
use sdl_demo::app::result::{CHANNEL_COUNT, RemoteDocument};
use sdl_demo::app::topics::Topics;
use sdl_demo::error::{ConnectivityError, HardwareError, SinkError};

pub const RAW_ID: &str = "001122aabbcc";
pub const PUBLIC_ID: &str = "9f3e2a1b0c";

pub fn topics() -> Topics {
    Topics::new(RAW_ID).unwrap()
}

pub fn command_topic() -> String {
    format!("{}GPIO/", topics().prefix())
}

pub fn dispatcher() -> CommandDispatcher {
    CommandDispatcher::new(
        topics(),
        DeviceLabel {
            nickname: heapless::String::try_from("sterling").unwrap(),
            public_id: heapless::String::try_from(PUBLIC_ID).unwrap(),
        },
    )
}

// ── Instrument ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HwCall {
    WriteColour(Rgb),
    Configure(SensorSettings),
    ReadChannels,
    Beep,
}

pub struct MockHardware {
    pub calls: Vec<HwCall>,
    pub readings: [u16; CHANNEL_COUNT],
    pub read_error: Option<HardwareError>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            readings: [101, 102, 103, 104, 105, 106, 107, 108],
            read_error: None,
        }
    }

    pub fn colour(&self) -> Option<Rgb> {
        self.calls.iter().rev().find_map(|c| match c {
            HwCall::WriteColour(rgb) => Some(*rgb),
            _ => None,
        })
    }
}

impl ActuatorPort for MockHardware {
    fn write_colour(&mut self, colour: Rgb) -> Result<(), HardwareError> {
        self.calls.push(HwCall::WriteColour(colour));
        Ok(())
    }
}

impl SpectralSensorPort for MockHardware {
    fn configure(&mut self, settings: &SensorSettings) -> Result<(), HardwareError> {
        self.calls.push(HwCall::Configure(*settings));
        Ok(())
    }

    fn read_channels(&mut self) -> Result<[u16; CHANNEL_COUNT], HardwareError> {
        self.calls.push(HwCall::ReadChannels);
        match self.read_error {
            Some(e) => Err(e),
            None => Ok(self.readings),
        }
    }
}

impl BuzzerPort for MockHardware {
    fn beep(&mut self) -> Result<(), HardwareError> {
        self.calls.push(HwCall::Beep);
        Ok(())
    }
}

// ── Broker ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockBroker {
    pub connected: bool,
    pub connects: u32,
    /// Number of upcoming connect attempts that fail.
    pub connect_failures: u32,
    pub fail_publish: bool,
    /// Next poll reports a lost link.
    pub drop_link: bool,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, String)>,
    pub inbound: VecDeque<InboundMessage>,
}

#[allow(dead_code)]
impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, topic: &str, payload: &str) {
        self.inbound
            .push_back(InboundMessage::new(topic, payload.as_bytes()).unwrap());
    }

    pub fn published_on(&self, topic: &str) -> Vec<&str> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.as_str())
            .collect()
    }
}

impl BrokerPort for MockBroker {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        self.connects += 1;
        self.connected = false;
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(ConnectivityError::ConnectFailed);
        }
        self.connected = true;
        Ok(())
    }

    fn subscribe(&mut self, filter: &str) -> Result<(), ConnectivityError> {
        if !self.connected {
            return Err(ConnectivityError::SubscribeFailed);
        }
        self.subscriptions.push(filter.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ConnectivityError> {
        if self.fail_publish || !self.connected {
            return Err(ConnectivityError::PublishFailed);
        }
        self.published.push((
            topic.to_owned(),
            String::from_utf8(payload.to_vec()).unwrap(),
        ));
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<InboundMessage>, ConnectivityError> {
        if self.drop_link {
            self.drop_link = false;
            self.connected = false;
            return Err(ConnectivityError::PollFailed);
        }
        if !self.connected {
            return Err(ConnectivityError::NotConnected);
        }
        Ok(self.inbound.pop_front())
    }
}

// ── Sinks ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockLocalLog {
    pub lines: Vec<String>,
    pub fail: bool,
}

impl LocalLogPort for MockLocalLog {
    fn append_line(&mut self, line: &str) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::LocalIo);
        }
        self.lines.push(line.to_owned());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockRemote {
    pub documents: Vec<serde_json::Value>,
    pub fail: bool,
}

impl RemoteLogPort for MockRemote {
    fn insert_one(&mut self, document: &RemoteDocument<'_>) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::RemoteStatus(500));
        }
        self.documents
            .push(serde_json::to_value(document).map_err(|_| SinkError::Encode)?);
        Ok(())
    }
}

// ── Time, delay, indicator ────────────────────────────────────

/// Hand-cranked clock; clones share the same time.
#[derive(Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: u64) {
        self.0.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

/// Records how long the caller asked to wait.
#[derive(Default)]
pub struct MockDelay {
    pub total_ns: u64,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

#[derive(Default)]
pub struct MockIndicator {
    pub toggles: u32,
}

impl IndicatorPort for MockIndicator {
    fn toggle(&mut self) {
        self.toggles += 1;
    }
}
