//! Integration tests: inbound command → validator → instrument → sinks.
//!
//! Drives [`CommandDispatcher::dispatch`] directly with recording mocks, so
//! every hardware call and every sink write can be asserted in order.

use crate::mock_hw::{
    HwCall, MockBroker, MockHardware, MockLocalLog, MockRemote, PUBLIC_ID, command_topic,
    dispatcher, topics,
};

use sdl_demo::app::dispatcher::{SinkOutcome, Sinks};
use sdl_demo::app::request::{Gain, SensorSettings};
use sdl_demo::error::{ConnectivityError, HardwareError, SinkError};

struct Rig {
    hw: MockHardware,
    broker: MockBroker,
    sinks: Sinks<MockLocalLog, MockRemote>,
}

impl Rig {
    fn new() -> Self {
        let mut broker = MockBroker::new();
        broker.connected = true;
        Self {
            hw: MockHardware::new(),
            broker,
            sinks: Sinks::new(Some(MockLocalLog::default()), Some(MockRemote::default())),
        }
    }

    fn send(&mut self, payload: &str) -> sdl_demo::app::dispatcher::DispatchReport {
        dispatcher()
            .dispatch(
                &command_topic(),
                payload.as_bytes(),
                &mut self.hw,
                &mut self.broker,
                &mut self.sinks,
            )
            .expect("command topic must dispatch")
    }

    fn results(&self) -> Vec<&str> {
        self.broker.published_on(topics().results())
    }

    fn local_lines(&self) -> &[String] {
        &self.sinks.local.as_ref().unwrap().lines
    }

    fn remote_docs(&self) -> &[serde_json::Value] {
        &self.sinks.remote.as_ref().unwrap().documents
    }
}

// ── End-to-end scenarios ──────────────────────────────────────

#[test]
fn valid_command_runs_and_publishes_readings() {
    let mut rig = Rig::new();
    let report = rig.send(r#"{"R":10,"G":20,"B":30}"#);

    assert!(report.accepted);
    assert_eq!(
        rig.hw.calls,
        vec![
            HwCall::Beep,
            HwCall::WriteColour((10, 20, 30)),
            HwCall::Configure(SensorSettings {
                atime: 100,
                astep: 999,
                gain: Gain::X128,
            }),
            HwCall::ReadChannels,
        ]
    );

    let expected = r#"{"_input_message":{"R":10,"G":20,"B":30},"ch410":101,"ch440":102,"ch470":103,"ch510":104,"ch550":105,"ch583":106,"ch620":107,"ch670":108,"sd_card_ready":true}"#;
    assert_eq!(rig.results(), vec![expected]);
    assert_eq!(rig.local_lines(), &[expected.to_owned()]);
}

#[test]
fn out_of_range_command_never_touches_hardware() {
    let mut rig = Rig::new();
    let report = rig.send(r#"{"R":300,"G":0,"B":0}"#);

    assert!(!report.accepted);
    assert!(rig.hw.calls.is_empty(), "rejected command must not reach hardware");
    assert_eq!(
        rig.results(),
        vec![
            r#"{"_input_message":{"R":300,"G":0,"B":0},"error":"R value 300 out of range (0..255)","sd_card_ready":true}"#
        ]
    );
}

#[test]
fn echo_keeps_sender_key_order() {
    let mut rig = Rig::new();
    rig.send(r#"{"gain":4,"B":3,"R":1,"G":2}"#);
    assert!(
        rig.results()[0].starts_with(r#"{"_input_message":{"gain":4,"B":3,"R":1,"G":2},"ch410""#)
    );
}

#[test]
fn optional_settings_reach_the_sensor() {
    let mut rig = Rig::new();
    rig.send(r#"{"R":1,"G":2,"B":3,"atime":29,"astep":599,"gain":4}"#);
    assert!(rig.hw.calls.contains(&HwCall::Configure(SensorSettings {
        atime: 29,
        astep: 599,
        gain: Gain::X4,
    })));
}

#[test]
fn disallowed_gain_is_rejected_before_hardware() {
    let mut rig = Rig::new();
    let report = rig.send(r#"{"R":1,"G":2,"B":3,"gain":3}"#);
    assert!(!report.accepted);
    assert!(rig.hw.calls.is_empty());
    assert!(rig.results()[0].contains("gain value 3 not one of"));
}

#[test]
fn unparseable_payload_echoes_raw_text() {
    let mut rig = Rig::new();
    rig.send("R=10");

    let v: serde_json::Value = serde_json::from_str(rig.results()[0]).unwrap();
    assert_eq!(v["_input_message"], "R=10");
    assert!(v["error"].as_str().unwrap().starts_with("malformed request"));
    assert!(rig.hw.calls.is_empty());
}

#[test]
fn hardware_fault_reports_and_turns_light_off() {
    let mut rig = Rig::new();
    rig.hw.read_error = Some(HardwareError::SensorTimeout);
    let report = rig.send(r#"{"R":10,"G":20,"B":30}"#);

    assert!(!report.accepted);
    assert_eq!(rig.hw.colour(), Some((0, 0, 0)));
    let v: serde_json::Value = serde_json::from_str(rig.results()[0]).unwrap();
    assert_eq!(v["error"], "hardware: spectral sensor acquisition timed out");
    assert!(v.get("ch410").is_none());
}

#[test]
fn light_keeps_colour_after_success() {
    let mut rig = Rig::new();
    rig.send(r#"{"R":10,"G":20,"B":30}"#);
    assert_eq!(rig.hw.colour(), Some((10, 20, 30)));
}

// ── Routing ───────────────────────────────────────────────────

#[test]
fn foreign_topics_are_ignored() {
    let mut rig = Rig::new();
    let other = format!("{}as7341/", topics().prefix());
    let report = dispatcher().dispatch(
        &other,
        br#"{"R":10,"G":20,"B":30}"#,
        &mut rig.hw,
        &mut rig.broker,
        &mut rig.sinks,
    );
    assert!(report.is_none());
    assert!(rig.hw.calls.is_empty());
    assert!(rig.broker.published.is_empty());
}

#[test]
fn any_gpio_subtopic_is_a_command() {
    let mut rig = Rig::new();
    let sub = format!("{}GPIO/led", topics().prefix());
    let report = dispatcher().dispatch(
        &sub,
        br#"{"R":1,"G":1,"B":1}"#,
        &mut rig.hw,
        &mut rig.broker,
        &mut rig.sinks,
    );
    assert!(report.is_some());
}

// ── Sink independence ─────────────────────────────────────────

#[test]
fn remote_document_carries_device_metadata() {
    let mut rig = Rig::new();
    rig.send(r#"{"R":10,"G":20,"B":30}"#);

    let doc = &rig.remote_docs()[0];
    assert_eq!(doc["device_nickname"], "sterling");
    assert_eq!(doc["encrypted_device_id_truncated"], PUBLIC_ID);
    assert_eq!(doc["ch670"], 108);
}

#[test]
fn rejected_commands_still_reach_every_sink() {
    let mut rig = Rig::new();
    rig.send(r#"{"R":"ten","G":0,"B":0}"#);
    assert_eq!(rig.results().len(), 1);
    assert_eq!(rig.local_lines().len(), 1);
    assert_eq!(rig.remote_docs().len(), 1);
}

#[test]
fn local_failure_does_not_block_remote() {
    let mut rig = Rig::new();
    rig.sinks.local.as_mut().unwrap().fail = true;
    let report = rig.send(r#"{"R":10,"G":20,"B":30}"#);

    assert_eq!(report.publish, SinkOutcome::Delivered);
    assert_eq!(report.local, SinkOutcome::Failed(SinkError::LocalIo));
    assert_eq!(report.remote, SinkOutcome::Delivered);
    assert_eq!(report.sink_failures(), 1);
    assert_eq!(rig.remote_docs().len(), 1);
}

#[test]
fn remote_failure_leaves_publish_and_local_unchanged() {
    let mut baseline = Rig::new();
    baseline.send(r#"{"R":10,"G":20,"B":30}"#);

    let mut rig = Rig::new();
    rig.sinks.remote.as_mut().unwrap().fail = true;
    let report = rig.send(r#"{"R":10,"G":20,"B":30}"#);

    assert_eq!(report.publish, SinkOutcome::Delivered);
    assert_eq!(report.local, SinkOutcome::Delivered);
    assert_eq!(report.remote, SinkOutcome::Failed(SinkError::RemoteStatus(500)));
    assert_eq!(report.sink_failures(), 1);
    assert!(report.accepted);
    assert_eq!(rig.results(), baseline.results());
    assert_eq!(rig.local_lines(), baseline.local_lines());
    assert!(rig.remote_docs().is_empty());
}

#[test]
fn publish_failure_still_logs_locally_and_remotely() {
    let mut rig = Rig::new();
    rig.broker.fail_publish = true;
    let report = rig.send(r#"{"R":10,"G":20,"B":30}"#);

    assert_eq!(report.link_lost(), Some(ConnectivityError::PublishFailed));
    assert_eq!(rig.local_lines().len(), 1);
    assert_eq!(rig.remote_docs().len(), 1);
    assert!(rig.broker.published.is_empty(), "publish must not be retried");
}

#[test]
fn disabled_sinks_are_skipped_and_flagged() {
    let mut rig = Rig::new();
    rig.sinks = Sinks::new(None, None);
    let report = rig.send(r#"{"R":10,"G":20,"B":30}"#);

    assert_eq!(report.local, SinkOutcome::Skipped);
    assert_eq!(report.remote, SinkOutcome::Skipped);
    assert_eq!(report.sink_failures(), 0);
    assert!(rig.results()[0].ends_with(r#""sd_card_ready":false}"#));
}
