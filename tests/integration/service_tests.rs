//! Integration tests: AppService loop orchestration.
//!
//! Boot connect with its single retry, heartbeat and sign-of-life cadence,
//! and the non-blocking reconnect state machine, all against a hand-cranked
//! clock.

use crate::mock_hw::{
    ManualClock, MockBroker, MockDelay, MockHardware, MockIndicator, MockLocalLog, MockRemote,
    command_topic, dispatcher, topics,
};

use sdl_demo::app::dispatcher::Sinks;
use sdl_demo::app::ports::Clock;
use sdl_demo::app::service::{AppService, ConnectionState};
use sdl_demo::config::SystemConfig;
use sdl_demo::error::ConnectivityError;

type Service = AppService<MockBroker, ManualClock, MockIndicator>;

struct Loop {
    app: Service,
    clock: ManualClock,
    hw: MockHardware,
    sinks: Sinks<MockLocalLog, MockRemote>,
}

impl Loop {
    fn new(broker: MockBroker) -> Self {
        let clock = ManualClock::new();
        let app = AppService::new(
            &SystemConfig::default(),
            dispatcher(),
            broker,
            clock.clone(),
            MockIndicator::default(),
        );
        Self {
            app,
            clock,
            hw: MockHardware::new(),
            sinks: Sinks::new(Some(MockLocalLog::default()), None),
        }
    }

    fn started() -> Self {
        let mut l = Self::new(MockBroker::new());
        l.app.start(&mut MockDelay::default()).unwrap();
        l
    }

    fn step(&mut self) -> Option<sdl_demo::app::dispatcher::DispatchReport> {
        self.app.poll_once(&mut self.hw, &mut self.sinks)
    }

    fn heartbeats(&self) -> usize {
        self.app.broker().published_on(topics().heartbeat()).len()
    }
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn start_connects_and_subscribes() {
    let l = Loop::started();
    assert_eq!(l.app.state(), ConnectionState::Alive);
    assert_eq!(l.app.broker().connects, 1);
    assert_eq!(
        l.app.broker().subscriptions,
        vec!["sdl-demo/esp32/001122aabbcc/GPIO/#".to_owned()]
    );
}

#[test]
fn start_retries_once_after_delay() {
    let mut broker = MockBroker::new();
    broker.connect_failures = 1;
    let mut l = Loop::new(broker);
    let mut delay = MockDelay::default();

    l.app.start(&mut delay).unwrap();
    assert_eq!(l.app.broker().connects, 2);
    assert_eq!(delay.total_ns, 2_000 * 1_000_000);
    assert_eq!(l.app.state(), ConnectionState::Alive);
}

#[test]
fn second_boot_failure_is_fatal() {
    let mut broker = MockBroker::new();
    broker.connect_failures = 2;
    let mut l = Loop::new(broker);

    assert_eq!(
        l.app.start(&mut MockDelay::default()),
        Err(ConnectivityError::ConnectFailed)
    );
    assert_eq!(l.app.broker().connects, 2);
    assert!(l.app.broker().subscriptions.is_empty());
}

// ── Liveness ──────────────────────────────────────────────────

#[test]
fn heartbeat_fires_immediately_then_every_interval() {
    let mut l = Loop::started();
    l.step();
    assert_eq!(l.heartbeats(), 1);

    l.clock.advance(14_999);
    l.step();
    assert_eq!(l.heartbeats(), 1);

    l.clock.advance(1);
    l.step();
    assert_eq!(l.heartbeats(), 2);

    let body: serde_json::Value =
        serde_json::from_str(l.app.broker().published_on(topics().heartbeat())[1]).unwrap();
    assert_eq!(body["uptime_ms"], 15_000);
    assert_eq!(body["stats"]["accepted"], 0);
}

#[test]
fn sign_of_life_toggles_on_its_own_schedule() {
    let mut l = Loop::started();
    l.step();
    assert_eq!(l.app.indicator().toggles, 1);

    for _ in 0..4 {
        l.clock.advance(1_000);
        l.step();
    }
    assert_eq!(l.app.indicator().toggles, 1);

    l.clock.advance(1_000);
    l.step();
    assert_eq!(l.app.indicator().toggles, 2);
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn one_command_per_iteration() {
    let mut l = Loop::started();
    l.app
        .broker_mut()
        .push(&command_topic(), r#"{"R":10,"G":20,"B":30}"#);
    l.app
        .broker_mut()
        .push(&command_topic(), r#"{"R":300,"G":0,"B":0}"#);

    assert!(l.step().unwrap().accepted);
    assert!(!l.step().unwrap().accepted);
    assert!(l.step().is_none());

    assert_eq!(l.app.stats().accepted, 1);
    assert_eq!(l.app.stats().rejected, 1);
    assert_eq!(l.sinks.local.as_ref().unwrap().lines.len(), 2);
}

#[test]
fn messages_on_other_topics_produce_nothing() {
    let mut l = Loop::started();
    let stray = format!("{}heartbeat/", topics().prefix());
    l.app.broker_mut().push(&stray, "{}");
    assert!(l.step().is_none());
    assert!(l.hw.calls.is_empty());
}

// ── Link recovery ─────────────────────────────────────────────

#[test]
fn lost_link_reconnects_with_backoff() {
    let mut l = Loop::started();
    l.clock.set(10_000);
    l.app.broker_mut().drop_link = true;
    l.app.broker_mut().connect_failures = 1;

    l.step();
    assert_eq!(
        l.app.state(),
        ConnectionState::Reconnecting {
            attempt: 0,
            next_attempt_ms: 12_000
        }
    );

    // Not yet due: no connect attempt.
    l.clock.set(11_999);
    l.step();
    assert_eq!(l.app.broker().connects, 1);

    // First attempt fails; the next one waits twice as long.
    l.clock.set(12_000);
    l.step();
    assert_eq!(l.app.broker().connects, 2);
    assert_eq!(
        l.app.state(),
        ConnectionState::Reconnecting {
            attempt: 1,
            next_attempt_ms: 16_000
        }
    );

    l.clock.set(16_000);
    l.step();
    assert_eq!(l.app.state(), ConnectionState::Alive);
    assert_eq!(l.app.stats().reconnects, 1);
    assert_eq!(l.app.broker().subscriptions.len(), 2, "resubscribed");
}

#[test]
fn backoff_is_capped() {
    let mut l = Loop::started();
    l.app.broker_mut().drop_link = true;
    l.app.broker_mut().connect_failures = u32::MAX;
    l.step();

    let mut last_wait = 0;
    for _ in 0..10 {
        let ConnectionState::Reconnecting { next_attempt_ms, .. } = l.app.state() else {
            panic!("should still be reconnecting");
        };
        last_wait = next_attempt_ms - l.clock.now_ms();
        l.clock.set(next_attempt_ms);
        l.step();
    }
    assert_eq!(last_wait, 60_000);
}

#[test]
fn publish_failure_triggers_reconnect_but_keeps_local_copy() {
    let mut l = Loop::started();
    l.step();
    l.app.broker_mut().fail_publish = true;
    l.app
        .broker_mut()
        .push(&command_topic(), r#"{"R":10,"G":20,"B":30}"#);

    let report = l.step().unwrap();
    assert_eq!(report.link_lost(), Some(ConnectivityError::PublishFailed));
    assert!(matches!(l.app.state(), ConnectionState::Reconnecting { .. }));
    assert_eq!(l.sinks.local.as_ref().unwrap().lines.len(), 1);
}

#[test]
fn indicator_keeps_blinking_while_reconnecting() {
    let mut l = Loop::started();
    l.step();
    l.app.broker_mut().drop_link = true;
    l.app.broker_mut().connect_failures = u32::MAX;

    for _ in 0..4 {
        l.clock.advance(5_000);
        l.step();
    }
    assert!(matches!(l.app.state(), ConnectionState::Reconnecting { .. }));
    assert_eq!(l.app.indicator().toggles, 5);
}
