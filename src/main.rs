//! SDL demo firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        MqttAdapter    FileLog     RemoteDb    │
//! │  (NeoPixel+AS7341+Buzz) (BrokerPort)   (LocalLog)  (RemoteLog) │
//! │  StatusLed   NvsAdapter   SystemClock   WifiAdapter            │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  validate · execute · fan-out · liveness · reconnect   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};

use esp_idf_hal::delay::{Delay, FreeRtos};
use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::ledc::config::TimerConfig;
use esp_idf_hal::ledc::{LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::rmt::TxRmtDriver;
use esp_idf_hal::rmt::config::TransmitConfig;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use sdl_demo::adapters::device_id::DeviceIdentity;
use sdl_demo::adapters::file_log::{self, FileLog};
use sdl_demo::adapters::hardware::HardwareAdapter;
use sdl_demo::adapters::mqtt::{INBOUND, MqttAdapter};
use sdl_demo::adapters::nvs::NvsAdapter;
use sdl_demo::adapters::remote_db::RemoteDb;
use sdl_demo::adapters::time::SystemClock;
use sdl_demo::adapters::wifi::WifiAdapter;
use sdl_demo::app::dispatcher::{CommandDispatcher, DeviceLabel, Sinks};
use sdl_demo::app::executor;
use sdl_demo::app::ports::{Clock, ConfigPort};
use sdl_demo::app::service::{AppService, ConnectionState};
use sdl_demo::app::topics::Topics;
use sdl_demo::config::{Secrets, SystemConfig};
use sdl_demo::diagnostics;
use sdl_demo::drivers::as7341::As7341;
use sdl_demo::drivers::buzzer::{BEEP_FREQ_HZ, Buzzer};
use sdl_demo::drivers::neopixel::NeoPixel;
use sdl_demo::drivers::status_led::StatusLed;
use sdl_demo::drivers::watchdog::Watchdog;
use sdl_demo::pins;

/// Loop pause while the broker link is down, so reconnect scheduling does
/// not spin the core.
const LINK_DOWN_IDLE_MS: u32 = 50;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  SDL demo v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    diagnostics::install_panic_handler();
    let watchdog = Watchdog::new();

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Config + secrets from NVS (or defaults) ────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            None
        }
    };
    let config = match nvs.as_ref().map(ConfigPort::load) {
        Some(Ok(cfg)) => {
            info!("Config loaded from NVS");
            cfg
        }
        Some(Err(e)) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
        None => SystemConfig::default(),
    };
    let secrets = load_secrets(nvs.as_mut());

    // ── 3. WiFi ───────────────────────────────────────────────
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs_partition))?;
    let mut wifi = WifiAdapter::new(BlockingWifi::wrap(esp_wifi, sysloop)?);
    match wifi.set_credentials(&secrets.wifi_ssid, &secrets.wifi_password) {
        Ok(()) => {
            if let Err(e) = wifi.connect() {
                warn!("WiFi: {} (will keep retrying)", e);
            }
        }
        Err(e) => warn!("WiFi: {}", e),
    }

    // ── 4. Device identity + topics ───────────────────────────
    let identity = DeviceIdentity::this_device();
    info!("Device id (private): {}", identity.raw_hex());
    info!("Device id (obfuscated): {}", identity.obfuscated());
    info!("Device id (public): {}", identity.public_id());
    let topics = Topics::new(identity.raw_hex()).map_err(|e| anyhow!("{e}"))?;
    info!("Topic prefix: {}", topics.prefix());

    // ── 5. Instrument hardware ────────────────────────────────
    // SAFETY: each GPIO number in `pins` is used for exactly one driver.
    let (px_pin, sda, scl, buzz_pin, led_pin) = unsafe {
        (
            AnyOutputPin::new(pins::NEOPIXEL_GPIO),
            AnyIOPin::new(pins::I2C_SDA_GPIO),
            AnyIOPin::new(pins::I2C_SCL_GPIO),
            AnyOutputPin::new(pins::BUZZER_GPIO),
            AnyOutputPin::new(pins::STATUS_LED_GPIO),
        )
    };

    let light = NeoPixel::new(TxRmtDriver::new(
        peripherals.rmt.channel0,
        px_pin,
        &TransmitConfig::new().clock_divider(1),
    )?);

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        sda,
        scl,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ)),
    )?;
    // Long integrations feed the watchdog from inside the sensor's waits.
    let sensor = As7341::new(i2c, watchdog.feeding(Delay::new_default()))
        .map_err(|e| anyhow!("AS7341: {e}"))?;

    let timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::new()
            .frequency(Hertz(BEEP_FREQ_HZ))
            .resolution(Resolution::Bits10),
    )?;
    let buzzer = Buzzer::new(
        LedcDriver::new(peripherals.ledc.channel0, timer, buzz_pin)?,
        Delay::new_default(),
    );

    let mut hw = HardwareAdapter::take(light, sensor, buzzer).map_err(|e| anyhow!("{e}"))?;
    if let Err(e) = executor::reset_experiment(&mut hw) {
        warn!("Boot: light reset failed: {}", e);
    }
    let status_led = StatusLed::new(PinDriver::output(led_pin)?);

    // ── 6. Telemetry sinks ────────────────────────────────────
    let local = match file_log::mount_flash().and_then(|()| FileLog::open(&config.local_log_path)) {
        Ok(log) => Some(log),
        Err(e) => {
            warn!("Local log disabled for this boot: {}", e);
            None
        }
    };
    let remote = RemoteDb::from_config(&config, &secrets);
    info!(
        "Sinks: local={} remote={}",
        local.is_some(),
        remote.is_some()
    );
    let mut sinks = Sinks::new(local, remote);

    // ── 7. App service + first broker session ─────────────────
    let label = DeviceLabel {
        nickname: heapless::String::try_from(secrets.nickname()).unwrap_or_default(),
        public_id: heapless::String::try_from(identity.public_id()).unwrap_or_default(),
    };
    let client_id = format!("sdl-demo-{}", identity.public_id());
    let clock = SystemClock::new();
    let mut app = AppService::new(
        &config,
        CommandDispatcher::new(topics, label),
        MqttAdapter::new(&config, &client_id, &INBOUND),
        clock,
        status_led,
    );

    if let Err(e) = app.start(&mut Delay::new_default()) {
        error!("Broker unreachable after retry ({}), restarting", e);
        esp_idf_hal::reset::restart();
    }

    info!("System ready. Entering control loop.");

    // ── 8. Control loop ───────────────────────────────────────
    loop {
        if let Some(report) = app.poll_once(&mut hw, &mut sinks) {
            debug!(
                "Command done: accepted={} sink failures={} free heap={}",
                report.accepted,
                report.sink_failures(),
                diagnostics::free_heap()
            );
        }

        wifi.poll(clock.now_ms());

        if app.state() != ConnectionState::Alive {
            FreeRtos::delay_ms(LINK_DOWN_IDLE_MS);
        }

        watchdog.feed();
    }
}

/// Secrets from NVS, falling back to build-time values.  Build-time WiFi
/// credentials are persisted on first boot so later images may omit them.
fn load_secrets(nvs: Option<&mut NvsAdapter>) -> Secrets {
    let Some(nvs) = nvs else {
        return Secrets::from_build_env();
    };
    let secrets = nvs.load_secrets().unwrap_or_else(|e| {
        warn!("NVS secrets load failed ({}), using build-time values", e);
        Secrets::from_build_env()
    });
    if !nvs.has_stored_secrets() && secrets.has_wifi() {
        match nvs.save_secrets(&secrets) {
            Ok(()) => info!("Secrets persisted to NVS"),
            Err(e) => warn!("Secrets not persisted: {}", e),
        }
    }
    secrets
}
