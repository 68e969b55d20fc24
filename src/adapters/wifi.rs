//! WiFi station-mode adapter.
//!
//! Association and DHCP happen once at boot; afterwards [`WifiAdapter::poll`]
//! is called every loop iteration and re-associates on link loss.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi`.
//! - **all other targets**: simulation stub for host-side tests.
//!
//! ## Reconnection policy
//!
//! After a drop the adapter waits an exponential backoff (2 s → 4 s →
//! 8 s … capped at 60 s) between attempts.

use core::fmt;
use log::{error, info, warn};

use super::utils::is_printable_ascii;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(
                f,
                "password invalid (must be 8-64 bytes for WPA2, or empty for open)"
            ),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connected,
    Reconnecting { attempt: u32, next_attempt_ms: u64 },
}

const MIN_BACKOFF_MS: u32 = 2_000;
const MAX_BACKOFF_MS: u32 = 60_000;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), WifiError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(WifiError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), WifiError> {
    if password.is_empty() || (8..=64).contains(&password.len()) {
        Ok(())
    } else {
        Err(WifiError::InvalidPassword)
    }
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Simulation: link is up.
    #[cfg(not(target_os = "espidf"))]
    sim_link_up: bool,
    /// Simulation: number of upcoming connect attempts that fail.
    #[cfg(not(target_os = "espidf"))]
    sim_failures: u32,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: BlockingWifi<EspWifi<'static>>) -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            wifi,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            sim_link_up: false,
            sim_failures: 0,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), WifiError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid
            .push_str(ssid)
            .map_err(|_| WifiError::InvalidSsid)?;
        self.password.clear();
        self.password
            .push_str(password)
            .map_err(|_| WifiError::InvalidPassword)?;
        info!("WiFi: credentials set (SSID='{}')", self.ssid);
        Ok(())
    }

    /// Associate and wait for an IP.  Blocking; boot only.
    pub fn connect(&mut self) -> Result<(), WifiError> {
        if self.ssid.is_empty() {
            return Err(WifiError::NoCredentials);
        }
        info!("WiFi: connecting to '{}'", self.ssid);
        match self.platform_connect() {
            Ok(()) => {
                self.state = WifiState::Connected;
                info!("WiFi: connected");
                Ok(())
            }
            Err(e) => {
                error!("WiFi: connection failed: {}", e);
                self.state = WifiState::Reconnecting {
                    attempt: 0,
                    next_attempt_ms: 0,
                };
                Err(e)
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == WifiState::Connected && self.platform_is_connected()
    }

    /// Watch the link and re-associate when a backoff slot is due.
    pub fn poll(&mut self, now_ms: u64) {
        match self.state {
            WifiState::Connected if !self.platform_is_connected() => {
                warn!("WiFi: link lost, entering reconnect");
                self.state = WifiState::Reconnecting {
                    attempt: 0,
                    next_attempt_ms: now_ms + u64::from(MIN_BACKOFF_MS),
                };
            }
            WifiState::Reconnecting {
                attempt,
                next_attempt_ms,
            } if now_ms >= next_attempt_ms => match self.platform_connect() {
                Ok(()) => {
                    self.state = WifiState::Connected;
                    info!("WiFi: reconnected after {} attempt(s)", attempt + 1);
                }
                Err(_) => {
                    let backoff = (u64::from(MIN_BACKOFF_MS) << (attempt + 1).min(16))
                        .min(u64::from(MAX_BACKOFF_MS));
                    self.state = WifiState::Reconnecting {
                        attempt: attempt + 1,
                        next_attempt_ms: now_ms + backoff,
                    };
                }
            },
            _ => {}
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), WifiError> {
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: self
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| WifiError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| WifiError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });
        let link = |e: esp_idf_svc::sys::EspError| {
            warn!("WiFi: driver error {}", e);
            WifiError::ConnectionFailed
        };
        self.wifi.set_configuration(&config).map_err(link)?;
        if !self.wifi.is_started().map_err(link)? {
            self.wifi.start().map_err(link)?;
        }
        self.wifi.connect().map_err(link)?;
        self.wifi.wait_netif_up().map_err(link)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), WifiError> {
        if self.sim_failures > 0 {
            self.sim_failures -= 1;
            return Err(WifiError::ConnectionFailed);
        }
        self.sim_link_up = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_link_up
    }

    /// Simulation: drop the link and fail the next `failures` attempts.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self, failures: u32) {
        self.sim_link_up = false;
        self.sim_failures = failures;
    }
}
