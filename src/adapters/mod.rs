//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements           | Connects to                 |
//! |--------------|----------------------|-----------------------------|
//! | `hardware`   | ActuatorPort         | WS2812 over RMT             |
//! |              | SpectralSensorPort   | AS7341 over I2C             |
//! |              | BuzzerPort           | piezo on LEDC PWM           |
//! |              | IndicatorPort        | onboard LED GPIO            |
//! | `mqtt`       | BrokerPort           | ESP-IDF MQTT client         |
//! | `file_log`   | LocalLogPort         | SPIFFS file                 |
//! | `remote_db`  | RemoteLogPort        | Data-API over HTTPS         |
//! | `nvs`        | ConfigPort           | NVS / in-memory store       |
//! |              | StoragePort          |                             |
//! | `time`       | Clock                | ESP32 system timer          |
//! | `wifi`       | (boot + link watch)  | ESP-IDF WiFi STA            |
//! | `device_id`  | (identity)           | eFuse MAC                   |

pub mod device_id;
pub mod file_log;
pub mod hardware;
pub mod mqtt;
pub mod nvs;
pub mod remote_db;
pub mod time;
pub(super) mod utils;
pub mod wifi;
