//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] on the ESP-IDF NVS partition (or an in-memory
//! map on the host) and [`ConfigPort`] on top of it.  Config and secrets
//! are postcard blobs in the `sdl` namespace.
//!
//! Secrets stored here take precedence over values baked in at build time;
//! when nothing is stored, [`Secrets::from_build_env`] is used.

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::{Secrets, SystemConfig};
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const NAMESPACE: &str = "sdl";
const CONFIG_KEY: &str = "syscfg";
const SECRETS_KEY: &str = "secrets";

/// Largest blob this adapter reads back.
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Vec<u8>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.  A full or version-mismatched partition is
    /// erased and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK
                {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
            Ok(Self {})
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("NvsAdapter: simulation backend");
            Ok(Self {
                store: HashMap::new(),
            })
        }
    }

    fn read_blob<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        match self.read(NAMESPACE, key, &mut buf) {
            Ok(len) => postcard::from_bytes(&buf[..len])
                .map(Some)
                .map_err(|_| ConfigError::Corrupted),
            Err(StorageError::NotFound) => Ok(None),
            Err(_) => Err(ConfigError::IoError),
        }
    }

    fn write_blob<T: serde::Serialize>(&mut self, key: &str, value: &T) -> Result<(), ConfigError> {
        let bytes = postcard::to_allocvec(value).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::IoError);
        }
        self.write(NAMESPACE, key, &bytes)
            .map_err(|_| ConfigError::IoError)
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NUL-terminated copy of an NVS name (max 15 chars).
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let len = name.len().min(15);
        buf[..len].copy_from_slice(&name.as_bytes()[..len]);
        buf
    }

    /// Open a namespace, run `f` with the handle, close it again.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(namespace);
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn commit(handle: nvs_handle_t) -> Result<(), i32> {
        let ret = unsafe { nvs_commit(handle) };
        if ret == ESP_OK { Ok(()) } else { Err(ret) }
    }
}

// ── ConfigPort ────────────────────────────────────────────────

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        match self.read_blob::<SystemConfig>(CONFIG_KEY)? {
            Some(cfg) => {
                cfg.validate()?;
                info!("NvsAdapter: loaded config");
                Ok(cfg)
            }
            None => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
        }
    }

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.write_blob(CONFIG_KEY, config)?;
        info!("NvsAdapter: config saved");
        Ok(())
    }

    fn load_secrets(&self) -> Result<Secrets, ConfigError> {
        match self.read_blob::<Secrets>(SECRETS_KEY) {
            Ok(Some(secrets)) => Ok(secrets),
            Ok(None) => Ok(Secrets::from_build_env()),
            Err(e) => {
                warn!("NvsAdapter: stored secrets unreadable ({}), using build-time values", e);
                Ok(Secrets::from_build_env())
            }
        }
    }

    fn save_secrets(&mut self, secrets: &Secrets) -> Result<(), ConfigError> {
        if !super::utils::is_printable_ascii(&secrets.wifi_ssid) {
            return Err(ConfigError::ValidationFailed("wifi_ssid must be printable ASCII"));
        }
        self.write_blob(SECRETS_KEY, secrets)
    }
}

// ── StoragePort ───────────────────────────────────────────────

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let data = self
                .store
                .get(&Self::composite_key(namespace, key))
                .ok_or(StorageError::NotFound)?;
            let len = data.len().min(buf.len());
            buf[..len].copy_from_slice(&data[..len]);
            Ok(len)
        }

        #[cfg(target_os = "espidf")]
        {
            let k = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        k.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret == ESP_OK { Ok(size) } else { Err(ret) }
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .insert(Self::composite_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let k = Self::c_name(key);
            Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        k.as_ptr() as *const _,
                        data.as_ptr() as *const _,
                        data.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Self::commit(handle)
            })
            .map_err(|e| {
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .contains_key(&Self::composite_key(namespace, key))
        }

        #[cfg(target_os = "espidf")]
        {
            let k = Self::c_name(key);
            Self::with_nvs_handle(namespace, false, |handle| {
                let ret =
                    unsafe { nvs_find_key(handle, k.as_ptr() as *const _, core::ptr::null_mut()) };
                Ok(ret == ESP_OK)
            })
            .unwrap_or(false)
        }
    }
}

impl NvsAdapter {
    /// True when secrets have been provisioned into NVS.
    pub fn has_stored_secrets(&self) -> bool {
        self.exists(NAMESPACE, SECRETS_KEY)
    }
}
