//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the RelayNode.  The configuration is
//! stored as two independent postcard blobs in the `relaynode` namespace:
//!
//! | Key    | Contents            |
//! |--------|---------------------|
//! | `wifi` | [`WifiCredentials`] |
//! | `bus`  | [`BusConfig`]       |
//!
//! A missing or corrupted blob falls back to defaults for that section
//! only, so a bad bus blob never costs the station credentials.
//!
//! - Validation: every section is checked before persistence.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::{validate_password, validate_ssid, BusConfig, DeviceConfig, WifiCredentials};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const CONFIG_NAMESPACE: &str = "relaynode";
const WIFI_KEY: &str = "wifi";
const BUS_KEY: &str = "bus";

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32
                || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32
            {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as i32 {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    // ── Section helpers ───────────────────────────────────────

    /// Load one section, falling back to its default on any failure.
    fn load_section<T>(&self, key: &str) -> T
    where
        T: serde::de::DeserializeOwned + Default,
    {
        match self.read_blob(key) {
            Ok(Some(bytes)) => match postcard::from_bytes(&bytes) {
                Ok(value) => {
                    info!("NvsAdapter: loaded '{}' ({} bytes)", key, bytes.len());
                    value
                }
                Err(_) => {
                    warn!("NvsAdapter: '{}' corrupted, using defaults", key);
                    T::default()
                }
            },
            Ok(None) => {
                info!("NvsAdapter: no stored '{}', using defaults", key);
                T::default()
            }
            Err(e) => {
                warn!("NvsAdapter: reading '{}' failed ({}), using defaults", key, e);
                T::default()
            }
        }
    }

    fn save_section<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        let bytes = postcard::to_allocvec(value).map_err(|_| ConfigError::IoError)?;
        self.write_blob(key, &bytes)?;
        info!("NvsAdapter: saved '{}' ({} bytes)", key, bytes.len());
        Ok(())
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.store.borrow().get(key).cloned())
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<(), ConfigError> {
        self.store.borrow_mut().insert(key.to_owned(), bytes.to_vec());
        Ok(())
    }

    /// Simulation: overwrite a raw blob (e.g. to plant a corrupted one).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_write_raw(&self, key: &str, bytes: &[u8]) {
        self.store.borrow_mut().insert(key.to_owned(), bytes.to_vec());
    }

    /// Open the config namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = CONFIG_NAMESPACE.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn key_buf(key: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let kb = key.as_bytes();
        let kl = kb.len().min(15);
        buf[..kl].copy_from_slice(&kb[..kl]);
        buf
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        let key_buf = Self::key_buf(key);
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;
            // First call: get size
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret == ESP_ERR_NVS_NOT_FOUND as i32 {
                return Ok(None);
            }
            if ret != ESP_OK as i32 || size == 0 || size > MAX_BLOB_SIZE {
                return Err(ret);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(Some(buf))
        });
        match result {
            Ok(blob) => Ok(blob),
            // Namespace not created yet: first boot.
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(None),
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<(), ConfigError> {
        let key_buf = Self::key_buf(key);
        let result = Self::with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    bytes.as_ptr() as *const _,
                    bytes.len(),
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(())
        });
        result.map_err(|e| {
            warn!("NvsAdapter: NVS write error {}", e);
            if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE as i32 {
                ConfigError::StorageFull
            } else {
                ConfigError::IoError
            }
        })
    }
}

fn validate_wifi(wifi: &WifiCredentials) -> Result<(), ConfigError> {
    if wifi.ssid.is_empty() {
        // Clearing credentials is allowed.
        return Ok(());
    }
    validate_ssid(&wifi.ssid).map_err(|_| ConfigError::ValidationFailed("ssid invalid"))?;
    validate_password(&wifi.password)
        .map_err(|_| ConfigError::ValidationFailed("password must be empty or 8-64 bytes"))
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        Ok(DeviceConfig {
            wifi: self.load_section::<WifiCredentials>(WIFI_KEY),
            bus: self.load_section::<BusConfig>(BUS_KEY),
        })
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        validate_wifi(&config.wifi)?;
        config.bus.validate()?;
        self.save_section(WIFI_KEY, &config.wifi)?;
        self.save_section(BUS_KEY, &config.bus)
    }
}
