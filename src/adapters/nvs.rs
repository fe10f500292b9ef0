//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigStore`] and [`StoragePort`] for the HerpTherm
//! controller.
//!
//! - Config validation: all fields are range-checked before persistence —
//!   a compromised network channel must not be able to inject dangerous
//!   operating parameters (e.g. lifting `max_temp_c` to `f32::MAX`).
//! - Namespace isolation: each subsystem uses its own namespace prefix.
//! - Atomic writes: ESP-IDF NVS commits are atomic per nvs_commit().
//!   The in-memory simulation backend achieves this trivially.

use crate::app::ports::{ConfigError, ConfigStore, StorageError, StoragePort};
use crate::channel::{HardwareKind, CHANNEL_COUNT};
use crate::config::{ChannelConfig, SystemConfig};
use log::info;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "herptherm";
const SYSTEM_KEY: &str = "syscfg";

/// Upper bound on a serialized config blob.
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl Default for NvsAdapter {
    fn default() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        }
    }
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
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                log::warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self::default())
    }

    fn channel_key(index: usize) -> heapless::String<8> {
        let mut key = heapless::String::new();
        // "ch0".."ch3" — never exceeds capacity for a one-digit table.
        let _ = core::fmt::Write::write_fmt(&mut key, format_args!("ch{index}"));
        key
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = namespace.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: ns_buf is NUL-terminated by construction; the handle is
        // closed before returning on every path.
        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    fn load_blob<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        let n = match self.read(CONFIG_NAMESPACE, key, &mut buf) {
            Ok(n) => n,
            Err(StorageError::NotFound) => return Err(ConfigError::NotFound),
            Err(_) => return Err(ConfigError::IoError),
        };
        postcard::from_bytes(&buf[..n]).map_err(|_| ConfigError::Corrupted)
    }

    fn save_blob<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        let used = postcard::to_slice(value, &mut buf).map_err(|_| ConfigError::IoError)?;
        // StoragePort::write takes &mut self; interior mutability on the
        // sim backend and a stateless handle on ESP-IDF let config saves
        // stay &self like the port expects.
        match self.write_inner(CONFIG_NAMESPACE, key, used) {
            Ok(()) => Ok(()),
            Err(StorageError::Full) => Err(ConfigError::StorageFull),
            Err(_) => Err(ConfigError::IoError),
        }
    }

    #[cfg(target_os = "espidf")]
    fn write_inner(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let mut key_buf = [0u8; 16];
        let kb = key.as_bytes();
        let len = kb.len().min(15);
        key_buf[..len].copy_from_slice(&kb[..len]);

        Self::with_nvs_handle(namespace, true, |handle| {
            // SAFETY: key_buf is NUL-terminated; data pointer/len are valid
            // for the duration of the call.
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    data.as_ptr() as *const _,
                    data.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|rc| {
            if rc == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                StorageError::Full
            } else {
                StorageError::IoError
            }
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_inner(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }
}

// ── StoragePort implementation ────────────────────────────────

impl StoragePort for NvsAdapter {
    #[cfg(target_os = "espidf")]
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let mut key_buf = [0u8; 16];
        let kb = key.as_bytes();
        let len = kb.len().min(15);
        key_buf[..len].copy_from_slice(&kb[..len]);

        Self::with_nvs_handle(namespace, false, |handle| {
            let mut size = buf.len();
            // SAFETY: buf is valid for `size` bytes; NVS writes at most
            // `size` and reports the actual length back.
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(size)
        })
        .map_err(|rc| {
            if rc == ESP_ERR_NVS_NOT_FOUND {
                StorageError::NotFound
            } else {
                StorageError::IoError
            }
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.borrow().get(&Self::composite_key(namespace, key)) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.write_inner(namespace, key, data)
    }

    #[cfg(target_os = "espidf")]
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let mut key_buf = [0u8; 16];
        let kb = key.as_bytes();
        let len = kb.len().min(15);
        key_buf[..len].copy_from_slice(&kb[..len]);

        Self::with_nvs_handle(namespace, true, |handle| {
            // SAFETY: key_buf is NUL-terminated.
            let ret = unsafe { nvs_erase_key(handle, key_buf.as_ptr() as *const _) };
            if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|_| StorageError::IoError)
    }

    #[cfg(not(target_os = "espidf"))]
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store
            .borrow_mut()
            .remove(&Self::composite_key(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        let mut probe = [0u8; 1];
        !matches!(self.read(namespace, key, &mut probe), Err(StorageError::NotFound))
    }
}

// ── ConfigStore implementation ────────────────────────────────

impl ConfigStore for NvsAdapter {
    fn load_system(&self) -> Result<SystemConfig, ConfigError> {
        match self.load_blob(SYSTEM_KEY) {
            Err(ConfigError::NotFound) => Ok(SystemConfig::default()),
            other => other,
        }
    }

    fn save_system(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        if config.control_tick_ms == 0 || config.sensor_sample_ms == 0 {
            return Err(ConfigError::ValidationFailed("tick periods must be nonzero"));
        }
        self.save_blob(SYSTEM_KEY, config)
    }

    fn load_channel(&self, index: usize) -> Result<ChannelConfig, ConfigError> {
        if index >= CHANNEL_COUNT {
            return Err(ConfigError::ValidationFailed("channel index out of range"));
        }
        match self.load_blob(&Self::channel_key(index)) {
            Err(ConfigError::NotFound) => Ok(ChannelConfig::default_for_slot(index)),
            other => other,
        }
    }

    fn save_channel(&self, index: usize, config: &ChannelConfig) -> Result<(), ConfigError> {
        if index >= CHANNEL_COUNT {
            return Err(ConfigError::ValidationFailed("channel index out of range"));
        }
        if !config.device.compatible_with(HardwareKind::for_slot(index)) {
            return Err(ConfigError::ValidationFailed("device incompatible with slot"));
        }
        if config.safety.validate().is_err() {
            return Err(ConfigError::ValidationFailed("safety limits out of range"));
        }
        if config.manual_power > 100 {
            return Err(ConfigError::ValidationFailed("manual power above 100 %"));
        }
        self.save_blob(&Self::channel_key(index), config)
    }
}
