//! mDNS name advertisement adapter.
//!
//! Registers `relaynode-XXYYZZ.local` and advertises the web UI as
//! `_http._tcp` on port 80.  Uses the ESP-IDF mDNS component on target
//! and is a no-op on simulation targets.
//!
//! Registration is best effort: a failure is logged and the device keeps
//! serving on its IP address.

use log::info;

use crate::error::Result;
#[cfg(target_os = "espidf")]
use crate::error::Error;

const MDNS_SERVICE_TYPE: &str = "_http";
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MDNS_SERVICE_PROTO: &str = "_tcp";
const MDNS_SERVICE_PORT: u16 = 80;

/// mDNS advertisement adapter.
pub struct MdnsAdapter {
    hostname: heapless::String<24>,
    device_id: heapless::String<16>,
    active: bool,
}

impl MdnsAdapter {
    pub fn new(hostname: heapless::String<24>, device_id: heapless::String<16>) -> Self {
        Self {
            hostname,
            device_id,
            active: false,
        }
    }

    /// Whether mDNS is currently advertising.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start hostname + service advertisement.
    /// Call after the station has an IP.
    pub fn start(&mut self) -> Result<()> {
        if self.active {
            return Ok(());
        }
        self.platform_start()?;
        self.active = true;
        info!(
            "mDNS: advertising {}.local {}.{}:{} (device={})",
            self.hostname, MDNS_SERVICE_TYPE, MDNS_SERVICE_PROTO, MDNS_SERVICE_PORT, self.device_id
        );
        Ok(())
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&self) -> Result<()> {
        use esp_idf_svc::sys::*;

        let mut hostname_buf = [0u8; 32];
        let hb = self.hostname.as_bytes();
        let hl = hb.len().min(31);
        hostname_buf[..hl].copy_from_slice(&hb[..hl]);

        let mut id_buf = [0u8; 24];
        let ib = self.device_id.as_bytes();
        let il = ib.len().min(23);
        id_buf[..il].copy_from_slice(&ib[..il]);

        // SAFETY: all pointers reference NUL-terminated buffers that
        // outlive the calls; mDNS copies them internally.
        unsafe {
            if mdns_init() != ESP_OK as i32 {
                return Err(Error::Init("mdns_init"));
            }
            if mdns_hostname_set(hostname_buf.as_ptr() as *const _) != ESP_OK as i32 {
                return Err(Error::Init("mdns_hostname_set"));
            }
            mdns_instance_name_set(b"RelayNode\0".as_ptr() as *const _);

            let svc_type = b"_http\0";
            let svc_proto = b"_tcp\0";
            if mdns_service_add(
                core::ptr::null(),
                svc_type.as_ptr() as *const _,
                svc_proto.as_ptr() as *const _,
                MDNS_SERVICE_PORT,
                core::ptr::null_mut(),
                0,
            ) != ESP_OK as i32
            {
                return Err(Error::Init("mdns_service_add"));
            }
            mdns_service_txt_item_set(
                svc_type.as_ptr() as *const _,
                svc_proto.as_ptr() as *const _,
                b"id\0".as_ptr() as *const _,
                id_buf.as_ptr() as *const _,
            );
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&self) -> Result<()> {
        info!(
            "mDNS(sim): registered {}.local v={}",
            self.hostname,
            env!("CARGO_PKG_VERSION"),
        );
        Ok(())
    }
}
