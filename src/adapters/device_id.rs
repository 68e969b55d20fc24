//! Device identity derived from the ESP32 factory MAC address.
//!
//! Three forms exist:
//! - the raw id (MAC bytes as lowercase hex), which names the topic
//!   namespace and is only logged locally,
//! - the obfuscated id, an HMAC-SHA256 of the raw id under a fixed
//!   application key, hex encoded,
//! - the public id, the first 10 characters of the obfuscated id.  This is
//!   the only form that leaves the device in telemetry.
//!
//! The MAC is factory-burned, so every form is stable across reboots.

use core::fmt::Write;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Length of the truncated public id.
pub const PUBLIC_ID_LEN: usize = 10;

const OBFUSCATION_KEY: &[u8] = b"sdl-demo/device-id/v1";

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: `mac` is a valid 6-byte buffer for the duration of the call.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    raw: heapless::String<12>,
    obfuscated: heapless::String<64>,
}

impl DeviceIdentity {
    pub fn from_mac(mac: &MacAddress) -> Self {
        let mut raw = heapless::String::new();
        for b in mac {
            // 6 bytes → 12 hex chars, always fits.
            let _ = write!(raw, "{:02x}", b);
        }
        let tag = hmac_sha256::HMAC::mac(raw.as_bytes(), OBFUSCATION_KEY);
        let mut obfuscated = heapless::String::new();
        for b in tag {
            let _ = write!(obfuscated, "{:02x}", b);
        }
        Self { raw, obfuscated }
    }

    /// Identity of the chip we are running on.
    pub fn this_device() -> Self {
        Self::from_mac(&read_mac())
    }

    /// Hex form of the hardware id.  Keep private.
    pub fn raw_hex(&self) -> &str {
        &self.raw
    }

    pub fn obfuscated(&self) -> &str {
        &self.obfuscated
    }

    /// Shareable prefix of the obfuscated id.
    pub fn public_id(&self) -> &str {
        &self.obfuscated[..PUBLIC_ID_LEN]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_hex_is_lowercase_mac() {
        let id = DeviceIdentity::from_mac(&[0x00, 0x11, 0x22, 0xAA, 0xBB, 0xCC]);
        assert_eq!(id.raw_hex(), "001122aabbcc");
    }

    #[test]
    fn obfuscated_is_full_hmac_hex() {
        let id = DeviceIdentity::from_mac(&read_mac());
        assert_eq!(id.obfuscated().len(), 64);
        assert!(id.obfuscated().bytes().all(|b| b.is_ascii_hexdigit()));
        assert!(!id.obfuscated().contains(id.raw_hex()));
    }

    #[test]
    fn public_id_is_prefix() {
        let id = DeviceIdentity::from_mac(&read_mac());
        assert_eq!(id.public_id().len(), PUBLIC_ID_LEN);
        assert!(id.obfuscated().starts_with(id.public_id()));
    }

    #[test]
    fn deterministic_and_distinct() {
        let a = DeviceIdentity::from_mac(&[1, 2, 3, 4, 5, 6]);
        let b = DeviceIdentity::from_mac(&[1, 2, 3, 4, 5, 6]);
        let c = DeviceIdentity::from_mac(&[1, 2, 3, 4, 5, 7]);
        assert_eq!(a, b);
        assert_ne!(a.public_id(), c.public_id());
    }
}
