//! Device identity derived from the ESP32 factory MAC address.
//!
//! The thing name `esp32-xxyyzz` (last 3 MAC bytes, lowercase hex) is the
//! MQTT client id when no thing name is configured at build time.  It is
//! stable across reboots because the MAC is burned into eFuse.

use core::fmt::Write;

/// `esp32-xxyyzz` fits comfortably.
pub type ThingName = heapless::String<24>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
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

/// Derive the thing name from the last 3 MAC bytes.
pub fn thing_name(mac: &MacAddress) -> ThingName {
    let mut name = ThingName::new();
    let _ = write!(name, "esp32-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    name
}
