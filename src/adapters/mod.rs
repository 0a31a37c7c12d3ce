//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements         | Connects to                     |
//! |-------------|--------------------|---------------------------------|
//! | `ble`       | PeripheralPort     | Bluedroid GATT server           |
//! | `http`      | TransportPort      | HTTPS status endpoint           |
//! | `mqtt`      | TransportPort      | MQTT broker over TLS (X.509)    |
//! | `backend`   | TransportPort      | whichever of the two is chosen  |
//! | `time`      | ClockPort          | ESP32 system timer              |
//! | `wifi`      | ConnectivityPort   | ESP-IDF WiFi STA                |
//! | `device_id` | none               | eFuse base MAC                  |

pub mod backend;
pub mod ble;
pub mod device_id;
pub mod http;
pub mod mqtt;
pub mod time;
pub(crate) mod utils;
pub mod wifi;
