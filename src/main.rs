//! BLE Bridge Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiAdapter      BackendTransport       BleAdapter            │
//! │  (Connectivity)   (HTTP | MQTT)          (GATT peripheral)     │
//! │  Esp32TimeAdapter (ClockPort)                                  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │          BridgeService (GattCallbacks handler)         │    │
//! │  │  ConnectionRecord · StatusReporter                     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Bootstrap (Wi-Fi → backend) · LivenessMonitor (main loop)     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::bt::BtDriver;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use blebridge::adapters::backend::BackendTransport;
use blebridge::adapters::ble::{BleAdapter, DEVICE_NAME};
use blebridge::adapters::device_id;
use blebridge::adapters::time::Esp32TimeAdapter;
use blebridge::adapters::wifi::{ConnectivityPort, WifiAdapter};
use blebridge::app::ports::{ClockPort, TransportPort};
use blebridge::app::service::BridgeService;
use blebridge::bootstrap::{self, BootPolicies};
use blebridge::config::BridgeConfig;
use blebridge::diagnostics::{self, MemoryReport};
use blebridge::error::Error;
use blebridge::events::BLE_EVENTS;
use blebridge::liveness::{LivenessChange, LivenessMonitor};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    diagnostics::install_panic_handler();

    let config = BridgeConfig::from_build_env()?;
    log::set_max_level(config.log_level.to_level_filter());

    info!("╔══════════════════════════════════════╗");
    info!("║  BLE Bridge v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    if let Err(e) = config.validate() {
        // Keep going: BLE still comes up and the failure shows in the boot report.
        error!("Config invalid: {}", e);
    }

    let mac = device_id::read_mac();
    info!("Device: {} ({})", device_id::thing_name(&mac), DEVICE_NAME);

    // ── 2. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let (wifi_modem, bt_modem) = peripherals.modem.split();

    let clock = Esp32TimeAdapter::new();
    let mut delay = FreeRtos;

    // ── 3. Wi-Fi + backend ────────────────────────────────────
    let esp_wifi = EspWifi::new(wifi_modem, sysloop.clone(), Some(nvs.clone()))?;
    let mut wifi = WifiAdapter::new(BlockingWifi::wrap(esp_wifi, sysloop)?, config.wifi_retry);
    if let Err(e) = wifi.set_credentials(&config.wifi_ssid, &config.wifi_password) {
        warn!("WiFi: {}", e);
    }

    let mut transport = BackendTransport::from_config(&config);
    let policies = BootPolicies {
        wifi: config.wifi_retry,
        backend: transport.handshake_policy(&config),
    };
    let report = bootstrap::bring_up(&mut wifi, &mut transport, policies, &clock, &mut delay);
    info!("Boot report: {:?}", report);

    // ── 4. BLE service ────────────────────────────────────────
    let bt = BtDriver::new(bt_modem, Some(nvs))?;
    let mut ble = BleAdapter::new(bt, &BLE_EVENTS).map_err(Error::from)?;
    ble.start().map_err(Error::from)?;

    let mut service = BridgeService::new(
        transport,
        Esp32TimeAdapter::new(),
        FreeRtos,
        config.disconnect_settle_ms,
    );

    info!("Listening for new devices");

    // ── 5. Event loop ─────────────────────────────────────────
    let mut liveness = LivenessMonitor::new();

    loop {
        ble.process_pending(&mut service);

        wifi.poll(clock.uptime_ms());

        if let Some(change) = liveness.observe(service.transport().is_connected()) {
            match change {
                LivenessChange::Connected => info!("{}: connected to server", service.transport().name()),
                LivenessChange::Disconnected => warn!("{}: lost server", service.transport().name()),
            }
            info!(
                "MEMREPORT | {} | clients {} | sent {} dropped {} | rssi {:?}",
                MemoryReport::collect(),
                service.record().clients(),
                service.reporter().sent(),
                service.reporter().dropped(),
                wifi.rssi(),
            );
        }

        FreeRtos::delay_ms(config.loop_interval_ms);
    }
}
