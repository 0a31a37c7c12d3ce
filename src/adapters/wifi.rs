//! Wi-Fi station-mode adapter.
//!
//! Implements [`ConnectivityPort`], the hexagonal boundary for network
//! connectivity.  Boot-time association is driven by
//! [`bootstrap`](crate::bootstrap) through a [`RetryPolicy`]; once the
//! main loop runs, [`ConnectivityPort::poll`] takes over and re-associates
//! after a dropped link.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF driver via `esp_idf_svc::wifi::BlockingWifi`.
//! - **all other targets**: simulation with injectable failures for host tests.
//!
//! ## Reconnection policy
//!
//! After a lost link the adapter waits the policy's backoff (500 ms →
//! 1 s → 2 s … capped) before each retry.  Background reconnection never
//! gives up.  `poll` never blocks: it starts an association and checks on
//! it in later iterations, abandoning it after [`ASSOCIATE_TIMEOUT_MS`].

use core::fmt;
use log::{error, info, warn};

use crate::adapters::utils::is_printable_ascii;
use crate::retry::RetryPolicy;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

/// Longest a background association may stay pending.
pub const ASSOCIATE_TIMEOUT_MS: u64 = 15_000;

// ───────────────────────────────────────────────────────────────
// Port trait
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AlreadyConnected,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
        }
    }
}

pub trait ConnectivityPort {
    /// One association attempt.  Blocks until the interface has an IP or
    /// the driver reports failure.
    fn connect(&mut self) -> Result<(), ConnectivityError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    /// Background link supervision; call once per main-loop iteration.
    /// Returns without waiting on the driver.
    fn poll(&mut self, now_ms: u64);
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;
    /// Signal strength of the associated AP in dBm, `None` when not associated.
    fn rssi(&self) -> Option<i8>;
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32, next_at_ms: u64 },
    /// Background association started at `started_ms`, link not up yet.
    Associating { attempt: u32, started_ms: u64 },
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Wi-Fi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    reconnect: RetryPolicy,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Simulation: remaining connect attempts that should fail.
    #[cfg(not(target_os = "espidf"))]
    sim_failures: u32,
    /// Simulation: whether the fake AP currently holds our link.
    #[cfg(not(target_os = "espidf"))]
    sim_link: bool,
    /// Simulation: total platform connect calls.
    #[cfg(not(target_os = "espidf"))]
    sim_attempts: u32,
    /// Simulation: link checks that report "not up" before a background
    /// association completes.
    #[cfg(not(target_os = "espidf"))]
    sim_assoc_checks: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_associating: bool,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: BlockingWifi<EspWifi<'static>>, reconnect: RetryPolicy) -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            reconnect,
            wifi,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(reconnect: RetryPolicy) -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            reconnect,
            sim_failures: 0,
            sim_link: false,
            sim_attempts: 0,
            sim_assoc_checks: 0,
            sim_associating: false,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    /// Simulation: make the next `n` connect attempts fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_next(&mut self, n: u32) {
        self.sim_failures = n;
    }

    /// Simulation: the access point drops us.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self) {
        self.sim_link = false;
    }

    /// Simulation: the next background association stays pending for `checks` link checks.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_hold_association(&mut self, checks: u32) {
        self.sim_assoc_checks = checks;
    }

    /// Simulation: connect attempts seen by the fake driver.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_attempts(&self) -> u32 {
        self.sim_attempts
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_configure(&mut self) -> Result<(), ConnectivityError> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

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
                .map_err(|_| ConnectivityError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });

        let driver_err = driver_error;

        self.wifi.set_configuration(&config).map_err(driver_err)?;
        if !self.wifi.is_started().map_err(driver_err)? {
            self.wifi.start().map_err(driver_err)?;
        }
        Ok(())
    }

    /// Blocking association, bounded by the driver's connect timeout.
    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        self.platform_configure()?;
        self.wifi.connect().map_err(driver_error)?;
        self.wifi.wait_netif_up().map_err(driver_error)?;
        self.log_ip();
        Ok(())
    }

    /// Kick off association and return immediately.
    #[cfg(target_os = "espidf")]
    fn platform_begin_connect(&mut self) -> Result<(), ConnectivityError> {
        self.platform_configure()?;
        self.wifi.wifi_mut().connect().map_err(driver_error)
    }

    #[cfg(target_os = "espidf")]
    fn platform_link_up(&mut self) -> bool {
        let up = self.wifi.is_up().unwrap_or(false);
        if up {
            self.log_ip();
        }
        up
    }

    #[cfg(target_os = "espidf")]
    fn platform_abort(&mut self) {
        if let Err(e) = self.wifi.wifi_mut().disconnect() {
            warn!("WiFi(espidf): abort association: {}", e);
        }
    }

    #[cfg(target_os = "espidf")]
    fn log_ip(&self) {
        match self.wifi.wifi().sta_netif().get_ip_info() {
            Ok(ip) => info!("WiFi connected, IP address: {}", ip.ip),
            Err(e) => warn!("WiFi(espidf): IP info unavailable: {}", e),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        self.sim_attempts = self.sim_attempts.wrapping_add(1);
        if self.sim_failures > 0 {
            self.sim_failures -= 1;
            warn!("WiFi(sim): simulated association failure (attempt {})", self.sim_attempts);
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.sim_link = true;
        info!("WiFi(sim): connected to '{}' (attempt {})", self.ssid, self.sim_attempts);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_begin_connect(&mut self) -> Result<(), ConnectivityError> {
        if self.sim_assoc_checks == 0 {
            return self.platform_connect();
        }
        self.sim_attempts = self.sim_attempts.wrapping_add(1);
        self.sim_associating = true;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_link_up(&mut self) -> bool {
        if self.sim_associating {
            if self.sim_assoc_checks > 0 {
                self.sim_assoc_checks -= 1;
                return false;
            }
            self.sim_associating = false;
            self.sim_link = true;
        }
        self.sim_link
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_abort(&mut self) {
        self.sim_associating = false;
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi(espidf): disconnect failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim_link = false;
        info!("WiFi(sim): disconnected");
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_link
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        let mut info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: `info` is a valid out-pointer for the duration of the call.
        let err = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut info) };
        (err == esp_idf_svc::sys::ESP_OK).then_some(info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        self.sim_link.then_some(-60)
    }

    fn check_association(&mut self, attempt: u32, started_ms: u64, now_ms: u64) {
        if self.platform_link_up() {
            self.state = WifiState::Connected;
            info!("WiFi: reconnected");
        } else if now_ms.saturating_sub(started_ms) >= ASSOCIATE_TIMEOUT_MS {
            warn!("WiFi: association timed out after {} ms", ASSOCIATE_TIMEOUT_MS);
            self.platform_abort();
            self.schedule_retry(attempt.saturating_add(1), now_ms);
        }
    }

    fn schedule_retry(&mut self, attempt: u32, now_ms: u64) {
        let wait = self.reconnect.backoff_for(attempt.max(1));
        self.state = WifiState::Reconnecting {
            attempt,
            next_at_ms: now_ms + u64::from(wait),
        };
    }
}

#[cfg(target_os = "espidf")]
fn driver_error(e: esp_idf_svc::sys::EspError) -> ConnectivityError {
    warn!("WiFi(espidf): driver error {}", e);
    ConnectivityError::ConnectionFailed
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.state == WifiState::Connected {
            return Err(ConnectivityError::AlreadyConnected);
        }

        info!("WiFi: connecting to '{}'", self.ssid);
        self.state = WifiState::Connecting;

        match self.platform_connect() {
            Ok(()) => {
                self.state = WifiState::Connected;
                info!("WiFi: connected");
                Ok(())
            }
            Err(e) => {
                error!("WiFi: connection failed: {}", e);
                self.state = WifiState::Disconnected;
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = WifiState::Disconnected;
        info!("WiFi: disconnected");
    }

    fn is_connected(&self) -> bool {
        self.state == WifiState::Connected && self.platform_is_connected()
    }

    fn poll(&mut self, now_ms: u64) {
        match self.state {
            WifiState::Connected => {
                if !self.platform_is_connected() {
                    warn!("WiFi: connection lost, entering reconnect");
                    self.schedule_retry(1, now_ms);
                }
            }
            WifiState::Reconnecting { attempt, next_at_ms } => {
                if now_ms < next_at_ms {
                    return;
                }
                info!("WiFi: reconnect attempt {}", attempt);
                match self.platform_begin_connect() {
                    Ok(()) => {
                        self.state = WifiState::Associating { attempt, started_ms: now_ms };
                        self.check_association(attempt, now_ms, now_ms);
                    }
                    Err(_) => self.schedule_retry(attempt.saturating_add(1), now_ms),
                }
            }
            WifiState::Associating { attempt, started_ms } => {
                self.check_association(attempt, started_ms, now_ms);
            }
            // Boot association gave up; keep trying in the background.
            WifiState::Disconnected if !self.ssid.is_empty() => self.schedule_retry(1, now_ms),
            _ => {}
        }
    }

    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| ConnectivityError::InvalidSsid)?;
        self.password.clear();
        self.password.push_str(password).map_err(|_| ConnectivityError::InvalidPassword)?;
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        Ok(())
    }

    fn rssi(&self) -> Option<i8> {
        if self.state != WifiState::Connected {
            return None;
        }
        self.platform_rssi()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
