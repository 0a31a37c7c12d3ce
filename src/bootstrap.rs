//! Connectivity bootstrap.
//!
//! Runs once before the BLE service starts: associate with the access
//! point, then perform the backend handshake.  Both stages are bounded by
//! a [`RetryPolicy`]; neither hangs.  The outcome is returned as a
//! [`BootstrapReport`] and the caller starts BLE whatever it says.
//!
//! ```text
//!  Wi-Fi connect ──(retry: wifi)──▶ up? ──▶ backend handshake ──(retry: backend)──▶ report
//!                                    │
//!                                    └─ no ──▶ backend Skipped ───────────────────▶ report
//! ```

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::adapters::wifi::{ConnectivityError, ConnectivityPort};
use crate::app::ports::{ClockPort, TransportPort};
use crate::error::Error;
use crate::retry::{RetryError, RetryPolicy};

/// Retry budgets for the two boot stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootPolicies {
    pub wifi: RetryPolicy,
    pub backend: RetryPolicy,
}

/// Outcome of one boot stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Up { attempts: u32 },
    Failed { attempts: u32, timed_out: bool, error: Error },
    /// Not attempted because an earlier stage failed.
    Skipped,
}

impl Stage {
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Up { .. })
    }

    fn from_retry<E: Into<Error>>(result: Result<u32, RetryError<E>>) -> Self {
        match result {
            Ok(attempts) => Self::Up { attempts },
            Err(e) => {
                let attempts = e.attempts();
                let timed_out = matches!(e, RetryError::TimedOut { .. });
                Self::Failed { attempts, timed_out, error: e.into_last().into() }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    pub wifi: Stage,
    pub backend: Stage,
}

impl BootstrapReport {
    /// Both stages came up.
    pub fn is_online(&self) -> bool {
        self.wifi.is_up() && self.backend.is_up()
    }
}

/// Headline logged when the backend stage fails.  A broker session that
/// never came up, or any stage that ran out of time, is a timeout.
fn backend_failure_line(backend: &str, timed_out: bool) -> &'static str {
    if timed_out || backend == "mqtt" { "Timeout!" } else { "Backend unreachable" }
}

/// Bring the network up: Wi-Fi first, then the backend handshake.
pub fn bring_up<W, T, C, D>(
    wifi: &mut W,
    transport: &mut T,
    policies: BootPolicies,
    clock: &C,
    delay: &mut D,
) -> BootstrapReport
where
    W: ConnectivityPort + ?Sized,
    T: TransportPort + ?Sized,
    C: ClockPort + ?Sized,
    D: DelayNs + ?Sized,
{
    info!("BOOT | connecting WiFi");
    let wifi_stage = Stage::from_retry(policies.wifi.run(clock, delay, |attempt| {
        debug!("BOOT | WiFi attempt {}", attempt);
        match wifi.connect() {
            Err(ConnectivityError::AlreadyConnected) => Ok(attempt),
            other => other.map(|()| attempt),
        }
    }));

    match wifi_stage {
        Stage::Up { attempts } => info!("BOOT | WiFi up after {} attempt(s)", attempts),
        Stage::Failed { attempts, error, .. } => {
            error!("BOOT | WiFi failed after {} attempt(s): {}", attempts, error);
            warn!("BOOT | skipping {} handshake", transport.name());
            return BootstrapReport { wifi: wifi_stage, backend: Stage::Skipped };
        }
        Stage::Skipped => {}
    }

    info!("BOOT | {} handshake", transport.name());
    let backend_stage = Stage::from_retry(policies.backend.run(clock, delay, |attempt| {
        transport.handshake().map(|()| attempt)
    }));

    match backend_stage {
        Stage::Up { attempts } => {
            info!("BOOT | {} ready after {} attempt(s)", transport.name(), attempts);
        }
        Stage::Failed { attempts, timed_out, error } => {
            error!("{}", backend_failure_line(transport.name(), timed_out));
            warn!("BOOT | {} handshake failed after {} attempt(s): {}", transport.name(), attempts, error);
        }
        Stage::Skipped => {}
    }

    BootstrapReport { wifi: wifi_stage, backend: backend_stage }
}
