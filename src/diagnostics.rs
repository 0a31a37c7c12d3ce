//! Runtime diagnostics.
//!
//! [`MemoryReport`] is logged by the main loop whenever backend liveness
//! changes, so a flapping link can be correlated with heap pressure or a
//! shrinking task stack.  [`install_panic_handler`] routes panic reasons
//! through the `log` facade before the IDF panic handler resets the chip.

use core::fmt;

/// Heap and stack snapshot of the calling task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReport {
    /// CPU core the caller runs on.
    pub core: u32,
    /// Minimum free stack (bytes) ever seen for the calling task.
    pub stack_high_water: u32,
    pub heap_free: u32,
    pub heap_total: u32,
    /// Low-water mark of free heap since boot.
    pub heap_min_free: u32,
}

impl MemoryReport {
    pub fn heap_used(&self) -> u32 {
        self.heap_total.saturating_sub(self.heap_free)
    }

    #[cfg(target_os = "espidf")]
    pub fn collect() -> Self {
        use esp_idf_svc::sys::*;

        let core = esp_idf_svc::hal::cpu::core() as u32;
        // SAFETY: plain reads of allocator / scheduler counters; a null
        // task handle means "the calling task".
        let (stack_high_water, heap_free, heap_total, heap_min_free) = unsafe {
            (
                uxTaskGetStackHighWaterMark(core::ptr::null_mut()),
                esp_get_free_heap_size(),
                heap_caps_get_total_size(MALLOC_CAP_DEFAULT) as u32,
                esp_get_minimum_free_heap_size(),
            )
        };

        Self {
            core,
            stack_high_water,
            heap_free,
            heap_total,
            heap_min_free,
        }
    }

    /// Simulation: fixed, plausible ESP32 numbers.
    #[cfg(not(target_os = "espidf"))]
    pub fn collect() -> Self {
        Self {
            core: 1,
            stack_high_water: 4_096,
            heap_free: 180_000,
            heap_total: 300_000,
            heap_min_free: 150_000,
        }
    }
}

impl fmt::Display for MemoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "core {} | stack hwm {} B | heap used {}/{} B (min free {} B)",
            self.core,
            self.stack_high_water,
            self.heap_used(),
            self.heap_total,
            self.heap_min_free
        )
    }
}

// ───────────────────────────────────────────────────────────────
// Custom panic handler
// ───────────────────────────────────────────────────────────────

/// Install a panic hook that logs the panic reason and location.
///
/// Must be called once during init, after the logger is up.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };

        match info.location() {
            Some(loc) => log::error!("PANIC: {} at {}:{}", reason, loc.file(), loc.line()),
            None => log::error!("PANIC: {}", reason),
        }
        log::error!("MEMREPORT | {}", MemoryReport::collect());
    }));
}
