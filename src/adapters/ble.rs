//! BLE GATT peripheral adapter.
//!
//! Implements [`PeripheralPort`] for one primary service with one
//! Read/Write/Notify characteristic and its CCCD.  Stack callbacks never
//! call into the bridge logic: they turn into [`BleEvent`]s on the event
//! queue, and [`BleAdapter::process_pending`] later dispatches them to the
//! registered [`GattCallbacks`] handler from the main loop.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid via `esp_idf_svc::bt::ble::{gap, gatt}`.
//! - **all other targets**: simulation with helpers that play the stack's part.
//!
//! ## GATT layout
//!
//! | Attribute      | UUID                                   | Access             |
//! |----------------|----------------------------------------|--------------------|
//! | Service        | `4fafc201-1fb5-459e-8fcc-c5c9c331914b` | primary            |
//! | Characteristic | `beb5483e-36e1-4688-b7f5-ea07361b26a8` | Read, Write, Notify|
//! | CCCD           | `0x2902`                               | Read, Write        |

use log::{info, warn};

use crate::app::ports::{GattCallbacks, PeripheralError, PeripheralPort, PeripheralState};
use crate::events::{BleEvent, EventQueue, MAX_WRITE_LEN, drain_events};

#[cfg(target_os = "espidf")]
use std::sync::{Arc, Mutex, PoisonError};

#[cfg(target_os = "espidf")]
use esp_idf_svc::bt::ble::gap::EspBleGap;
#[cfg(target_os = "espidf")]
use esp_idf_svc::bt::ble::gatt::server::EspGatts;
#[cfg(target_os = "espidf")]
use esp_idf_svc::bt::ble::gatt::{GattInterface, Handle};
#[cfg(target_os = "espidf")]
use esp_idf_svc::bt::{Ble, BtDriver};

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const DEVICE_NAME: &str = "ESP32-BLE";
pub const SERVICE_UUID: u128 = 0x4fafc201_1fb5_459e_8fcc_c5c9c331914b;
pub const CHARACTERISTIC_UUID: u128 = 0xbeb5483e_36e1_4688_b7f5_ea07361b26a8;
pub const CCCD_UUID: u16 = 0x2902;

/// Longest characteristic value served or accepted.
pub const MAX_VALUE_LEN: usize = 512;
/// Preferred connection interval hints carried in the advertisement.
pub const ADV_MIN_INTERVAL: i32 = 0x06;
pub const ADV_MAX_INTERVAL: i32 = 0x12;
/// Simultaneous centrals tracked.
pub const MAX_LINKS: usize = 4;

#[cfg(target_os = "espidf")]
const APP_ID: u16 = 0;
/// Attribute handle the simulated stack assigns to the characteristic value.
#[cfg(not(target_os = "espidf"))]
const SIM_VALUE_HANDLE: u16 = 0x2a;

type Links = heapless::Vec<u16, MAX_LINKS>;

// ───────────────────────────────────────────────────────────────
// Write bookkeeping
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareError {
    /// Chunk does not continue the value queued so far.
    InvalidOffset,
    /// Reassembled value would exceed [`MAX_WRITE_LEN`].
    TooLong,
    /// Every reassembly slot is held by another central.
    NoSlot,
}

#[derive(Debug)]
struct PreparedWrite {
    conn_id: u16,
    handle: u16,
    value: heapless::Vec<u8, MAX_WRITE_LEN>,
}

/// Per-central write state: notify subscriptions from CCCD writes and
/// prepared (long) writes waiting for their execute request.
#[derive(Debug, Default)]
pub struct WriteTracker {
    subscribed: Links,
    prepared: heapless::Vec<PreparedWrite, MAX_LINKS>,
}

impl WriteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Centrals that enabled notifications.
    pub fn subscribed(&self) -> &[u16] {
        &self.subscribed
    }

    /// Apply a CCCD write.  Returns the notify flag now in force, or
    /// `None` when the value is not a 2-byte descriptor.
    pub fn cccd_write(&mut self, conn_id: u16, value: &[u8]) -> Option<bool> {
        let &[lo, hi] = value else {
            return None;
        };
        let enabled = u16::from_le_bytes([lo, hi]) & 0x0001 != 0;
        let known = self.subscribed.iter().position(|c| *c == conn_id);
        match (enabled, known) {
            (true, None) => {
                if self.subscribed.push(conn_id).is_err() {
                    warn!("BLE: subscriber table full, conn {} not notified", conn_id);
                    return Some(false);
                }
            }
            (false, Some(i)) => {
                self.subscribed.swap_remove(i);
            }
            _ => {}
        }
        Some(enabled)
    }

    /// Queue one prepare-write chunk.  Chunks must arrive in order; any
    /// error discards what `conn_id` had queued.
    pub fn prepare(&mut self, conn_id: u16, handle: u16, offset: u16, chunk: &[u8]) -> Result<(), PrepareError> {
        let slot = match self.prepared.iter().position(|p| p.conn_id == conn_id) {
            Some(i) => i,
            None => {
                let fresh = PreparedWrite { conn_id, handle, value: heapless::Vec::new() };
                self.prepared.push(fresh).map_err(|_| PrepareError::NoSlot)?;
                self.prepared.len() - 1
            }
        };

        let entry = &mut self.prepared[slot];
        let result = if entry.handle != handle || usize::from(offset) != entry.value.len() {
            Err(PrepareError::InvalidOffset)
        } else {
            entry.value.extend_from_slice(chunk).map_err(|_| PrepareError::TooLong)
        };
        if result.is_err() {
            self.prepared.swap_remove(slot);
        }
        result
    }

    /// Execute request: hand back the reassembled `(handle, value)`.
    pub fn execute(&mut self, conn_id: u16) -> Option<(u16, heapless::Vec<u8, MAX_WRITE_LEN>)> {
        let i = self.prepared.iter().position(|p| p.conn_id == conn_id)?;
        let done = self.prepared.swap_remove(i);
        Some((done.handle, done.value))
    }

    /// Drop queued chunks.  Returns whether anything was queued.
    pub fn cancel(&mut self, conn_id: u16) -> bool {
        match self.prepared.iter().position(|p| p.conn_id == conn_id) {
            Some(i) => {
                self.prepared.swap_remove(i);
                true
            }
            None => false,
        }
    }

    /// Central left: forget its subscription and any queued chunks.
    pub fn forget(&mut self, conn_id: u16) {
        if let Some(i) = self.subscribed.iter().position(|c| *c == conn_id) {
            self.subscribed.swap_remove(i);
        }
        self.cancel(conn_id);
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF stack glue
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
type BleDriver = BtDriver<'static, Ble>;
#[cfg(target_os = "espidf")]
type Gap = Arc<EspBleGap<'static, Ble, Arc<BleDriver>>>;
#[cfg(target_os = "espidf")]
type Gatts = Arc<EspGatts<'static, Ble, Arc<BleDriver>>>;

/// Handles learned from stack events, shared with the Bluedroid task.
#[cfg(target_os = "espidf")]
#[derive(Default)]
struct StackState {
    gatt_if: Option<GattInterface>,
    service: Option<Handle>,
    value_handle: Option<Handle>,
    cccd_handle: Option<Handle>,
    advertising: bool,
    writes: WriteTracker,
    value: heapless::Vec<u8, MAX_VALUE_LEN>,
}

#[cfg(target_os = "espidf")]
#[derive(Clone)]
struct StackContext {
    gap: Gap,
    gatts: Gatts,
    state: Arc<Mutex<StackState>>,
    queue: &'static EventQueue,
}

#[cfg(target_os = "espidf")]
mod stack {
    use enumset::enum_set;
    use esp_idf_svc::bt::ble::gap::{AdvConfiguration, BleGapEvent};
    use esp_idf_svc::bt::ble::gatt::server::GattsEvent;
    use esp_idf_svc::bt::ble::gatt::{
        AutoResponse, GattCharacteristic, GattDescriptor, GattId, GattInterface, GattResponse,
        GattServiceId, GattStatus, Permission, Property,
    };
    use esp_idf_svc::bt::{BtStatus, BtUuid};
    use esp_idf_svc::sys::{ESP_FAIL, EspError};
    use log::{debug, info, warn};
    use std::sync::PoisonError;

    use super::*;
    use crate::events::push_event;

    fn fail() -> EspError {
        EspError::from_infallible::<ESP_FAIL>()
    }

    fn check_gatt(status: GattStatus) -> Result<(), EspError> {
        if matches!(status, GattStatus::Ok) {
            Ok(())
        } else {
            warn!("BLE GATTS: status {:?}", status);
            Err(fail())
        }
    }

    pub(super) fn on_gap_event(ctx: &StackContext, event: BleGapEvent) -> Result<(), EspError> {
        if let BleGapEvent::AdvertisingConfigured(status) = event {
            if !matches!(status, BtStatus::Success) {
                warn!("BLE GAP: advertising config failed: {:?}", status);
                return Err(fail());
            }
            ctx.gap.start_advertising()?;
            ctx.state.lock().unwrap_or_else(PoisonError::into_inner).advertising = true;
            info!("BLE GAP: advertising as '{}'", DEVICE_NAME);
        }
        Ok(())
    }

    pub(super) fn on_gatts_event(
        ctx: &StackContext,
        gatt_if: GattInterface,
        event: GattsEvent,
    ) -> Result<(), EspError> {
        match event {
            GattsEvent::ServiceRegistered { status, app_id } => {
                check_gatt(status)?;
                if app_id == APP_ID {
                    create_service(ctx, gatt_if)?;
                }
            }
            GattsEvent::ServiceCreated { status, service_handle, .. } => {
                check_gatt(status)?;
                ctx.state.lock().unwrap_or_else(PoisonError::into_inner).service = Some(service_handle);
                ctx.gatts.start_service(service_handle)?;
                ctx.gatts.add_characteristic(
                    service_handle,
                    &GattCharacteristic {
                        uuid: BtUuid::uuid128(CHARACTERISTIC_UUID),
                        permissions: enum_set!(Permission::Read | Permission::Write),
                        properties: enum_set!(Property::Read | Property::Write | Property::Notify),
                        max_len: MAX_VALUE_LEN,
                        auto_rsp: AutoResponse::ByApp,
                    },
                    &[],
                )?;
            }
            GattsEvent::CharacteristicAdded { status, attr_handle, service_handle, char_uuid } => {
                check_gatt(status)?;
                if char_uuid == BtUuid::uuid128(CHARACTERISTIC_UUID) {
                    ctx.state.lock().unwrap_or_else(PoisonError::into_inner).value_handle = Some(attr_handle);
                    ctx.gatts.add_descriptor(
                        service_handle,
                        &GattDescriptor {
                            uuid: BtUuid::uuid16(CCCD_UUID),
                            permissions: enum_set!(Permission::Read | Permission::Write),
                        },
                    )?;
                }
            }
            GattsEvent::DescriptorAdded { status, attr_handle, descr_uuid, .. } => {
                check_gatt(status)?;
                if descr_uuid == BtUuid::uuid16(CCCD_UUID) {
                    ctx.state.lock().unwrap_or_else(PoisonError::into_inner).cccd_handle = Some(attr_handle);
                    info!("BLE GATTS: service ready");
                }
            }
            GattsEvent::PeerConnected { conn_id, addr, .. } => {
                // Connectable advertising stops when a central connects.
                ctx.state.lock().unwrap_or_else(PoisonError::into_inner).advertising = false;
                debug!("BLE GATTS: peer {} connected (conn {})", addr, conn_id);
                push_event(ctx.queue, BleEvent::Connected { conn_id });
            }
            GattsEvent::PeerDisconnected { conn_id, addr, .. } => {
                ctx.state.lock().unwrap_or_else(PoisonError::into_inner).writes.forget(conn_id);
                debug!("BLE GATTS: peer {} disconnected (conn {})", addr, conn_id);
                push_event(ctx.queue, BleEvent::Disconnected { conn_id });
            }
            GattsEvent::Write { conn_id, trans_id, handle, offset, need_rsp, is_prep, value, .. } => {
                let mut state = ctx.state.lock().unwrap_or_else(PoisonError::into_inner);
                if is_prep {
                    let status = match state.writes.prepare(conn_id, handle, offset, value) {
                        Ok(()) => GattStatus::Ok,
                        Err(e) => {
                            warn!("BLE GATTS: prepare write rejected (conn {}): {:?}", conn_id, e);
                            prepare_status(e)
                        }
                    };
                    drop(state);
                    if need_rsp {
                        // Prepare responses echo the chunk back to the client.
                        let mut rsp = GattResponse::default();
                        rsp.attr_handle(handle)
                            .auth_req(0)
                            .offset(offset)
                            .value(value)
                            .map_err(|_| fail())?;
                        ctx.gatts.send_response(gatt_if, conn_id, trans_id, status, Some(&rsp))?;
                    }
                    return Ok(());
                }

                let cccd = Some(handle) == state.cccd_handle;
                let written = Some(handle) == state.value_handle;
                if cccd {
                    match state.writes.cccd_write(conn_id, value) {
                        Some(enabled) => debug!("BLE GATTS: conn {} notify {}", conn_id, enabled),
                        None => warn!("BLE GATTS: malformed CCCD write ({} bytes)", value.len()),
                    }
                }
                drop(state);
                if need_rsp {
                    ctx.gatts.send_response(gatt_if, conn_id, trans_id, GattStatus::Ok, None)?;
                }
                if written {
                    push_event(ctx.queue, BleEvent::written(conn_id, value));
                }
            }
            GattsEvent::ExecWrite { conn_id, trans_id, canceled, .. } => {
                let (done, value_handle) = {
                    let mut state = ctx.state.lock().unwrap_or_else(PoisonError::into_inner);
                    let done = if canceled {
                        state.writes.cancel(conn_id);
                        None
                    } else {
                        state.writes.execute(conn_id)
                    };
                    (done, state.value_handle)
                };
                ctx.gatts.send_response(gatt_if, conn_id, trans_id, GattStatus::Ok, None)?;
                if let Some((handle, value)) = done {
                    if Some(handle) == value_handle {
                        push_event(ctx.queue, BleEvent::Written { conn_id, value });
                    }
                }
            }
            GattsEvent::Read { conn_id, trans_id, handle, offset, need_rsp, .. } => {
                let state = ctx.state.lock().unwrap_or_else(PoisonError::into_inner);
                if Some(handle) != state.value_handle {
                    return Ok(());
                }
                if need_rsp {
                    let start = usize::from(offset).min(state.value.len());
                    let mut rsp = GattResponse::default();
                    rsp.attr_handle(handle)
                        .auth_req(0)
                        .offset(offset)
                        .value(&state.value[start..])
                        .map_err(|_| fail())?;
                    ctx.gatts.send_response(gatt_if, conn_id, trans_id, GattStatus::Ok, Some(&rsp))?;
                }
                drop(state);
                push_event(ctx.queue, BleEvent::Read { conn_id });
            }
            _ => {}
        }
        Ok(())
    }

    fn prepare_status(e: PrepareError) -> GattStatus {
        match e {
            PrepareError::InvalidOffset => GattStatus::InvalidOffset,
            PrepareError::TooLong | PrepareError::NoSlot => GattStatus::InvalidAttrLen,
        }
    }

    fn create_service(ctx: &StackContext, gatt_if: GattInterface) -> Result<(), EspError> {
        ctx.state.lock().unwrap_or_else(PoisonError::into_inner).gatt_if = Some(gatt_if);

        ctx.gap.set_device_name(DEVICE_NAME)?;
        ctx.gap.set_adv_conf(&AdvConfiguration {
            set_scan_rsp: true,
            include_name: true,
            include_txpower: true,
            min_interval: ADV_MIN_INTERVAL,
            max_interval: ADV_MAX_INTERVAL,
            ..Default::default()
        })?;
        ctx.gap.set_adv_conf(&AdvConfiguration {
            include_name: true,
            include_txpower: true,
            flag: 2,
            service_uuid: Some(BtUuid::uuid128(SERVICE_UUID)),
            min_interval: ADV_MIN_INTERVAL,
            max_interval: ADV_MAX_INTERVAL,
            ..Default::default()
        })?;
        ctx.gatts.create_service(
            gatt_if,
            &GattServiceId {
                id: GattId {
                    uuid: BtUuid::uuid128(SERVICE_UUID),
                    inst_id: 0,
                },
                is_primary: true,
            },
            8,
        )?;
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// BLE adapter
// ───────────────────────────────────────────────────────────────

pub struct BleAdapter {
    queue: &'static EventQueue,
    /// Centrals currently linked, as seen by the main loop.
    links: Links,
    #[cfg(target_os = "espidf")]
    ctx: StackContext,
    #[cfg(not(target_os = "espidf"))]
    sim_started: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_advertising: bool,
    /// Simulation: how often the beacon was actually (re)started.
    #[cfg(not(target_os = "espidf"))]
    sim_advertise_starts: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_value: heapless::Vec<u8, MAX_VALUE_LEN>,
    #[cfg(not(target_os = "espidf"))]
    sim_writes: WriteTracker,
    /// Simulation: every notification pushed, in order.
    #[cfg(not(target_os = "espidf"))]
    sim_notified: Vec<Vec<u8>>,
}

impl BleAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(driver: BleDriver, queue: &'static EventQueue) -> Result<Self, PeripheralError> {
        let driver = Arc::new(driver);
        let init_err = |e: esp_idf_svc::sys::EspError| {
            warn!("BLE(espidf): stack init failed: {}", e);
            PeripheralError::StackInitFailed
        };
        let gap = Arc::new(EspBleGap::new(driver.clone()).map_err(init_err)?);
        let gatts = Arc::new(EspGatts::new(driver).map_err(init_err)?);
        Ok(Self {
            queue,
            links: Links::new(),
            ctx: StackContext {
                gap,
                gatts,
                state: Arc::new(Mutex::new(StackState::default())),
                queue,
            },
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(queue: &'static EventQueue) -> Self {
        Self {
            queue,
            links: Links::new(),
            sim_started: false,
            sim_advertising: false,
            sim_advertise_starts: 0,
            sim_value: heapless::Vec::new(),
            sim_writes: WriteTracker::new(),
            sim_notified: Vec::new(),
        }
    }

    /// Register the GATT application.  Service creation and the first
    /// advertisement follow asynchronously from stack events.
    #[cfg(target_os = "espidf")]
    pub fn start(&mut self) -> Result<(), PeripheralError> {
        let init_err = |e: esp_idf_svc::sys::EspError| {
            warn!("BLE(espidf): start failed: {}", e);
            PeripheralError::StackInitFailed
        };

        let gap_ctx = self.ctx.clone();
        self.ctx
            .gap
            .subscribe(move |event| {
                if let Err(e) = stack::on_gap_event(&gap_ctx, event) {
                    warn!("BLE GAP: {:?}", e);
                }
            })
            .map_err(init_err)?;

        let gatts_ctx = self.ctx.clone();
        self.ctx
            .gatts
            .subscribe(move |(gatt_if, event)| {
                if let Err(e) = stack::on_gatts_event(&gatts_ctx, gatt_if, event) {
                    warn!("BLE GATTS: {:?}", e);
                }
            })
            .map_err(init_err)?;

        self.ctx.gatts.register_app(APP_ID).map_err(init_err)?;
        info!("BLE(espidf): GATT app registered");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn start(&mut self) -> Result<(), PeripheralError> {
        self.sim_started = true;
        info!("BLE(sim): '{}' serving {:032x}", DEVICE_NAME, SERVICE_UUID);
        self.start_advertising()
    }

    /// Centrals currently linked.
    pub fn links(&self) -> &[u16] {
        &self.links
    }

    /// Route one queued event: update link bookkeeping, then hand it to
    /// `handler` with this adapter as the peripheral.
    pub fn dispatch(&mut self, event: &BleEvent, handler: &mut dyn GattCallbacks) {
        match event {
            BleEvent::Connected { conn_id } => {
                if !self.links.contains(conn_id) && self.links.push(*conn_id).is_err() {
                    warn!("BLE: link table full, conn {} untracked", conn_id);
                }
                handler.on_connect(*conn_id, self);
            }
            BleEvent::Disconnected { conn_id } => {
                if let Some(i) = self.links.iter().position(|c| c == conn_id) {
                    self.links.swap_remove(i);
                }
                handler.on_disconnect(*conn_id, self);
            }
            BleEvent::Written { conn_id, value } => handler.on_write(*conn_id, value, self),
            BleEvent::Read { conn_id } => handler.on_read(*conn_id),
        }
    }

    /// Drain the event queue into `handler`.  Returns events processed.
    pub fn process_pending(&mut self, handler: &mut dyn GattCallbacks) -> usize {
        let queue = self.queue;
        drain_events(queue, |event| self.dispatch(&event, handler))
    }

    // ── Simulation: play the stack's part ─────────────────────

    /// A central connects.  Advertising stops, as on the real stack.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_connect(&mut self, conn_id: u16) -> bool {
        self.sim_advertising = false;
        crate::events::push_event(self.queue, BleEvent::Connected { conn_id })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_disconnect(&mut self, conn_id: u16) -> bool {
        self.sim_writes.forget(conn_id);
        crate::events::push_event(self.queue, BleEvent::Disconnected { conn_id })
    }

    /// A central writes the CCCD.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_write_cccd(&mut self, conn_id: u16, value: &[u8]) -> Option<bool> {
        self.sim_writes.cccd_write(conn_id, value)
    }

    /// One prepare-write chunk of a long characteristic write.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_prepare_write(&mut self, conn_id: u16, offset: u16, chunk: &[u8]) -> Result<(), PrepareError> {
        self.sim_writes.prepare(conn_id, SIM_VALUE_HANDLE, offset, chunk)
    }

    /// Execute (or cancel) the prepared write.  Returns whether a write
    /// event was queued.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_execute_write(&mut self, conn_id: u16, canceled: bool) -> bool {
        if canceled {
            self.sim_writes.cancel(conn_id);
            return false;
        }
        match self.sim_writes.execute(conn_id) {
            Some((SIM_VALUE_HANDLE, value)) => {
                crate::events::push_event(self.queue, BleEvent::Written { conn_id, value })
            }
            _ => false,
        }
    }

    /// Centrals subscribed to notifications.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_subscribed(&self) -> &[u16] {
        self.sim_writes.subscribed()
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_write(&mut self, conn_id: u16, data: &[u8]) -> bool {
        crate::events::push_event(self.queue, BleEvent::written(conn_id, data))
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_read(&mut self, conn_id: u16) -> bool {
        crate::events::push_event(self.queue, BleEvent::Read { conn_id })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_advertise_starts(&self) -> u32 {
        self.sim_advertise_starts
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_value(&self) -> &[u8] {
        &self.sim_value
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_notified(&self) -> &[Vec<u8>] {
        &self.sim_notified
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn is_advertising(&self) -> bool {
        self.ctx.state.lock().unwrap_or_else(PoisonError::into_inner).advertising
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_advertising(&self) -> bool {
        self.sim_advertising
    }
}

// ───────────────────────────────────────────────────────────────
// PeripheralPort
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl PeripheralPort for BleAdapter {
    fn start_advertising(&mut self) -> Result<(), PeripheralError> {
        let mut state = self.ctx.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.gatt_if.is_none() {
            return Err(PeripheralError::NotReady);
        }
        if state.advertising {
            return Ok(());
        }
        self.ctx.gap.start_advertising().map_err(|e| {
            warn!("BLE(espidf): start advertising: {}", e);
            PeripheralError::AdvertisingFailed
        })?;
        state.advertising = true;
        info!("BLE: advertising restarted");
        Ok(())
    }

    fn set_value(&mut self, value: &[u8]) -> Result<(), PeripheralError> {
        let mut state = self.ctx.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.value.clear();
        state
            .value
            .extend_from_slice(value)
            .map_err(|_| PeripheralError::ValueTooLong)?;
        let handle = state.value_handle.ok_or(PeripheralError::NotReady)?;
        self.ctx
            .gatts
            .set_attr(handle, value)
            .map_err(|_| PeripheralError::NotReady)
    }

    fn notify(&mut self, value: &[u8]) -> Result<(), PeripheralError> {
        if value.len() > MAX_VALUE_LEN {
            return Err(PeripheralError::ValueTooLong);
        }
        let state = self.ctx.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(gatt_if), Some(handle)) = (state.gatt_if, state.value_handle) else {
            return Err(PeripheralError::NotReady);
        };
        for conn_id in state.writes.subscribed() {
            self.ctx
                .gatts
                .notify(gatt_if, *conn_id, handle, value)
                .map_err(|_| PeripheralError::NotifyFailed)?;
        }
        Ok(())
    }

    fn state(&self) -> PeripheralState {
        peripheral_state(&self.links, self.is_advertising())
    }
}

#[cfg(not(target_os = "espidf"))]
impl PeripheralPort for BleAdapter {
    fn start_advertising(&mut self) -> Result<(), PeripheralError> {
        if !self.sim_started {
            return Err(PeripheralError::NotReady);
        }
        if self.sim_advertising {
            return Ok(());
        }
        self.sim_advertising = true;
        self.sim_advertise_starts += 1;
        info!("BLE(sim): advertising");
        Ok(())
    }

    fn set_value(&mut self, value: &[u8]) -> Result<(), PeripheralError> {
        self.sim_value.clear();
        self.sim_value
            .extend_from_slice(value)
            .map_err(|_| PeripheralError::ValueTooLong)
    }

    fn notify(&mut self, value: &[u8]) -> Result<(), PeripheralError> {
        if value.len() > MAX_VALUE_LEN {
            return Err(PeripheralError::ValueTooLong);
        }
        if !self.sim_started {
            return Err(PeripheralError::NotReady);
        }
        self.sim_notified.push(value.to_vec());
        Ok(())
    }

    fn state(&self) -> PeripheralState {
        peripheral_state(&self.links, self.is_advertising())
    }
}

fn peripheral_state(links: &[u16], advertising: bool) -> PeripheralState {
    if !links.is_empty() {
        PeripheralState::Connected { links: links.len() as u16 }
    } else if advertising {
        PeripheralState::Advertising
    } else {
        PeripheralState::Idle
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
