//! In-process simulated platform backend.
//!
//! `SimBackend` stands in for the OS Bluetooth stack: scripted peripherals,
//! periodic advertisement and notification emission, adapter toggling and
//! unsolicited link drops. The acceptance scenarios in `tests/` run the real
//! client against it.

mod peripheral;

pub use peripheral::SimPeripheral;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use uuid::Uuid;

use crate::api::backend::Backend;
use crate::api::device::DeviceId;
use crate::api::event::BackendEvent;
use crate::api::options::{DisplayStrings, ScanOptions, WriteType};
use crate::{Error, Result};

struct SimState {
    initialized: bool,
    enabled: bool,
    enabled_notifications: bool,
    bonding_supported: bool,
    disconnect_failing: bool,
    connect_latency: Duration,
    read_latency: Duration,
    adv_interval: Duration,
    display_strings: DisplayStrings,
    peripherals: HashMap<DeviceId, SimPeripheral>,
    scan_task: Option<JoinHandle<()>>,
    notify_tasks: HashMap<(DeviceId, Uuid, Uuid), JoinHandle<()>>,
}

pub struct SimBackend {
    state: Arc<Mutex<SimState>>,
    events: mpsc::Sender<BackendEvent>,
}

impl SimBackend {
    pub fn new() -> (Arc<Self>, mpsc::Receiver<BackendEvent>) {
        let (events, receiver) = mpsc::channel(256);
        let backend = SimBackend {
            state: Arc::new(Mutex::new(SimState {
                initialized: false,
                enabled: true,
                enabled_notifications: false,
                bonding_supported: true,
                disconnect_failing: false,
                connect_latency: Duration::from_millis(5),
                read_latency: Duration::ZERO,
                adv_interval: Duration::from_millis(20),
                display_strings: DisplayStrings::default(),
                peripherals: HashMap::new(),
                scan_task: None,
                notify_tasks: HashMap::new(),
            })),
            events,
        };
        (Arc::new(backend), receiver)
    }

    pub async fn add_peripheral(&self, peripheral: SimPeripheral) {
        let mut state = self.state.lock().await;
        state.peripherals.insert(peripheral.id().clone(), peripheral);
    }

    pub async fn set_connect_latency(&self, latency: Duration) {
        self.state.lock().await.connect_latency = latency;
    }

    /// Delays every read acknowledgement, useful for exercising the
    /// client's queue and busy dispatch.
    pub async fn set_read_latency(&self, latency: Duration) {
        self.state.lock().await.read_latency = latency;
    }

    pub async fn set_adv_interval(&self, interval: Duration) {
        self.state.lock().await.adv_interval = interval;
    }

    pub async fn set_bonding_supported(&self, supported: bool) {
        self.state.lock().await.bonding_supported = supported;
    }

    /// Makes transport-level disconnect requests fail, as a stack going
    /// down mid-teardown would. The link itself stays up.
    pub async fn set_disconnect_failure(&self, failing: bool) {
        self.state.lock().await.disconnect_failing = failing;
    }

    /// Flips the simulated radio. Reports the new state through the event
    /// channel whenever adapter-state notifications are active, including
    /// repeated reports of an unchanged state (the client deduplicates).
    pub async fn set_enabled(&self, enabled: bool) {
        let notify = {
            let mut state = self.state.lock().await;
            state.enabled = enabled;
            state.enabled_notifications
        };
        if notify {
            let _ = self
                .events
                .send(BackendEvent::AdapterStateChanged { enabled })
                .await;
        }
    }

    /// Unsolicited link loss: the device dropped out of range or powered
    /// off without any local disconnect request.
    pub async fn drop_link(&self, device: &DeviceId) {
        if self.tear_down_link(device).await {
            let _ = self
                .events
                .send(BackendEvent::DeviceDisconnected {
                    device: device.clone(),
                })
                .await;
        }
    }

    /// Pushes a single notification value through the event channel, as if
    /// it had been buffered in flight by the transport.
    pub async fn inject_notification(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        value: Vec<u8>,
    ) {
        let _ = self
            .events
            .send(BackendEvent::NotificationReceived {
                device: device.clone(),
                service,
                characteristic,
                value,
            })
            .await;
    }

    pub async fn display_strings(&self) -> DisplayStrings {
        self.state.lock().await.display_strings.clone()
    }

    /// Marks the link down and aborts its emitters. Returns whether a live
    /// link existed.
    async fn tear_down_link(&self, device: &DeviceId) -> bool {
        let mut state = self.state.lock().await;
        let was_connected = match state.peripherals.get_mut(device) {
            Some(peripheral) if peripheral.connected => {
                peripheral.connected = false;
                true
            }
            _ => false,
        };
        if was_connected {
            let stale: Vec<_> = state
                .notify_tasks
                .keys()
                .filter(|(id, _, _)| id == device)
                .cloned()
                .collect();
            for key in stale {
                if let Some(task) = state.notify_tasks.remove(&key) {
                    task.abort();
                }
            }
        }
        was_connected
    }
}

#[async_trait]
impl Backend for SimBackend {
    async fn initialize(&self) -> Result<()> {
        self.state.lock().await.initialized = true;
        Ok(())
    }

    async fn is_enabled(&self) -> Result<bool> {
        Ok(self.state.lock().await.enabled)
    }

    async fn start_enabled_notifications(&self) -> Result<()> {
        self.state.lock().await.enabled_notifications = true;
        Ok(())
    }

    async fn stop_enabled_notifications(&self) -> Result<()> {
        self.state.lock().await.enabled_notifications = false;
        Ok(())
    }

    async fn start_scan(&self, _options: &ScanOptions) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.initialized {
            return Err(Error::NotInitialized);
        }
        if let Some(task) = state.scan_task.take() {
            task.abort();
        }
        let shared = Arc::clone(&self.state);
        let events = self.events.clone();
        // Re-advertise every interval; duplicate suppression is the
        // client's job.
        state.scan_task = Some(tokio::spawn(async move {
            loop {
                let (interval, reports) = {
                    let state = shared.lock().await;
                    let reports: Vec<_> = state
                        .peripherals
                        .values()
                        .map(SimPeripheral::advertisement)
                        .collect();
                    (state.adv_interval, reports)
                };
                for result in reports {
                    if events.send(BackendEvent::ScanResult { result }).await.is_err() {
                        return;
                    }
                }
                sleep(interval).await;
            }
        }));
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        if let Some(task) = self.state.lock().await.scan_task.take() {
            task.abort();
        }
        Ok(())
    }

    async fn connect(&self, device: &DeviceId) -> Result<()> {
        let latency = {
            let state = self.state.lock().await;
            if !state.initialized {
                return Err(Error::NotInitialized);
            }
            let peripheral = state
                .peripherals
                .get(device)
                .ok_or_else(|| Error::DeviceNotFound(device.clone()))?;
            if peripheral.unreachable {
                None
            } else {
                Some(state.connect_latency)
            }
        };
        match latency {
            Some(latency) => sleep(latency).await,
            // Out of range: the attempt never completes, the client's
            // timeout has to cut it off.
            None => std::future::pending::<()>().await,
        }
        let mut state = self.state.lock().await;
        let peripheral = state
            .peripherals
            .get_mut(device)
            .ok_or_else(|| Error::DeviceNotFound(device.clone()))?;
        peripheral.connected = true;
        debug!("sim: link up for {device}");
        Ok(())
    }

    async fn disconnect(&self, device: &DeviceId) -> Result<()> {
        if self.state.lock().await.disconnect_failing {
            return Err(Error::Unavailable);
        }
        if self.tear_down_link(device).await {
            debug!("sim: link down for {device}");
            let _ = self
                .events
                .send(BackendEvent::DeviceDisconnected {
                    device: device.clone(),
                })
                .await;
        }
        Ok(())
    }

    async fn create_bond(&self, device: &DeviceId) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.bonding_supported {
            return Err(Error::Unavailable);
        }
        let peripheral = state
            .peripherals
            .get_mut(device)
            .ok_or_else(|| Error::DeviceNotFound(device.clone()))?;
        if peripheral.refuse_bond {
            return Err(Error::BondingFailed("bonding request was canceled".into()));
        }
        peripheral.bonded = true;
        Ok(())
    }

    async fn is_bonded(&self, device: &DeviceId) -> Result<bool> {
        let state = self.state.lock().await;
        if !state.bonding_supported {
            return Err(Error::Unavailable);
        }
        let peripheral = state
            .peripherals
            .get(device)
            .ok_or_else(|| Error::DeviceNotFound(device.clone()))?;
        Ok(peripheral.bonded)
    }

    async fn read(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>> {
        let (value, latency) = {
            let state = self.state.lock().await;
            let peripheral = state
                .peripherals
                .get(device)
                .ok_or_else(|| Error::DeviceNotFound(device.clone()))?;
            if !peripheral.connected {
                return Err(Error::NotConnected(device.clone()));
            }
            let charac = peripheral
                .characteristics
                .get(&(service, characteristic))
                .ok_or(Error::CharacteristicNotFound {
                    device: device.clone(),
                    characteristic,
                })?;
            (charac.value.clone(), state.read_latency)
        };
        if latency > Duration::ZERO {
            sleep(latency).await;
        }
        Ok(value)
    }

    async fn write(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
        _write_type: WriteType,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let peripheral = state
            .peripherals
            .get_mut(device)
            .ok_or_else(|| Error::DeviceNotFound(device.clone()))?;
        if !peripheral.connected {
            return Err(Error::NotConnected(device.clone()));
        }
        let charac = peripheral
            .characteristics
            .get_mut(&(service, characteristic))
            .ok_or(Error::CharacteristicNotFound {
                device: device.clone(),
                characteristic,
            })?;
        if let Some(len) = charac.fixed_len
            && value.len() != len
        {
            return Err(Error::WriteRejected(format!(
                "expected a {len} byte payload, got {}",
                value.len()
            )));
        }
        charac.value = value.to_vec();
        Ok(())
    }

    async fn start_notifications(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let peripheral = state
            .peripherals
            .get(device)
            .ok_or_else(|| Error::DeviceNotFound(device.clone()))?;
        if !peripheral.connected {
            return Err(Error::NotConnected(device.clone()));
        }
        let charac = peripheral
            .characteristics
            .get(&(service, characteristic))
            .ok_or(Error::CharacteristicNotFound {
                device: device.clone(),
                characteristic,
            })?;
        let Some(interval) = charac.notify_interval else {
            // Readable-only characteristic: subscribing is legal, values
            // only arrive via inject_notification.
            return Ok(());
        };

        let key = (device.clone(), service, characteristic);
        if let Some(previous) = state.notify_tasks.remove(&key) {
            previous.abort();
        }
        let shared = Arc::clone(&self.state);
        let events = self.events.clone();
        let id = device.clone();
        let task = tokio::spawn(async move {
            let mut index = 0usize;
            loop {
                sleep(interval).await;
                let value = {
                    let state = shared.lock().await;
                    let Some(peripheral) = state.peripherals.get(&id) else {
                        return;
                    };
                    if !peripheral.connected {
                        return;
                    }
                    let Some(charac) = peripheral.characteristics.get(&(service, characteristic))
                    else {
                        return;
                    };
                    if charac.notify_values.is_empty() {
                        continue;
                    }
                    charac.notify_values[index % charac.notify_values.len()].clone()
                };
                index += 1;
                let event = BackendEvent::NotificationReceived {
                    device: id.clone(),
                    service,
                    characteristic,
                    value,
                };
                if events.send(event).await.is_err() {
                    return;
                }
            }
        });
        state.notify_tasks.insert(key, task);
        Ok(())
    }

    async fn stop_notifications(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<()> {
        let key = (device.clone(), service, characteristic);
        if let Some(task) = self.state.lock().await.notify_tasks.remove(&key) {
            task.abort();
        }
        Ok(())
    }

    async fn set_display_strings(&self, strings: &DisplayStrings) -> Result<()> {
        self.state.lock().await.display_strings = strings.clone();
        Ok(())
    }
}
