//! The BLE session core: connection lifecycle, notification multiplexing,
//! operation dispatch, adapter monitoring and scan sessions, layered over a
//! pluggable [`Backend`].

mod connection;
mod handlers;
mod notifications;
mod operations;
mod scan;

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::api::backend::Backend;
use crate::api::device::{BleDevice, DeviceId, ScanResult};
use crate::api::event::BackendEvent;
use crate::api::options::{DisplayStrings, ScanOptions, WriteType};
use crate::{Error, Result};

pub use handlers::{DisconnectHandler, NotifyHandler};

use connection::{ConnectionRecord, ConnectionState};
use handlers::EnabledCallback;
use notifications::{Subscription, SubscriptionKey};
use scan::ScanSession;

/// Timeouts applied by the client itself. Read and write are deliberately
/// unbounded; only the platform can abort those.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    pub request_device_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            connect_timeout: Duration::from_secs(10),
            request_device_timeout: Duration::from_secs(30),
        }
    }
}

/// BLE client over a platform [`Backend`].
///
/// Construction spawns a single event-loop task consuming the backend's
/// event channel, so platform callbacks are always handled sequentially.
pub struct BleClient {
    inner: Arc<ClientInner>,
    event_task: JoinHandle<()>,
}

impl BleClient {
    pub fn new(backend: Arc<dyn Backend>, events: mpsc::Receiver<BackendEvent>) -> Self {
        Self::with_config(backend, events, ClientConfig::default())
    }

    pub fn with_config(
        backend: Arc<dyn Backend>,
        mut events: mpsc::Receiver<BackendEvent>,
        config: ClientConfig,
    ) -> Self {
        let inner = Arc::new(ClientInner {
            backend,
            config,
            initialized: AtomicBool::new(false),
            connections: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
            adapter: Mutex::new(AdapterMonitor::default()),
            scan: Mutex::new(None),
            queue_enabled: AtomicBool::new(true),
        });
        let loop_inner = Arc::clone(&inner);
        let event_task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                loop_inner.handle_event(event).await;
            }
            debug!("backend event channel closed");
        });
        BleClient { inner, event_task }
    }

    pub async fn initialize(&self) -> Result<()> {
        self.inner.backend.initialize().await?;
        self.inner.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Queries the radio state from the backend; never cached.
    pub async fn get_enabled(&self) -> Result<bool> {
        self.inner.ensure_initialized()?;
        self.inner.backend.is_enabled().await
    }

    /// Registers `callback` for adapter-state changes. Only the newest
    /// callback is retained; at most one listener is forwarded to the
    /// backend no matter how often this is called.
    pub async fn start_enabled_notifications(
        &self,
        callback: impl Fn(bool) + Send + Sync + 'static,
    ) -> Result<()> {
        self.inner.ensure_initialized()?;
        let mut monitor = self.inner.adapter.lock().await;
        monitor.callback = Some(Arc::new(callback));
        if !monitor.registered {
            self.inner.backend.start_enabled_notifications().await?;
            monitor.registered = true;
        }
        Ok(())
    }

    /// Safe to call when nothing is registered.
    pub async fn stop_enabled_notifications(&self) -> Result<()> {
        let mut monitor = self.inner.adapter.lock().await;
        monitor.callback = None;
        if monitor.registered {
            self.inner.backend.stop_enabled_notifications().await?;
            monitor.registered = false;
        }
        Ok(())
    }

    pub async fn set_display_strings(&self, strings: &DisplayStrings) -> Result<()> {
        self.inner.ensure_initialized()?;
        self.inner.backend.set_display_strings(strings).await
    }

    /// One-shot scan resolving to the first device matching `options`.
    pub async fn request_device(&self, options: ScanOptions) -> Result<BleDevice> {
        self.inner.request_device(options).await
    }

    pub async fn request_le_scan(
        &self,
        options: ScanOptions,
        on_result: impl Fn(ScanResult) + Send + Sync + 'static,
    ) -> Result<()> {
        self.inner.request_le_scan(options, Arc::new(on_result)).await
    }

    pub async fn stop_le_scan(&self) -> Result<()> {
        self.inner.stop_le_scan().await
    }

    pub async fn connect(
        &self,
        device: &DeviceId,
        on_disconnected: impl Into<DisconnectHandler>,
    ) -> Result<()> {
        self.inner.connect(device, on_disconnected.into()).await
    }

    /// Defensive: a no-op when the device is unknown or already disconnected.
    pub async fn disconnect(&self, device: &DeviceId) -> Result<()> {
        self.inner.disconnect(device).await
    }

    pub async fn create_bond(&self, device: &DeviceId) -> Result<()> {
        self.inner.ensure_initialized()?;
        self.inner.backend.create_bond(device).await
    }

    pub async fn is_bonded(&self, device: &DeviceId) -> Result<bool> {
        self.inner.ensure_initialized()?;
        self.inner.backend.is_bonded(device).await
    }

    pub async fn read(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>> {
        self.inner.read(device, service, characteristic).await
    }

    pub async fn write(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<()> {
        self.inner
            .write(device, service, characteristic, value, WriteType::WithResponse)
            .await
    }

    pub async fn write_without_response(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<()> {
        self.inner
            .write(device, service, characteristic, value, WriteType::WithoutResponse)
            .await
    }

    pub async fn start_notifications(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        callback: impl Into<NotifyHandler>,
    ) -> Result<()> {
        self.inner
            .start_notifications(device, service, characteristic, callback.into())
            .await
    }

    /// Safe to call when no subscription exists. After this returns, zero
    /// further deliveries happen for the key, in-flight values included.
    pub async fn stop_notifications(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<()> {
        self.inner
            .stop_notifications(device, service, characteristic)
            .await
    }

    /// Queue mode (the default): concurrent operations against one device
    /// are serialized in submission order.
    pub fn enable_queue(&self) {
        self.inner.queue_enabled.store(true, Ordering::SeqCst);
    }

    /// Reject mode: an operation against a device with one already in
    /// flight fails with [`Error::Busy`].
    pub fn disable_queue(&self) {
        self.inner.queue_enabled.store(false, Ordering::SeqCst);
    }

    pub async fn get_connected_devices(&self) -> Vec<DeviceId> {
        let connections = self.inner.connections.lock().await;
        connections
            .iter()
            .filter(|(_, record)| record.state == ConnectionState::Connected)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl Drop for BleClient {
    fn drop(&mut self) {
        self.event_task.abort();
    }
}

#[derive(Default)]
struct AdapterMonitor {
    callback: Option<EnabledCallback>,
    registered: bool,
    last_delivered: Option<bool>,
}

pub(crate) struct ClientInner {
    backend: Arc<dyn Backend>,
    config: ClientConfig,
    initialized: AtomicBool,
    connections: Mutex<HashMap<DeviceId, ConnectionRecord>>,
    subscriptions: Mutex<HashMap<SubscriptionKey, Subscription>>,
    adapter: Mutex<AdapterMonitor>,
    scan: Mutex<Option<ScanSession>>,
    queue_enabled: AtomicBool,
}

impl ClientInner {
    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    async fn handle_event(&self, event: BackendEvent) {
        match event {
            BackendEvent::AdapterStateChanged { enabled } => {
                self.handle_adapter_state(enabled).await;
            }
            BackendEvent::DeviceDisconnected { device } => {
                self.handle_disconnect(&device).await;
            }
            BackendEvent::NotificationReceived {
                device,
                service,
                characteristic,
                value,
            } => {
                self.deliver_notification(&device, service, characteristic, value)
                    .await;
            }
            BackendEvent::ScanResult { result } => {
                self.deliver_scan_result(result).await;
            }
        }
    }

    async fn handle_adapter_state(&self, enabled: bool) {
        let callback = {
            let mut monitor = self.adapter.lock().await;
            if monitor.last_delivered == Some(enabled) {
                debug!("suppressing duplicate adapter state report: {enabled}");
                return;
            }
            match monitor.callback.clone() {
                Some(callback) => {
                    monitor.last_delivered = Some(enabled);
                    callback
                }
                None => return,
            }
        };
        if std::panic::catch_unwind(AssertUnwindSafe(|| callback(enabled))).is_err() {
            warn!("adapter state callback panicked");
        }
    }
}
