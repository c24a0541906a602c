//! Per-device connection state machine.
//!
//! Each device the client has seen owns one [`ConnectionRecord`]. The
//! generation counter advances on every successful connect; it tags
//! notification subscriptions so nothing registered against a previous
//! connection epoch can ever fire again.

use std::sync::Arc;

use log::debug;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::api::device::DeviceId;
use crate::client::handlers::DisconnectHandler;
use crate::client::ClientInner;
use crate::{Error, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

pub(crate) struct ConnectionRecord {
    pub(crate) state: ConnectionState,
    pub(crate) generation: u64,
    pub(crate) on_disconnected: DisconnectHandler,
    pub(crate) op_lock: Arc<Mutex<()>>,
}

impl ConnectionRecord {
    fn new() -> Self {
        ConnectionRecord {
            state: ConnectionState::Disconnected,
            generation: 0,
            on_disconnected: DisconnectHandler::None,
            op_lock: Arc::new(Mutex::new(())),
        }
    }
}

impl ClientInner {
    pub(crate) async fn connect(
        &self,
        device: &DeviceId,
        on_disconnected: DisconnectHandler,
    ) -> Result<()> {
        self.ensure_initialized()?;
        {
            let mut connections = self.connections.lock().await;
            let record = connections
                .entry(device.clone())
                .or_insert_with(ConnectionRecord::new);
            match record.state {
                ConnectionState::Connected => {
                    // Idempotent reconnect: swap the callback, skip the
                    // transport-level connect entirely.
                    record.on_disconnected = on_disconnected;
                    return Ok(());
                }
                ConnectionState::Connecting | ConnectionState::Disconnecting => {
                    return Err(Error::Busy(device.clone()));
                }
                ConnectionState::Disconnected => record.state = ConnectionState::Connecting,
            }
        }

        debug!("connecting to {device}");
        let attempt = timeout(self.config.connect_timeout, self.backend.connect(device)).await;

        let mut connections = self.connections.lock().await;
        let Some(record) = connections.get_mut(device) else {
            return Err(Error::DeviceNotFound(device.clone()));
        };
        match attempt {
            Ok(Ok(())) => {
                record.state = ConnectionState::Connected;
                record.generation += 1;
                record.on_disconnected = on_disconnected;
                let generation = record.generation;
                drop(connections);
                self.prune_stale_subscriptions(device, generation).await;
                debug!("connected to {device} (generation {generation})");
                Ok(())
            }
            Ok(Err(e)) => {
                record.state = ConnectionState::Disconnected;
                Err(e)
            }
            Err(_) => {
                // A timed-out attempt never reached Connected, so the
                // disconnect callback stays silent.
                record.state = ConnectionState::Disconnected;
                Err(Error::ConnectionTimeout("connection".into()))
            }
        }
    }

    pub(crate) async fn disconnect(&self, device: &DeviceId) -> Result<()> {
        {
            let mut connections = self.connections.lock().await;
            match connections.get_mut(device) {
                Some(record) if record.state == ConnectionState::Connected => {
                    record.state = ConnectionState::Disconnecting;
                }
                // Unknown or already disconnected: always safe to call.
                _ => return Ok(()),
            }
        }
        debug!("disconnecting from {device}");
        let outcome = self.backend.disconnect(device).await;
        // Complete the transition whether or not the transport call worked;
        // a record must never stay stuck in Disconnecting. On success the
        // backend's own disconnect event then arrives as a duplicate and is
        // suppressed by the state check.
        self.handle_disconnect(device).await;
        outcome
    }

    /// Converges deliberate and unsolicited disconnects: unless the record
    /// leaves Connected or Disconnecting right now, nothing fires. That keeps
    /// the callback at exactly one invocation per physical disconnect.
    pub(crate) async fn handle_disconnect(&self, device: &DeviceId) {
        let handler = {
            let mut connections = self.connections.lock().await;
            match connections.get_mut(device) {
                Some(record)
                    if matches!(
                        record.state,
                        ConnectionState::Connected | ConnectionState::Disconnecting
                    ) =>
                {
                    record.state = ConnectionState::Disconnected;
                    // Retained for the next connect cycle.
                    record.on_disconnected.clone()
                }
                _ => {
                    debug!("ignoring disconnect event for {device}");
                    return;
                }
            }
        };
        self.drop_device_subscriptions(device).await;
        handler.run(device.clone()).await;
    }

    /// Generation and operation lock of a currently connected device.
    pub(crate) async fn require_connected(
        &self,
        device: &DeviceId,
    ) -> Result<(u64, Arc<Mutex<()>>)> {
        let connections = self.connections.lock().await;
        match connections.get(device) {
            Some(record) if record.state == ConnectionState::Connected => {
                Ok((record.generation, Arc::clone(&record.op_lock)))
            }
            _ => Err(Error::NotConnected(device.clone())),
        }
    }
}
