//! Notification registry: at most one live subscription per
//! (device, service, characteristic) key, tagged with the connection
//! generation it was created under.

use log::debug;
use uuid::Uuid;

use crate::Result;
use crate::api::device::DeviceId;
use crate::client::ClientInner;
use crate::client::connection::ConnectionState;
use crate::client::handlers::NotifyHandler;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct SubscriptionKey {
    pub(crate) device: DeviceId,
    pub(crate) service: Uuid,
    pub(crate) characteristic: Uuid,
}

pub(crate) struct Subscription {
    pub(crate) generation: u64,
    pub(crate) handler: NotifyHandler,
}

impl ClientInner {
    pub(crate) async fn start_notifications(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        handler: NotifyHandler,
    ) -> Result<()> {
        self.ensure_initialized()?;
        let (generation, _) = self.require_connected(device).await?;
        let key = SubscriptionKey {
            device: device.clone(),
            service,
            characteristic,
        };
        let mut subscriptions = self.subscriptions.lock().await;
        if let Some(existing) = subscriptions.get_mut(&key)
            && existing.generation == generation
        {
            // Idempotent re-subscribe: replace the callback without a second
            // transport-level registration.
            existing.handler = handler;
            debug!("replaced notification callback for {characteristic} on {device}");
            return Ok(());
        }
        self.backend
            .start_notifications(device, service, characteristic)
            .await?;
        subscriptions.insert(key, Subscription { generation, handler });
        Ok(())
    }

    /// Removes the subscription and unregisters at the transport. The
    /// registry entry goes away while the lock is held, so any value already
    /// queued behind this call finds no subscription and is dropped.
    pub(crate) async fn stop_notifications(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<()> {
        let key = SubscriptionKey {
            device: device.clone(),
            service,
            characteristic,
        };
        let mut subscriptions = self.subscriptions.lock().await;
        if subscriptions.remove(&key).is_some() {
            self.backend
                .stop_notifications(device, service, characteristic)
                .await?;
        }
        Ok(())
    }

    pub(crate) async fn deliver_notification(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        value: Vec<u8>,
    ) {
        let handler = {
            let generation = {
                let connections = self.connections.lock().await;
                match connections.get(device) {
                    Some(record) if record.state == ConnectionState::Connected => {
                        record.generation
                    }
                    _ => return,
                }
            };
            let subscriptions = self.subscriptions.lock().await;
            let key = SubscriptionKey {
                device: device.clone(),
                service,
                characteristic,
            };
            match subscriptions.get(&key) {
                // Generation compared at delivery time: a value raced in
                // from a previous connection epoch never reaches the caller.
                Some(subscription) if subscription.generation == generation => {
                    subscription.handler.clone()
                }
                _ => return,
            }
        };
        // Awaited inline on the event loop, which preserves arrival order.
        handler.run(value).await;
    }

    pub(crate) async fn prune_stale_subscriptions(
        &self,
        device: &DeviceId,
        current_generation: u64,
    ) {
        let mut subscriptions = self.subscriptions.lock().await;
        subscriptions
            .retain(|key, sub| key.device != *device || sub.generation == current_generation);
    }

    pub(crate) async fn drop_device_subscriptions(&self, device: &DeviceId) {
        let mut subscriptions = self.subscriptions.lock().await;
        subscriptions.retain(|key, _| key.device != *device);
    }
}
