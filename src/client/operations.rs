//! Read/write dispatch. Every device carries its own operation lock; queue
//! mode serializes concurrent calls in submission order, reject mode fails
//! fast with `Busy`. Devices never block each other.

use std::sync::atomic::Ordering;

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::api::device::DeviceId;
use crate::api::options::WriteType;
use crate::client::ClientInner;
use crate::{Error, Result};

/// ATT long-write ceiling; larger payloads are rejected client-side.
const MAX_WRITE_LEN: usize = 512;

impl ClientInner {
    async fn acquire_device(&self, device: &DeviceId) -> Result<OwnedMutexGuard<()>> {
        let (_, lock) = self.require_connected(device).await?;
        if self.queue_enabled.load(Ordering::SeqCst) {
            Ok(lock.lock_owned().await)
        } else {
            lock.try_lock_owned()
                .map_err(|_| Error::Busy(device.clone()))
        }
    }

    pub(crate) async fn read(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>> {
        self.ensure_initialized()?;
        let _guard = self.acquire_device(device).await?;
        self.backend.read(device, service, characteristic).await
    }

    pub(crate) async fn write(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
        write_type: WriteType,
    ) -> Result<()> {
        self.ensure_initialized()?;
        if value.is_empty() {
            return Err(Error::WriteRejected("empty payload".into()));
        }
        if value.len() > MAX_WRITE_LEN {
            return Err(Error::WriteRejected(format!(
                "payload of {} bytes exceeds the {MAX_WRITE_LEN} byte limit",
                value.len()
            )));
        }
        let _guard = self.acquire_device(device).await?;
        self.backend
            .write(device, service, characteristic, value, write_type)
            .await
    }
}
