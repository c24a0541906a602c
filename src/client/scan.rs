//! Scan session management. At most one session is active; starting a new
//! scan implicitly stops the previous one.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::api::device::{BleDevice, DeviceId, ScanResult};
use crate::api::options::ScanOptions;
use crate::client::ClientInner;
use crate::client::handlers::ScanCallback;
use crate::{Error, Result};

pub(crate) struct ScanSession {
    options: ScanOptions,
    callback: ScanCallback,
    seen: HashSet<DeviceId>,
}

impl ClientInner {
    pub(crate) async fn request_le_scan(
        &self,
        options: ScanOptions,
        callback: ScanCallback,
    ) -> Result<()> {
        self.ensure_initialized()?;
        let mut scan = self.scan.lock().await;
        if scan.take().is_some() {
            debug!("stopping previous scan session");
            if let Err(e) = self.backend.stop_scan().await {
                warn!("failed to stop previous scan: {e}");
            }
        }
        self.backend.start_scan(&options).await?;
        *scan = Some(ScanSession {
            options,
            callback,
            seen: HashSet::new(),
        });
        Ok(())
    }

    /// Safe to call with no scan active.
    pub(crate) async fn stop_le_scan(&self) -> Result<()> {
        let mut scan = self.scan.lock().await;
        if scan.take().is_some() {
            self.backend.stop_scan().await?;
        }
        Ok(())
    }

    pub(crate) async fn deliver_scan_result(&self, result: ScanResult) {
        let callback = {
            let mut scan = self.scan.lock().await;
            let Some(session) = scan.as_mut() else { return };
            if !session
                .options
                .matches(result.device.name.as_deref(), &result.uuids)
            {
                return;
            }
            if !session.options.allow_duplicates
                && !session.seen.insert(result.device.device_id.clone())
            {
                return;
            }
            Arc::clone(&session.callback)
        };
        if std::panic::catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
            warn!("scan result callback panicked");
        }
    }

    /// One-shot scan: resolves with the first matching device, or times out.
    pub(crate) async fn request_device(&self, mut options: ScanOptions) -> Result<BleDevice> {
        self.ensure_initialized()?;
        options.allow_duplicates = false;
        let (tx, mut rx) = mpsc::channel::<ScanResult>(8);
        self.request_le_scan(
            options,
            Arc::new(move |result| {
                let _ = tx.try_send(result);
            }),
        )
        .await?;
        let found = timeout(self.config.request_device_timeout, rx.recv()).await;
        if let Err(e) = self.stop_le_scan().await {
            warn!("failed to stop request-device scan: {e}");
        }
        match found {
            Ok(Some(result)) => Ok(result.device),
            _ => Err(Error::ConnectionTimeout("request device".into())),
        }
    }
}
