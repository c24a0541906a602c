use uuid::Uuid;

use crate::api::device::{DeviceId, ScanResult};

/// Asynchronous, out-of-band reports from the platform backend.
///
/// Backends push these onto the mpsc channel handed out at construction; the
/// client consumes them on a single event-loop task, so no two events are
/// ever handled concurrently.
#[derive(Clone, Debug)]
pub enum BackendEvent {
    AdapterStateChanged {
        enabled: bool,
    },
    DeviceDisconnected {
        device: DeviceId,
    },
    NotificationReceived {
        device: DeviceId,
        service: Uuid,
        characteristic: Uuid,
        value: Vec<u8>,
    },
    ScanResult {
        result: ScanResult,
    },
}
