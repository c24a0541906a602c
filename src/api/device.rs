use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

/// Opaque handle for a physical device, unique per session.
///
/// The client assumes nothing about the contents beyond equality; backends
/// are free to use MAC addresses, platform identifiers or anything else.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        DeviceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        DeviceId(id.to_string())
    }
}

/// A device as returned by discovery.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BleDevice {
    pub device_id: DeviceId,
    pub name: Option<String>,
}

/// One advertisement report delivered during a scan.
#[derive(Clone, Debug)]
pub struct ScanResult {
    pub device: BleDevice,
    pub local_name: Option<String>,
    pub rssi: Option<i16>,
    pub tx_power: Option<i8>,
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    pub service_data: HashMap<Uuid, Vec<u8>>,
    pub uuids: Vec<Uuid>,
}

impl ScanResult {
    /// A bare report carrying only identity and advertised services.
    pub fn new(device: BleDevice, uuids: Vec<Uuid>) -> Self {
        let local_name = device.name.clone();
        ScanResult {
            device,
            local_name,
            rssi: None,
            tx_power: None,
            manufacturer_data: HashMap::new(),
            service_data: HashMap::new(),
            uuids,
        }
    }
}
