use std::collections::HashMap;
use std::time::Duration;

use uuid::Uuid;

use crate::api::device::{BleDevice, DeviceId, ScanResult};

/// One scripted peripheral in the simulated environment.
///
/// Built fluently before being handed to
/// [`SimBackend::add_peripheral`](super::SimBackend::add_peripheral):
///
/// ```no_run
/// use blecheck::sim::SimPeripheral;
/// use blecheck::uuid_util::number_to_uuid;
///
/// let hr = number_to_uuid(0x180d);
/// let hrm = number_to_uuid(0x2a37);
/// let polar = SimPeripheral::new("polar-1", Some("Polar H10"))
///     .advertise(hr)
///     .notifying_characteristic(hr, hrm, vec![vec![0, 72]], std::time::Duration::from_millis(20));
/// ```
pub struct SimPeripheral {
    pub(super) id: DeviceId,
    pub(super) name: Option<String>,
    pub(super) advertised: Vec<Uuid>,
    pub(super) rssi: i16,
    pub(super) tx_power: i8,
    pub(super) manufacturer_data: HashMap<u16, Vec<u8>>,
    pub(super) service_data: HashMap<Uuid, Vec<u8>>,
    pub(super) unreachable: bool,
    pub(super) refuse_bond: bool,
    pub(super) bonded: bool,
    pub(super) connected: bool,
    pub(super) characteristics: HashMap<(Uuid, Uuid), SimCharacteristic>,
}

pub(super) struct SimCharacteristic {
    pub(super) value: Vec<u8>,
    pub(super) fixed_len: Option<usize>,
    pub(super) notify_values: Vec<Vec<u8>>,
    pub(super) notify_interval: Option<Duration>,
}

impl SimPeripheral {
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        SimPeripheral {
            id: DeviceId::new(id),
            name: name.map(str::to_string),
            advertised: Vec::new(),
            rssi: -60,
            tx_power: 0,
            manufacturer_data: HashMap::new(),
            service_data: HashMap::new(),
            unreachable: false,
            refuse_bond: false,
            bonded: false,
            connected: false,
            characteristics: HashMap::new(),
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn advertise(mut self, service: Uuid) -> Self {
        self.advertised.push(service);
        self
    }

    pub fn rssi(mut self, rssi: i16) -> Self {
        self.rssi = rssi;
        self
    }

    pub fn manufacturer_data(mut self, company: u16, data: Vec<u8>) -> Self {
        self.manufacturer_data.insert(company, data);
        self
    }

    pub fn service_data(mut self, service: Uuid, data: Vec<u8>) -> Self {
        self.service_data.insert(service, data);
        self
    }

    /// Readable and writable characteristic with an initial value.
    pub fn characteristic(mut self, service: Uuid, characteristic: Uuid, value: Vec<u8>) -> Self {
        self.characteristics.insert(
            (service, characteristic),
            SimCharacteristic {
                value,
                fixed_len: None,
                notify_values: Vec::new(),
                notify_interval: None,
            },
        );
        self
    }

    /// Characteristic that rejects writes whose payload is not exactly
    /// `len` bytes.
    pub fn fixed_len_characteristic(
        mut self,
        service: Uuid,
        characteristic: Uuid,
        value: Vec<u8>,
        len: usize,
    ) -> Self {
        self.characteristics.insert(
            (service, characteristic),
            SimCharacteristic {
                value,
                fixed_len: Some(len),
                notify_values: Vec::new(),
                notify_interval: None,
            },
        );
        self
    }

    /// Characteristic that cycles through `values` at `interval` while
    /// subscribed.
    pub fn notifying_characteristic(
        mut self,
        service: Uuid,
        characteristic: Uuid,
        values: Vec<Vec<u8>>,
        interval: Duration,
    ) -> Self {
        self.characteristics.insert(
            (service, characteristic),
            SimCharacteristic {
                value: values.first().cloned().unwrap_or_default(),
                fixed_len: None,
                notify_values: values,
                notify_interval: Some(interval),
            },
        );
        self
    }

    /// Connect attempts to this peripheral hang until the client's timeout.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Bonding attempts fail as if the pairing dialog was canceled.
    pub fn refuse_bond(mut self) -> Self {
        self.refuse_bond = true;
        self
    }

    pub(super) fn advertisement(&self) -> ScanResult {
        let device = BleDevice {
            device_id: self.id.clone(),
            name: self.name.clone(),
        };
        ScanResult {
            local_name: self.name.clone(),
            rssi: Some(self.rssi),
            tx_power: Some(self.tx_power),
            manufacturer_data: self.manufacturer_data.clone(),
            service_data: self.service_data.clone(),
            uuids: self.advertised.clone(),
            device,
        }
    }
}
