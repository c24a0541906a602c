//! Shared simulated environment for the integration tests: a heart-rate
//! belt, a temperature gadget, an advertised-only test device, a peripheral
//! that refuses bonding and one that never answers connects.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use blecheck::client::{BleClient, ClientConfig};
use blecheck::sim::{SimBackend, SimPeripheral};
use blecheck::uuid_util::number_to_uuid;

pub const POLAR: &str = "polar-1";
pub const ZYX: &str = "zyx-1";
pub const SMART: &str = "smart-1";
pub const REFUSER: &str = "refuser-1";
pub const GHOST: &str = "ghost-1";

pub fn heart_rate_service() -> Uuid {
    number_to_uuid(0x180d)
}

pub fn heart_rate_measurement() -> Uuid {
    number_to_uuid(0x2a37)
}

pub fn body_sensor_location() -> Uuid {
    number_to_uuid(0x2a38)
}

pub fn battery_service() -> Uuid {
    number_to_uuid(0x180f)
}

pub fn battery_level() -> Uuid {
    number_to_uuid(0x2a19)
}

pub fn env_sensing_service() -> Uuid {
    number_to_uuid(0x1822)
}

pub fn test_service() -> Uuid {
    number_to_uuid(0x1111)
}

pub fn test_char_a() -> Uuid {
    number_to_uuid(0x1112)
}

pub fn test_char_b() -> Uuid {
    number_to_uuid(0x1113)
}

pub fn temperature_service() -> Uuid {
    Uuid::from_u128(0x00002234_b38d_4985_720e_0f99_3a68ee41)
}

pub fn temperature_characteristic() -> Uuid {
    Uuid::from_u128(0x00002235_b38d_4985_720e_0f99_3a68ee41)
}

pub const NOTIFY_INTERVAL: Duration = Duration::from_millis(20);

pub struct TestRig {
    pub backend: Arc<SimBackend>,
    pub client: BleClient,
}

pub async fn rig() -> TestRig {
    let (backend, events) = SimBackend::new();
    backend.set_connect_latency(Duration::from_millis(2)).await;
    backend.set_adv_interval(Duration::from_millis(10)).await;

    backend
        .add_peripheral(
            SimPeripheral::new(POLAR, Some("Polar H10"))
                .advertise(heart_rate_service())
                .rssi(-55)
                .characteristic(heart_rate_service(), body_sensor_location(), vec![1])
                .characteristic(battery_service(), battery_level(), vec![77])
                .notifying_characteristic(
                    heart_rate_service(),
                    heart_rate_measurement(),
                    vec![vec![6, 72], vec![6, 74], vec![6, 71]],
                    NOTIFY_INTERVAL,
                ),
        )
        .await;

    backend
        .add_peripheral(
            SimPeripheral::new(ZYX, Some("zyx"))
                .advertise(heart_rate_service())
                .advertise(env_sensing_service())
                .rssi(-42)
                .manufacturer_data(1281, vec![238, 0, 255])
                .service_data(heart_rate_service(), vec![255, 0, 238])
                .fixed_len_characteristic(test_service(), test_char_a(), vec![0], 1)
                .fixed_len_characteristic(test_service(), test_char_b(), vec![0], 1),
        )
        .await;

    backend
        .add_peripheral(
            SimPeripheral::new(SMART, Some("Smart Humigadget"))
                .advertise(temperature_service())
                .characteristic(battery_service(), battery_level(), vec![88])
                .notifying_characteristic(
                    temperature_service(),
                    temperature_characteristic(),
                    vec![22.5f32.to_le_bytes().to_vec()],
                    NOTIFY_INTERVAL,
                ),
        )
        .await;

    backend
        .add_peripheral(
            SimPeripheral::new(REFUSER, Some("No Pairing"))
                .advertise(env_sensing_service())
                .refuse_bond(),
        )
        .await;

    backend
        .add_peripheral(
            SimPeripheral::new(GHOST, Some("Ghost"))
                .advertise(number_to_uuid(0x1823))
                .unreachable(),
        )
        .await;

    let client = BleClient::with_config(
        backend.clone(),
        events,
        ClientConfig {
            connect_timeout: Duration::from_millis(150),
            request_device_timeout: Duration::from_millis(250),
        },
    );
    TestRig { backend, client }
}

/// Waits long enough for queued events to drain through the client's
/// event loop.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(40)).await;
}
