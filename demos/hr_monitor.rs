use std::time::Duration;

use log::LevelFilter;
use tokio::time::sleep;

use blecheck::api::device::DeviceId;
use blecheck::api::options::ScanOptions;
use blecheck::sim::{SimBackend, SimPeripheral};
use blecheck::uuid_util::number_to_uuid;
use blecheck::BleClient;

#[tokio::main]
async fn main() -> blecheck::Result<()> {
    pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .init();

    let heart_rate = number_to_uuid(0x180d);
    let measurement = number_to_uuid(0x2a37);

    let (backend, events) = SimBackend::new();
    backend
        .add_peripheral(
            SimPeripheral::new("polar-1", Some("Polar H10"))
                .advertise(heart_rate)
                .notifying_characteristic(
                    heart_rate,
                    measurement,
                    vec![vec![0, 72], vec![0, 74], vec![0, 71]],
                    Duration::from_millis(500),
                ),
        )
        .await;

    let client = BleClient::new(backend, events);
    client.initialize().await?;

    let device = client
        .request_device(ScanOptions {
            services: vec![heart_rate],
            ..Default::default()
        })
        .await?;
    log::info!("found {} ({})", device.device_id, device.name.as_deref().unwrap_or("?"));

    client
        .connect(&device.device_id, |id: DeviceId| log::warn!("{id} disconnected"))
        .await?;

    client
        .start_notifications(&device.device_id, heart_rate, measurement, |value: Vec<u8>| {
            log::info!("heart rate: {} bpm", value[1]);
        })
        .await?;

    sleep(Duration::from_secs(3)).await;

    client
        .stop_notifications(&device.device_id, heart_rate, measurement)
        .await?;
    client.disconnect(&device.device_id).await?;
    Ok(())
}
