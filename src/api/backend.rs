use async_trait::async_trait;
use uuid::Uuid;

use crate::Result;
use crate::api::device::DeviceId;
use crate::api::options::{DisplayStrings, ScanOptions, WriteType};

/// The platform collaborator: the OS Bluetooth stack (or a simulation of it).
///
/// Implementations deliver scan results, notification values, disconnects and
/// adapter-state changes through the [`BackendEvent`](crate::api::event::BackendEvent)
/// channel created alongside the backend. Request/response calls resolve when
/// the platform acknowledges them; `connect` may block until the link is up
/// and is bounded by the client's own timeout.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn initialize(&self) -> Result<()>;

    async fn is_enabled(&self) -> Result<bool>;

    /// Registers the single adapter-state listener. The client forwards at
    /// most one registration regardless of how many caller subscriptions
    /// come and go.
    async fn start_enabled_notifications(&self) -> Result<()>;

    async fn stop_enabled_notifications(&self) -> Result<()>;

    /// Begins advertisement delivery. Filtering is the client's concern;
    /// backends may deliver unfiltered reports.
    async fn start_scan(&self, options: &ScanOptions) -> Result<()>;

    async fn stop_scan(&self) -> Result<()>;

    async fn connect(&self, device: &DeviceId) -> Result<()>;

    async fn disconnect(&self, device: &DeviceId) -> Result<()>;

    /// May fail with [`Error::Unavailable`](crate::Error::Unavailable) on
    /// platforms without bonding support.
    async fn create_bond(&self, device: &DeviceId) -> Result<()>;

    async fn is_bonded(&self, device: &DeviceId) -> Result<bool>;

    async fn read(&self, device: &DeviceId, service: Uuid, characteristic: Uuid)
    -> Result<Vec<u8>>;

    async fn write(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
        write_type: WriteType,
    ) -> Result<()>;

    async fn start_notifications(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<()>;

    async fn stop_notifications(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<()>;

    /// Only meaningful on backends that show a native scan UI.
    async fn set_display_strings(&self, strings: &DisplayStrings) -> Result<()>;
}
