use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use log::error;

use crate::api::device::{DeviceId, ScanResult};

/// Callback invoked with each notification value, in arrival order.
#[derive(Clone)]
pub enum NotifyHandler {
    Sync(Arc<dyn Fn(Vec<u8>) + Send + Sync>),
    Async(Arc<dyn Fn(Vec<u8>) -> BoxFuture<'static, ()> + Send + Sync>),
}

impl NotifyHandler {
    pub fn from_async(
        func: impl Fn(Vec<u8>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    ) -> Self {
        NotifyHandler::Async(Arc::new(func))
    }

    /// A panicking callback is logged and contained; it must not take the
    /// event loop down with it.
    pub(crate) async fn run(&self, value: Vec<u8>) {
        let faulted = match self {
            NotifyHandler::Sync(f) => {
                std::panic::catch_unwind(AssertUnwindSafe(|| f(value))).is_err()
            }
            NotifyHandler::Async(f) => {
                AssertUnwindSafe(f(value)).catch_unwind().await.is_err()
            }
        };
        if faulted {
            error!("notification callback panicked");
        }
    }
}

impl<F: Fn(Vec<u8>) + Send + Sync + 'static> From<F> for NotifyHandler {
    fn from(func: F) -> Self {
        NotifyHandler::Sync(Arc::new(func))
    }
}

/// Callback fired with the originating device id, at most once per physical
/// disconnect. The handler stays registered for the next connect cycle.
#[derive(Clone, Default)]
pub enum DisconnectHandler {
    #[default]
    None,
    Sync(Arc<dyn Fn(DeviceId) + Send + Sync>),
    Async(Arc<dyn Fn(DeviceId) -> BoxFuture<'static, ()> + Send + Sync>),
}

impl DisconnectHandler {
    pub fn from_async(
        func: impl Fn(DeviceId) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    ) -> Self {
        DisconnectHandler::Async(Arc::new(func))
    }

    pub(crate) async fn run(&self, device: DeviceId) {
        let faulted = match self {
            DisconnectHandler::None => false,
            DisconnectHandler::Sync(f) => {
                std::panic::catch_unwind(AssertUnwindSafe(|| f(device))).is_err()
            }
            DisconnectHandler::Async(f) => {
                AssertUnwindSafe(f(device)).catch_unwind().await.is_err()
            }
        };
        if faulted {
            error!("disconnect callback panicked");
        }
    }
}

impl<F: Fn(DeviceId) + Send + Sync + 'static> From<F> for DisconnectHandler {
    fn from(func: F) -> Self {
        DisconnectHandler::Sync(Arc::new(func))
    }
}

pub(crate) type EnabledCallback = Arc<dyn Fn(bool) + Send + Sync>;

pub(crate) type ScanCallback = Arc<dyn Fn(ScanResult) + Send + Sync>;
