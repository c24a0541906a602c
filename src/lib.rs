pub mod api;
pub mod client;
pub mod error;
pub mod runner;
pub mod sim;
pub mod uuid_util;

pub use client::BleClient;
pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;
