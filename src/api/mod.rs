pub mod backend;
pub mod device;
pub mod event;
pub mod options;
