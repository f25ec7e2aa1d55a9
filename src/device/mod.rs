pub mod manager;
pub mod models;

pub(crate) mod dispatcher;

pub use manager::DeviceManager;
pub use models::{ConnectionState, FetchState, MonitorEvent};

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Device not connected")]
    NotConnected,

    #[error("Device already connected")]
    AlreadyConnected,

    #[error("Log fetch sequence already in progress")]
    FetchInProgress,

    #[error("Serial communication error: {0}")]
    Serial(#[from] crate::serial::SerialError),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
