pub mod interface;
pub mod reader;

pub use interface::{SerialInterface, SerialPortIO};
pub use reader::{LinkEvent, PortCommand};

use serde::{Deserialize, Serialize};

/// Identity of a serial port as offered to the connection form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialDeviceInfo {
    pub port_name: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl SerialDeviceInfo {
    /// Human-readable `PORT - description` label.
    pub fn label(&self) -> String {
        match self.product.as_deref().or(self.manufacturer.as_deref()) {
            Some(desc) => format!("{} - {}", self.port_name, desc),
            None => self.port_name.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Communication timeout")]
    Timeout,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;
