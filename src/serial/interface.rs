use std::io::{Read, Write};
use std::time::Duration;

use async_trait::async_trait;
use serialport::{SerialPort, SerialPortType};
use tokio::time::timeout;

use super::{Result, SerialDeviceInfo, SerialError};
use crate::config::LinkSettings;

const OPEN_TIMEOUT: Duration = Duration::from_millis(1000);
const POLL_SLEEP: Duration = Duration::from_millis(10);
const MAX_POLL_ATTEMPTS: usize = 100;

/// Byte-level port I/O as seen by the link reader. Implemented by the real
/// serial interface and by scripted doubles in tests and simulators.
#[async_trait]
pub trait SerialPortIO: Send {
    /// Write a full frame and flush it to the device.
    async fn send_data(&mut self, data: &[u8]) -> Result<usize>;

    /// Read whatever bytes are available within `timeout_ms`, sleeping
    /// briefly between empty polls so the caller never busy-waits.
    async fn read_data(&mut self, buffer: &mut [u8], timeout_ms: u64) -> Result<usize>;
}

pub struct SerialInterface {
    port: Option<Box<dyn SerialPort>>,
    port_name: Option<String>,
}

impl SerialInterface {
    pub fn new() -> Self {
        Self {
            port: None,
            port_name: None,
        }
    }

    /// List every serial port on the host with its USB identity when known.
    pub fn discover_ports() -> Result<Vec<SerialDeviceInfo>> {
        let ports = serialport::available_ports()?;
        let mut devices = Vec::new();

        for port in ports {
            let mut device = SerialDeviceInfo {
                port_name: port.port_name.clone(),
                vid: None,
                pid: None,
                serial_number: None,
                manufacturer: None,
                product: None,
            };
            if let SerialPortType::UsbPort(usb) = port.port_type {
                device.vid = Some(usb.vid);
                device.pid = Some(usb.pid);
                device.serial_number = usb.serial_number;
                device.manufacturer = usb.manufacturer;
                device.product = usb.product;
            }
            devices.push(device);
        }

        Ok(devices)
    }

    /// Open the configured port. Fails closed: an error leaves no open
    /// handle behind.
    pub fn open(settings: &LinkSettings) -> Result<Self> {
        let port = serialport::new(settings.port_name.as_str(), settings.baud_rate)
            .timeout(OPEN_TIMEOUT)
            .open()
            .map_err(|e| SerialError::ConnectionFailed(e.to_string()))?;

        log::info!(
            "opened {} at {} baud",
            settings.port_name,
            settings.baud_rate
        );
        Ok(Self {
            port: Some(port),
            port_name: Some(settings.port_name.clone()),
        })
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    pub fn close(&mut self) {
        if let Some(name) = &self.port_name {
            log::info!("closing {}", name);
        }
        self.port = None;
        self.port_name = None;
    }
}

impl Default for SerialInterface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SerialPortIO for SerialInterface {
    async fn send_data(&mut self, data: &[u8]) -> Result<usize> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| SerialError::ConnectionFailed("port not open".to_string()))?;

        let written = port.write(data).map_err(SerialError::IoError)?;
        port.flush().map_err(SerialError::IoError)?;

        Ok(written)
    }

    async fn read_data(&mut self, buffer: &mut [u8], timeout_ms: u64) -> Result<usize> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| SerialError::ConnectionFailed("port not open".to_string()))?;

        let read_operation = async {
            let mut attempts = 0;
            loop {
                match port.bytes_to_read() {
                    Ok(0) => {
                        if attempts >= MAX_POLL_ATTEMPTS {
                            return Err(SerialError::Timeout);
                        }
                        attempts += 1;
                        tokio::time::sleep(POLL_SLEEP).await;
                    }
                    Ok(_) => match port.read(buffer) {
                        Ok(bytes_read) => return Ok(bytes_read),
                        Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                            attempts += 1;
                        }
                        Err(e) => return Err(SerialError::IoError(e)),
                    },
                    Err(e) => return Err(SerialError::SerialportError(e)),
                }
            }
        };

        timeout(Duration::from_millis(timeout_ms), read_operation)
            .await
            .map_err(|_| SerialError::Timeout)?
    }
}
