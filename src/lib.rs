pub mod config;
pub mod device;
pub mod errlog;
pub mod serial;

pub use config::{LinkSettings, TransportProfile};
pub use device::{ConnectionState, DeviceError, DeviceManager, FetchState, MonitorEvent};
pub use errlog::{DecodedRecord, DiagnosticRecord, LogStore, SeverityTag};
