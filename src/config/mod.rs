use serde::{Deserialize, Serialize};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Baud rates offered by the connection form.
pub const SUPPORTED_BAUD_RATES: [u32; 8] = [
    9_600, 19_200, 38_400, 57_600, 115_200, 230_400, 460_800, 921_600,
];

/// Adapter family driving the physical link. Everything except the Pico
/// bridge expects outbound commands to carry a trailing checksum byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportProfile {
    Pico,
    Ch341,
    UsbTtl,
    Other,
}

impl TransportProfile {
    pub fn requires_checksum(&self) -> bool {
        !matches!(self, TransportProfile::Pico)
    }

    /// Frame an outbound command for the wire: `<command>\n`, or
    /// `<command>:<checksum>\n` when the profile requires checksum framing.
    pub fn frame(&self, command: &str) -> String {
        if self.requires_checksum() {
            format!("{}:{:02X}\n", command, command_checksum(command))
        } else {
            format!("{}\n", command)
        }
    }
}

impl Default for TransportProfile {
    fn default() -> Self {
        TransportProfile::Pico
    }
}

/// Sum of the command bytes, truncated to one byte.
pub fn command_checksum(command: &str) -> u8 {
    command.bytes().fold(0u8, |sum, byte| sum.wrapping_add(byte))
}

/// Connection settings for a single serial session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub profile: TransportProfile,
}

impl LinkSettings {
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            profile: TransportProfile::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_sum_of_bytes_mod_256() {
        assert_eq!(command_checksum("version"), 0x06);
        assert_eq!(command_checksum(""), 0x00);
    }

    #[test]
    fn test_frame_roundtrip() {
        let framed = TransportProfile::Ch341.frame("errlog 0");
        let body = framed.trim_end();
        let (command, checksum) = body.split_once(':').unwrap();
        assert_eq!(command, "errlog 0");
        assert_eq!(checksum, format!("{:02X}", command_checksum(command)));
    }

    #[test]
    fn test_pico_frames_without_checksum() {
        assert_eq!(TransportProfile::Pico.frame("version"), "version\n");
        assert!(!TransportProfile::Pico.requires_checksum());
        assert!(TransportProfile::UsbTtl.requires_checksum());
    }
}
